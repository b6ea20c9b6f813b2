use serde_json::{json, Value as JsonValue};

use crate::blocks::{Block, BlockKind};

/// Builds the display models the host shell renders for a lesson. Pure over
/// the stored block JSON: every field is defaulted when missing, and a tag
/// this build does not know produces a visible placeholder instead of an
/// error. Interactive kinds carry initial view state only; none of it is
/// ever written back.
pub fn render_blocks(blocks: &[Block]) -> Vec<JsonValue> {
    let mut ordered: Vec<&Block> = blocks.iter().collect();
    ordered.sort_by_key(|b| b.order);
    ordered.iter().map(|b| render_block(b)).collect()
}

pub fn render_block(block: &Block) -> JsonValue {
    let Some(kind) = BlockKind::parse(&block.block_type) else {
        return json!({
            "kind": "unknown",
            "id": block.id,
            "tag": block.block_type,
            "placeholder": format!("Unsupported content block: {}", block.block_type),
        });
    };

    let d = &block.data;
    let mut view = match kind {
        BlockKind::Video => json!({
            "url": s(d, "url"),
            "title": s(d, "title"),
            "description": s(d, "description"),
        }),
        BlockKind::Image => json!({
            "url": s(d, "url"),
            "alt": s(d, "alt"),
            "caption": s(d, "caption"),
        }),
        BlockKind::Text => json!({ "text": s(d, "text") }),
        BlockKind::Quiz => json!({
            "title": s(d, "title"),
            "questions": arr(d, "questions"),
        }),
        BlockKind::File => json!({ "url": s(d, "url"), "name": s(d, "name") }),
        BlockKind::Embed => json!({ "url": s(d, "url"), "height": int(d, "height", 400) }),
        BlockKind::Heading => json!({ "text": s(d, "text"), "level": int(d, "level", 2) }),
        BlockKind::Divider => json!({}),
        BlockKind::BulletList => json!({ "items": arr(d, "items") }),
        BlockKind::NumberedList => json!({ "items": arr(d, "items") }),
        BlockKind::NumberedSteps => json!({ "steps": arr(d, "steps") }),
        BlockKind::Accordion => json!({ "sections": arr(d, "sections") }),
        BlockKind::Flashcard => json!({
            "front": s(d, "front"),
            "back": s(d, "back"),
            "side": "front",
        }),
        BlockKind::FlashcardDeck => json!({
            "title": s(d, "title"),
            "cards": arr(d, "cards"),
            "currentIndex": 0,
        }),
        BlockKind::Slider => json!({
            "label": s(d, "label"),
            "min": int(d, "min", 0),
            "max": int(d, "max", 100),
            "step": int(d, "step", 1),
        }),
        BlockKind::Reveal => json!({
            "prompt": s(d, "prompt"),
            "content": s(d, "content"),
            "revealed": false,
        }),
        BlockKind::Callout => json!({ "style": s_or(d, "style", "info"), "text": s(d, "text") }),
        BlockKind::HighlightBox => json!({ "title": s(d, "title"), "text": s(d, "text") }),
        BlockKind::Table => json!({ "headers": arr(d, "headers"), "rows": arr(d, "rows") }),
        BlockKind::Tabs => json!({ "tabs": arr(d, "tabs"), "activeIndex": 0 }),
        BlockKind::ImageGallery => json!({ "images": arr(d, "images") }),
        BlockKind::Audio => json!({ "url": s(d, "url"), "title": s(d, "title") }),
        BlockKind::FileDownload => json!({
            "url": s(d, "url"),
            "name": s(d, "name"),
            "sizeLabel": s(d, "sizeLabel"),
        }),
        BlockKind::Checklist => json!({ "items": arr(d, "items") }),
        BlockKind::Quote => json!({ "text": s(d, "text"), "attribution": s(d, "attribution") }),
        BlockKind::Glossary => json!({ "terms": arr(d, "terms") }),
        BlockKind::Definition => json!({
            "term": s(d, "term"),
            "definition": s(d, "definition"),
        }),
        BlockKind::Comparison => json!({
            "leftTitle": s(d, "leftTitle"),
            "rightTitle": s(d, "rightTitle"),
            "rows": arr(d, "rows"),
        }),
        BlockKind::Timeline => json!({ "events": arr(d, "events") }),
        BlockKind::ProcessFlow => json!({ "steps": arr(d, "steps") }),
        BlockKind::Stats => json!({ "items": arr(d, "items") }),
        BlockKind::Code => json!({ "language": s(d, "language"), "code": s(d, "code") }),
        BlockKind::Formula => json!({ "latex": s(d, "latex"), "caption": s(d, "caption") }),
        BlockKind::Citation => json!({
            "text": s(d, "text"),
            "source": s(d, "source"),
            "url": s(d, "url"),
        }),
        BlockKind::KnowledgeCheck => json!({
            "question": s(d, "question"),
            "options": arr(d, "options"),
            "correctIndex": int(d, "correctIndex", 0),
            "explanation": s(d, "explanation"),
            "selectedIndex": JsonValue::Null,
            "answered": false,
        }),
        BlockKind::Reflection => json!({ "prompt": s(d, "prompt") }),
        BlockKind::Poll => json!({
            "question": s(d, "question"),
            "options": arr(d, "options"),
            "selectedIndex": JsonValue::Null,
        }),
        BlockKind::Discussion => json!({ "prompt": s(d, "prompt") }),
        BlockKind::Scenario => json!({
            "setup": s(d, "setup"),
            "choices": arr(d, "choices"),
            "chosenIndex": JsonValue::Null,
        }),
        BlockKind::DragDrop => json!({
            "prompt": s(d, "prompt"),
            "items": arr(d, "items"),
            "targets": arr(d, "targets"),
        }),
        BlockKind::TwoColumn => json!({ "left": s(d, "left"), "right": s(d, "right") }),
        BlockKind::ThreeColumn => json!({
            "left": s(d, "left"),
            "middle": s(d, "middle"),
            "right": s(d, "right"),
        }),
        BlockKind::CardGrid => json!({ "cards": arr(d, "cards") }),
        BlockKind::Spacer => json!({ "height": int(d, "height", 24) }),
        BlockKind::HotspotImage => json!({ "url": s(d, "url"), "hotspots": arr(d, "hotspots") }),
    };

    let obj = view.as_object_mut().expect("views are objects");
    obj.insert("kind".to_string(), json!(kind.tag()));
    obj.insert("id".to_string(), json!(block.id));
    view
}

fn s(data: &JsonValue, key: &str) -> String {
    data.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn s_or(data: &JsonValue, key: &str, default: &str) -> String {
    let v = s(data, key);
    if v.is_empty() {
        default.to_string()
    } else {
        v
    }
}

fn int(data: &JsonValue, key: &str, default: i64) -> i64 {
    data.get(key).and_then(|v| v.as_i64()).unwrap_or(default)
}

fn arr(data: &JsonValue, key: &str) -> Vec<JsonValue> {
    data.get(key)
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}
