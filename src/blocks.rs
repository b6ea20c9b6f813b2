use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

/// Closed set of content block kinds the builder and the read path agree on.
/// Tags read back from storage that predate this enum stay unparsed and are
/// rendered as placeholders, never dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Video,
    Image,
    Text,
    Quiz,
    File,
    Embed,
    Heading,
    Divider,
    BulletList,
    NumberedList,
    NumberedSteps,
    Accordion,
    Flashcard,
    FlashcardDeck,
    Slider,
    Reveal,
    Callout,
    HighlightBox,
    Table,
    Tabs,
    ImageGallery,
    Audio,
    FileDownload,
    Checklist,
    Quote,
    Glossary,
    Definition,
    Comparison,
    Timeline,
    ProcessFlow,
    Stats,
    Code,
    Formula,
    Citation,
    KnowledgeCheck,
    Reflection,
    Poll,
    Discussion,
    Scenario,
    DragDrop,
    TwoColumn,
    ThreeColumn,
    CardGrid,
    Spacer,
    HotspotImage,
}

pub const ALL_TAGS: &[&str] = &[
    "video",
    "image",
    "text",
    "quiz",
    "file",
    "embed",
    "heading",
    "divider",
    "bullet_list",
    "numbered_list",
    "numbered_steps",
    "accordion",
    "flashcard",
    "flashcard_deck",
    "slider",
    "reveal",
    "callout",
    "highlight_box",
    "table",
    "tabs",
    "image_gallery",
    "audio",
    "file_download",
    "checklist",
    "quote",
    "glossary",
    "definition",
    "comparison",
    "timeline",
    "process_flow",
    "stats",
    "code",
    "formula",
    "citation",
    "knowledge_check",
    "reflection",
    "poll",
    "discussion",
    "scenario",
    "drag_drop",
    "two_column",
    "three_column",
    "card_grid",
    "spacer",
    "hotspot_image",
];

impl BlockKind {
    pub fn parse(tag: &str) -> Option<BlockKind> {
        let kind = match tag {
            "video" => BlockKind::Video,
            "image" => BlockKind::Image,
            "text" => BlockKind::Text,
            "quiz" => BlockKind::Quiz,
            "file" => BlockKind::File,
            "embed" => BlockKind::Embed,
            "heading" => BlockKind::Heading,
            "divider" => BlockKind::Divider,
            "bullet_list" => BlockKind::BulletList,
            "numbered_list" => BlockKind::NumberedList,
            "numbered_steps" => BlockKind::NumberedSteps,
            "accordion" => BlockKind::Accordion,
            "flashcard" => BlockKind::Flashcard,
            "flashcard_deck" => BlockKind::FlashcardDeck,
            "slider" => BlockKind::Slider,
            "reveal" => BlockKind::Reveal,
            "callout" => BlockKind::Callout,
            "highlight_box" => BlockKind::HighlightBox,
            "table" => BlockKind::Table,
            "tabs" => BlockKind::Tabs,
            "image_gallery" => BlockKind::ImageGallery,
            "audio" => BlockKind::Audio,
            "file_download" => BlockKind::FileDownload,
            "checklist" => BlockKind::Checklist,
            "quote" => BlockKind::Quote,
            "glossary" => BlockKind::Glossary,
            "definition" => BlockKind::Definition,
            "comparison" => BlockKind::Comparison,
            "timeline" => BlockKind::Timeline,
            "process_flow" => BlockKind::ProcessFlow,
            "stats" => BlockKind::Stats,
            "code" => BlockKind::Code,
            "formula" => BlockKind::Formula,
            "citation" => BlockKind::Citation,
            "knowledge_check" => BlockKind::KnowledgeCheck,
            "reflection" => BlockKind::Reflection,
            "poll" => BlockKind::Poll,
            "discussion" => BlockKind::Discussion,
            "scenario" => BlockKind::Scenario,
            "drag_drop" => BlockKind::DragDrop,
            "two_column" => BlockKind::TwoColumn,
            "three_column" => BlockKind::ThreeColumn,
            "card_grid" => BlockKind::CardGrid,
            "spacer" => BlockKind::Spacer,
            "hotspot_image" => BlockKind::HotspotImage,
            _ => return None,
        };
        Some(kind)
    }

    pub fn tag(self) -> &'static str {
        match self {
            BlockKind::Video => "video",
            BlockKind::Image => "image",
            BlockKind::Text => "text",
            BlockKind::Quiz => "quiz",
            BlockKind::File => "file",
            BlockKind::Embed => "embed",
            BlockKind::Heading => "heading",
            BlockKind::Divider => "divider",
            BlockKind::BulletList => "bullet_list",
            BlockKind::NumberedList => "numbered_list",
            BlockKind::NumberedSteps => "numbered_steps",
            BlockKind::Accordion => "accordion",
            BlockKind::Flashcard => "flashcard",
            BlockKind::FlashcardDeck => "flashcard_deck",
            BlockKind::Slider => "slider",
            BlockKind::Reveal => "reveal",
            BlockKind::Callout => "callout",
            BlockKind::HighlightBox => "highlight_box",
            BlockKind::Table => "table",
            BlockKind::Tabs => "tabs",
            BlockKind::ImageGallery => "image_gallery",
            BlockKind::Audio => "audio",
            BlockKind::FileDownload => "file_download",
            BlockKind::Checklist => "checklist",
            BlockKind::Quote => "quote",
            BlockKind::Glossary => "glossary",
            BlockKind::Definition => "definition",
            BlockKind::Comparison => "comparison",
            BlockKind::Timeline => "timeline",
            BlockKind::ProcessFlow => "process_flow",
            BlockKind::Stats => "stats",
            BlockKind::Code => "code",
            BlockKind::Formula => "formula",
            BlockKind::Citation => "citation",
            BlockKind::KnowledgeCheck => "knowledge_check",
            BlockKind::Reflection => "reflection",
            BlockKind::Poll => "poll",
            BlockKind::Discussion => "discussion",
            BlockKind::Scenario => "scenario",
            BlockKind::DragDrop => "drag_drop",
            BlockKind::TwoColumn => "two_column",
            BlockKind::ThreeColumn => "three_column",
            BlockKind::CardGrid => "card_grid",
            BlockKind::Spacer => "spacer",
            BlockKind::HotspotImage => "hotspot_image",
        }
    }

    /// Empty data shape a freshly created block starts from. Every field is
    /// optional on read; the editor and renderer default anything missing.
    /// Shapes stay flat so the shallow-merge update primitive is always safe.
    pub fn default_data(self) -> JsonValue {
        match self {
            BlockKind::Video => json!({ "url": "", "title": "", "description": "" }),
            BlockKind::Image => json!({ "url": "", "alt": "", "caption": "" }),
            BlockKind::Text => json!({ "text": "" }),
            BlockKind::Quiz => json!({ "title": "", "questions": [] }),
            BlockKind::File => json!({ "url": "", "name": "" }),
            BlockKind::Embed => json!({ "url": "", "height": 400 }),
            BlockKind::Heading => json!({ "text": "", "level": 2 }),
            BlockKind::Divider => json!({}),
            BlockKind::BulletList => json!({ "items": [] }),
            BlockKind::NumberedList => json!({ "items": [] }),
            BlockKind::NumberedSteps => json!({ "steps": [] }),
            BlockKind::Accordion => json!({ "sections": [] }),
            BlockKind::Flashcard => json!({ "front": "", "back": "" }),
            BlockKind::FlashcardDeck => json!({ "title": "", "cards": [] }),
            BlockKind::Slider => json!({ "label": "", "min": 0, "max": 100, "step": 1 }),
            BlockKind::Reveal => json!({ "prompt": "", "content": "" }),
            BlockKind::Callout => json!({ "style": "info", "text": "" }),
            BlockKind::HighlightBox => json!({ "title": "", "text": "" }),
            BlockKind::Table => json!({ "headers": [], "rows": [] }),
            BlockKind::Tabs => json!({ "tabs": [] }),
            BlockKind::ImageGallery => json!({ "images": [] }),
            BlockKind::Audio => json!({ "url": "", "title": "" }),
            BlockKind::FileDownload => json!({ "url": "", "name": "", "sizeLabel": "" }),
            BlockKind::Checklist => json!({ "items": [] }),
            BlockKind::Quote => json!({ "text": "", "attribution": "" }),
            BlockKind::Glossary => json!({ "terms": [] }),
            BlockKind::Definition => json!({ "term": "", "definition": "" }),
            BlockKind::Comparison => json!({ "leftTitle": "", "rightTitle": "", "rows": [] }),
            BlockKind::Timeline => json!({ "events": [] }),
            BlockKind::ProcessFlow => json!({ "steps": [] }),
            BlockKind::Stats => json!({ "items": [] }),
            BlockKind::Code => json!({ "language": "", "code": "" }),
            BlockKind::Formula => json!({ "latex": "", "caption": "" }),
            BlockKind::Citation => json!({ "text": "", "source": "", "url": "" }),
            BlockKind::KnowledgeCheck => json!({
                "question": "",
                "options": [],
                "correctIndex": 0,
                "explanation": ""
            }),
            BlockKind::Reflection => json!({ "prompt": "" }),
            BlockKind::Poll => json!({ "question": "", "options": [] }),
            BlockKind::Discussion => json!({ "prompt": "" }),
            BlockKind::Scenario => json!({ "setup": "", "choices": [] }),
            BlockKind::DragDrop => json!({ "prompt": "", "items": [], "targets": [] }),
            BlockKind::TwoColumn => json!({ "left": "", "right": "" }),
            BlockKind::ThreeColumn => json!({ "left": "", "middle": "", "right": "" }),
            BlockKind::CardGrid => json!({ "cards": [] }),
            BlockKind::Spacer => json!({ "height": 24 }),
            BlockKind::HotspotImage => json!({ "url": "", "hotspots": [] }),
        }
    }
}

/// One content block inside a lesson. `block_type` is kept as the raw tag so
/// blocks written by a newer schema survive a load/save round trip intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default = "empty_object")]
    pub data: JsonValue,
    #[serde(default)]
    pub order: i64,
}

fn empty_object() -> JsonValue {
    json!({})
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LessonContent {
    #[serde(default)]
    pub blocks: Vec<Block>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tag_round_trips_through_parse() {
        for tag in ALL_TAGS {
            let kind = BlockKind::parse(tag).unwrap_or_else(|| panic!("unparsed tag {}", tag));
            assert_eq!(kind.tag(), *tag);
        }
        assert_eq!(ALL_TAGS.len(), 45);
    }

    #[test]
    fn unknown_tag_stays_unparsed() {
        assert!(BlockKind::parse("not_a_real_type").is_none());
        assert!(BlockKind::parse("").is_none());
        assert!(BlockKind::parse("VIDEO").is_none());
    }

    #[test]
    fn default_data_is_always_an_object() {
        for tag in ALL_TAGS {
            let kind = BlockKind::parse(tag).unwrap();
            assert!(kind.default_data().is_object(), "tag {}", tag);
        }
    }

    #[test]
    fn block_deserializes_with_missing_data_and_order() {
        let b: Block = serde_json::from_value(serde_json::json!({
            "id": "b1",
            "type": "text"
        }))
        .expect("deserialize");
        assert_eq!(b.block_type, "text");
        assert!(b.data.is_object());
        assert_eq!(b.order, 0);
    }

    #[test]
    fn lesson_content_defaults_to_empty_blocks() {
        let c: LessonContent = serde_json::from_value(serde_json::json!({})).expect("deserialize");
        assert!(c.blocks.is_empty());
    }
}
