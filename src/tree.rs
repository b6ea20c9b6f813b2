use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::blocks::{Block, BlockKind};

/// In-memory authoring state for one course. Lives in `AppState` between
/// requests and is only written to the database by an explicit save; a
/// failed save leaves it untouched for manual retry.
#[derive(Debug, Clone)]
pub struct CourseDraft {
    pub course_id: Option<String>,
    pub metadata: CourseMetadata,
    pub modules: Vec<ModuleNode>,
    pub selected_lesson: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CourseMetadata {
    pub title: String,
    pub slug: Option<String>,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub duration_minutes: Option<i64>,
    pub category_id: Option<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub original_prompt: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModuleNode {
    pub id: String,
    pub title: String,
    pub description: String,
    pub lessons: Vec<LessonNode>,
}

#[derive(Debug, Clone)]
pub struct LessonNode {
    pub id: String,
    pub title: String,
    pub description: String,
    pub duration_minutes: Option<i64>,
    pub is_preview: bool,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    NoLessonSelected,
    ModuleNotFound,
    LessonNotFound,
    BlockNotFound,
    UnknownBlockType(String),
    BadIndex,
}

impl TreeError {
    pub fn code(&self) -> &'static str {
        match self {
            TreeError::NoLessonSelected => "no_lesson_selected",
            TreeError::ModuleNotFound
            | TreeError::LessonNotFound
            | TreeError::BlockNotFound => "not_found",
            TreeError::UnknownBlockType(_) | TreeError::BadIndex => "bad_params",
        }
    }

    pub fn message(&self) -> String {
        match self {
            TreeError::NoLessonSelected => "select or create a lesson first".to_string(),
            TreeError::ModuleNotFound => "module not found".to_string(),
            TreeError::LessonNotFound => "lesson not found".to_string(),
            TreeError::BlockNotFound => "block not found".to_string(),
            TreeError::UnknownBlockType(t) => format!("unknown block type: {}", t),
            TreeError::BadIndex => "index out of range".to_string(),
        }
    }
}

pub fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

impl CourseDraft {
    /// Fresh draft for a brand-new course: one default module with one
    /// default lesson, selected for editing.
    pub fn new() -> CourseDraft {
        let lesson = LessonNode {
            id: gen_id(),
            title: "Lesson 1".to_string(),
            description: String::new(),
            duration_minutes: None,
            is_preview: false,
            blocks: Vec::new(),
        };
        let selected = lesson.id.clone();
        CourseDraft {
            course_id: None,
            metadata: CourseMetadata {
                is_active: true,
                ..CourseMetadata::default()
            },
            modules: vec![ModuleNode {
                id: gen_id(),
                title: "Module 1".to_string(),
                description: String::new(),
                lessons: vec![lesson],
            }],
            selected_lesson: Some(selected),
        }
    }

    pub fn add_module(&mut self) -> &ModuleNode {
        let title = format!("Module {}", self.modules.len() + 1);
        self.modules.push(ModuleNode {
            id: gen_id(),
            title,
            description: String::new(),
            lessons: Vec::new(),
        });
        self.modules.last().expect("just pushed")
    }

    /// Appends an auto-numbered lesson and makes it the selected lesson.
    pub fn add_lesson(&mut self, module_id: &str) -> Result<&LessonNode, TreeError> {
        let module = self
            .modules
            .iter_mut()
            .find(|m| m.id == module_id)
            .ok_or(TreeError::ModuleNotFound)?;
        let title = format!("Lesson {}", module.lessons.len() + 1);
        let lesson = LessonNode {
            id: gen_id(),
            title,
            description: String::new(),
            duration_minutes: None,
            is_preview: false,
            blocks: Vec::new(),
        };
        self.selected_lesson = Some(lesson.id.clone());
        module.lessons.push(lesson);
        Ok(module.lessons.last().expect("just pushed"))
    }

    /// Silent no-op when the id is unknown.
    pub fn rename_module(&mut self, module_id: &str, title: &str) {
        if let Some(module) = self.modules.iter_mut().find(|m| m.id == module_id) {
            module.title = title.to_string();
        }
    }

    /// Silent no-op when the id is unknown.
    pub fn rename_lesson(&mut self, lesson_id: &str, title: &str) {
        for module in &mut self.modules {
            if let Some(lesson) = module.lessons.iter_mut().find(|l| l.id == lesson_id) {
                lesson.title = title.to_string();
                return;
            }
        }
    }

    pub fn delete_module(&mut self, module_id: &str) -> Result<(), TreeError> {
        let idx = self
            .modules
            .iter()
            .position(|m| m.id == module_id)
            .ok_or(TreeError::ModuleNotFound)?;
        let removed = self.modules.remove(idx);
        if let Some(selected) = &self.selected_lesson {
            if removed.lessons.iter().any(|l| &l.id == selected) {
                self.selected_lesson = None;
            }
        }
        Ok(())
    }

    pub fn delete_lesson(&mut self, lesson_id: &str) -> Result<(), TreeError> {
        for module in &mut self.modules {
            if let Some(idx) = module.lessons.iter().position(|l| l.id == lesson_id) {
                module.lessons.remove(idx);
                if self.selected_lesson.as_deref() == Some(lesson_id) {
                    self.selected_lesson = None;
                }
                return Ok(());
            }
        }
        Err(TreeError::LessonNotFound)
    }

    pub fn select_lesson(&mut self, lesson_id: &str) -> Result<(), TreeError> {
        if self.lesson(lesson_id).is_none() {
            return Err(TreeError::LessonNotFound);
        }
        self.selected_lesson = Some(lesson_id.to_string());
        Ok(())
    }

    pub fn lesson(&self, lesson_id: &str) -> Option<&LessonNode> {
        self.modules
            .iter()
            .flat_map(|m| m.lessons.iter())
            .find(|l| l.id == lesson_id)
    }

    fn selected_lesson_mut(&mut self) -> Result<&mut LessonNode, TreeError> {
        let id = self
            .selected_lesson
            .clone()
            .ok_or(TreeError::NoLessonSelected)?;
        self.modules
            .iter_mut()
            .flat_map(|m| m.lessons.iter_mut())
            .find(|l| l.id == id)
            .ok_or(TreeError::NoLessonSelected)
    }

    /// Appends a block to the selected lesson. Adding with no selection is a
    /// reported user error, not a silent no-op.
    pub fn add_block(
        &mut self,
        block_type: &str,
        data: Option<JsonValue>,
    ) -> Result<&Block, TreeError> {
        let kind = BlockKind::parse(block_type)
            .ok_or_else(|| TreeError::UnknownBlockType(block_type.to_string()))?;
        let lesson = self.selected_lesson_mut()?;
        let data = match data {
            Some(JsonValue::Object(map)) => JsonValue::Object(map),
            _ => kind.default_data(),
        };
        lesson.blocks.push(Block {
            id: gen_id(),
            block_type: kind.tag().to_string(),
            data,
            order: lesson.blocks.len() as i64,
        });
        renumber(&mut lesson.blocks);
        Ok(lesson.blocks.last().expect("just pushed"))
    }

    /// Shallow-merges a patch into the block's data: top-level keys replace,
    /// nothing recurses. Block shapes are designed flat so this is complete.
    pub fn update_block(&mut self, block_id: &str, patch: &JsonValue) -> Result<(), TreeError> {
        let lesson = self.selected_lesson_mut()?;
        let block = lesson
            .blocks
            .iter_mut()
            .find(|b| b.id == block_id)
            .ok_or(TreeError::BlockNotFound)?;
        if let Some(patch) = patch.as_object() {
            if !block.data.is_object() {
                block.data = json!({});
            }
            if let Some(data) = block.data.as_object_mut() {
                for (k, v) in patch {
                    data.insert(k.clone(), v.clone());
                }
            }
        }
        Ok(())
    }

    pub fn delete_block(&mut self, block_id: &str) -> Result<(), TreeError> {
        let lesson = self.selected_lesson_mut()?;
        let idx = lesson
            .blocks
            .iter()
            .position(|b| b.id == block_id)
            .ok_or(TreeError::BlockNotFound)?;
        lesson.blocks.remove(idx);
        renumber(&mut lesson.blocks);
        Ok(())
    }

    /// Clones type and data under a new id, appended at the end.
    pub fn duplicate_block(&mut self, block_id: &str) -> Result<&Block, TreeError> {
        let lesson = self.selected_lesson_mut()?;
        let source = lesson
            .blocks
            .iter()
            .find(|b| b.id == block_id)
            .ok_or(TreeError::BlockNotFound)?;
        let copy = Block {
            id: gen_id(),
            block_type: source.block_type.clone(),
            data: source.data.clone(),
            order: lesson.blocks.len() as i64,
        };
        lesson.blocks.push(copy);
        renumber(&mut lesson.blocks);
        Ok(lesson.blocks.last().expect("just pushed"))
    }

    /// Drag-and-drop release: moves one block and renumbers. Reordering is
    /// scoped to a single lesson's block list.
    pub fn reorder_blocks(
        &mut self,
        lesson_id: &str,
        from_index: usize,
        to_index: usize,
    ) -> Result<(), TreeError> {
        let lesson = self
            .modules
            .iter_mut()
            .flat_map(|m| m.lessons.iter_mut())
            .find(|l| l.id == lesson_id)
            .ok_or(TreeError::LessonNotFound)?;
        if from_index >= lesson.blocks.len() || to_index >= lesson.blocks.len() {
            return Err(TreeError::BadIndex);
        }
        let block = lesson.blocks.remove(from_index);
        lesson.blocks.insert(to_index, block);
        renumber(&mut lesson.blocks);
        Ok(())
    }

    pub fn total_lesson_count(&self) -> usize {
        self.modules.iter().map(|m| m.lessons.len()).sum()
    }

    /// Full draft as JSON for the host shell (and for tests).
    pub fn state_json(&self) -> JsonValue {
        json!({
            "courseId": self.course_id,
            "metadata": {
                "title": self.metadata.title,
                "slug": self.metadata.slug,
                "description": self.metadata.description,
                "thumbnailUrl": self.metadata.thumbnail_url,
                "durationMinutes": self.metadata.duration_minutes,
                "categoryId": self.metadata.category_id,
                "isActive": self.metadata.is_active,
                "isFeatured": self.metadata.is_featured,
            },
            "selectedLessonId": self.selected_lesson,
            "modules": self.modules.iter().map(|m| json!({
                "id": m.id,
                "title": m.title,
                "description": m.description,
                "lessons": m.lessons.iter().map(|l| json!({
                    "id": l.id,
                    "title": l.title,
                    "description": l.description,
                    "durationMinutes": l.duration_minutes,
                    "isPreview": l.is_preview,
                    "blocks": l.blocks,
                })).collect::<Vec<_>>(),
            })).collect::<Vec<_>>(),
        })
    }

    /// Save payload: module and lesson sort_order come from array position,
    /// block order is renumbered 0..n-1 immediately before serialization.
    pub fn save_payload(&mut self) -> JsonValue {
        for module in &mut self.modules {
            for lesson in &mut module.lessons {
                renumber(&mut lesson.blocks);
            }
        }
        json!({
            "courseId": self.course_id,
            "metadata": {
                "title": self.metadata.title,
                "slug": self.metadata.slug,
                "description": self.metadata.description,
                "thumbnailUrl": self.metadata.thumbnail_url,
                "durationMinutes": self.metadata.duration_minutes,
                "categoryId": self.metadata.category_id,
                "isActive": self.metadata.is_active,
                "isFeatured": self.metadata.is_featured,
                "originalPrompt": self.metadata.original_prompt,
            },
            "modules": self.modules.iter().enumerate().map(|(mi, m)| json!({
                "id": m.id,
                "title": m.title,
                "description": m.description,
                "sortOrder": mi as i64,
                "lessons": m.lessons.iter().enumerate().map(|(li, l)| json!({
                    "id": l.id,
                    "title": l.title,
                    "description": l.description,
                    "sortOrder": li as i64,
                    "durationMinutes": l.duration_minutes,
                    "isPreview": l.is_preview,
                    "content": { "blocks": l.blocks },
                })).collect::<Vec<_>>(),
            })).collect::<Vec<_>>(),
        })
    }
}

fn renumber(blocks: &mut [Block]) {
    for (i, block) in blocks.iter_mut().enumerate() {
        block.order = i as i64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders(draft: &CourseDraft) -> Vec<i64> {
        let id = draft.selected_lesson.clone().unwrap();
        draft.lesson(&id).unwrap().blocks.iter().map(|b| b.order).collect()
    }

    #[test]
    fn new_draft_has_default_module_lesson_and_selection() {
        let draft = CourseDraft::new();
        assert_eq!(draft.modules.len(), 1);
        assert_eq!(draft.modules[0].title, "Module 1");
        assert_eq!(draft.modules[0].lessons.len(), 1);
        assert_eq!(draft.modules[0].lessons[0].title, "Lesson 1");
        assert_eq!(
            draft.selected_lesson.as_deref(),
            Some(draft.modules[0].lessons[0].id.as_str())
        );
    }

    #[test]
    fn block_order_stays_contiguous_through_mutations() {
        let mut draft = CourseDraft::new();
        let b0 = draft.add_block("text", None).unwrap().id.clone();
        let _b1 = draft.add_block("heading", None).unwrap().id.clone();
        let b2 = draft.add_block("table", None).unwrap().id.clone();
        assert_eq!(orders(&draft), vec![0, 1, 2]);

        draft.duplicate_block(&b0).unwrap();
        assert_eq!(orders(&draft), vec![0, 1, 2, 3]);

        draft.delete_block(&b2).unwrap();
        assert_eq!(orders(&draft), vec![0, 1, 2]);

        let lesson_id = draft.selected_lesson.clone().unwrap();
        draft.reorder_blocks(&lesson_id, 2, 0).unwrap();
        assert_eq!(orders(&draft), vec![0, 1, 2]);
        draft.reorder_blocks(&lesson_id, 0, 2).unwrap();
        assert_eq!(orders(&draft), vec![0, 1, 2]);
    }

    #[test]
    fn add_block_without_selection_is_a_user_error() {
        let mut draft = CourseDraft::new();
        let lesson_id = draft.selected_lesson.clone().unwrap();
        draft.delete_lesson(&lesson_id).unwrap();
        assert!(draft.selected_lesson.is_none());
        let err = draft.add_block("text", None).unwrap_err();
        assert_eq!(err, TreeError::NoLessonSelected);
    }

    #[test]
    fn add_block_rejects_unknown_type() {
        let mut draft = CourseDraft::new();
        let err = draft.add_block("not_a_real_type", None).unwrap_err();
        assert_eq!(err, TreeError::UnknownBlockType("not_a_real_type".to_string()));
    }

    #[test]
    fn update_block_shallow_merges_patch() {
        let mut draft = CourseDraft::new();
        let id = draft.add_block("video", None).unwrap().id.clone();
        draft
            .update_block(&id, &json!({ "url": "https://v.example/1" }))
            .unwrap();
        let lesson_id = draft.selected_lesson.clone().unwrap();
        let block = &draft.lesson(&lesson_id).unwrap().blocks[0];
        assert_eq!(block.data["url"], "https://v.example/1");
        // untouched defaults survive the merge
        assert_eq!(block.data["title"], "");
    }

    #[test]
    fn deleting_selected_module_clears_selection() {
        let mut draft = CourseDraft::new();
        let module_id = draft.modules[0].id.clone();
        draft.delete_module(&module_id).unwrap();
        assert!(draft.selected_lesson.is_none());
        assert!(draft.modules.is_empty());
    }

    #[test]
    fn deleting_unselected_lesson_keeps_selection() {
        let mut draft = CourseDraft::new();
        let module_id = draft.modules[0].id.clone();
        let second = draft.add_lesson(&module_id).unwrap().id.clone();
        // add_lesson selected the new lesson; reselect the first one
        let first = draft.modules[0].lessons[0].id.clone();
        draft.select_lesson(&first).unwrap();
        draft.delete_lesson(&second).unwrap();
        assert_eq!(draft.selected_lesson.as_deref(), Some(first.as_str()));
    }

    #[test]
    fn rename_with_unknown_id_is_a_silent_noop() {
        let mut draft = CourseDraft::new();
        draft.rename_module("missing", "New Title");
        draft.rename_lesson("missing", "New Title");
        assert_eq!(draft.modules[0].title, "Module 1");
        assert_eq!(draft.modules[0].lessons[0].title, "Lesson 1");
    }

    #[test]
    fn auto_numbered_titles_follow_counts() {
        let mut draft = CourseDraft::new();
        assert_eq!(draft.add_module().title, "Module 2");
        assert_eq!(draft.add_module().title, "Module 3");
        let module_id = draft.modules[0].id.clone();
        assert_eq!(draft.add_lesson(&module_id).unwrap().title, "Lesson 2");
    }

    #[test]
    fn save_payload_derives_sort_order_from_position() {
        let mut draft = CourseDraft::new();
        draft.metadata.title = "Payload Course".to_string();
        let m2 = draft.add_module().id.clone();
        draft.add_lesson(&m2).unwrap();
        draft.add_lesson(&m2).unwrap();

        let payload = draft.save_payload();
        let modules = payload["modules"].as_array().unwrap();
        for (mi, module) in modules.iter().enumerate() {
            assert_eq!(module["sortOrder"], mi as i64);
            let lessons = module["lessons"].as_array().unwrap();
            for (li, lesson) in lessons.iter().enumerate() {
                assert_eq!(lesson["sortOrder"], li as i64);
            }
        }
    }

    #[test]
    fn reorder_rejects_out_of_range_indices() {
        let mut draft = CourseDraft::new();
        draft.add_block("text", None).unwrap();
        let lesson_id = draft.selected_lesson.clone().unwrap();
        assert_eq!(
            draft.reorder_blocks(&lesson_id, 0, 5),
            Err(TreeError::BadIndex)
        );
    }
}
