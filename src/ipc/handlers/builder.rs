use serde_json::json;

use super::auth;
use super::courses::{self, SavePayload};
use crate::blocks::LessonContent;
use crate::ipc::error::{err, not_found, ok};
use crate::ipc::helpers::{db_conn, parse_bool, parse_opt_i64, parse_opt_string, required_str};
use crate::ipc::types::{AppState, Request};
use crate::tree::{CourseDraft, CourseMetadata, LessonNode, ModuleNode, TreeError};

fn tree_err(req: &Request, e: TreeError) -> serde_json::Value {
    err(&req.id, e.code(), e.message(), None)
}

fn draft_mut<'a>(
    state: &'a mut AppState,
    req: &Request,
) -> Result<&'a mut CourseDraft, serde_json::Value> {
    state
        .draft
        .as_mut()
        .ok_or_else(|| err(&req.id, "no_draft", "open a course in the builder first", None))
}

/// All builder methods are admin-gated; the draft itself never leaves
/// process memory until `builder.save`.
fn check_admin(state: &AppState, req: &Request) -> Result<(), serde_json::Value> {
    let conn = db_conn(state, req)?;
    auth::require_admin(conn, req)?;
    Ok(())
}

fn handle_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let auth_user = match auth::require_admin(conn, req) {
        Ok(a) => a,
        Err(e) => return e,
    };

    let course_id = match parse_opt_string(req.params.get("courseId")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("courseId {}", m), None),
    };

    let draft = match course_id {
        None => CourseDraft::new(),
        Some(course_id) => {
            let course = match courses::course_row_json(conn, &course_id) {
                Ok(Some(c)) => c,
                Ok(None) => return not_found(&req.id, "course"),
                Err(e) => return err(&req.id, "db_query_failed", e, None),
            };
            let owner = course["companyId"].as_str().map(|s| s.to_string());
            if owner.is_some() && !auth_user.manages_company(owner.as_deref()) {
                return not_found(&req.id, "course");
            }
            let modules = match courses::course_tree_json(conn, &course_id) {
                Ok(m) => m,
                Err(e) => return err(&req.id, "db_query_failed", e, None),
            };
            hydrate_draft(&course_id, &course, &modules)
        }
    };

    let view = draft.state_json();
    state.draft = Some(draft);
    ok(&req.id, view)
}

fn hydrate_draft(
    course_id: &str,
    course: &serde_json::Value,
    modules: &[serde_json::Value],
) -> CourseDraft {
    let module_nodes: Vec<ModuleNode> = modules
        .iter()
        .map(|m| ModuleNode {
            id: m["id"].as_str().unwrap_or_default().to_string(),
            title: m["title"].as_str().unwrap_or_default().to_string(),
            description: m["description"].as_str().unwrap_or_default().to_string(),
            lessons: m["lessons"]
                .as_array()
                .map(|lessons| {
                    lessons
                        .iter()
                        .map(|l| {
                            let content: LessonContent =
                                serde_json::from_value(l["content"].clone()).unwrap_or_default();
                            LessonNode {
                                id: l["id"].as_str().unwrap_or_default().to_string(),
                                title: l["title"].as_str().unwrap_or_default().to_string(),
                                description: l["description"]
                                    .as_str()
                                    .unwrap_or_default()
                                    .to_string(),
                                duration_minutes: l["durationMinutes"].as_i64(),
                                is_preview: l["isPreview"].as_bool().unwrap_or(false),
                                blocks: content.blocks,
                            }
                        })
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect();

    // Editing an existing course starts with nothing selected.
    CourseDraft {
        course_id: Some(course_id.to_string()),
        metadata: CourseMetadata {
            title: course["title"].as_str().unwrap_or_default().to_string(),
            slug: course["slug"].as_str().map(|s| s.to_string()),
            description: course["description"].as_str().unwrap_or_default().to_string(),
            thumbnail_url: course["thumbnailUrl"].as_str().map(|s| s.to_string()),
            duration_minutes: course["durationMinutes"].as_i64(),
            category_id: course["categoryId"].as_str().map(|s| s.to_string()),
            is_active: course["isActive"].as_bool().unwrap_or(true),
            is_featured: course["isFeatured"].as_bool().unwrap_or(false),
            original_prompt: None,
        },
        modules: module_nodes,
        selected_lesson: None,
    }
}

fn handle_state(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = check_admin(state, req) {
        return e;
    }
    let draft = match draft_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    ok(&req.id, draft.state_json())
}

/// Course-level fields are edited separately from structure; only the keys
/// present in the patch change.
fn handle_metadata_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = check_admin(state, req) {
        return e;
    }
    let params = req.params.clone();
    let draft = match draft_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };

    if let Some(title) = params.get("title").and_then(|v| v.as_str()) {
        draft.metadata.title = title.trim().to_string();
    }
    match parse_opt_string(params.get("slug")) {
        Ok(Some(v)) => draft.metadata.slug = Some(v),
        Ok(None) => {}
        Err(m) => return err(&req.id, "bad_params", format!("slug {}", m), None),
    }
    if let Some(desc) = params.get("description").and_then(|v| v.as_str()) {
        draft.metadata.description = desc.to_string();
    }
    match parse_opt_string(params.get("thumbnailUrl")) {
        Ok(Some(v)) => draft.metadata.thumbnail_url = Some(v),
        Ok(None) => {}
        Err(m) => return err(&req.id, "bad_params", format!("thumbnailUrl {}", m), None),
    }
    match parse_opt_i64(params.get("durationMinutes")) {
        Ok(Some(v)) => draft.metadata.duration_minutes = Some(v),
        Ok(None) => {}
        Err(m) => return err(&req.id, "bad_params", format!("durationMinutes {}", m), None),
    }
    match parse_opt_string(params.get("categoryId")) {
        Ok(Some(v)) => draft.metadata.category_id = Some(v),
        Ok(None) => {}
        Err(m) => return err(&req.id, "bad_params", format!("categoryId {}", m), None),
    }
    if let Some(v) = params.get("isActive") {
        match parse_bool(Some(v), draft.metadata.is_active) {
            Ok(b) => draft.metadata.is_active = b,
            Err(m) => return err(&req.id, "bad_params", format!("isActive {}", m), None),
        }
    }
    if let Some(v) = params.get("isFeatured") {
        match parse_bool(Some(v), draft.metadata.is_featured) {
            Ok(b) => draft.metadata.is_featured = b,
            Err(m) => return err(&req.id, "bad_params", format!("isFeatured {}", m), None),
        }
    }
    match parse_opt_string(params.get("originalPrompt")) {
        Ok(Some(v)) => draft.metadata.original_prompt = Some(v),
        Ok(None) => {}
        Err(m) => return err(&req.id, "bad_params", format!("originalPrompt {}", m), None),
    }

    ok(&req.id, draft.state_json())
}

fn handle_modules_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = check_admin(state, req) {
        return e;
    }
    let draft = match draft_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let module = draft.add_module();
    ok(
        &req.id,
        json!({ "moduleId": module.id, "title": module.title }),
    )
}

fn handle_modules_rename(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = check_admin(state, req) {
        return e;
    }
    let module_id = match required_str(req, "moduleId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let title = match required_str(req, "title") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let draft = match draft_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    draft.rename_module(&module_id, &title);
    ok(&req.id, json!({ "ok": true }))
}

fn handle_modules_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = check_admin(state, req) {
        return e;
    }
    let module_id = match required_str(req, "moduleId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let draft = match draft_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    match draft.delete_module(&module_id) {
        Ok(()) => ok(
            &req.id,
            json!({ "ok": true, "selectedLessonId": draft.selected_lesson }),
        ),
        Err(e) => tree_err(req, e),
    }
}

fn handle_lessons_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = check_admin(state, req) {
        return e;
    }
    let module_id = match required_str(req, "moduleId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let draft = match draft_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    match draft.add_lesson(&module_id) {
        Ok(lesson) => {
            let result = json!({ "lessonId": lesson.id, "title": lesson.title });
            ok(&req.id, result)
        }
        Err(e) => tree_err(req, e),
    }
}

fn handle_lessons_rename(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = check_admin(state, req) {
        return e;
    }
    let lesson_id = match required_str(req, "lessonId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let title = match required_str(req, "title") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let draft = match draft_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    draft.rename_lesson(&lesson_id, &title);
    ok(&req.id, json!({ "ok": true }))
}

fn handle_lessons_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = check_admin(state, req) {
        return e;
    }
    let lesson_id = match required_str(req, "lessonId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let draft = match draft_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    match draft.delete_lesson(&lesson_id) {
        Ok(()) => ok(
            &req.id,
            json!({ "ok": true, "selectedLessonId": draft.selected_lesson }),
        ),
        Err(e) => tree_err(req, e),
    }
}

fn handle_lessons_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = check_admin(state, req) {
        return e;
    }
    let lesson_id = match required_str(req, "lessonId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let draft = match draft_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    match draft.select_lesson(&lesson_id) {
        Ok(()) => ok(&req.id, json!({ "selectedLessonId": lesson_id })),
        Err(e) => tree_err(req, e),
    }
}

fn handle_blocks_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = check_admin(state, req) {
        return e;
    }
    let block_type = match required_str(req, "type") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let data = req.params.get("data").cloned();
    let draft = match draft_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    match draft.add_block(&block_type, data) {
        Ok(block) => {
            let result = json!({ "block": block });
            ok(&req.id, result)
        }
        Err(e) => tree_err(req, e),
    }
}

fn handle_blocks_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = check_admin(state, req) {
        return e;
    }
    let block_id = match required_str(req, "blockId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").cloned() else {
        return err(&req.id, "bad_params", "missing patch", None);
    };
    if !patch.is_object() {
        return err(&req.id, "bad_params", "patch must be an object", None);
    }
    let draft = match draft_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    match draft.update_block(&block_id, &patch) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => tree_err(req, e),
    }
}

fn handle_blocks_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = check_admin(state, req) {
        return e;
    }
    let block_id = match required_str(req, "blockId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let draft = match draft_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    match draft.delete_block(&block_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => tree_err(req, e),
    }
}

fn handle_blocks_duplicate(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = check_admin(state, req) {
        return e;
    }
    let block_id = match required_str(req, "blockId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let draft = match draft_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    match draft.duplicate_block(&block_id) {
        Ok(block) => {
            let result = json!({ "block": block });
            ok(&req.id, result)
        }
        Err(e) => tree_err(req, e),
    }
}

fn handle_blocks_reorder(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = check_admin(state, req) {
        return e;
    }
    let lesson_id = match required_str(req, "lessonId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let from_index = req.params.get("fromIndex").and_then(|v| v.as_u64());
    let to_index = req.params.get("toIndex").and_then(|v| v.as_u64());
    let (Some(from_index), Some(to_index)) = (from_index, to_index) else {
        return err(&req.id, "bad_params", "missing fromIndex/toIndex", None);
    };
    let draft = match draft_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    match draft.reorder_blocks(&lesson_id, from_index as usize, to_index as usize) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => tree_err(req, e),
    }
}

/// Serializes the whole draft and runs the save protocol in-process. The
/// client-side validation gate fires before any payload is built; a failed
/// save leaves the draft exactly as it was.
fn handle_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let auth_user = match auth::require_admin(conn, req) {
        Ok(a) => a,
        Err(e) => return e,
    };

    let draft = match state.draft.as_mut() {
        Some(d) => d,
        None => return err(&req.id, "no_draft", "open a course in the builder first", None),
    };

    if draft.metadata.title.trim().is_empty() {
        return err(&req.id, "validation_failed", "course title is required", None);
    }
    if draft.total_lesson_count() == 0 {
        return err(
            &req.id,
            "validation_failed",
            "a course needs at least one lesson",
            None,
        );
    }

    let payload_value = draft.save_payload();
    let payload: SavePayload = match serde_json::from_value(payload_value) {
        Ok(p) => p,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };

    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let course_id = match courses::save_course_tree(conn, &auth_user, &payload) {
        Ok(id) => id,
        Err(e) => return e.response(&req.id),
    };
    let course = match courses::course_row_json(conn, &course_id) {
        Ok(Some(c)) => c,
        Ok(None) => return not_found(&req.id, "course"),
        Err(e) => return err(&req.id, "db_query_failed", e, None),
    };

    if let Some(draft) = state.draft.as_mut() {
        draft.course_id = Some(course_id.clone());
    }

    ok(&req.id, json!({ "courseId": course_id, "course": course }))
}

fn handle_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = check_admin(state, req) {
        return e;
    }
    state.draft = None;
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "builder.open" => Some(handle_open(state, req)),
        "builder.close" => Some(handle_close(state, req)),
        "builder.state" => Some(handle_state(state, req)),
        "builder.metadata.set" => Some(handle_metadata_set(state, req)),
        "builder.modules.add" => Some(handle_modules_add(state, req)),
        "builder.modules.rename" => Some(handle_modules_rename(state, req)),
        "builder.modules.delete" => Some(handle_modules_delete(state, req)),
        "builder.lessons.add" => Some(handle_lessons_add(state, req)),
        "builder.lessons.rename" => Some(handle_lessons_rename(state, req)),
        "builder.lessons.delete" => Some(handle_lessons_delete(state, req)),
        "builder.lessons.select" => Some(handle_lessons_select(state, req)),
        "builder.blocks.add" => Some(handle_blocks_add(state, req)),
        "builder.blocks.update" => Some(handle_blocks_update(state, req)),
        "builder.blocks.delete" => Some(handle_blocks_delete(state, req)),
        "builder.blocks.duplicate" => Some(handle_blocks_duplicate(state, req)),
        "builder.blocks.reorder" => Some(handle_blocks_reorder(state, req)),
        "builder.save" => Some(handle_save(state, req)),
        _ => None,
    }
}
