use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use super::auth::{self, AuthUser};
use crate::blocks::LessonContent;
use crate::ipc::error::{err, not_found, ok, unauthorized};
use crate::ipc::helpers::{db_conn, now_ts, required_str};
use crate::ipc::types::{AppState, Request};
use crate::slug;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePayload {
    #[serde(default)]
    pub course_id: Option<String>,
    #[serde(default)]
    pub company_id: Option<String>,
    pub metadata: MetadataPayload,
    #[serde(default)]
    pub modules: Vec<ModulePayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataPayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_featured: Option<bool>,
    #[serde(default)]
    pub original_prompt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModulePayload {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i64>,
    #[serde(default)]
    pub lessons: Vec<LessonPayload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPayload {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i64>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub is_preview: Option<bool>,
    #[serde(default)]
    pub content: LessonContent,
}

#[derive(Debug)]
pub enum SaveError {
    NotFound(&'static str),
    Validation(String),
    Course(String),
    Modules(String),
    Lessons(String),
    Query(String),
}

impl SaveError {
    pub fn response(self, id: &str) -> serde_json::Value {
        match self {
            SaveError::NotFound(what) => not_found(id, what),
            SaveError::Validation(msg) => err(id, "validation_failed", msg, None),
            SaveError::Course(msg) => err(
                id,
                "db_write_failed",
                "failed to save course",
                Some(json!({ "db": msg })),
            ),
            SaveError::Modules(msg) => err(
                id,
                "modules_save_failed",
                "failed to save modules",
                Some(json!({ "db": msg })),
            ),
            SaveError::Lessons(msg) => err(
                id,
                "lessons_save_failed",
                "failed to save lessons",
                Some(json!({ "db": msg })),
            ),
            SaveError::Query(msg) => err(id, "db_query_failed", msg, None),
        }
    }
}

/// Full-tree save: the payload is the complete desired state for the course.
/// Steps run sequentially with no wrapping transaction; a failure after the
/// course row was written surfaces as a modules/lessons error so the caller
/// knows how far the save progressed.
pub fn save_course_tree(
    conn: &Connection,
    auth: &AuthUser,
    payload: &SavePayload,
) -> Result<String, SaveError> {
    if payload.metadata.title.trim().is_empty() {
        return Err(SaveError::Validation("course title is required".to_string()));
    }
    let lesson_total: usize = payload.modules.iter().map(|m| m.lessons.len()).sum();
    if lesson_total == 0 {
        return Err(SaveError::Validation(
            "a course needs at least one lesson".to_string(),
        ));
    }

    let ts = now_ts();
    let course_id = match &payload.course_id {
        Some(existing_id) => {
            let owner: Option<Option<String>> = conn
                .query_row(
                    "SELECT company_id FROM courses WHERE id = ?",
                    [existing_id],
                    |r| r.get(0),
                )
                .optional()
                .map_err(|e| SaveError::Query(e.to_string()))?;
            // A course outside the caller's tenant looks exactly like a
            // missing one.
            let Some(owner) = owner else {
                return Err(SaveError::NotFound("course"));
            };
            if !auth.manages_company(owner.as_deref()) {
                return Err(SaveError::NotFound("course"));
            }
            update_course_row(conn, existing_id, &payload.metadata, &ts)?;
            existing_id.clone()
        }
        None => {
            let company_id = match &payload.company_id {
                Some(cid) if auth.is_super_admin() => Some(cid.clone()),
                Some(cid) if auth.manages_company(Some(cid)) => Some(cid.clone()),
                Some(_) => return Err(SaveError::NotFound("company")),
                None => auth.company_id.clone(),
            };
            insert_course_row(conn, company_id.as_deref(), &payload.metadata, &ts)?
        }
    };

    // Modules upserted by their client-generated ids.
    for (idx, module) in payload.modules.iter().enumerate() {
        let sort_order = module.sort_order.unwrap_or(idx as i64);
        conn.execute(
            "INSERT INTO course_modules(id, course_id, title, description, sort_order, is_published, updated_at)
             VALUES(?, ?, ?, ?, ?, 0, ?)
             ON CONFLICT(id) DO UPDATE SET
               course_id = excluded.course_id,
               title = excluded.title,
               description = excluded.description,
               sort_order = excluded.sort_order,
               is_published = excluded.is_published,
               updated_at = excluded.updated_at",
            params![
                module.id,
                course_id,
                module.title,
                module.description.clone().unwrap_or_default(),
                sort_order,
                ts
            ],
        )
        .map_err(|e| SaveError::Modules(e.to_string()))?;
    }

    // Anything persisted for this course but absent from the payload goes
    // away; lessons follow their module via cascade.
    let module_ids: Vec<String> = payload.modules.iter().map(|m| m.id.clone()).collect();
    delete_absent(conn, "course_modules", "course_id", &course_id, &module_ids)
        .map_err(SaveError::Modules)?;

    for module in &payload.modules {
        for (idx, lesson) in module.lessons.iter().enumerate() {
            let sort_order = lesson.sort_order.unwrap_or(idx as i64);
            let content = serde_json::to_string(&lesson.content)
                .map_err(|e| SaveError::Lessons(e.to_string()))?;
            conn.execute(
                "INSERT INTO lessons(id, module_id, title, description, content_type, content,
                                     duration_minutes, sort_order, is_preview, is_published, updated_at)
                 VALUES(?, ?, ?, ?, 'text', ?, ?, ?, ?, 0, ?)
                 ON CONFLICT(id) DO UPDATE SET
                   module_id = excluded.module_id,
                   title = excluded.title,
                   description = excluded.description,
                   content_type = excluded.content_type,
                   content = excluded.content,
                   duration_minutes = excluded.duration_minutes,
                   sort_order = excluded.sort_order,
                   is_preview = excluded.is_preview,
                   is_published = excluded.is_published,
                   updated_at = excluded.updated_at",
                params![
                    lesson.id,
                    module.id,
                    lesson.title,
                    lesson.description.clone().unwrap_or_default(),
                    content,
                    lesson.duration_minutes,
                    sort_order,
                    lesson.is_preview.unwrap_or(false) as i64,
                    ts
                ],
            )
            .map_err(|e| SaveError::Lessons(e.to_string()))?;
        }
    }

    let lesson_ids: Vec<String> = payload
        .modules
        .iter()
        .flat_map(|m| m.lessons.iter().map(|l| l.id.clone()))
        .collect();
    delete_absent_lessons(conn, &module_ids, &lesson_ids).map_err(SaveError::Lessons)?;

    Ok(course_id)
}

fn insert_course_row(
    conn: &Connection,
    company_id: Option<&str>,
    meta: &MetadataPayload,
    ts: &str,
) -> Result<String, SaveError> {
    let id = Uuid::new_v4().to_string();
    let base = match &meta.slug {
        Some(s) if !s.trim().is_empty() => slug::slugify(s),
        _ => slug::slugify(&meta.title),
    };
    let unique = slug::unique_slug(conn, &base)
        .map_err(|e| SaveError::Validation(e.to_string()))?;

    let mut cols: Vec<(&str, Value)> = vec![
        ("id", text(&id)),
        ("company_id", opt_text(company_id)),
        ("category_id", opt_text(meta.category_id.as_deref())),
        ("title", text(meta.title.trim())),
        ("slug", text(&unique)),
        ("description", text(meta.description.as_deref().unwrap_or(""))),
        ("thumbnail_url", opt_text(meta.thumbnail_url.as_deref())),
        ("duration_minutes", opt_int(meta.duration_minutes)),
        ("is_active", Value::Integer(meta.is_active.unwrap_or(true) as i64)),
        ("is_featured", Value::Integer(meta.is_featured.unwrap_or(false) as i64)),
        ("created_at", text(ts)),
        ("updated_at", text(ts)),
    ];
    if let Some(prompt) = meta.original_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
        cols.push(("original_prompt", text(prompt)));
    }

    write_course_row(conn, WriteMode::Insert, cols).map_err(SaveError::Course)?;
    Ok(id)
}

fn update_course_row(
    conn: &Connection,
    course_id: &str,
    meta: &MetadataPayload,
    ts: &str,
) -> Result<(), SaveError> {
    let mut cols: Vec<(&str, Value)> = vec![
        ("title", text(meta.title.trim())),
        ("description", text(meta.description.as_deref().unwrap_or(""))),
        ("thumbnail_url", opt_text(meta.thumbnail_url.as_deref())),
        ("duration_minutes", opt_int(meta.duration_minutes)),
        ("category_id", opt_text(meta.category_id.as_deref())),
        ("is_active", Value::Integer(meta.is_active.unwrap_or(true) as i64)),
        ("is_featured", Value::Integer(meta.is_featured.unwrap_or(false) as i64)),
        ("updated_at", text(ts)),
    ];
    if let Some(s) = meta.slug.as_deref().filter(|s| !s.trim().is_empty()) {
        cols.insert(1, ("slug", text(&slug::slugify(s))));
    }
    if let Some(prompt) = meta.original_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
        cols.push(("original_prompt", text(prompt)));
    }

    write_course_row(conn, WriteMode::Update(course_id), cols).map_err(SaveError::Course)
}

#[derive(Clone, Copy)]
enum WriteMode<'a> {
    Insert,
    Update(&'a str),
}

// Columns the drift retry may never strip; losing these is a real failure.
const REQUIRED_COURSE_COLUMNS: &[&str] = &["id", "title", "slug"];

/// Writes the course row, tolerating one missing-column schema drift: if the
/// workspace schema predates an optional column, that column is stripped and
/// the write retried exactly once. A second drift failure (or a drifted
/// required column) surfaces the original error.
fn write_course_row(
    conn: &Connection,
    mode: WriteMode<'_>,
    cols: Vec<(&str, Value)>,
) -> Result<(), String> {
    match exec_course_write(conn, mode, &cols) {
        Ok(()) => Ok(()),
        Err(first) => {
            let Some(missing) = missing_column_in(&first) else {
                return Err(first.to_string());
            };
            let strippable = cols.iter().any(|(name, _)| *name == missing)
                && !REQUIRED_COURSE_COLUMNS.contains(&missing.as_str());
            if !strippable {
                return Err(first.to_string());
            }
            tracing::warn!(
                column = %missing,
                "courses schema is missing a column; dropping the field and retrying"
            );
            let stripped: Vec<(&str, Value)> = cols
                .into_iter()
                .filter(|(name, _)| *name != missing)
                .collect();
            match exec_course_write(conn, mode, &stripped) {
                Ok(()) => Ok(()),
                // Keep the original error; the retry was best-effort.
                Err(_) => Err(first.to_string()),
            }
        }
    }
}

fn exec_course_write(
    conn: &Connection,
    mode: WriteMode<'_>,
    cols: &[(&str, Value)],
) -> Result<(), rusqlite::Error> {
    let mut binds: Vec<Value> = cols.iter().map(|(_, v)| v.clone()).collect();
    let sql = match mode {
        WriteMode::Insert => {
            let names: Vec<&str> = cols.iter().map(|(n, _)| *n).collect();
            let marks = vec!["?"; cols.len()].join(", ");
            format!(
                "INSERT INTO courses({}) VALUES({})",
                names.join(", "),
                marks
            )
        }
        WriteMode::Update(course_id) => {
            let sets: Vec<String> = cols.iter().map(|(n, _)| format!("{} = ?", n)).collect();
            binds.push(text(course_id));
            format!("UPDATE courses SET {} WHERE id = ?", sets.join(", "))
        }
    };
    conn.execute(&sql, params_from_iter(binds)).map(|_| ())
}

/// SQLite reports a drifted column as either
/// "table courses has no column named X" (INSERT) or
/// "no such column: X" (UPDATE).
fn missing_column_in(e: &rusqlite::Error) -> Option<String> {
    let msg = e.to_string();
    if let Some(rest) = msg.split("has no column named ").nth(1) {
        return Some(rest.split_whitespace().next()?.to_string());
    }
    if let Some(rest) = msg.split("no such column: ").nth(1) {
        return Some(rest.split_whitespace().next()?.to_string());
    }
    None
}

fn delete_absent(
    conn: &Connection,
    table: &str,
    owner_col: &str,
    owner_id: &str,
    keep_ids: &[String],
) -> Result<(), String> {
    if keep_ids.is_empty() {
        conn.execute(
            &format!("DELETE FROM {} WHERE {} = ?", table, owner_col),
            [owner_id],
        )
        .map_err(|e| e.to_string())?;
        return Ok(());
    }
    let marks = vec!["?"; keep_ids.len()].join(", ");
    let sql = format!(
        "DELETE FROM {} WHERE {} = ? AND id NOT IN ({})",
        table, owner_col, marks
    );
    let mut binds: Vec<Value> = vec![text(owner_id)];
    binds.extend(keep_ids.iter().map(|s| text(s)));
    conn.execute(&sql, params_from_iter(binds))
        .map_err(|e| e.to_string())?;
    Ok(())
}

fn delete_absent_lessons(
    conn: &Connection,
    retained_modules: &[String],
    keep_lessons: &[String],
) -> Result<(), String> {
    if retained_modules.is_empty() {
        return Ok(());
    }
    let module_marks = vec!["?"; retained_modules.len()].join(", ");
    let mut binds: Vec<Value> = retained_modules.iter().map(|s| text(s)).collect();
    let sql = if keep_lessons.is_empty() {
        format!("DELETE FROM lessons WHERE module_id IN ({})", module_marks)
    } else {
        let lesson_marks = vec!["?"; keep_lessons.len()].join(", ");
        binds.extend(keep_lessons.iter().map(|s| text(s)));
        format!(
            "DELETE FROM lessons WHERE module_id IN ({}) AND id NOT IN ({})",
            module_marks, lesson_marks
        )
    };
    conn.execute(&sql, params_from_iter(binds))
        .map_err(|e| e.to_string())?;
    Ok(())
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn opt_text(s: Option<&str>) -> Value {
    match s {
        Some(s) => Value::Text(s.to_string()),
        None => Value::Null,
    }
}

fn opt_int(v: Option<i64>) -> Value {
    match v {
        Some(v) => Value::Integer(v),
        None => Value::Null,
    }
}

pub fn course_row_json(conn: &Connection, course_id: &str) -> Result<Option<JsonValue>, String> {
    conn.query_row(
        "SELECT id, company_id, category_id, title, slug, description, thumbnail_url,
                duration_minutes, is_active, is_featured, created_at, updated_at
         FROM courses WHERE id = ?",
        [course_id],
        |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "companyId": row.get::<_, Option<String>>(1)?,
                "categoryId": row.get::<_, Option<String>>(2)?,
                "title": row.get::<_, String>(3)?,
                "slug": row.get::<_, String>(4)?,
                "description": row.get::<_, String>(5)?,
                "thumbnailUrl": row.get::<_, Option<String>>(6)?,
                "durationMinutes": row.get::<_, Option<i64>>(7)?,
                "isActive": row.get::<_, i64>(8)? != 0,
                "isFeatured": row.get::<_, i64>(9)? != 0,
                "createdAt": row.get::<_, String>(10)?,
                "updatedAt": row.get::<_, String>(11)?,
            }))
        },
    )
    .optional()
    .map_err(|e| e.to_string())
}

/// Modules and lessons for a course, ordered for display and hydration.
pub fn course_tree_json(conn: &Connection, course_id: &str) -> Result<Vec<JsonValue>, String> {
    let mut stmt = conn
        .prepare(
            "SELECT id, title, description, sort_order, is_published
             FROM course_modules WHERE course_id = ? ORDER BY sort_order, id",
        )
        .map_err(|e| e.to_string())?;
    let modules: Vec<(String, String, String, i64, bool)> = stmt
        .query_map([course_id], |r| {
            Ok((
                r.get(0)?,
                r.get(1)?,
                r.get(2)?,
                r.get(3)?,
                r.get::<_, i64>(4)? != 0,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| e.to_string())?;

    let mut lesson_stmt = conn
        .prepare(
            "SELECT id, title, description, content, duration_minutes, sort_order, is_preview
             FROM lessons WHERE module_id = ? ORDER BY sort_order, id",
        )
        .map_err(|e| e.to_string())?;

    let mut out = Vec::with_capacity(modules.len());
    for (id, title, description, sort_order, is_published) in modules {
        let lessons = lesson_stmt
            .query_map([&id], |r| {
                let content_raw: String = r.get(3)?;
                let content: JsonValue =
                    serde_json::from_str(&content_raw).unwrap_or_else(|_| json!({ "blocks": [] }));
                Ok(json!({
                    "id": r.get::<_, String>(0)?,
                    "title": r.get::<_, String>(1)?,
                    "description": r.get::<_, String>(2)?,
                    "content": content,
                    "durationMinutes": r.get::<_, Option<i64>>(4)?,
                    "sortOrder": r.get::<_, i64>(5)?,
                    "isPreview": r.get::<_, i64>(6)? != 0,
                }))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            .map_err(|e| e.to_string())?;
        out.push(json!({
            "id": id,
            "title": title,
            "description": description,
            "sortOrder": sort_order,
            "isPublished": is_published,
            "lessons": lessons,
        }));
    }
    Ok(out)
}

fn handle_courses_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let auth = match auth::require_admin(conn, req) {
        Ok(a) => a,
        Err(e) => return e,
    };

    let payload: SavePayload = match serde_json::from_value(req.params.clone()) {
        Ok(p) => p,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };

    let course_id = match save_course_tree(conn, &auth, &payload) {
        Ok(id) => id,
        Err(e) => return e.response(&req.id),
    };

    let course = match course_row_json(conn, &course_id) {
        Ok(Some(c)) => c,
        Ok(None) => return not_found(&req.id, "course"),
        Err(e) => return err(&req.id, "db_query_failed", e, None),
    };

    ok(&req.id, json!({ "courseId": course_id, "course": course }))
}

fn handle_courses_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let auth = match auth::require_admin(conn, req) {
        Ok(a) => a,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let course = match course_row_json(conn, &course_id) {
        Ok(Some(c)) => c,
        Ok(None) => return not_found(&req.id, "course"),
        Err(e) => return err(&req.id, "db_query_failed", e, None),
    };
    let owner = course["companyId"].as_str().map(|s| s.to_string());
    if !auth.manages_company(owner.as_deref()) && owner.is_some() {
        return not_found(&req.id, "course");
    }

    let modules = match course_tree_json(conn, &course_id) {
        Ok(m) => m,
        Err(e) => return err(&req.id, "db_query_failed", e, None),
    };

    ok(&req.id, json!({ "course": course, "modules": modules }))
}

fn handle_courses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let auth = match auth::require_admin(conn, req) {
        Ok(a) => a,
        Err(e) => return e,
    };

    // Company admins see their tenant's courses plus the global catalog.
    let (sql, binds): (&str, Vec<String>) = if auth.is_super_admin() {
        (
            "SELECT id, company_id, title, slug, is_active, is_featured,
                    (SELECT COUNT(*) FROM course_modules m WHERE m.course_id = courses.id),
                    (SELECT COUNT(*) FROM enrollments e WHERE e.course_id = courses.id)
             FROM courses ORDER BY title",
            Vec::new(),
        )
    } else {
        (
            "SELECT id, company_id, title, slug, is_active, is_featured,
                    (SELECT COUNT(*) FROM course_modules m WHERE m.course_id = courses.id),
                    (SELECT COUNT(*) FROM enrollments e WHERE e.course_id = courses.id)
             FROM courses
             WHERE company_id = ? OR company_id IS NULL
             ORDER BY title",
            vec![auth.company_id.clone().unwrap_or_default()],
        )
    };

    let mut stmt = match conn.prepare(sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(params_from_iter(binds), |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "companyId": row.get::<_, Option<String>>(1)?,
                "title": row.get::<_, String>(2)?,
                "slug": row.get::<_, String>(3)?,
                "isActive": row.get::<_, i64>(4)? != 0,
                "isFeatured": row.get::<_, i64>(5)? != 0,
                "moduleCount": row.get::<_, i64>(6)?,
                "enrollmentCount": row.get::<_, i64>(7)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(courses) => ok(&req.id, json!({ "courses": courses })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_courses_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let auth = match auth::require_admin(conn, req) {
        Ok(a) => a,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let owner: Option<Option<String>> = match conn
        .query_row(
            "SELECT company_id FROM courses WHERE id = ?",
            [&course_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(owner) = owner else {
        return not_found(&req.id, "course");
    };
    if !auth.manages_company(owner.as_deref()) {
        return not_found(&req.id, "course");
    }

    // Modules, lessons and enrollments follow via cascade.
    if let Err(e) = conn.execute("DELETE FROM courses WHERE id = ?", [&course_id]) {
        return err(&req.id, "db_delete_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "ok": true }))
}

fn handle_categories_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let auth = match auth::require_session(conn, req) {
        Ok(a) => a,
        Err(e) => return e,
    };
    if !auth.is_super_admin() {
        return unauthorized(&req.id);
    }
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let sort_order = req
        .params
        .get("sortOrder")
        .and_then(|v| v.as_i64())
        .unwrap_or(0);

    let category_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO categories(id, name, sort_order) VALUES(?, ?, ?)",
        params![category_id, name, sort_order],
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "categoryId": category_id, "name": name }))
}

fn handle_categories_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    if let Err(e) = auth::require_session(conn, req) {
        return e;
    }

    let mut stmt = match conn
        .prepare("SELECT id, name, sort_order FROM categories ORDER BY sort_order, name")
    {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "name": row.get::<_, String>(1)?,
                "sortOrder": row.get::<_, i64>(2)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(categories) => ok(&req.id, json!({ "categories": categories })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.save" => Some(handle_courses_save(state, req)),
        "courses.get" => Some(handle_courses_get(state, req)),
        "courses.list" => Some(handle_courses_list(state, req)),
        "courses.delete" => Some(handle_courses_delete(state, req)),
        "categories.create" => Some(handle_categories_create(state, req)),
        "categories.list" => Some(handle_categories_list(state, req)),
        _ => None,
    }
}
