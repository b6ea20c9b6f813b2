use rusqlite::OptionalExtension;
use serde_json::json;

use super::auth::{self, AuthUser};
use crate::blocks::LessonContent;
use crate::ipc::error::{err, not_found, ok};
use crate::ipc::helpers::{db_conn, now_ts, required_str};
use crate::ipc::types::{AppState, Request};
use crate::render;

/// Learners see active courses in their tenant's scope (or the global
/// catalog); admins see whatever they manage. Everything else is a plain
/// not-found, never an authorization hint.
fn course_visible(auth: &AuthUser, company_id: Option<&str>, is_active: bool) -> bool {
    if auth.is_admin() {
        return auth.manages_company(company_id) || company_id.is_none();
    }
    if !is_active {
        return false;
    }
    company_id.is_none() || auth.company_id.as_deref() == company_id
}

fn handle_course_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let auth = match auth::require_session(conn, req) {
        Ok(a) => a,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let row: Option<(Option<String>, String, String, String, Option<String>, Option<i64>, bool)> =
        match conn
            .query_row(
                "SELECT company_id, title, slug, description, thumbnail_url, duration_minutes, is_active
                 FROM courses WHERE id = ?",
                [&course_id],
                |r| {
                    Ok((
                        r.get(0)?,
                        r.get(1)?,
                        r.get(2)?,
                        r.get(3)?,
                        r.get(4)?,
                        r.get(5)?,
                        r.get::<_, i64>(6)? != 0,
                    ))
                },
            )
            .optional()
        {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };

    let Some((company_id, title, slug, description, thumbnail_url, duration_minutes, is_active)) =
        row
    else {
        return not_found(&req.id, "course");
    };
    if !course_visible(&auth, company_id.as_deref(), is_active) {
        return not_found(&req.id, "course");
    }

    // Outline only: lesson content stays behind learning.lesson.open.
    let mut stmt = match conn.prepare(
        "SELECT m.id, m.title, m.description, m.sort_order
         FROM course_modules m WHERE m.course_id = ? ORDER BY m.sort_order, m.id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let modules: Vec<(String, String, String, i64)> = match stmt
        .query_map([&course_id], |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut lesson_stmt = match conn.prepare(
        "SELECT id, title, duration_minutes, sort_order, is_preview
         FROM lessons WHERE module_id = ? ORDER BY sort_order, id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut module_views = Vec::with_capacity(modules.len());
    for (module_id, module_title, module_description, sort_order) in modules {
        let lessons = match lesson_stmt
            .query_map([&module_id], |r| {
                Ok(json!({
                    "id": r.get::<_, String>(0)?,
                    "title": r.get::<_, String>(1)?,
                    "durationMinutes": r.get::<_, Option<i64>>(2)?,
                    "sortOrder": r.get::<_, i64>(3)?,
                    "isPreview": r.get::<_, i64>(4)? != 0,
                }))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
        module_views.push(json!({
            "id": module_id,
            "title": module_title,
            "description": module_description,
            "sortOrder": sort_order,
            "lessons": lessons,
        }));
    }

    ok(
        &req.id,
        json!({
            "course": {
                "id": course_id,
                "title": title,
                "slug": slug,
                "description": description,
                "thumbnailUrl": thumbnail_url,
                "durationMinutes": duration_minutes,
            },
            "modules": module_views,
        }),
    )
}

fn is_enrolled(
    conn: &rusqlite::Connection,
    course_id: &str,
    user_id: &str,
) -> Result<bool, rusqlite::Error> {
    let row: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM enrollments WHERE course_id = ? AND user_id = ?",
            [course_id, user_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(row.is_some())
}

fn handle_lesson_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let auth = match auth::require_session(conn, req) {
        Ok(a) => a,
        Err(e) => return e,
    };
    let lesson_id = match required_str(req, "lessonId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let row: Option<(String, String, String, String, Option<i64>, bool, String, Option<String>, bool)> =
        match conn
            .query_row(
                "SELECT l.title, l.description, l.content, l.content_type, l.duration_minutes,
                        l.is_preview, c.id, c.company_id, c.is_active
                 FROM lessons l
                 JOIN course_modules m ON m.id = l.module_id
                 JOIN courses c ON c.id = m.course_id
                 WHERE l.id = ?",
                [&lesson_id],
                |r| {
                    Ok((
                        r.get(0)?,
                        r.get(1)?,
                        r.get(2)?,
                        r.get(3)?,
                        r.get(4)?,
                        r.get::<_, i64>(5)? != 0,
                        r.get(6)?,
                        r.get(7)?,
                        r.get::<_, i64>(8)? != 0,
                    ))
                },
            )
            .optional()
        {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };

    let Some((
        title,
        description,
        content_raw,
        content_type,
        duration_minutes,
        is_preview,
        course_id,
        company_id,
        is_active,
    )) = row
    else {
        return not_found(&req.id, "lesson");
    };
    if !course_visible(&auth, company_id.as_deref(), is_active) {
        return not_found(&req.id, "lesson");
    }

    // Non-preview lessons need an enrollment; preview lessons are open.
    if !auth.is_admin() && !is_preview {
        match is_enrolled(conn, &course_id, &auth.user_id) {
            Ok(true) => {}
            Ok(false) => return not_found(&req.id, "lesson"),
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }

    let content: LessonContent = serde_json::from_str(&content_raw).unwrap_or_default();
    let views = render::render_blocks(&content.blocks);

    ok(
        &req.id,
        json!({
            "lesson": {
                "id": lesson_id,
                "courseId": course_id,
                "title": title,
                "description": description,
                "contentType": content_type,
                "durationMinutes": duration_minutes,
                "isPreview": is_preview,
            },
            "views": views,
        }),
    )
}

fn handle_progress_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let auth = match auth::require_session(conn, req) {
        Ok(a) => a,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(progress) = req.params.get("progressPercent").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing progressPercent", None);
    };
    let progress = progress.clamp(0, 100);

    let (status, completed_at) = if progress >= 100 {
        ("completed", Some(now_ts()))
    } else {
        ("active", None)
    };

    let updated = match conn.execute(
        "UPDATE enrollments
         SET progress_percent = ?, status = ?, completed_at = ?
         WHERE course_id = ? AND user_id = ?",
        rusqlite::params![progress, status, completed_at, course_id, auth.user_id],
    ) {
        Ok(n) => n,
        Err(e) => return err(&req.id, "db_update_failed", e.to_string(), None),
    };
    if updated == 0 {
        return not_found(&req.id, "enrollment");
    }

    ok(
        &req.id,
        json!({ "progressPercent": progress, "status": status }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "learning.course.open" => Some(handle_course_open(state, req)),
        "learning.lesson.open" => Some(handle_lesson_open(state, req)),
        "learning.progress.set" => Some(handle_progress_set(state, req)),
        _ => None,
    }
}
