use rusqlite::{params_from_iter, types::Value, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

use super::auth;
use crate::ipc::error::{err, not_found, ok, unauthorized};
use crate::ipc::helpers::{db_conn, now_ts, parse_opt_string, required_str};
use crate::ipc::types::{AppState, Request};

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let user_id = match required_str(req, "userId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let learner: Option<Option<String>> = match conn
        .query_row("SELECT company_id FROM users WHERE id = ?", [&user_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(learner_company) = learner else {
        return not_found(&req.id, "user");
    };
    let Some(company_id) = learner_company else {
        return err(&req.id, "bad_params", "user has no company to enroll under", None);
    };
    if !auth.manages_company(Some(&company_id)) {
        return unauthorized(&req.id);
    }

    // The course must be in the learner's scope: their tenant's or global.
    let course: Option<Option<String>> = match conn
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
    let Some(course_company) = course else {
        return not_found(&req.id, "course");
    };
    if let Some(cc) = &course_company {
        if cc != &company_id {
            return not_found(&req.id, "course");
        }
    }

    let existing: Option<i64> = match conn
        .query_row(
            "SELECT 1 FROM enrollments WHERE course_id = ? AND user_id = ?",
            [&course_id, &user_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if existing.is_some() {
        return err(&req.id, "already_enrolled", "user is already enrolled", None);
    }

    let enrollment_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO enrollments(id, company_id, course_id, user_id, status, progress_percent, enrolled_at)
         VALUES(?, ?, ?, ?, 'active', 0, ?)",
        (&enrollment_id, &company_id, &course_id, &user_id, now_ts()),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "enrollments" })),
        );
    }

    ok(&req.id, json!({ "enrollmentId": enrollment_id }))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let auth = match auth::require_admin(conn, req) {
        Ok(a) => a,
        Err(e) => return e,
    };
    let course_id = match parse_opt_string(req.params.get("courseId")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("courseId {}", m), None),
    };
    let company_id = match parse_opt_string(req.params.get("companyId")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("companyId {}", m), None),
    };

    let mut where_clause = String::from("1 = 1");
    let mut binds: Vec<Value> = Vec::new();
    if let Some(cid) = &course_id {
        where_clause.push_str(" AND e.course_id = ?");
        binds.push(Value::Text(cid.clone()));
    }
    match (&company_id, auth.is_super_admin()) {
        (Some(cid), true) => {
            where_clause.push_str(" AND e.company_id = ?");
            binds.push(Value::Text(cid.clone()));
        }
        (requested, false) => {
            if requested.is_some() && !auth.manages_company(requested.as_deref()) {
                return unauthorized(&req.id);
            }
            let Some(own) = auth.company_id.clone() else {
                return unauthorized(&req.id);
            };
            where_clause.push_str(" AND e.company_id = ?");
            binds.push(Value::Text(own));
        }
        (None, true) => {}
    }

    let sql = format!(
        "SELECT e.id, e.course_id, c.title, e.user_id, u.display_name, u.email,
                e.status, e.progress_percent, e.enrolled_at, e.completed_at
         FROM enrollments e
         JOIN courses c ON c.id = e.course_id
         JOIN users u ON u.id = e.user_id
         WHERE {}
         ORDER BY u.email, c.title",
        where_clause
    );
    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(params_from_iter(binds), |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "courseId": row.get::<_, String>(1)?,
                "courseTitle": row.get::<_, String>(2)?,
                "userId": row.get::<_, String>(3)?,
                "displayName": row.get::<_, String>(4)?,
                "email": row.get::<_, String>(5)?,
                "status": row.get::<_, String>(6)?,
                "progressPercent": row.get::<_, i64>(7)?,
                "enrolledAt": row.get::<_, String>(8)?,
                "completedAt": row.get::<_, Option<String>>(9)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(enrollments) => ok(&req.id, json!({ "enrollments": enrollments })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let auth = match auth::require_admin(conn, req) {
        Ok(a) => a,
        Err(e) => return e,
    };
    let enrollment_id = match required_str(req, "enrollmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let owner: Option<String> = match conn
        .query_row(
            "SELECT company_id FROM enrollments WHERE id = ?",
            [&enrollment_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(company_id) = owner else {
        return not_found(&req.id, "enrollment");
    };
    if !auth.manages_company(Some(&company_id)) {
        return not_found(&req.id, "enrollment");
    }

    if let Err(e) = conn.execute("DELETE FROM enrollments WHERE id = ?", [&enrollment_id]) {
        return err(&req.id, "db_delete_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "enrollments.create" => Some(handle_create(state, req)),
        "enrollments.list" => Some(handle_list(state, req)),
        "enrollments.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
