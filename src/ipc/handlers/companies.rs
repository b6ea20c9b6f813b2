use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

use super::auth::{self, ROLE_COMPANY_ADMIN, ROLE_LEARNER, ROLE_SUPER_ADMIN};
use crate::ipc::error::{err, not_found, ok, unauthorized};
use crate::ipc::helpers::{db_conn, now_ts, parse_opt_string, required_str};
use crate::ipc::types::{AppState, Request};

fn handle_companies_list(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    // Counts via correlated subqueries to avoid double-counting from joins.
    let mut stmt = match conn.prepare(
        "SELECT
           c.id,
           c.name,
           (SELECT COUNT(*) FROM users u WHERE u.company_id = c.id) AS user_count,
           (SELECT COUNT(*) FROM courses co WHERE co.company_id = c.id) AS course_count,
           (SELECT COUNT(*) FROM enrollments e WHERE e.company_id = c.id) AS enrollment_count
         FROM companies c
         ORDER BY c.name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "name": row.get::<_, String>(1)?,
                "userCount": row.get::<_, i64>(2)?,
                "courseCount": row.get::<_, i64>(3)?,
                "enrollmentCount": row.get::<_, i64>(4)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(companies) => ok(&req.id, json!({ "companies": companies })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_companies_create(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    let company_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO companies(id, name, created_at) VALUES(?, ?, ?)",
        (&company_id, &name, now_ts()),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "companies" })),
        );
    }

    ok(&req.id, json!({ "companyId": company_id, "name": name }))
}

fn handle_companies_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let company_id = match required_str(req, "companyId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM companies WHERE id = ?", [&company_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return not_found(&req.id, "company");
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    // Tenant teardown in dependency order; course deletion cascades to its
    // modules, lessons and enrollments at the storage layer.
    if let Err(e) = tx.execute("DELETE FROM enrollments WHERE company_id = ?", [&company_id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "enrollments" })),
        );
    }
    if let Err(e) = tx.execute("DELETE FROM courses WHERE company_id = ?", [&company_id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "courses" })),
        );
    }
    if let Err(e) = tx.execute(
        "DELETE FROM sessions
         WHERE user_id IN (SELECT id FROM users WHERE company_id = ?)",
        [&company_id],
    ) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "sessions" })),
        );
    }
    if let Err(e) = tx.execute("DELETE FROM users WHERE company_id = ?", [&company_id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "users" })),
        );
    }
    if let Err(e) = tx.execute("DELETE FROM companies WHERE id = ?", [&company_id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "companies" })),
        );
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "ok": true }))
}

fn handle_users_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let auth = match auth::require_admin(conn, req) {
        Ok(a) => a,
        Err(e) => return e,
    };
    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let display_name = match required_str(req, "displayName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let role = match required_str(req, "role") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if role != ROLE_SUPER_ADMIN && role != ROLE_COMPANY_ADMIN && role != ROLE_LEARNER {
        return err(
            &req.id,
            "bad_params",
            "role must be one of: super_admin, company_admin, learner",
            Some(json!({ "role": role })),
        );
    }
    let company_id = match parse_opt_string(req.params.get("companyId")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("companyId {}", m), None),
    };

    // Company admins create users only inside their own tenant, and never
    // another admin tier above their own.
    if !auth.is_super_admin() {
        if role == ROLE_SUPER_ADMIN || !auth.manages_company(company_id.as_deref()) {
            return unauthorized(&req.id);
        }
    }
    if role != ROLE_SUPER_ADMIN && company_id.is_none() {
        return err(&req.id, "bad_params", "companyId required for this role", None);
    }

    if let Some(cid) = &company_id {
        let exists: Option<i64> = match conn
            .query_row("SELECT 1 FROM companies WHERE id = ?", [cid], |r| r.get(0))
            .optional()
        {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
        if exists.is_none() {
            return not_found(&req.id, "company");
        }
    }

    let user_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO users(id, company_id, email, display_name, role, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (&user_id, &company_id, &email, &display_name, &role, now_ts()),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "users" })),
        );
    }

    ok(&req.id, json!({ "userId": user_id, "email": email, "role": role }))
}

fn handle_users_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let auth = match auth::require_admin(conn, req) {
        Ok(a) => a,
        Err(e) => return e,
    };
    let company_id = match parse_opt_string(req.params.get("companyId")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("companyId {}", m), None),
    };

    let scope = if auth.is_super_admin() {
        company_id
    } else {
        // Tenant-scoped regardless of what was asked for.
        if company_id.is_some() && !auth.manages_company(company_id.as_deref()) {
            return unauthorized(&req.id);
        }
        auth.company_id.clone()
    };

    let (sql, binds): (&str, Vec<String>) = match &scope {
        Some(cid) => (
            "SELECT id, company_id, email, display_name, role FROM users
             WHERE company_id = ? ORDER BY email",
            vec![cid.clone()],
        ),
        None => (
            "SELECT id, company_id, email, display_name, role FROM users ORDER BY email",
            Vec::new(),
        ),
    };

    let mut stmt = match conn.prepare(sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(rusqlite::params_from_iter(binds), |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "companyId": row.get::<_, Option<String>>(1)?,
                "email": row.get::<_, String>(2)?,
                "displayName": row.get::<_, String>(3)?,
                "role": row.get::<_, String>(4)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(users) => ok(&req.id, json!({ "users": users })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "companies.list" => Some(handle_companies_list(state, req)),
        "companies.create" => Some(handle_companies_create(state, req)),
        "companies.delete" => Some(handle_companies_delete(state, req)),
        "users.create" => Some(handle_users_create(state, req)),
        "users.list" => Some(handle_users_list(state, req)),
        _ => None,
    }
}
