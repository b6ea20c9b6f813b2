use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

use crate::ipc::error::{err, ok, unauthorized};
use crate::ipc::helpers::{db_conn, now_ts, parse_opt_string, required_str};
use crate::ipc::types::{AppState, Request};

pub const ROLE_SUPER_ADMIN: &str = "super_admin";
pub const ROLE_COMPANY_ADMIN: &str = "company_admin";
pub const ROLE_LEARNER: &str = "learner";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub company_id: Option<String>,
    pub role: String,
}

impl AuthUser {
    pub fn is_super_admin(&self) -> bool {
        self.role == ROLE_SUPER_ADMIN
    }

    pub fn is_admin(&self) -> bool {
        self.role == ROLE_SUPER_ADMIN || self.role == ROLE_COMPANY_ADMIN
    }

    /// Company admins manage only their own tenant; super-admins manage all.
    pub fn manages_company(&self, company_id: Option<&str>) -> bool {
        if self.is_super_admin() {
            return true;
        }
        self.role == ROLE_COMPANY_ADMIN
            && self.company_id.as_deref().is_some()
            && self.company_id.as_deref() == company_id
    }
}

/// Resolves `params.sessionToken` to a user. Missing token, unknown token,
/// and expired token all produce the same `unauthorized` response as a wrong
/// role does; nothing leaks which check failed.
pub fn require_session(conn: &Connection, req: &Request) -> Result<AuthUser, serde_json::Value> {
    let token = req
        .params
        .get("sessionToken")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| unauthorized(&req.id))?;

    let row: Option<(String, Option<String>, String, Option<String>)> = conn
        .query_row(
            "SELECT u.id, u.company_id, u.role, s.expires_at
             FROM sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.token = ?",
            [token],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;

    let Some((user_id, company_id, role, expires_at)) = row else {
        return Err(unauthorized(&req.id));
    };

    if let Some(expires_at) = expires_at {
        let now = now_ts().parse::<i64>().unwrap_or(0);
        if expires_at.parse::<i64>().map(|exp| exp <= now).unwrap_or(true) {
            return Err(unauthorized(&req.id));
        }
    }

    Ok(AuthUser {
        user_id,
        company_id,
        role,
    })
}

pub fn require_admin(conn: &Connection, req: &Request) -> Result<AuthUser, serde_json::Value> {
    let auth = require_session(conn, req)?;
    if !auth.is_admin() {
        return Err(unauthorized(&req.id));
    }
    Ok(auth)
}

fn users_exist(conn: &Connection) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
    Ok(count > 0)
}

fn insert_session(
    conn: &Connection,
    user_id: &str,
    token: &str,
    expires_at: Option<&str>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO sessions(token, user_id, created_at, expires_at) VALUES(?, ?, ?, ?)
         ON CONFLICT(token) DO UPDATE SET user_id = excluded.user_id,
                                          expires_at = excluded.expires_at",
        (token, user_id, now_ts(), expires_at),
    )?;
    Ok(())
}

/// First-run escape hatch: creates the initial super-admin while the users
/// table is still empty. Any later call is rejected like any other
/// unauthorized request.
fn handle_bootstrap(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
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

    match users_exist(conn) {
        Ok(true) => return unauthorized(&req.id),
        Ok(false) => {}
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let user_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO users(id, company_id, email, display_name, role, created_at)
         VALUES(?, NULL, ?, ?, ?, ?)",
        (&user_id, &email, &display_name, ROLE_SUPER_ADMIN, now_ts()),
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }

    let token = Uuid::new_v4().to_string();
    if let Err(e) = insert_session(conn, &user_id, &token, None) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }

    ok(
        &req.id,
        json!({ "userId": user_id, "sessionToken": token, "role": ROLE_SUPER_ADMIN }),
    )
}

/// The seam to the hosted auth provider: after it authenticates a user, the
/// host shell installs the provider's session token here. The shell is the
/// only peer on this stdio channel and is trusted for exactly this call.
fn handle_sessions_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user_id = match required_str(req, "userId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let expires_at = match parse_opt_string(req.params.get("expiresAt")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("expiresAt {}", m), None),
    };

    let known: Option<i64> = match conn
        .query_row("SELECT 1 FROM users WHERE id = ?", [&user_id], |r| r.get(0))
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if known.is_none() {
        return err(&req.id, "not_found", "user not found", None);
    }

    let token = req
        .params
        .get("token")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Err(e) = insert_session(conn, &user_id, &token, expires_at.as_deref()) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "sessionToken": token }))
}

fn handle_sessions_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let token = match required_str(req, "token") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = conn.execute("DELETE FROM sessions WHERE token = ?", [&token]) {
        return err(&req.id, "db_delete_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.bootstrap" => Some(handle_bootstrap(state, req)),
        "auth.sessions.open" => Some(handle_sessions_open(state, req)),
        "auth.sessions.close" => Some(handle_sessions_close(state, req)),
        _ => None,
    }
}
