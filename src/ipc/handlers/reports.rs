use chrono::Utc;
use rusqlite::{params_from_iter, types::Value, Connection, OptionalExtension};
use serde_json::json;

use super::auth;
use crate::ipc::error::{err, not_found, ok, unauthorized};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};

// Bounded result sets keep the in-memory CSV (and the response) small.
const ROW_CAP: usize = 500;

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

struct EnrollmentRow {
    email: String,
    display_name: String,
    course_title: String,
    course_slug: String,
    status: String,
    progress_percent: i64,
    enrolled_at: String,
    completed_at: Option<String>,
}

fn query_enrollment_rows(
    conn: &Connection,
    where_clause: &str,
    binds: Vec<Value>,
) -> Result<(Vec<EnrollmentRow>, bool), String> {
    // One row past the cap tells us whether we truncated.
    let sql = format!(
        "SELECT u.email, u.display_name, c.title, c.slug, e.status, e.progress_percent,
                e.enrolled_at, e.completed_at
         FROM enrollments e
         JOIN users u ON u.id = e.user_id
         JOIN courses c ON c.id = e.course_id
         WHERE {}
         ORDER BY u.email, c.title
         LIMIT {}",
        where_clause,
        ROW_CAP + 1
    );
    let mut stmt = conn.prepare(&sql).map_err(|e| e.to_string())?;
    let mut rows: Vec<EnrollmentRow> = stmt
        .query_map(params_from_iter(binds), |r| {
            Ok(EnrollmentRow {
                email: r.get(0)?,
                display_name: r.get(1)?,
                course_title: r.get(2)?,
                course_slug: r.get(3)?,
                status: r.get(4)?,
                progress_percent: r.get(5)?,
                enrolled_at: r.get(6)?,
                completed_at: r.get(7)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| e.to_string())?;

    let truncated = rows.len() > ROW_CAP;
    rows.truncate(ROW_CAP);
    Ok((rows, truncated))
}

fn enrollment_csv(rows: &[EnrollmentRow]) -> String {
    let mut csv = String::from(
        "email,display_name,course_title,course_slug,status,progress_percent,enrolled_at,completed_at\n",
    );
    for r in rows {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            csv_quote(&r.email),
            csv_quote(&r.display_name),
            csv_quote(&r.course_title),
            csv_quote(&r.course_slug),
            csv_quote(&r.status),
            r.progress_percent,
            csv_quote(&r.enrolled_at),
            csv_quote(r.completed_at.as_deref().unwrap_or("")),
        ));
    }
    csv
}

fn handle_enrollments_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let auth = match auth::require_admin(conn, req) {
        Ok(a) => a,
        Err(e) => return e,
    };
    let company_id = match required_str(req, "companyId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if !auth.manages_company(Some(&company_id)) {
        return unauthorized(&req.id);
    }

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

    let (rows, truncated) = match query_enrollment_rows(
        conn,
        "e.company_id = ?",
        vec![Value::Text(company_id.clone())],
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e, None),
    };

    let csv = enrollment_csv(&rows);
    let filename = format!(
        "enrollments_{}_{}.csv",
        company_id,
        Utc::now().format("%Y%m%d")
    );

    ok(
        &req.id,
        json!({
            "filename": filename,
            "csv": csv,
            "rowCount": rows.len(),
            "truncated": truncated,
        }),
    )
}

fn handle_roster_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    let owner: Option<(Option<String>, String)> = match conn
        .query_row(
            "SELECT company_id, slug FROM courses WHERE id = ?",
            [&course_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some((course_company, course_slug)) = owner else {
        return not_found(&req.id, "course");
    };
    if let Some(cc) = &course_company {
        if !auth.manages_company(Some(cc)) {
            return not_found(&req.id, "course");
        }
    }

    // A global course's roster is still tenant-scoped for company admins.
    let (where_clause, binds): (String, Vec<Value>) = if auth.is_super_admin() {
        (
            "e.course_id = ?".to_string(),
            vec![Value::Text(course_id.clone())],
        )
    } else {
        let Some(own) = auth.company_id.clone() else {
            return unauthorized(&req.id);
        };
        (
            "e.course_id = ? AND e.company_id = ?".to_string(),
            vec![Value::Text(course_id.clone()), Value::Text(own)],
        )
    };

    let (rows, truncated) = match query_enrollment_rows(conn, &where_clause, binds) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e, None),
    };

    let csv = enrollment_csv(&rows);
    let filename = format!("roster_{}_{}.csv", course_slug, Utc::now().format("%Y%m%d"));

    ok(
        &req.id,
        json!({
            "filename": filename,
            "csv": csv,
            "rowCount": rows.len(),
            "truncated": truncated,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.enrollments.csv" => Some(handle_enrollments_csv(state, req)),
        "reports.roster.csv" => Some(handle_roster_csv(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_quote_escapes_only_when_needed() {
        assert_eq!(csv_quote("plain"), "plain");
        assert_eq!(csv_quote("a,b"), "\"a,b\"");
        assert_eq!(csv_quote("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_quote("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn enrollment_csv_has_explicit_header_and_one_line_per_row() {
        let rows = vec![EnrollmentRow {
            email: "a@b.c".into(),
            display_name: "Doe, Jay".into(),
            course_title: "Safety 101".into(),
            course_slug: "safety-101".into(),
            status: "active".into(),
            progress_percent: 40,
            enrolled_at: "100".into(),
            completed_at: None,
        }];
        let csv = enrollment_csv(&rows);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("email,display_name,course_title"));
        assert!(lines[1].contains("\"Doe, Jay\""));
    }
}
