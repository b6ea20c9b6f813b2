use rusqlite::{Connection, OptionalExtension};

const MAX_PROBES: usize = 50;

/// Lowercased, URL-safe slug: runs of non-alphanumerics collapse to single
/// hyphens, leading/trailing hyphens are trimmed. Empty titles fall back to
/// "course".
pub fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_hyphen = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    if out.is_empty() {
        out.push_str("course");
    }
    out
}

/// Probes existing course slugs, appending `-2`, `-3`, ... until unique.
/// Gives up after 50 attempts rather than looping forever.
pub fn unique_slug(conn: &Connection, base: &str) -> anyhow::Result<String> {
    let mut candidate = base.to_string();
    for attempt in 1..=MAX_PROBES {
        let taken: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM courses WHERE slug = ?",
                [&candidate],
                |r| r.get(0),
            )
            .optional()?;
        if taken.is_none() {
            return Ok(candidate);
        }
        candidate = format!("{}-{}", base, attempt + 1);
    }
    anyhow::bail!("could not find a unique slug for '{}' after {} attempts", base, MAX_PROBES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn conn_with_slugs(slugs: &[&str]) -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        conn.execute("CREATE TABLE courses(id TEXT PRIMARY KEY, slug TEXT UNIQUE)", [])
            .expect("create");
        for (i, s) in slugs.iter().enumerate() {
            conn.execute(
                "INSERT INTO courses(id, slug) VALUES(?, ?)",
                (i.to_string(), s),
            )
            .expect("insert");
        }
        conn
    }

    #[test]
    fn slugify_basic_forms() {
        assert_eq!(slugify("Acme"), "acme");
        assert_eq!(slugify("Intro to Rust: Part 2!"), "intro-to-rust-part-2");
        assert_eq!(slugify("  --  "), "course");
        assert_eq!(slugify("Already-Slugged"), "already-slugged");
    }

    #[test]
    fn probe_appends_numeric_suffixes() {
        let conn = conn_with_slugs(&[]);
        assert_eq!(unique_slug(&conn, "acme").unwrap(), "acme");

        let conn = conn_with_slugs(&["acme"]);
        assert_eq!(unique_slug(&conn, "acme").unwrap(), "acme-2");

        let conn = conn_with_slugs(&["acme", "acme-2"]);
        assert_eq!(unique_slug(&conn, "acme").unwrap(), "acme-3");
    }

    #[test]
    fn probe_gives_up_after_fifty_attempts() {
        let mut taken = vec!["acme".to_string()];
        for i in 2..=60 {
            taken.push(format!("acme-{}", i));
        }
        let refs: Vec<&str> = taken.iter().map(|s| s.as_str()).collect();
        let conn = conn_with_slugs(&refs);
        assert!(unique_slug(&conn, "acme").is_err());
    }
}
