use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("learndesk.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS companies(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            company_id TEXT,
            email TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            role TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(company_id) REFERENCES companies(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_company ON users(company_id)",
        [],
    )?;

    // Session rows are installed by the host shell once the hosted auth
    // provider completes a login; the daemon only validates them.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions(
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT,
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            sort_order INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            company_id TEXT,
            category_id TEXT,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            thumbnail_url TEXT,
            duration_minutes INTEGER,
            is_active INTEGER NOT NULL DEFAULT 1,
            is_featured INTEGER NOT NULL DEFAULT 0,
            original_prompt TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(company_id) REFERENCES companies(id),
            FOREIGN KEY(category_id) REFERENCES categories(id)
        )",
        [],
    )?;
    // Workspaces created before these columns existed get them added here;
    // the save path additionally tolerates a missing column at write time.
    ensure_courses_authoring_columns(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_company ON courses(company_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_category ON courses(category_id)",
        [],
    )?;

    // Module and lesson ids are generated by the builder client and trusted
    // as the natural keys for upsert and diff-based deletion. Deleting a
    // parent cascades at the storage layer.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS course_modules(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            sort_order INTEGER NOT NULL DEFAULT 0,
            is_published INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_course_modules_course ON course_modules(course_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS lessons(
            id TEXT PRIMARY KEY,
            module_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            content_type TEXT NOT NULL DEFAULT 'text',
            content TEXT NOT NULL DEFAULT '{\"blocks\":[]}',
            duration_minutes INTEGER,
            sort_order INTEGER NOT NULL DEFAULT 0,
            is_preview INTEGER NOT NULL DEFAULT 0,
            is_published INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(module_id) REFERENCES course_modules(id) ON DELETE CASCADE
        )",
        [],
    )?;
    ensure_lessons_is_preview(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lessons_module ON lessons(module_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            progress_percent INTEGER NOT NULL DEFAULT 0,
            enrolled_at TEXT NOT NULL,
            completed_at TEXT,
            UNIQUE(course_id, user_id),
            FOREIGN KEY(company_id) REFERENCES companies(id),
            FOREIGN KEY(course_id) REFERENCES courses(id) ON DELETE CASCADE,
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;
    ensure_enrollments_completed_at(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_company ON enrollments(company_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_course ON enrollments(course_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_user ON enrollments(user_id)",
        [],
    )?;

    Ok(conn)
}

fn ensure_courses_authoring_columns(conn: &Connection) -> anyhow::Result<()> {
    if !table_has_column(conn, "courses", "is_featured")? {
        conn.execute(
            "ALTER TABLE courses ADD COLUMN is_featured INTEGER NOT NULL DEFAULT 0",
            [],
        )?;
    }
    if !table_has_column(conn, "courses", "original_prompt")? {
        conn.execute("ALTER TABLE courses ADD COLUMN original_prompt TEXT", [])?;
    }
    Ok(())
}

fn ensure_lessons_is_preview(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "lessons", "is_preview")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE lessons ADD COLUMN is_preview INTEGER NOT NULL DEFAULT 0",
        [],
    )?;
    Ok(())
}

fn ensure_enrollments_completed_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "enrollments", "completed_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE enrollments ADD COLUMN completed_at TEXT", [])?;
    Ok(())
}

pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
