use rusqlite::types::ValueRef;
use rusqlite::{Connection, Params};
use serde_json::{Map, Value as JsonValue};
use std::path::Path;

pub type Record = Map<String, JsonValue>;

pub fn open_db(path: &Path, bootstrap_schema: bool) -> anyhow::Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    if bootstrap_schema {
        ensure_schema(&conn)?;
    }
    Ok(conn)
}

pub fn ensure_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            designation TEXT,
            department TEXT,
            school TEXT NOT NULL,
            school_type TEXT NOT NULL,
            email TEXT,
            phone TEXT,
            linkedin_url TEXT,
            email_sent_date TEXT,
            linkedin_request_date TEXT,
            linkedin_accepted_date TEXT,
            call_date TEXT,
            follow_up_date TEXT,
            last_contacted_date TEXT,
            status TEXT NOT NULL,
            notes TEXT,
            via_email INTEGER NOT NULL DEFAULT 0,
            via_linkedin INTEGER NOT NULL DEFAULT 0,
            via_call INTEGER NOT NULL DEFAULT 0,
            via_referral INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS interviews(
            id TEXT PRIMARY KEY,
            teacher_id INTEGER,
            teacher_name TEXT NOT NULL,
            school TEXT,
            interview_date TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'scheduled',
            score INTEGER,
            pilot_interest INTEGER NOT NULL DEFAULT 0,
            setup_time INTEGER,
            price_feedback REAL,
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT,
            FOREIGN KEY(teacher_id) REFERENCES teachers(id) ON DELETE SET NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_interviews_teacher ON interviews(teacher_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS tasks(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            notes TEXT,
            week_id INTEGER,
            priority TEXT NOT NULL,
            due_date TEXT,
            completed INTEGER NOT NULL DEFAULT 0,
            completed_at TEXT,
            created_at TEXT NOT NULL,
            is_default INTEGER NOT NULL DEFAULT 0,
            subtasks TEXT NOT NULL DEFAULT '[]',
            interview_id TEXT,
            teacher_id INTEGER,
            assignee TEXT CHECK(assignee IS NULL OR assignee IN ('rishabh', 'tung'))
        )",
        [],
    )?;
    // Files created before multi-assignee support only carry the legacy column.
    ensure_tasks_assignees(conn)?;
    ensure_tasks_last_modified_by(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tasks_week ON tasks(week_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS goals(
            id INTEGER PRIMARY KEY CHECK(id = 1),
            target_interviews INTEGER NOT NULL,
            target_high_scores INTEGER NOT NULL,
            target_pilots INTEGER NOT NULL,
            target_setup_time INTEGER NOT NULL,
            price_point REAL NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS knowledge_cards(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            sort_order INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS knowledge_items(
            id TEXT PRIMARY KEY,
            card_id TEXT NOT NULL,
            type TEXT NOT NULL,
            title TEXT NOT NULL,
            url TEXT,
            content TEXT,
            sort_order INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT,
            FOREIGN KEY(card_id) REFERENCES knowledge_cards(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_knowledge_items_card ON knowledge_items(card_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS activity_log(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            action TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT,
            entity_name TEXT,
            user_name TEXT NOT NULL,
            details TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_activity_log_created ON activity_log(created_at)",
        [],
    )?;

    Ok(())
}

fn ensure_tasks_assignees(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "tasks", "assignees")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE tasks ADD COLUMN assignees TEXT NOT NULL DEFAULT '[]'",
        [],
    )?;
    // Backfill from the legacy single-assignee column.
    conn.execute(
        "UPDATE tasks SET assignees = json_array(assignee) WHERE assignee IS NOT NULL",
        [],
    )?;
    Ok(())
}

fn ensure_tasks_last_modified_by(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "tasks", "last_modified_by")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE tasks ADD COLUMN last_modified_by TEXT", [])?;
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

/// Runs a query and returns each row as a JSON object keyed by column name.
pub fn query_records<P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> rusqlite::Result<Vec<Record>> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(|n| n.to_string())
        .collect();
    let rows = stmt.query_map(params, |row| {
        let mut rec = Record::new();
        for (i, name) in names.iter().enumerate() {
            let value = match row.get_ref(i)? {
                ValueRef::Null => JsonValue::Null,
                ValueRef::Integer(n) => JsonValue::from(n),
                ValueRef::Real(f) => JsonValue::from(f),
                ValueRef::Text(t) => JsonValue::String(String::from_utf8_lossy(t).into_owned()),
                ValueRef::Blob(_) => JsonValue::Null,
            };
            rec.insert(name.clone(), value);
        }
        Ok(rec)
    })?;
    rows.collect()
}

pub fn query_record<P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> rusqlite::Result<Option<Record>> {
    Ok(query_records(conn, sql, params)?.into_iter().next())
}

/// SQLite reports an unprovisioned schema as "no such table: <name>".
pub fn is_missing_table(e: &rusqlite::Error) -> bool {
    e.to_string().contains("no such table")
}

pub fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
