use std::time::Duration;

use rusqlite::{params, Connection, DatabaseName, OptionalExtension, Result, Row};

use crate::clock::{format_rfc3339, Clock, SystemClock};

pub const CURRENT_SCHEMA_VERSION: i64 = 2;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: [Migration; 2] = [
    Migration {
        version: 1,
        name: "baseline_task_cache_v1",
        sql: r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS task_local (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    status TEXT NOT NULL,
    assigned_to TEXT NOT NULL,
    created_at TEXT NOT NULL,
    sla_date TEXT NOT NULL,
    location TEXT,
    priority TEXT,
    category TEXT,
    signature BLOB,
    media_urls_json TEXT NOT NULL DEFAULT '[]',
    checklist_json TEXT NOT NULL DEFAULT '[]',
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_task_local_created_at ON task_local(created_at);
CREATE INDEX IF NOT EXISTS idx_task_local_status ON task_local(status);
"#,
    },
    Migration {
        version: 2,
        name: "pending_reminders_v1",
        sql: r#"
CREATE TABLE IF NOT EXISTS reminder (
    notification_id TEXT PRIMARY KEY,
    task_id TEXT NOT NULL,
    fire_at TEXT NOT NULL,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    scheduled_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reminder_fire_at ON reminder(fire_at);
"#,
    },
];

pub fn open_connection(path: &str) -> Result<Connection> {
    let mut conn = Connection::open(path)?;
    configure_for_speed(&conn)?;
    apply_migrations(&mut conn)?;
    Ok(conn)
}

fn configure_for_speed(conn: &Connection) -> Result<()> {
    conn.pragma_update(None::<DatabaseName>, "journal_mode", "WAL")?;
    conn.pragma_update(None::<DatabaseName>, "synchronous", "NORMAL")?;
    conn.pragma_update(None::<DatabaseName>, "foreign_keys", "ON")?;
    conn.pragma_update(None::<DatabaseName>, "temp_store", "MEMORY")?;
    conn.pragma_update(None::<DatabaseName>, "busy_timeout", 5000i64)?;
    conn.busy_timeout(Duration::from_millis(5000))?;
    Ok(())
}

fn apply_migrations(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL
);
"#,
    )?;

    for migration in MIGRATIONS {
        let already_applied: Option<i64> = tx
            .query_row(
                "SELECT version FROM schema_migrations WHERE version = ?1",
                params![migration.version],
                |row| row.get(0),
            )
            .optional()?;

        if already_applied.is_some() {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![migration.version, migration.name, now_utc_rfc3339()],
        )?;
    }

    tx.execute(
        r#"
INSERT INTO meta (key, value)
VALUES ('schema_version', ?1)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#,
        params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;

    tx.commit()
}

pub fn now_utc_rfc3339() -> String {
    format_rfc3339(SystemClock.now())
}

/// One `task_local` row with JSON list columns still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub assigned_to: String,
    pub created_at: String,
    pub sla_date: String,
    pub location: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub signature: Option<Vec<u8>>,
    pub media_urls_json: String,
    pub checklist_json: String,
    pub updated_at: String,
}

const TASK_COLUMNS: &str = "id, title, description, status, assigned_to, created_at, sla_date, \
     location, priority, category, signature, media_urls_json, checklist_json, updated_at";

fn task_row(row: &Row<'_>) -> Result<TaskRow> {
    Ok(TaskRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: row.get(3)?,
        assigned_to: row.get(4)?,
        created_at: row.get(5)?,
        sla_date: row.get(6)?,
        location: row.get(7)?,
        priority: row.get(8)?,
        category: row.get(9)?,
        signature: row.get(10)?,
        media_urls_json: row.get(11)?,
        checklist_json: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

pub fn upsert_task_row(conn: &Connection, row: &TaskRow) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO task_local (
    id, title, description, status, assigned_to, created_at, sla_date,
    location, priority, category, signature, media_urls_json, checklist_json, updated_at
)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
ON CONFLICT(id) DO UPDATE SET
    title = excluded.title,
    description = excluded.description,
    status = excluded.status,
    assigned_to = excluded.assigned_to,
    sla_date = excluded.sla_date,
    location = excluded.location,
    priority = excluded.priority,
    category = excluded.category,
    signature = excluded.signature,
    media_urls_json = excluded.media_urls_json,
    checklist_json = excluded.checklist_json,
    updated_at = excluded.updated_at
"#,
        params![
            row.id,
            row.title,
            row.description,
            row.status,
            row.assigned_to,
            row.created_at,
            row.sla_date,
            row.location,
            row.priority,
            row.category,
            row.signature,
            row.media_urls_json,
            row.checklist_json,
            row.updated_at
        ],
    )?;
    Ok(())
}

/// Remote-owned columns overwritten when a live-query batch carries a task
/// that is already cached.
pub struct RemoteFieldsUpdate<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub status: &'a str,
    pub assigned_to: &'a str,
    pub sla_date: &'a str,
    pub location: Option<&'a str>,
    pub media_urls_json: &'a str,
    pub checklist_json: &'a str,
    pub updated_at: &'a str,
}

/// Leaves `signature`, `priority`, `category` and `created_at` untouched.
pub fn update_remote_fields(conn: &Connection, update: &RemoteFieldsUpdate<'_>) -> Result<usize> {
    conn.execute(
        r#"
UPDATE task_local SET
    title = ?2,
    description = ?3,
    status = ?4,
    assigned_to = ?5,
    sla_date = ?6,
    location = ?7,
    media_urls_json = ?8,
    checklist_json = ?9,
    updated_at = ?10
WHERE id = ?1
"#,
        params![
            update.id,
            update.title,
            update.description,
            update.status,
            update.assigned_to,
            update.sla_date,
            update.location,
            update.media_urls_json,
            update.checklist_json,
            update.updated_at
        ],
    )
}

pub fn get_task_row(conn: &Connection, id: &str) -> Result<Option<TaskRow>> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM task_local WHERE id = ?1"),
        params![id],
        task_row,
    )
    .optional()
}

pub fn task_row_exists(conn: &Connection, id: &str) -> Result<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM task_local WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub fn list_task_rows(conn: &Connection) -> Result<Vec<TaskRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM task_local ORDER BY created_at DESC, id ASC"
    ))?;

    let mut rows = stmt.query([])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        result.push(task_row(row)?);
    }

    Ok(result)
}

pub fn count_task_rows(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM task_local", [], |row| row.get(0))
}

pub fn delete_task_row(conn: &Connection, id: &str) -> Result<usize> {
    conn.execute("DELETE FROM task_local WHERE id = ?1", params![id])
}

pub fn set_status(conn: &Connection, id: &str, status: &str, updated_at: &str) -> Result<usize> {
    conn.execute(
        "UPDATE task_local SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, status, updated_at],
    )
}

pub fn set_signature(
    conn: &Connection,
    id: &str,
    signature: Option<&[u8]>,
    updated_at: &str,
) -> Result<usize> {
    conn.execute(
        "UPDATE task_local SET signature = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, signature, updated_at],
    )
}

pub fn set_media_urls_json(
    conn: &Connection,
    id: &str,
    media_urls_json: &str,
    updated_at: &str,
) -> Result<usize> {
    conn.execute(
        "UPDATE task_local SET media_urls_json = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, media_urls_json, updated_at],
    )
}

pub fn set_checklist_json(
    conn: &Connection,
    id: &str,
    checklist_json: &str,
    updated_at: &str,
) -> Result<usize> {
    conn.execute(
        "UPDATE task_local SET checklist_json = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, checklist_json, updated_at],
    )
}

pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM meta WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO meta (key, value)
VALUES (?1, ?2)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#,
        params![key, value],
    )?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderRecord {
    pub notification_id: String,
    pub task_id: String,
    pub fire_at: String,
    pub title: String,
    pub body: String,
    pub scheduled_at: String,
}

pub fn upsert_reminder(conn: &Connection, record: &ReminderRecord) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO reminder (notification_id, task_id, fire_at, title, body, scheduled_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
ON CONFLICT(notification_id) DO UPDATE SET
    task_id = excluded.task_id,
    fire_at = excluded.fire_at,
    title = excluded.title,
    body = excluded.body,
    scheduled_at = excluded.scheduled_at
"#,
        params![
            record.notification_id,
            record.task_id,
            record.fire_at,
            record.title,
            record.body,
            record.scheduled_at
        ],
    )?;
    Ok(())
}

pub fn delete_reminder(conn: &Connection, notification_id: &str) -> Result<usize> {
    conn.execute(
        "DELETE FROM reminder WHERE notification_id = ?1",
        params![notification_id],
    )
}

pub fn list_reminders(conn: &Connection) -> Result<Vec<ReminderRecord>> {
    let mut stmt = conn.prepare(
        r#"
SELECT notification_id, task_id, fire_at, title, body, scheduled_at
FROM reminder
ORDER BY fire_at ASC, notification_id ASC
"#,
    )?;
    let mut rows = stmt.query([])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        result.push(ReminderRecord {
            notification_id: row.get(0)?,
            task_id: row.get(1)?,
            fire_at: row.get(2)?,
            title: row.get(3)?,
            body: row.get(4)?,
            scheduled_at: row.get(5)?,
        });
    }
    Ok(result)
}
