use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use crate::clock::{format_rfc3339, parse_rfc3339};
use crate::db::{self, ReminderRecord};

pub const REMINDER_TITLE: &str = "Task deadline approaching";

/// Identifier of the deadline reminder for a task; one per task.
pub fn reminder_id(task_id: &str) -> String {
    format!("SLA-{task_id}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRequest {
    pub id: String,
    pub task_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub fire_at: OffsetDateTime,
    pub title: String,
    pub body: String,
}

impl ReminderRequest {
    pub fn for_task(task_id: &str, task_title: &str, fire_at: OffsetDateTime) -> Self {
        Self {
            id: reminder_id(task_id),
            task_id: task_id.to_string(),
            fire_at,
            title: REMINDER_TITLE.to_string(),
            body: format!("'{task_title}' is due in one hour."),
        }
    }
}

/// Local notification scheduling. Scheduling an id that is already pending
/// replaces it; cancelling an unknown id succeeds.
pub trait NotificationScheduler {
    fn schedule(&self, request: &ReminderRequest) -> Result<(), NotifyError>;
    fn cancel(&self, id: &str) -> Result<(), NotifyError>;
}

/// Keeps pending reminders in the `reminder` table of the cache database so
/// an external notifier can pick them up.
pub struct SqliteReminderScheduler {
    conn: Connection,
}

impl SqliteReminderScheduler {
    pub fn open(path: &str) -> Result<Self, NotifyError> {
        Ok(Self {
            conn: db::open_connection(path)?,
        })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Pending reminders, earliest first.
    pub fn pending(&self) -> Result<Vec<ReminderRequest>, NotifyError> {
        db::list_reminders(&self.conn)?
            .into_iter()
            .map(|record| {
                let fire_at = parse_rfc3339(&record.fire_at).map_err(|err| {
                    NotifyError::Rejected(format!(
                        "reminder {} has invalid fire time: {err}",
                        record.notification_id
                    ))
                })?;
                Ok(ReminderRequest {
                    id: record.notification_id,
                    task_id: record.task_id,
                    fire_at,
                    title: record.title,
                    body: record.body,
                })
            })
            .collect()
    }
}

impl NotificationScheduler for SqliteReminderScheduler {
    fn schedule(&self, request: &ReminderRequest) -> Result<(), NotifyError> {
        db::upsert_reminder(
            &self.conn,
            &ReminderRecord {
                notification_id: request.id.clone(),
                task_id: request.task_id.clone(),
                fire_at: format_rfc3339(request.fire_at),
                title: request.title.clone(),
                body: request.body.clone(),
                scheduled_at: db::now_utc_rfc3339(),
            },
        )?;
        debug!(reminder_id = %request.id, fire_at = %format_rfc3339(request.fire_at), "scheduled reminder");
        Ok(())
    }

    fn cancel(&self, id: &str) -> Result<(), NotifyError> {
        if db::delete_reminder(&self.conn, id)? > 0 {
            debug!(reminder_id = id, "cancelled reminder");
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("reminder storage error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("reminder rejected: {0}")]
    Rejected(String),
}
