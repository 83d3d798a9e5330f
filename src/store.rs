use std::str::FromStr;

use rusqlite::Connection;
use thiserror::Error;
use tracing::debug;

use crate::clock::{format_rfc3339, parse_rfc3339};
use crate::db::{self, RemoteFieldsUpdate, TaskRow};
use crate::domain::{ChecklistItem, LocalTask, Task, TaskStatus};
use crate::observe::{ListenerId, Observers};

/// Change notification published after every successful store write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Inserted(String),
    Updated(String),
    Removed(String),
}

impl StoreChange {
    pub fn task_id(&self) -> &str {
        match self {
            StoreChange::Inserted(id) | StoreChange::Updated(id) | StoreChange::Removed(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteApply {
    Inserted,
    Updated,
}

/// The on-device task cache.
///
/// Owned by a single thread; every read and write goes through `&self` on
/// that thread, so records are never mutated concurrently.
pub struct TaskStore {
    conn: Connection,
    observers: Observers<StoreChange>,
}

impl TaskStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        Ok(Self::from_connection(db::open_connection(path)?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            observers: Observers::new(),
        }
    }

    pub fn subscribe(&mut self, listener: impl Fn(&StoreChange) + 'static) -> ListenerId {
        self.observers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn get(&self, id: &str) -> Result<Option<LocalTask>, StoreError> {
        db::get_task_row(&self.conn, id)?
            .map(LocalTask::try_from)
            .transpose()
    }

    pub fn contains(&self, id: &str) -> Result<bool, StoreError> {
        Ok(db::task_row_exists(&self.conn, id)?)
    }

    /// All cached tasks, newest `created_at` first.
    pub fn list(&self) -> Result<Vec<LocalTask>, StoreError> {
        let mut tasks = db::list_task_rows(&self.conn)?
            .into_iter()
            .map(LocalTask::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(db::count_task_rows(&self.conn)? as usize)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Writes every column of `task`, inserting or replacing by id.
    pub fn save(&self, task: &LocalTask) -> Result<(), StoreError> {
        let existed = self.contains(&task.id)?;
        db::upsert_task_row(&self.conn, &TaskRow::from_local(task)?)?;
        self.publish(if existed {
            StoreChange::Updated(task.id.clone())
        } else {
            StoreChange::Inserted(task.id.clone())
        });
        Ok(())
    }

    /// Upsert-by-id from a live-query snapshot. An existing record keeps its
    /// signature bytes, priority, category and creation time.
    pub fn apply_remote(&self, id: &str, task: &Task) -> Result<RemoteApply, StoreError> {
        if !self.contains(id)? {
            let local = LocalTask::from_remote(id, task);
            db::upsert_task_row(&self.conn, &TaskRow::from_local(&local)?)?;
            debug!(task_id = id, "inserted task from remote snapshot");
            self.publish(StoreChange::Inserted(id.to_string()));
            return Ok(RemoteApply::Inserted);
        }

        let media_urls_json = encode_json(id, "media_urls_json", &task.media_urls)?;
        let checklist_json = encode_json(id, "checklist_json", &task.checklist)?;
        let sla_date = format_rfc3339(task.sla_date);
        let updated_at = db::now_utc_rfc3339();
        db::update_remote_fields(
            &self.conn,
            &RemoteFieldsUpdate {
                id,
                title: &task.title,
                description: &task.description,
                status: task.status.as_str(),
                assigned_to: &task.assigned_to,
                sla_date: &sla_date,
                location: task.location.as_deref(),
                media_urls_json: &media_urls_json,
                checklist_json: &checklist_json,
                updated_at: &updated_at,
            },
        )?;
        debug!(task_id = id, "updated task from remote snapshot");
        self.publish(StoreChange::Updated(id.to_string()));
        Ok(RemoteApply::Updated)
    }

    pub fn set_status(&self, id: &str, status: TaskStatus) -> Result<(), StoreError> {
        let changed = db::set_status(&self.conn, id, status.as_str(), &db::now_utc_rfc3339())?;
        self.finish_update(id, changed)
    }

    pub fn set_signature(&self, id: &str, signature: Option<&[u8]>) -> Result<(), StoreError> {
        let changed = db::set_signature(&self.conn, id, signature, &db::now_utc_rfc3339())?;
        self.finish_update(id, changed)
    }

    pub fn set_media_urls(&self, id: &str, media_urls: &[String]) -> Result<(), StoreError> {
        let encoded = encode_json(id, "media_urls_json", media_urls)?;
        let changed = db::set_media_urls_json(&self.conn, id, &encoded, &db::now_utc_rfc3339())?;
        self.finish_update(id, changed)
    }

    pub fn set_checklist(&self, id: &str, checklist: &[ChecklistItem]) -> Result<(), StoreError> {
        let encoded = encode_json(id, "checklist_json", checklist)?;
        let changed = db::set_checklist_json(&self.conn, id, &encoded, &db::now_utc_rfc3339())?;
        self.finish_update(id, changed)
    }

    /// Returns whether a record was removed.
    pub fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let removed = db::delete_task_row(&self.conn, id)? > 0;
        if removed {
            self.publish(StoreChange::Removed(id.to_string()));
        }
        Ok(removed)
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(db::get_meta(&self.conn, key)?)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<(), StoreError> {
        Ok(db::set_meta(&self.conn, key, value)?)
    }

    fn finish_update(&self, id: &str, changed: usize) -> Result<(), StoreError> {
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.publish(StoreChange::Updated(id.to_string()));
        Ok(())
    }

    fn publish(&self, change: StoreChange) {
        self.observers.notify(&change);
    }
}

impl TaskRow {
    fn from_local(task: &LocalTask) -> Result<Self, StoreError> {
        Ok(Self {
            id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status.as_str().to_string(),
            assigned_to: task.assigned_to.clone(),
            created_at: format_rfc3339(task.created_at),
            sla_date: format_rfc3339(task.sla_date),
            location: task.location.clone(),
            priority: task.priority.clone(),
            category: task.category.clone(),
            signature: task.signature.clone(),
            media_urls_json: encode_json(&task.id, "media_urls_json", &task.media_urls)?,
            checklist_json: encode_json(&task.id, "checklist_json", &task.checklist)?,
            updated_at: db::now_utc_rfc3339(),
        })
    }
}

impl TryFrom<TaskRow> for LocalTask {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = TaskStatus::from_str(&row.status)
            .map_err(|err| corrupt(&row.id, "status", err.to_string()))?;
        let created_at = parse_rfc3339(&row.created_at)
            .map_err(|err| corrupt(&row.id, "created_at", err.to_string()))?;
        let sla_date = parse_rfc3339(&row.sla_date)
            .map_err(|err| corrupt(&row.id, "sla_date", err.to_string()))?;
        let media_urls: Vec<String> = serde_json::from_str(&row.media_urls_json)
            .map_err(|err| corrupt(&row.id, "media_urls_json", err.to_string()))?;
        let checklist: Vec<ChecklistItem> = serde_json::from_str(&row.checklist_json)
            .map_err(|err| corrupt(&row.id, "checklist_json", err.to_string()))?;

        Ok(LocalTask {
            id: row.id,
            title: row.title,
            description: row.description,
            status,
            assigned_to: row.assigned_to,
            created_at,
            sla_date,
            location: row.location,
            priority: row.priority,
            category: row.category,
            signature: row.signature,
            media_urls,
            checklist,
        })
    }
}

fn encode_json<T>(id: &str, column: &'static str, value: &T) -> Result<String, StoreError>
where
    T: serde::Serialize + ?Sized,
{
    serde_json::to_string(value).map_err(|err| corrupt(id, column, err.to_string()))
}

fn corrupt(id: &str, column: &'static str, message: String) -> StoreError {
    StoreError::Corrupt {
        id: id.to_string(),
        column,
        message,
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("task '{0}' not found in local cache")]
    NotFound(String),
    #[error("invalid {column} for task '{id}': {message}")]
    Corrupt {
        id: String,
        column: &'static str,
        message: String,
    },
}
