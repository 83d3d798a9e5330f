use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{BatchListener, FieldUpdate, RemoteError, RemoteTaskGateway, Subscription};
use crate::domain::Task;

const DOCUMENT_ID_LEN: usize = 20;

/// Task collection kept as one JSON document per file in a directory.
///
/// Live queries are served in-process: every subscriber receives the full
/// snapshot when it subscribes and again after each write made through this
/// gateway. Snapshots are taken and delivered one at a time, so a subscriber
/// never misses a write that lands while it subscribes. A listener may drop
/// its own subscription from inside the callback, but must not write through
/// the gateway there.
pub struct DirectoryGateway {
    root: PathBuf,
    listeners: Arc<Mutex<ListenerRegistry>>,
    delivery: Mutex<()>,
}

type SharedListener = Arc<Mutex<BatchListener>>;

#[derive(Default)]
struct ListenerRegistry {
    next_id: u64,
    listeners: Vec<(u64, SharedListener)>,
}

impl DirectoryGateway {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            listeners: Arc::new(Mutex::new(ListenerRegistry::default())),
            delivery: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current result set ordered by `createdAt`, newest first. Documents
    /// that fail to decode are skipped.
    pub fn snapshot(&self) -> Result<Vec<Task>, RemoteError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.root).map_err(|err| {
            RemoteError::read(format!("cannot list '{}': {err}", self.root.display()))
        })?;
        let mut tasks = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|err| RemoteError::read(format!("cannot read entry: {err}")))?
                .path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match read_task(&path) {
                Ok(mut task) => {
                    task.id = Some(id.to_string());
                    tasks.push(task);
                }
                Err(err) => warn!(path = %path.display(), error = %err, "skipping undecodable task document"),
            }
        }

        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    fn document_path(&self, id: &str) -> Result<PathBuf, RemoteError> {
        validate_document_id(id)?;
        Ok(self.root.join(format!("{id}.json")))
    }

    fn broadcast(&self) {
        let _delivery = lock(&self.delivery);
        let listeners = self.current_listeners();
        if listeners.is_empty() {
            return;
        }
        match self.snapshot() {
            Ok(tasks) => {
                for (id, listener) in listeners {
                    if self.is_registered(id) {
                        (*lock(&listener))(tasks.clone());
                    }
                }
            }
            Err(err) => warn!(error = %err, "live query snapshot failed; batch not delivered"),
        }
    }

    /// Registry lock is released before any listener runs.
    fn current_listeners(&self) -> Vec<(u64, SharedListener)> {
        lock(&self.listeners)
            .listeners
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect()
    }

    fn is_registered(&self, id: u64) -> bool {
        lock(&self.listeners)
            .listeners
            .iter()
            .any(|(existing, _)| *existing == id)
    }
}

impl RemoteTaskGateway for DirectoryGateway {
    fn create(&self, task: &Task) -> Result<String, RemoteError> {
        fs::create_dir_all(&self.root).map_err(|err| {
            RemoteError::write(format!("cannot create '{}': {err}", self.root.display()))
        })?;

        let id = generate_document_id(|candidate| self.root.join(format!("{candidate}.json")).exists());
        let path = self.document_path(&id)?;
        let body = serde_json::to_vec_pretty(task)
            .map_err(|err| RemoteError::write(format!("cannot encode task: {err}")))?;

        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)
            .map_err(|err| RemoteError::write(format!("cannot create document {id}: {err}")))?;
        file.write_all(&body)
            .and_then(|()| file.write_all(b"\n"))
            .and_then(|()| file.sync_all())
            .map_err(|err| RemoteError::write(format!("cannot write document {id}: {err}")))?;

        debug!(task_id = %id, "created remote task document");
        self.broadcast();
        Ok(id)
    }

    fn subscribe(&self, on_batch: BatchListener) -> Result<Subscription, RemoteError> {
        let _delivery = lock(&self.delivery);
        let initial = self.snapshot()?;
        let listener: SharedListener = Arc::new(Mutex::new(on_batch));

        let id = {
            let mut registry = lock(&self.listeners);
            registry.next_id += 1;
            let id = registry.next_id;
            registry.listeners.push((id, Arc::clone(&listener)));
            id
        };
        (*lock(&listener))(initial);

        let listeners = Arc::downgrade(&self.listeners);
        Ok(Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                lock(&listeners)
                    .listeners
                    .retain(|(existing, _)| *existing != id);
            }
        }))
    }

    fn update_fields(&self, id: &str, fields: &[FieldUpdate]) -> Result<(), RemoteError> {
        let path = self.document_path(id)?;
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(RemoteError::write(format!("document {id} does not exist")));
            }
            Err(err) => return Err(RemoteError::write(format!("cannot read document {id}: {err}"))),
        };

        let mut document: Map<String, Value> = serde_json::from_slice(&raw)
            .map_err(|err| RemoteError::write(format!("document {id} is not an object: {err}")))?;
        for field in fields {
            match field.to_json() {
                Some(value) => {
                    document.insert(field.field_name().to_string(), value);
                }
                None => {
                    document.remove(field.field_name());
                }
            }
        }

        let body = serde_json::to_vec_pretty(&document)
            .map_err(|err| RemoteError::write(format!("cannot encode document {id}: {err}")))?;
        write_replace(&path, &body)
            .map_err(|err| RemoteError::write(format!("cannot write document {id}: {err}")))?;

        debug!(task_id = id, fields = fields.len(), "merged remote task fields");
        self.broadcast();
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let path = self.document_path(id)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(RemoteError::write(format!("cannot delete document {id}: {err}"))),
        }

        debug!(task_id = id, "deleted remote task document");
        self.broadcast();
        Ok(())
    }
}

/// Random 20-character lowercase hex id, re-rolled while `exists` reports a
/// collision.
pub fn generate_document_id<F>(mut exists: F) -> String
where
    F: FnMut(&str) -> bool,
{
    for _ in 0..64 {
        let seed = Uuid::now_v7().to_string();
        let mut hasher = Sha256::new();
        hasher.update(seed.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        let candidate = &digest[..DOCUMENT_ID_LEN];
        if !exists(candidate) {
            return candidate.to_string();
        }
    }

    Uuid::now_v7().simple().to_string()
}

fn validate_document_id(id: &str) -> Result<(), RemoteError> {
    let is_valid = !id.is_empty()
        && id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_'));
    if is_valid {
        Ok(())
    } else {
        Err(RemoteError::write(format!("invalid document id '{id}'")))
    }
}

fn read_task(path: &Path) -> Result<Task, String> {
    let raw = fs::read(path).map_err(|err| err.to_string())?;
    serde_json::from_slice(&raw).map_err(|err| err.to_string())
}

fn write_replace(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp)?;
        file.write_all(body)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }
    fs::rename(tmp, path)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests;
