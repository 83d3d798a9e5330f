use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::{ChecklistItem, Task, TaskStatus};

pub mod dir;

pub use dir::DirectoryGateway;

/// Receives the full, `createdAt`-descending result set on every change.
pub type BatchListener = Box<dyn Fn(Vec<Task>) + Send + 'static>;

/// Access to the remote task collection.
///
/// Implementations do no local caching; the store and synchronizer own that.
pub trait RemoteTaskGateway {
    /// Persists a new document and returns its assigned id.
    fn create(&self, task: &Task) -> Result<String, RemoteError>;

    /// Starts a live query. `on_batch` may be invoked from any thread.
    fn subscribe(&self, on_batch: BatchListener) -> Result<Subscription, RemoteError>;

    /// Merges `fields` into an existing document. Fails if it does not exist.
    fn update_fields(&self, id: &str, fields: &[FieldUpdate]) -> Result<(), RemoteError>;

    /// Removes a document. Deleting a missing document succeeds.
    fn delete(&self, id: &str) -> Result<(), RemoteError>;
}

/// A single named field written by a workflow operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    Status(TaskStatus),
    /// `None` removes the field from the document.
    SignatureUrl(Option<String>),
    MediaUrls(Vec<String>),
    Checklist(Vec<ChecklistItem>),
}

impl FieldUpdate {
    pub fn field_name(&self) -> &'static str {
        match self {
            FieldUpdate::Status(_) => "status",
            FieldUpdate::SignatureUrl(_) => "signatureStorageURL",
            FieldUpdate::MediaUrls(_) => "mediaURLs",
            FieldUpdate::Checklist(_) => "checklist",
        }
    }

    /// JSON value to merge, or `None` when the field should be deleted.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            FieldUpdate::Status(status) => Some(json!(status.as_str())),
            FieldUpdate::SignatureUrl(url) => url.as_ref().map(|url| json!(url)),
            FieldUpdate::MediaUrls(urls) => Some(json!(urls)),
            FieldUpdate::Checklist(items) => Some(json!(items)),
        }
    }

    /// Applies the update to an in-memory document body.
    pub fn apply_to(&self, task: &mut Task) {
        match self {
            FieldUpdate::Status(status) => task.status = *status,
            FieldUpdate::SignatureUrl(url) => task.signature_url = url.clone(),
            FieldUpdate::MediaUrls(urls) => task.media_urls = urls.clone(),
            FieldUpdate::Checklist(items) => task.checklist = items.clone(),
        }
    }
}

/// Handle for a live query. Dropping it unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stops delivery. Calling it again is a no-op.
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote write failed: {0}")]
    Write(String),
    #[error("remote read failed: {0}")]
    Read(String),
}

impl RemoteError {
    pub fn write(message: impl Into<String>) -> Self {
        RemoteError::Write(message.into())
    }

    pub fn read(message: impl Into<String>) -> Self {
        RemoteError::Read(message.into())
    }
}
