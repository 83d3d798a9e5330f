use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::status::TaskStatus;

/// Task document as stored by the remote collection.
///
/// The document id is not part of the body; gateways fill `id` in from the
/// document key when they read a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(skip)]
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub assigned_to: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub sla_date: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(
        rename = "signatureStorageURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub signature_url: Option<String>,
    #[serde(rename = "mediaURLs", default)]
    pub media_urls: Vec<String>,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub is_completed: bool,
}

impl ChecklistItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            text: text.into(),
            is_completed: false,
        }
    }
}

/// Working copy of a task in the on-device cache.
///
/// Keyed by the remote document id. Unlike [`Task`], the signature lives here
/// as raw bytes; the remote side only knows its download URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalTask {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub assigned_to: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub sla_date: OffsetDateTime,
    pub location: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    #[serde(skip)]
    pub signature: Option<Vec<u8>>,
    #[serde(rename = "mediaURLs")]
    pub media_urls: Vec<String>,
    pub checklist: Vec<ChecklistItem>,
}

impl LocalTask {
    /// Builds a cache record from a remote document. Signature bytes start
    /// empty because only the URL is known at this point.
    pub fn from_remote(id: impl Into<String>, task: &Task) -> Self {
        Self {
            id: id.into(),
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status,
            assigned_to: task.assigned_to.clone(),
            created_at: task.created_at,
            sla_date: task.sla_date,
            location: task.location.clone(),
            priority: task.priority.clone(),
            category: task.category.clone(),
            signature: None,
            media_urls: task.media_urls.clone(),
            checklist: task.checklist.clone(),
        }
    }

    pub fn has_signature(&self) -> bool {
        self.signature.as_ref().is_some_and(|bytes| !bytes.is_empty())
    }

    /// Returns `(completed, total)` checklist counts.
    pub fn checklist_progress(&self) -> (usize, usize) {
        let done = self
            .checklist
            .iter()
            .filter(|item| item.is_completed)
            .count();
        (done, self.checklist.len())
    }
}

/// Fields a caller supplies when creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub assigned_to: String,
    pub sla_date: OffsetDateTime,
    pub location: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
}

impl NewTask {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        assigned_to: impl Into<String>,
        sla_date: OffsetDateTime,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            assigned_to: assigned_to.into(),
            sla_date,
            location: None,
            priority: None,
            category: None,
        }
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.title.trim().is_empty() {
            missing.push("title");
        }
        if self.description.trim().is_empty() {
            missing.push("description");
        }
        if self.assigned_to.trim().is_empty() {
            missing.push("assignedTo");
        }
        missing
    }

    /// Document body for a freshly created task: `planned`, no evidence yet.
    pub fn into_task(self, created_at: OffsetDateTime) -> Task {
        Task {
            id: None,
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            status: TaskStatus::Planned,
            assigned_to: self.assigned_to.trim().to_string(),
            created_at,
            sla_date: self.sla_date,
            location: non_empty(self.location),
            priority: non_empty(self.priority),
            category: non_empty(self.category),
            signature_url: None,
            media_urls: Vec::new(),
            checklist: Vec::new(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}
