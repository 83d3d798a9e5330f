use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::{ChecklistItem, LocalTask, TaskStatus};

/// Snapshot handed to a report renderer once a task is completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReport {
    pub task_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub assigned_to: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub sla_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    pub location: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "mediaURLs")]
    pub media_urls: Vec<String>,
    pub checklist: Vec<ChecklistItem>,
    pub signature_bytes: usize,
}

impl TaskReport {
    pub fn from_task(task: &LocalTask, generated_at: OffsetDateTime) -> Self {
        Self {
            task_id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status,
            assigned_to: task.assigned_to.clone(),
            created_at: task.created_at,
            sla_date: task.sla_date,
            generated_at,
            location: task.location.clone(),
            priority: task.priority.clone(),
            category: task.category.clone(),
            media_urls: task.media_urls.clone(),
            checklist: task.checklist.clone(),
            signature_bytes: task.signature.as_ref().map_or(0, Vec::len),
        }
    }
}

pub trait ReportRenderer {
    /// Renders the report and returns where it was written.
    fn render(&self, report: &TaskReport) -> Result<PathBuf, ReportError>;
}

/// Writes reports as pretty-printed JSON files into a directory.
#[derive(Debug, Clone)]
pub struct JsonReportRenderer {
    dir: PathBuf,
}

impl JsonReportRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ReportRenderer for JsonReportRenderer {
    fn render(&self, report: &TaskReport) -> Result<PathBuf, ReportError> {
        fs::create_dir_all(&self.dir)?;
        let path = self
            .dir
            .join(format!("taskflow-report-{}.json", report.task_id));
        let body = serde_json::to_vec_pretty(report)?;
        fs::write(&path, body)?;
        Ok(path)
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("report encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}
