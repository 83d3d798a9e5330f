use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::blob::dir::DirectoryBlobStore;
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, StoragePaths, TaskFlowConfig};
use crate::domain::sla::countdown_text;
use crate::domain::{ChecklistItem, LocalTask, NewTask, TaskStatus};
use crate::listing::{apply_filters, SlaWindow, TaskListFilter, TaskSummary};
use crate::notify::{NotifyError, ReminderRequest, SqliteReminderScheduler};
use crate::remote::dir::DirectoryGateway;
use crate::report::JsonReportRenderer;
use crate::store::{StoreError, TaskStore};
use crate::sync::{SyncError, SyncSummary, Synchronizer, LAST_SYNC_META_KEY};
use crate::workflow::{MediaUpload, WorkflowEngine, WorkflowError, WorkflowSettings};

/// Wires the local cache, the directory-backed adapters and the workflow
/// engine together for the binary.
pub struct App {
    paths: StoragePaths,
    settings: WorkflowSettings,
    due_soon: Duration,
    render_reports: bool,
    store: TaskStore,
    gateway: DirectoryGateway,
    blobs: DirectoryBlobStore,
    scheduler: SqliteReminderScheduler,
    renderer: JsonReportRenderer,
    clock: SystemClock,
}

/// A cached task plus the derived fields shown by `ls` and `show`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub assigned_to: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub sla_date: OffsetDateTime,
    pub sla: String,
    pub countdown: Option<String>,
    pub location: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub has_signature: bool,
    pub media_urls: Vec<String>,
    pub checklist: Vec<ChecklistItem>,
}

impl TaskView {
    pub fn from_task(task: LocalTask, window: &SlaWindow) -> Self {
        let sla = window.classify(&task).as_str().to_string();
        let countdown = countdown_text(task.status, task.sla_date, window.now, window.due_soon);
        let has_signature = task.has_signature();
        Self {
            id: task.id,
            title: task.title,
            description: task.description,
            status: task.status,
            assigned_to: task.assigned_to,
            created_at: task.created_at,
            sla_date: task.sla_date,
            sla,
            countdown,
            location: task.location,
            priority: task.priority,
            category: task.category,
            has_signature,
            media_urls: task.media_urls,
            checklist: task.checklist,
        }
    }

    pub fn checklist_progress(&self) -> (usize, usize) {
        let done = self
            .checklist
            .iter()
            .filter(|item| item.is_completed)
            .count();
        (done, self.checklist.len())
    }
}

/// Outcome of `status`: the updated task and, after completion, the report.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub task: TaskView,
    pub report_path: Option<PathBuf>,
}

impl App {
    pub fn open(
        config: &TaskFlowConfig,
        root: &Path,
        db_override: Option<&Path>,
    ) -> Result<Self, AppError> {
        let mut paths = config.storage.resolve(root);
        if let Some(db_path) = db_override {
            paths.db_path = db_path.to_path_buf();
        }

        ensure_parent_dir(&paths.db_path)?;
        ensure_dir(&paths.remote_dir)?;
        ensure_dir(&paths.blob_dir)?;

        let db_path = path_str(&paths.db_path)?;
        let store = TaskStore::open(db_path)?;
        let scheduler = SqliteReminderScheduler::open(db_path)?;

        Ok(Self {
            settings: config.workflow_settings(),
            due_soon: config.due_soon(),
            render_reports: config.workflow.render_reports,
            gateway: DirectoryGateway::new(&paths.remote_dir),
            blobs: DirectoryBlobStore::new(&paths.blob_dir),
            renderer: JsonReportRenderer::new(&paths.report_dir),
            store,
            scheduler,
            clock: SystemClock,
            paths,
        })
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Pulls the remote collection into the local cache once.
    pub fn sync(&self) -> Result<SyncSummary, AppError> {
        let mut synchronizer = Synchronizer::new(&self.store, &self.gateway);
        Ok(synchronizer.sync_once()?)
    }

    pub fn last_sync_at(&self) -> Result<Option<String>, AppError> {
        Ok(self.store.get_meta(LAST_SYNC_META_KEY)?)
    }

    pub fn list_tasks(&self, filter: &TaskListFilter) -> Result<Vec<TaskView>, AppError> {
        let window = self.window();
        let tasks = apply_filters(self.store.list()?, filter, &window);
        Ok(tasks
            .into_iter()
            .map(|task| TaskView::from_task(task, &window))
            .collect())
    }

    pub fn show_task(&self, id: &str) -> Result<TaskView, AppError> {
        let task = self.load(id)?;
        Ok(TaskView::from_task(task, &self.window()))
    }

    pub fn summary(&self) -> Result<TaskSummary, AppError> {
        Ok(TaskSummary::from_tasks(&self.store.list()?))
    }

    pub fn reminders(&self) -> Result<Vec<ReminderRequest>, AppError> {
        Ok(self.scheduler.pending()?)
    }

    pub fn create_task(&self, fields: NewTask) -> Result<TaskView, AppError> {
        let task = self.run(|engine| engine.create_task(fields))?;
        Ok(TaskView::from_task(task, &self.window()))
    }

    pub fn set_status(&self, id: &str, next: TaskStatus) -> Result<StatusChange, AppError> {
        let id = self.resolve_id(id)?;
        let mut engine = self.engine();
        let result = engine.transition_status(&id, next);
        let task = finish(&engine, result)?;
        Ok(StatusChange {
            task: TaskView::from_task(task, &self.window()),
            report_path: engine.view_state().report_path().map(Path::to_path_buf),
        })
    }

    pub fn sign(&self, id: &str, image: &Path) -> Result<String, AppError> {
        let id = self.resolve_id(id)?;
        let bytes = read_file(image)?;
        self.run(|engine| engine.save_signature(&id, &bytes))
    }

    pub fn unsign(&self, id: &str) -> Result<(), AppError> {
        let id = self.resolve_id(id)?;
        self.run(|engine| engine.delete_signature(&id))
    }

    pub fn add_media(&self, id: &str, files: &[PathBuf]) -> Result<MediaUpload, AppError> {
        let id = self.resolve_id(id)?;
        let items = files
            .iter()
            .map(|path| read_file(path))
            .collect::<Result<Vec<_>, _>>()?;
        self.run(|engine| engine.upload_media(&id, &items))
    }

    pub fn remove_media(&self, id: &str, url: &str) -> Result<Vec<String>, AppError> {
        let id = self.resolve_id(id)?;
        self.run(|engine| engine.delete_media_url(&id, url))
    }

    pub fn add_checklist_item(&self, id: &str, text: &str) -> Result<ChecklistItem, AppError> {
        let id = self.resolve_id(id)?;
        self.run(|engine| engine.add_checklist_item(&id, text))
    }

    pub fn remove_checklist_item(&self, id: &str, item: &str) -> Result<(), AppError> {
        let id = self.resolve_id(id)?;
        let item_id = self.resolve_item(&id, item)?;
        if self.run(|engine| engine.remove_checklist_item(&id, &item_id))? {
            Ok(())
        } else {
            Err(AppError::ChecklistItemNotFound(item.to_string()))
        }
    }

    pub fn set_checklist_item_completed(
        &self,
        id: &str,
        item: &str,
        completed: bool,
    ) -> Result<(), AppError> {
        let id = self.resolve_id(id)?;
        let item_id = self.resolve_item(&id, item)?;
        if self.run(|engine| engine.set_checklist_item_completed(&id, &item_id, completed))? {
            Ok(())
        } else {
            Err(AppError::ChecklistItemNotFound(item.to_string()))
        }
    }

    pub fn delete_task(&self, id: &str) -> Result<String, AppError> {
        let id = self.resolve_id(id)?;
        self.run(|engine| engine.delete_task(&id))?;
        Ok(id)
    }

    fn engine(&self) -> WorkflowEngine<'_> {
        let engine = WorkflowEngine::new(
            &self.store,
            &self.gateway,
            &self.blobs,
            &self.scheduler,
            &self.clock,
        )
        .with_settings(self.settings.clone());
        if self.render_reports {
            engine.with_renderer(&self.renderer)
        } else {
            engine
        }
    }

    fn run<T>(
        &self,
        op: impl FnOnce(&mut WorkflowEngine<'_>) -> Result<T, WorkflowError>,
    ) -> Result<T, AppError> {
        let mut engine = self.engine();
        let result = op(&mut engine);
        finish(&engine, result)
    }

    fn window(&self) -> SlaWindow {
        SlaWindow {
            now: self.clock.now(),
            due_soon: self.due_soon,
        }
    }

    fn load(&self, id: &str) -> Result<LocalTask, AppError> {
        let id = self.resolve_id(id)?;
        self.store
            .get(&id)?
            .ok_or(AppError::NotFound(id))
    }

    /// Accepts a full task id or a prefix matching exactly one cached task.
    fn resolve_id(&self, raw: &str) -> Result<String, AppError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AppError::InvalidArgument("task id is empty".to_string()));
        }
        if self.store.contains(raw)? {
            return Ok(raw.to_string());
        }

        let matches = self
            .store
            .list()?
            .into_iter()
            .filter(|task| task.id.starts_with(raw))
            .map(|task| task.id)
            .collect::<Vec<_>>();
        match matches.as_slice() {
            [only] => Ok(only.clone()),
            [] => Err(AppError::NotFound(raw.to_string())),
            _ => Err(AppError::InvalidArgument(format!(
                "task id prefix '{raw}' is ambiguous ({} matches)",
                matches.len()
            ))),
        }
    }

    /// Checklist items are addressed by id or by 1-based position.
    fn resolve_item(&self, task_id: &str, raw: &str) -> Result<String, AppError> {
        let task = self.load(task_id)?;
        let raw = raw.trim();
        if let Some(item) = task.checklist.iter().find(|item| item.id == raw) {
            return Ok(item.id.clone());
        }
        raw.parse::<usize>()
            .ok()
            .and_then(|position| position.checked_sub(1))
            .and_then(|index| task.checklist.get(index))
            .map(|item| item.id.clone())
            .ok_or_else(|| AppError::ChecklistItemNotFound(raw.to_string()))
    }
}

fn finish<T>(engine: &WorkflowEngine<'_>, result: Result<T, WorkflowError>) -> Result<T, AppError> {
    result.map_err(|source| AppError::Workflow {
        message: engine.view_state().error_message().to_string(),
        source,
    })
}

fn read_file(path: &Path) -> Result<Vec<u8>, AppError> {
    std::fs::read(path).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn ensure_dir(path: &Path) -> Result<(), AppError> {
    std::fs::create_dir_all(path).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn ensure_parent_dir(path: &Path) -> Result<(), AppError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

fn path_str(path: &Path) -> Result<&str, AppError> {
    path.to_str().ok_or_else(|| {
        AppError::InvalidArgument(format!("path '{}' is not valid UTF-8", path.display()))
    })
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("reminder store error: {0}")]
    Notify(#[from] NotifyError),
    #[error("{message}")]
    Workflow {
        message: String,
        #[source]
        source: WorkflowError,
    },
    #[error("cannot access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot encode output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("task '{0}' not found in local cache")]
    NotFound(String),
    #[error("checklist item '{0}' not found")]
    ChecklistItemNotFound(String),
    #[error("{0}")]
    InvalidArgument(String),
}
