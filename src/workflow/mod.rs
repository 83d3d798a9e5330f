use thiserror::Error;
use time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::blob::{self, media_key, media_prefix, signature_key, BlobError, BlobStore};
use crate::clock::{format_rfc3339, Clock};
use crate::domain::guards::check_transition;
use crate::domain::sla::reminder_fire_at;
use crate::domain::{ChecklistItem, GuardViolation, LocalTask, NewTask, TaskStatus};
use crate::notify::{reminder_id, NotificationScheduler, ReminderRequest};
use crate::remote::{FieldUpdate, RemoteError, RemoteTaskGateway};
use crate::report::{ReportRenderer, TaskReport};
use crate::store::{StoreError, TaskStore};
use crate::view_state::ViewState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSettings {
    /// How long before the SLA date the deadline reminder fires.
    pub reminder_lead: Duration,
    pub media_content_type: String,
    pub signature_content_type: String,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            reminder_lead: Duration::hours(1),
            media_content_type: blob::MEDIA_CONTENT_TYPE.to_string(),
            signature_content_type: blob::SIGNATURE_CONTENT_TYPE.to_string(),
        }
    }
}

/// Result of a media upload batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUpload {
    /// URLs uploaded by this call, in input order.
    pub uploaded: Vec<String>,
    /// Items whose upload failed and were skipped.
    pub failed: usize,
    /// The task's full media list after the call.
    pub media_urls: Vec<String>,
}

/// Executes task mutations against the remote collection, blob storage and
/// reminder scheduler, keeping the local store in step.
///
/// Every public operation records its outcome on [`ViewState`]: failures set
/// the error message, successes clear it. Nothing is rolled back when a
/// remote call fails after a local write.
pub struct WorkflowEngine<'a> {
    store: &'a TaskStore,
    gateway: &'a dyn RemoteTaskGateway,
    blobs: &'a dyn BlobStore,
    scheduler: &'a dyn NotificationScheduler,
    renderer: Option<&'a dyn ReportRenderer>,
    clock: &'a dyn Clock,
    settings: WorkflowSettings,
    view: ViewState,
}

impl<'a> WorkflowEngine<'a> {
    pub fn new(
        store: &'a TaskStore,
        gateway: &'a dyn RemoteTaskGateway,
        blobs: &'a dyn BlobStore,
        scheduler: &'a dyn NotificationScheduler,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            store,
            gateway,
            blobs,
            scheduler,
            renderer: None,
            clock,
            settings: WorkflowSettings::default(),
            view: ViewState::new(),
        }
    }

    pub fn with_renderer(mut self, renderer: &'a dyn ReportRenderer) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_settings(mut self, settings: WorkflowSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    pub fn view_state(&self) -> &ViewState {
        &self.view
    }

    pub fn view_state_mut(&mut self) -> &mut ViewState {
        &mut self.view
    }

    pub fn create_task(&mut self, fields: NewTask) -> Result<LocalTask, WorkflowError> {
        let result = self.create_task_inner(fields);
        self.track(result)
    }

    /// Moves a task to `next`. Returns the task as stored afterwards; asking
    /// for the current status changes nothing.
    pub fn transition_status(
        &mut self,
        task_id: &str,
        next: TaskStatus,
    ) -> Result<LocalTask, WorkflowError> {
        let result = self.transition_status_inner(task_id, next);
        self.track(result)
    }

    /// Uploads the signature and returns its download URL.
    pub fn save_signature(
        &mut self,
        task_id: &str,
        signature: &[u8],
    ) -> Result<String, WorkflowError> {
        let result = self.save_signature_inner(task_id, signature);
        self.track(result)
    }

    pub fn delete_signature(&mut self, task_id: &str) -> Result<(), WorkflowError> {
        let result = self.delete_signature_inner(task_id);
        self.track(result)
    }

    pub fn upload_media<B>(&mut self, task_id: &str, items: &[B]) -> Result<MediaUpload, WorkflowError>
    where
        B: AsRef<[u8]>,
    {
        let result = self.upload_media_inner(task_id, items);
        self.track(result)
    }

    pub fn delete_media_url(&mut self, task_id: &str, url: &str) -> Result<Vec<String>, WorkflowError> {
        let result = self.delete_media_url_inner(task_id, url);
        self.track(result)
    }

    pub fn add_checklist_item(
        &mut self,
        task_id: &str,
        text: &str,
    ) -> Result<ChecklistItem, WorkflowError> {
        let result = self.add_checklist_item_inner(task_id, text);
        self.track(result)
    }

    /// Returns `false` without touching anything when no item has `item_id`.
    pub fn remove_checklist_item(
        &mut self,
        task_id: &str,
        item_id: &str,
    ) -> Result<bool, WorkflowError> {
        let result = self.remove_checklist_item_inner(task_id, item_id);
        self.track(result)
    }

    /// Returns `false` without touching anything when no item has `item_id`.
    pub fn set_checklist_item_completed(
        &mut self,
        task_id: &str,
        item_id: &str,
        completed: bool,
    ) -> Result<bool, WorkflowError> {
        let result = self.set_checklist_item_completed_inner(task_id, item_id, completed);
        self.track(result)
    }

    pub fn delete_task(&mut self, task_id: &str) -> Result<(), WorkflowError> {
        let result = self.delete_task_inner(task_id);
        self.track(result)
    }

    fn create_task_inner(&mut self, fields: NewTask) -> Result<LocalTask, WorkflowError> {
        let missing = fields.missing_fields();
        if !missing.is_empty() {
            return Err(WorkflowError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let task = fields.into_task(self.clock.now());
        let id = self.gateway.create(&task)?;
        let local = LocalTask::from_remote(id, &task);
        self.store.save(&local)?;
        self.refresh_reminder(&local);

        info!(task_id = %local.id, title = %local.title, "created task");
        Ok(local)
    }

    fn transition_status_inner(
        &mut self,
        task_id: &str,
        next: TaskStatus,
    ) -> Result<LocalTask, WorkflowError> {
        let mut task = self.load(task_id)?;
        if task.status == next {
            return Ok(task);
        }
        check_transition(&task, next)?;

        self.gateway
            .update_fields(task_id, &[FieldUpdate::Status(next)])?;
        self.store.set_status(task_id, next)?;
        let previous = task.status;
        task.status = next;

        if next == TaskStatus::Completed {
            self.cancel_reminder(task_id);
            let report_path = self.render_report(&task);
            self.view.set_report_path(report_path);
        } else {
            self.refresh_reminder(&task);
            self.view.set_report_path(None);
        }

        info!(
            task_id,
            from = previous.as_str(),
            to = next.as_str(),
            "changed task status"
        );
        Ok(task)
    }

    fn save_signature_inner(
        &mut self,
        task_id: &str,
        signature: &[u8],
    ) -> Result<String, WorkflowError> {
        if signature.is_empty() {
            return Err(WorkflowError::Validation(
                "signature image is empty".to_string(),
            ));
        }
        self.load(task_id)?;

        let url = self.blobs.put(
            &signature_key(task_id),
            signature,
            &self.settings.signature_content_type,
        )?;
        self.gateway
            .update_fields(task_id, &[FieldUpdate::SignatureUrl(Some(url.clone()))])?;
        self.store.set_signature(task_id, Some(signature))?;

        info!(task_id, size = signature.len(), "saved signature");
        Ok(url)
    }

    fn delete_signature_inner(&mut self, task_id: &str) -> Result<(), WorkflowError> {
        self.load(task_id)?;

        self.blobs.delete(&signature_key(task_id))?;
        self.gateway
            .update_fields(task_id, &[FieldUpdate::SignatureUrl(None)])?;
        self.store.set_signature(task_id, None)?;

        info!(task_id, "deleted signature");
        Ok(())
    }

    fn upload_media_inner<B>(&mut self, task_id: &str, items: &[B]) -> Result<MediaUpload, WorkflowError>
    where
        B: AsRef<[u8]>,
    {
        let task = self.load(task_id)?;

        let mut uploaded = Vec::with_capacity(items.len());
        let mut failed = 0;
        for (index, item) in items.iter().enumerate() {
            let key = media_key(task_id, &Uuid::now_v7().to_string());
            match self
                .blobs
                .put(&key, item.as_ref(), &self.settings.media_content_type)
            {
                Ok(url) => uploaded.push(url),
                Err(err) => {
                    warn!(task_id, index, error = %err, "media upload failed; skipping item");
                    failed += 1;
                }
            }
        }

        let mut media_urls = task.media_urls;
        media_urls.extend(uploaded.iter().cloned());
        self.gateway
            .update_fields(task_id, &[FieldUpdate::MediaUrls(media_urls.clone())])?;
        self.store.set_media_urls(task_id, &media_urls)?;

        info!(task_id, uploaded = uploaded.len(), failed, "uploaded media");
        Ok(MediaUpload {
            uploaded,
            failed,
            media_urls,
        })
    }

    fn delete_media_url_inner(&mut self, task_id: &str, url: &str) -> Result<Vec<String>, WorkflowError> {
        let task = self.load(task_id)?;

        self.blobs.delete_url(url)?;
        let media_urls = task
            .media_urls
            .into_iter()
            .filter(|existing| existing != url)
            .collect::<Vec<_>>();
        self.store.set_media_urls(task_id, &media_urls)?;
        self.gateway
            .update_fields(task_id, &[FieldUpdate::MediaUrls(media_urls.clone())])?;

        info!(task_id, remaining = media_urls.len(), "deleted media");
        Ok(media_urls)
    }

    fn add_checklist_item_inner(
        &mut self,
        task_id: &str,
        text: &str,
    ) -> Result<ChecklistItem, WorkflowError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(WorkflowError::Validation(
                "checklist item text is empty".to_string(),
            ));
        }
        let task = self.load(task_id)?;

        let item = ChecklistItem::new(text);
        let mut checklist = task.checklist;
        checklist.push(item.clone());
        self.write_checklist(task_id, checklist)?;

        info!(task_id, item_id = %item.id, "added checklist item");
        Ok(item)
    }

    fn remove_checklist_item_inner(
        &mut self,
        task_id: &str,
        item_id: &str,
    ) -> Result<bool, WorkflowError> {
        let task = self.load(task_id)?;
        if !task.checklist.iter().any(|item| item.id == item_id) {
            return Ok(false);
        }

        let checklist = task
            .checklist
            .into_iter()
            .filter(|item| item.id != item_id)
            .collect();
        self.write_checklist(task_id, checklist)?;

        info!(task_id, item_id, "removed checklist item");
        Ok(true)
    }

    fn set_checklist_item_completed_inner(
        &mut self,
        task_id: &str,
        item_id: &str,
        completed: bool,
    ) -> Result<bool, WorkflowError> {
        let task = self.load(task_id)?;
        if !task.checklist.iter().any(|item| item.id == item_id) {
            return Ok(false);
        }

        let checklist = task
            .checklist
            .into_iter()
            .map(|mut item| {
                if item.id == item_id {
                    item.is_completed = completed;
                }
                item
            })
            .collect();
        self.write_checklist(task_id, checklist)?;

        info!(task_id, item_id, completed, "updated checklist item");
        Ok(true)
    }

    fn delete_task_inner(&mut self, task_id: &str) -> Result<(), WorkflowError> {
        self.load(task_id)?;

        self.cancel_reminder(task_id);
        if let Err(err) = self.blobs.delete(&signature_key(task_id)) {
            warn!(task_id, error = %err, "signature cleanup failed");
        }
        self.delete_media_blobs(task_id);

        self.gateway.delete(task_id)?;
        self.store.remove(task_id)?;

        info!(task_id, "deleted task");
        Ok(())
    }

    fn delete_media_blobs(&self, task_id: &str) {
        let keys = match self.blobs.list(&media_prefix(task_id)) {
            Ok(keys) => keys,
            Err(err) => {
                warn!(task_id, error = %err, "cannot list media for cleanup");
                return;
            }
        };
        for key in keys {
            if let Err(err) = self.blobs.delete(&key) {
                warn!(task_id, key = %key, error = %err, "media cleanup failed");
            }
        }
    }

    /// Local list first, then the remote copy.
    fn write_checklist(
        &self,
        task_id: &str,
        checklist: Vec<ChecklistItem>,
    ) -> Result<(), WorkflowError> {
        self.store.set_checklist(task_id, &checklist)?;
        self.gateway
            .update_fields(task_id, &[FieldUpdate::Checklist(checklist)])?;
        Ok(())
    }

    fn load(&self, task_id: &str) -> Result<LocalTask, WorkflowError> {
        self.store
            .get(task_id)?
            .ok_or_else(|| WorkflowError::NotFound(task_id.to_string()))
    }

    /// Schedules the deadline reminder, or cancels it when the task is
    /// completed or its SLA date has passed. Scheduler failures are logged.
    fn refresh_reminder(&self, task: &LocalTask) {
        let now = self.clock.now();
        if task.status == TaskStatus::Completed || task.sla_date <= now {
            self.cancel_reminder(&task.id);
            return;
        }

        let fire_at = reminder_fire_at(task.sla_date, self.settings.reminder_lead);
        let request = ReminderRequest::for_task(&task.id, &task.title, fire_at);
        match self.scheduler.schedule(&request) {
            Ok(()) => info!(task_id = %task.id, fire_at = %format_rfc3339(fire_at), "scheduled deadline reminder"),
            Err(err) => warn!(task_id = %task.id, error = %err, "failed to schedule deadline reminder"),
        }
    }

    fn cancel_reminder(&self, task_id: &str) {
        if let Err(err) = self.scheduler.cancel(&reminder_id(task_id)) {
            warn!(task_id, error = %err, "failed to cancel deadline reminder");
        }
    }

    fn render_report(&self, task: &LocalTask) -> Option<std::path::PathBuf> {
        let renderer = self.renderer?;
        match renderer.render(&TaskReport::from_task(task, self.clock.now())) {
            Ok(path) => {
                info!(task_id = %task.id, path = %path.display(), "rendered completion report");
                Some(path)
            }
            Err(err) => {
                warn!(task_id = %task.id, error = %err, "completion report rendering failed");
                None
            }
        }
    }

    fn track<T>(&mut self, result: Result<T, WorkflowError>) -> Result<T, WorkflowError> {
        match &result {
            Ok(_) => self.view.clear_error(),
            Err(err) => self.view.set_error(err.user_message()),
        }
        result
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("transition blocked: {0}")]
    Guard(#[from] GuardViolation),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("task '{0}' not found")]
    NotFound(String),
}

impl WorkflowError {
    /// Text shown to the user in the view state.
    pub fn user_message(&self) -> String {
        match self {
            WorkflowError::Validation(message) => capitalize(message),
            WorkflowError::Guard(violation) => violation.user_message().to_string(),
            WorkflowError::Remote(_) => {
                format!("Could not reach the task server: {self}")
            }
            WorkflowError::Blob(_) => format!("File storage failed: {self}"),
            WorkflowError::Store(_) => format!("Local storage failed: {self}"),
            WorkflowError::NotFound(id) => format!("Task {id} no longer exists."),
        }
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
