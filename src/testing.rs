//! Collaborator fakes and fixtures shared by the unit test suites.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use time::OffsetDateTime;
use uuid::Uuid;

use crate::blob::{BlobError, BlobStore};
use crate::clock::Clock;
use crate::domain::{LocalTask, NewTask, Task, TaskStatus};
use crate::notify::{NotificationScheduler, NotifyError, ReminderRequest};
use crate::remote::{BatchListener, FieldUpdate, RemoteError, RemoteTaskGateway, Subscription};
use crate::report::{ReportError, ReportRenderer, TaskReport};
use crate::store::TaskStore;

pub fn at(seconds: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(seconds).expect("test timestamp should be valid")
}

pub fn unique_db_path() -> String {
    std::env::temp_dir()
        .join(format!("taskflow-test-{}.sqlite", Uuid::now_v7()))
        .display()
        .to_string()
}

pub fn unique_dir(prefix: &str) -> PathBuf {
    std::env::temp_dir().join(format!("taskflow-{prefix}-{}", Uuid::now_v7()))
}

pub fn cleanup_db_files(path: &str) {
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{path}{suffix}"));
    }
}

pub fn remote_task(title: &str, created_at: OffsetDateTime) -> Task {
    NewTask::new(title, format!("{title} description"), "ayse", created_at + time::Duration::days(2))
        .into_task(created_at)
}

pub fn remote_task_with_id(id: &str, title: &str, created_at: OffsetDateTime) -> Task {
    let mut task = remote_task(title, created_at);
    task.id = Some(id.to_string());
    task
}

pub fn local_task(id: &str, created_at: OffsetDateTime) -> LocalTask {
    LocalTask::from_remote(id, &remote_task("Replace filter", created_at))
}

/// Task store over a throwaway database file, removed on drop.
pub struct TempStore {
    pub store: TaskStore,
    path: String,
}

impl TempStore {
    pub fn new() -> Self {
        let path = unique_db_path();
        let store = TaskStore::open(&path).expect("temp store should open");
        Self { store, path }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn with_task(task: &LocalTask) -> Self {
        let temp = Self::new();
        temp.store.save(task).expect("fixture task should save");
        temp
    }
}

impl Deref for TempStore {
    type Target = TaskStore;

    fn deref(&self) -> &TaskStore {
        &self.store
    }
}

impl Drop for TempStore {
    fn drop(&mut self) {
        cleanup_db_files(&self.path);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Create(Task),
    Update(String, Vec<FieldUpdate>),
    Delete(String),
}

/// In-memory gateway that records every call. Batches are pushed by the test
/// through [`RecordingGateway::push_batch`].
#[derive(Default)]
pub struct RecordingGateway {
    calls: RefCell<Vec<GatewayCall>>,
    created: Cell<u64>,
    fail_creates: Cell<bool>,
    fail_updates: Cell<bool>,
    fail_deletes: Cell<bool>,
    listeners: Arc<Mutex<Vec<(u64, BatchListener)>>>,
    next_listener: Cell<u64>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.set(fail);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.set(fail);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.set(fail);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.borrow().clone()
    }

    pub fn updates(&self) -> Vec<(String, Vec<FieldUpdate>)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                GatewayCall::Update(id, fields) => Some((id.clone(), fields.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    /// Delivers `tasks` to every live subscriber; returns how many received it.
    pub fn push_batch(&self, tasks: Vec<Task>) -> usize {
        let listeners = self.listeners.lock().expect("listener registry lock");
        for (_, listener) in listeners.iter() {
            listener(tasks.clone());
        }
        listeners.len()
    }
}

impl RemoteTaskGateway for RecordingGateway {
    fn create(&self, task: &Task) -> Result<String, RemoteError> {
        self.calls.borrow_mut().push(GatewayCall::Create(task.clone()));
        if self.fail_creates.get() {
            return Err(RemoteError::write("simulated create failure"));
        }
        self.created.set(self.created.get() + 1);
        Ok(format!("task-{}", self.created.get()))
    }

    fn subscribe(&self, on_batch: BatchListener) -> Result<Subscription, RemoteError> {
        let id = self.next_listener.get() + 1;
        self.next_listener.set(id);
        self.listeners
            .lock()
            .expect("listener registry lock")
            .push((id, on_batch));
        let listeners = Arc::clone(&self.listeners);
        Ok(Subscription::new(move || {
            if let Ok(mut listeners) = listeners.lock() {
                listeners.retain(|(existing, _)| *existing != id);
            }
        }))
    }

    fn update_fields(&self, id: &str, fields: &[FieldUpdate]) -> Result<(), RemoteError> {
        self.calls
            .borrow_mut()
            .push(GatewayCall::Update(id.to_string(), fields.to_vec()));
        if self.fail_updates.get() {
            return Err(RemoteError::write("simulated update failure"));
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.calls
            .borrow_mut()
            .push(GatewayCall::Delete(id.to_string()));
        if self.fail_deletes.get() {
            return Err(RemoteError::write("simulated delete failure"));
        }
        Ok(())
    }
}

pub const MEMORY_URL_SCHEME: &str = "mem://";

/// In-memory blob store with per-call failure injection.
#[derive(Default)]
pub struct FlakyBlobStore {
    objects: RefCell<BTreeMap<String, Vec<u8>>>,
    put_calls: Cell<usize>,
    failing_puts: RefCell<BTreeSet<usize>>,
    fail_deletes: Cell<bool>,
    fail_lists: Cell<bool>,
    deleted_keys: RefCell<Vec<String>>,
    deleted_urls: RefCell<Vec<String>>,
}

impl FlakyBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the `n`-th put call (zero-based).
    pub fn fail_put_call(&self, n: usize) {
        self.failing_puts.borrow_mut().insert(n);
    }

    pub fn fail_all_puts(&self) {
        self.failing_puts.borrow_mut().extend(0..1024);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.set(fail);
    }

    pub fn fail_lists(&self, fail: bool) {
        self.fail_lists.set(fail);
    }

    pub fn insert(&self, key: &str, bytes: &[u8]) -> String {
        self.objects
            .borrow_mut()
            .insert(key.to_string(), bytes.to_vec());
        format!("{MEMORY_URL_SCHEME}{key}")
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.borrow().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.borrow().keys().cloned().collect()
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted_keys.borrow().clone()
    }

    pub fn deleted_urls(&self) -> Vec<String> {
        self.deleted_urls.borrow().clone()
    }
}

impl BlobStore for FlakyBlobStore {
    fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<String, BlobError> {
        let call = self.put_calls.get();
        self.put_calls.set(call + 1);
        if self.failing_puts.borrow().contains(&call) {
            return Err(BlobError::Rejected("simulated upload failure".to_string()));
        }
        Ok(self.insert(key, bytes))
    }

    fn download_url(&self, key: &str) -> Result<String, BlobError> {
        if self.contains(key) {
            Ok(format!("{MEMORY_URL_SCHEME}{key}"))
        } else {
            Err(BlobError::NotFound(key.to_string()))
        }
    }

    fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.deleted_keys.borrow_mut().push(key.to_string());
        if self.fail_deletes.get() {
            return Err(BlobError::Rejected("simulated delete failure".to_string()));
        }
        self.objects.borrow_mut().remove(key);
        Ok(())
    }

    fn delete_url(&self, url: &str) -> Result<(), BlobError> {
        self.deleted_urls.borrow_mut().push(url.to_string());
        if self.fail_deletes.get() {
            return Err(BlobError::Rejected("simulated delete failure".to_string()));
        }
        if let Some(key) = url.strip_prefix(MEMORY_URL_SCHEME) {
            self.objects.borrow_mut().remove(key);
        }
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError> {
        if self.fail_lists.get() {
            return Err(BlobError::Rejected("simulated list failure".to_string()));
        }
        Ok(self
            .objects
            .borrow()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerCall {
    Schedule(ReminderRequest),
    Cancel(String),
}

#[derive(Default)]
pub struct RecordingScheduler {
    calls: RefCell<Vec<SchedulerCall>>,
    fail: Cell<bool>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.set(fail);
    }

    pub fn calls(&self) -> Vec<SchedulerCall> {
        self.calls.borrow().clone()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl NotificationScheduler for RecordingScheduler {
    fn schedule(&self, request: &ReminderRequest) -> Result<(), NotifyError> {
        self.calls
            .borrow_mut()
            .push(SchedulerCall::Schedule(request.clone()));
        if self.fail.get() {
            return Err(NotifyError::Rejected("simulated scheduler failure".to_string()));
        }
        Ok(())
    }

    fn cancel(&self, id: &str) -> Result<(), NotifyError> {
        self.calls
            .borrow_mut()
            .push(SchedulerCall::Cancel(id.to_string()));
        if self.fail.get() {
            return Err(NotifyError::Rejected("simulated scheduler failure".to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingRenderer {
    rendered: RefCell<Vec<TaskReport>>,
    fail: Cell<bool>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.set(fail);
    }

    pub fn rendered(&self) -> Vec<TaskReport> {
        self.rendered.borrow().clone()
    }
}

impl ReportRenderer for RecordingRenderer {
    fn render(&self, report: &TaskReport) -> Result<PathBuf, ReportError> {
        self.rendered.borrow_mut().push(report.clone());
        if self.fail.get() {
            return Err(ReportError::Io(std::io::Error::other("simulated render failure")));
        }
        Ok(PathBuf::from(format!("/reports/{}.json", report.task_id)))
    }
}

pub fn status_of(store: &TaskStore, id: &str) -> TaskStatus {
    store
        .get(id)
        .expect("store read should succeed")
        .expect("task should exist")
        .status
}
