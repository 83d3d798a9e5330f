use std::sync::mpsc::{self, Receiver, TryRecvError};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::db;
use crate::domain::Task;
use crate::remote::{RemoteError, RemoteTaskGateway, Subscription};
use crate::store::{StoreError, TaskStore};

mod apply;

pub use apply::BatchApplier;

pub const LAST_SYNC_META_KEY: &str = "last_sync_at";

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SyncSummary {
    pub batches: u64,
    pub received: u64,
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl SyncSummary {
    pub fn absorb(&mut self, other: &SyncSummary) {
        self.batches += other.batches;
        self.received += other.received;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Keeps the local store in step with the remote live query.
///
/// The gateway may deliver batches from any thread; they are queued and only
/// applied by [`Synchronizer::pump`] on the thread that owns the store, one
/// whole batch at a time.
pub struct Synchronizer<'a> {
    store: &'a TaskStore,
    gateway: &'a dyn RemoteTaskGateway,
    subscription: Option<Subscription>,
    batches: Option<Receiver<Vec<Task>>>,
}

impl<'a> Synchronizer<'a> {
    pub fn new(store: &'a TaskStore, gateway: &'a dyn RemoteTaskGateway) -> Self {
        Self {
            store,
            gateway,
            subscription: None,
            batches: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.subscription.is_some()
    }

    /// Subscribes to the live query. A running synchronizer is stopped first.
    pub fn start(&mut self) -> Result<(), SyncError> {
        if self.is_running() {
            self.stop();
        }

        let (sender, receiver) = mpsc::channel();
        let subscription = self.gateway.subscribe(Box::new(move |batch| {
            // The receiver is gone once stopped; late deliveries are dropped.
            let _ = sender.send(batch);
        }))?;

        self.subscription = Some(subscription);
        self.batches = Some(receiver);
        info!("synchronizer started");
        Ok(())
    }

    /// Applies every batch delivered since the last pump.
    pub fn pump(&mut self) -> Result<SyncSummary, SyncError> {
        let mut summary = SyncSummary::default();
        let Some(batches) = self.batches.as_ref() else {
            return Ok(summary);
        };

        let applier = BatchApplier::new(self.store);
        loop {
            match batches.try_recv() {
                Ok(batch) => {
                    applier.apply_batch(&batch, &mut summary);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("live query closed by the gateway");
                    break;
                }
            }
        }

        if summary.batches > 0 {
            self.store
                .set_meta(LAST_SYNC_META_KEY, &db::now_utc_rfc3339())?;
        }
        Ok(summary)
    }

    /// Detaches from the live query. Safe to call repeatedly.
    pub fn stop(&mut self) {
        let was_running = self.subscription.is_some();
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.batches = None;
        if was_running {
            info!("synchronizer stopped");
        }
    }

    /// One catch-up pass: start, apply whatever the live query delivered,
    /// stop.
    pub fn sync_once(&mut self) -> Result<SyncSummary, SyncError> {
        self.start()?;
        let summary = self.pump();
        self.stop();
        summary
    }
}

impl Drop for Synchronizer<'_> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
