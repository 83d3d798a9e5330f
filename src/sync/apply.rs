use tracing::{debug, warn};

use crate::domain::Task;
use crate::store::{RemoteApply, TaskStore};

use super::SyncSummary;

/// Upserts live-query batches into the local store.
///
/// Records missing from a batch are left alone; only explicit deletes remove
/// local records.
pub struct BatchApplier<'a> {
    store: &'a TaskStore,
}

impl<'a> BatchApplier<'a> {
    pub fn new(store: &'a TaskStore) -> Self {
        Self { store }
    }

    /// Applies every task in `tasks`, folding the outcome into `summary`, and
    /// returns the counts for this batch alone. A task that fails to apply is
    /// logged and counted; the rest of the batch still runs.
    pub fn apply_batch(&self, tasks: &[Task], summary: &mut SyncSummary) -> SyncSummary {
        let mut batch = SyncSummary {
            batches: 1,
            received: tasks.len() as u64,
            ..SyncSummary::default()
        };

        for task in tasks {
            let Some(id) = task.id.as_deref().filter(|id| !id.is_empty()) else {
                warn!(title = %task.title, "skipping remote task without a document id");
                batch.skipped += 1;
                continue;
            };

            match self.store.apply_remote(id, task) {
                Ok(RemoteApply::Inserted) => batch.inserted += 1,
                Ok(RemoteApply::Updated) => batch.updated += 1,
                Err(err) => {
                    warn!(task_id = id, error = %err, "failed to reconcile remote task");
                    batch.failed += 1;
                }
            }
        }

        debug!(
            received = batch.received,
            inserted = batch.inserted,
            updated = batch.updated,
            skipped = batch.skipped,
            failed = batch.failed,
            "applied live query batch"
        );
        summary.absorb(&batch);
        batch
    }
}
