use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use teloxide::types::MessageId;

use crate::types::PendingReport;

/// Reports posted to the review channel and still waiting for the
/// administrator's verdict, keyed by the channel message that carries
/// them.
///
/// The queue lives in memory only. If the process restarts, pending
/// entries are gone and the report messages in the channel outlive
/// their data; approving one of those gets answered with a "not found"
/// notice instead of a merge.
pub struct ModerationQueue {
    pending: Mutex<HashMap<MessageId, PendingReport>>,
}

impl ModerationQueue {
    pub fn new() -> Arc<ModerationQueue> {
        Arc::new(ModerationQueue {
            pending: Mutex::new(HashMap::new()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<MessageId, PendingReport>> {
        self.pending.lock().expect("Moderation lock is poisoned!")
    }

    /// File a new report under the channel message that carries it.
    pub fn register(&self, id: MessageId, report: PendingReport) {
        let previous = self.lock().insert(id, report);
        if previous.is_some() {
            // Message ids are unique within a channel, so this should
            // never happen.
            log::error!("Two pending reports registered under message id {}!", id.0);
        }
    }

    /// Take a report out for merging. The first caller gets it and
    /// everyone after gets `None`, which is what makes approving a
    /// report at-most-once.
    pub fn take(&self, id: MessageId) -> Option<PendingReport> {
        self.lock().remove(&id)
    }

    /// Drop a report without merging it. True if there was one; fine
    /// to call for ids that were never registered or already resolved.
    pub fn discard(&self, id: MessageId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// How many reports still wait for a verdict.
    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }
}
