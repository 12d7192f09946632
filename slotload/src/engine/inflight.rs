//! Registry of scheduled loads that have not finished yet.

use super::delivery::{DeliveryEvent, DeliverySender, Recipient};
use crate::source::Locator;
use crate::task::{SlotId, TaskId, TaskManager};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// In-flight loads keyed by task id.
///
/// Entries are added at submission and removed when the load finishes, is
/// cancelled, or is dropped by the dispatcher.
#[derive(Default)]
pub(crate) struct InFlight {
    entries: DashMap<TaskId, Arc<Recipient>>,
}

impl InFlight {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn track(&self, recipient: Arc<Recipient>) {
        self.entries.insert(recipient.task.id(), recipient);
    }

    pub(crate) fn remove(&self, task_id: TaskId) {
        self.entries.remove(&task_id);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Cancels every in-flight load requested for `locator`.
    pub(crate) fn cancel_by_locator(
        &self,
        locator: &Locator,
        sender: &DeliverySender,
        task_manager: &TaskManager,
    ) -> usize {
        self.cancel_matching(|r| r.future.locator() == locator, sender, task_manager)
    }

    /// Cancels every in-flight load bound to `slot`.
    pub(crate) fn cancel_by_slot(
        &self,
        slot: SlotId,
        sender: &DeliverySender,
        task_manager: &TaskManager,
    ) -> usize {
        self.cancel_matching(|r| r.task.slot() == Some(slot), sender, task_manager)
    }

    /// Cancels every load for `slot` other than `except`.
    pub(crate) fn cancel_predecessors(
        &self,
        slot: SlotId,
        except: TaskId,
        sender: &DeliverySender,
        task_manager: &TaskManager,
    ) -> usize {
        self.cancel_matching(
            |r| r.task.slot() == Some(slot) && r.task.id() != except,
            sender,
            task_manager,
        )
    }

    pub(crate) fn cancel_all(&self, sender: &DeliverySender, task_manager: &TaskManager) -> usize {
        self.cancel_matching(|_| true, sender, task_manager)
    }

    /// Cancels matching loads that are still live.
    ///
    /// The cancellation callback is only posted for loads whose task is
    /// still current; superseded loads stay silent.
    fn cancel_matching(
        &self,
        predicate: impl Fn(&Recipient) -> bool,
        sender: &DeliverySender,
        task_manager: &TaskManager,
    ) -> usize {
        // Collect first so no shard lock is held while posting
        let matched: Vec<Arc<Recipient>> = self
            .entries
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut cancelled = 0;
        for recipient in matched {
            self.entries.remove(&recipient.task.id());
            if !recipient.future.cancel() {
                continue;
            }
            cancelled += 1;
            debug!(task_id = %recipient.task.id(), locator = %recipient.future.locator(), "Cancelled load");
            if !task_manager.is_stale(&recipient.task) {
                sender.post(DeliveryEvent::Cancelled { recipient });
            }
        }
        cancelled
    }
}
