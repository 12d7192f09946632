//! Slot-to-task bookkeeping and staleness checks.

use super::record::{SlotId, Task, TaskId, TaskRecord};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, trace};

/// Returned when registering a task after [`TaskManager::terminate`].
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Task manager has been terminated")]
pub struct TaskManagerTerminated;

/// Tracks the latest task per slot so superseded work can be suppressed.
///
/// A task is stale when either:
/// - it was created before the last [`clear_tasks`](Self::clear_tasks), or
/// - a newer task has since been created for the same slot.
///
/// The bulk-clear mark is a task-id watermark rather than a timestamp: ids
/// are handed out in creation order, so "created before the clear" is the
/// same as "id below the watermark" without depending on clock resolution.
/// The wall-clock time of the last clear is kept for diagnostics only.
///
/// Stale work is never interrupted. It either gets skipped before
/// execution ([`interrupt_execute`](Self::interrupt_execute)) or its result
/// is dropped before delivery ([`interrupt_display`](Self::interrupt_display)).
pub struct TaskManager {
    next_id: AtomicU64,
    clear_watermark: AtomicU64,
    last_cleared_at: Mutex<Option<Instant>>,
    slots: Mutex<HashMap<SlotId, Arc<TaskRecord>>>,
    terminated: AtomicBool,
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskManager {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            clear_watermark: AtomicU64::new(0),
            last_cleared_at: Mutex::new(None),
            slots: Mutex::new(HashMap::new()),
            terminated: AtomicBool::new(false),
        }
    }

    /// Issues a fresh task id.
    pub fn next_task_id(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::AcqRel))
    }

    /// Registers `task_id` as the latest task for `slot`.
    ///
    /// An existing record only has its latest id bumped; otherwise a new
    /// record is stored. Returns the slot's record.
    pub fn on_task_created(
        &self,
        slot: SlotId,
        task_id: TaskId,
    ) -> Result<Arc<TaskRecord>, TaskManagerTerminated> {
        if self.is_terminated() {
            return Err(TaskManagerTerminated);
        }

        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let record = slots
            .entry(slot)
            .and_modify(|record| record.bump(task_id))
            .or_insert_with(|| Arc::new(TaskRecord::new(slot, task_id)));

        trace!(slot = %slot, task_id = %task_id, "Task registered for slot");
        Ok(Arc::clone(record))
    }

    /// Creates a task for a slot: issues an id and refreshes the slot record.
    pub fn create_task(&self, slot: SlotId) -> Result<Arc<Task>, TaskManagerTerminated> {
        let id = self.next_task_id();
        let record = self.on_task_created(slot, id)?;
        Ok(Arc::new(Task::new(id, Some(record))))
    }

    /// Creates a task not bound to any slot.
    ///
    /// Detached tasks only go stale through a bulk clear or termination.
    pub fn create_detached_task(&self) -> Result<Arc<Task>, TaskManagerTerminated> {
        if self.is_terminated() {
            return Err(TaskManagerTerminated);
        }
        Ok(Arc::new(Task::new(self.next_task_id(), None)))
    }

    /// Computes (and latches) staleness for a task.
    pub fn is_stale(&self, task: &Task) -> bool {
        if task.is_latched_stale() {
            return true;
        }

        let stale = self.is_terminated()
            || task.id().0 < self.clear_watermark.load(Ordering::Acquire)
            || task.is_superseded();

        if stale {
            task.latch_stale();
        }
        stale
    }

    /// Returns true if a finished result for `task` must not be delivered.
    pub fn interrupt_display(&self, task: &Task) -> bool {
        let stale = self.is_stale(task);
        if stale {
            debug!(task_id = %task.id(), slot = ?task.slot(), "Suppressing stale delivery");
        }
        stale
    }

    /// Returns true if `task` should be skipped before any decode work.
    pub fn interrupt_execute(&self, task: &Task) -> bool {
        let stale = self.is_stale(task);
        if stale {
            debug!(task_id = %task.id(), slot = ?task.slot(), "Skipping stale task before execution");
        }
        stale
    }

    /// Marks every task created so far as stale.
    ///
    /// Slot records are left in place; tasks created after this call are
    /// unaffected.
    pub fn clear_tasks(&self) {
        let watermark = self.next_id.load(Ordering::Acquire);
        self.clear_watermark.fetch_max(watermark, Ordering::AcqRel);
        *self
            .last_cleared_at
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
        info!(watermark, "Cleared all in-flight tasks");
    }

    /// When [`clear_tasks`](Self::clear_tasks) last ran.
    pub fn last_cleared_at(&self) -> Option<Instant> {
        *self
            .last_cleared_at
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Drops all slot records. One-way: afterwards every task is stale and
    /// no new tasks can be registered.
    pub fn terminate(&self) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        info!("Task manager terminated");
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Number of slots with a live record.
    pub fn tracked_slots(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// The record currently held for a slot.
    pub fn record_for(&self, slot: SlotId) -> Option<Arc<TaskRecord>> {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&slot)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::thread;

    #[test]
    fn test_task_ids_are_monotonic() {
        let manager = TaskManager::new();
        let a = manager.next_task_id();
        let b = manager.next_task_id();
        assert!(b > a);
    }

    #[test]
    fn test_newer_task_supersedes_older_for_same_slot() {
        let manager = TaskManager::new();
        let older = manager.create_task(SlotId(1)).unwrap();
        assert!(!manager.is_stale(&older));

        let newer = manager.create_task(SlotId(1)).unwrap();
        assert!(manager.is_stale(&older));
        assert!(!manager.is_stale(&newer));
    }

    #[test]
    fn test_record_is_reused_per_slot() {
        let manager = TaskManager::new();
        let first = manager.on_task_created(SlotId(8), manager.next_task_id()).unwrap();
        let newer_id = manager.next_task_id();
        let second = manager.on_task_created(SlotId(8), newer_id).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.latest_task(), newer_id);
        assert_eq!(manager.tracked_slots(), 1);
    }

    #[test]
    fn test_other_slots_are_unaffected() {
        let manager = TaskManager::new();
        let a = manager.create_task(SlotId(1)).unwrap();
        let _b = manager.create_task(SlotId(2)).unwrap();
        assert!(!manager.is_stale(&a));
    }

    #[test]
    fn test_staleness_is_latched() {
        let manager = TaskManager::new();
        let older = manager.create_task(SlotId(1)).unwrap();
        let _newer = manager.create_task(SlotId(1)).unwrap();
        assert!(manager.interrupt_execute(&older));

        // Even after the slot record disappears the verdict holds
        manager.slots.lock().unwrap().clear();
        assert!(manager.interrupt_display(&older));
    }

    #[test]
    fn test_clear_tasks_marks_earlier_tasks_stale() {
        let manager = TaskManager::new();
        let before = manager.create_task(SlotId(1)).unwrap();
        let detached_before = manager.create_detached_task().unwrap();

        manager.clear_tasks();
        assert!(manager.last_cleared_at().is_some());

        let after = manager.create_task(SlotId(2)).unwrap();
        let detached_after = manager.create_detached_task().unwrap();

        assert!(manager.is_stale(&before));
        assert!(manager.is_stale(&detached_before));
        assert!(!manager.is_stale(&after));
        assert!(!manager.is_stale(&detached_after));
    }

    #[test]
    fn test_terminate_is_one_way() {
        let manager = TaskManager::new();
        let task = manager.create_task(SlotId(1)).unwrap();
        manager.terminate();

        assert!(manager.is_terminated());
        assert_eq!(manager.tracked_slots(), 0);
        assert!(manager.is_stale(&task));
        assert_eq!(manager.create_task(SlotId(1)).unwrap_err(), TaskManagerTerminated);
        assert!(manager.create_detached_task().is_err());
    }

    #[test]
    fn test_concurrent_creators_settle_on_latest() {
        let manager = Arc::new(TaskManager::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&manager);
                thread::spawn(move || {
                    (0..100)
                        .map(|_| m.create_task(SlotId(42)).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let tasks: Vec<Arc<Task>> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        let fresh: Vec<_> = tasks.iter().filter(|t| !manager.is_stale(t)).collect();
        assert_eq!(fresh.len(), 1);
        let max_id = tasks.iter().map(|t| t.id()).max().unwrap();
        assert_eq!(fresh[0].id(), max_id);
    }

    proptest! {
        /// Property: within a slot only the most recently created task is fresh,
        /// regardless of how creations interleave across slots.
        #[test]
        fn prop_only_latest_per_slot_is_fresh(slots in proptest::collection::vec(0u64..5, 1..60)) {
            let manager = TaskManager::new();
            let tasks: Vec<_> = slots
                .iter()
                .map(|s| (*s, manager.create_task(SlotId(*s)).unwrap()))
                .collect();

            for (i, (slot, task)) in tasks.iter().enumerate() {
                let has_newer = tasks[i + 1..].iter().any(|(s, _)| s == slot);
                prop_assert_eq!(manager.is_stale(task), has_newer);
            }
        }
    }
}
