//! Task identities and per-slot records.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Monotonic, globally unique task ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Stable identity of a display slot.
///
/// Two requests for the same visual slot share a `SlotId` even when their
/// locators differ; that is what lets a newer request supersede an older one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u64);

impl SlotId {
    /// Derives a slot id from the address of a shared target.
    ///
    /// Stable for as long as the `Arc` is alive. Once it is freed the
    /// address, and with it the id, may be handed to an unrelated target.
    pub fn of<T: ?Sized>(target: &Arc<T>) -> Self {
        Self(Arc::as_ptr(target) as *const () as usize as u64)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot-{:x}", self.0)
    }
}

/// The one record kept per slot.
///
/// Reused across tasks for the same slot: creating a new task bumps
/// `latest` in place, and every older task holding this record observes
/// the bump on its next staleness check.
#[derive(Debug)]
pub struct TaskRecord {
    slot: SlotId,
    latest: AtomicU64,
    created_at: Instant,
}

impl TaskRecord {
    pub(crate) fn new(slot: SlotId, task_id: TaskId) -> Self {
        Self {
            slot,
            latest: AtomicU64::new(task_id.0),
            created_at: Instant::now(),
        }
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// Id of the most recent task created for this slot.
    pub fn latest_task(&self) -> TaskId {
        TaskId(self.latest.load(Ordering::Acquire))
    }

    /// When the first task for this slot was registered.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Moves the latest id forward; never backwards, so racing creators for
    /// the same slot settle on the highest id.
    pub(crate) fn bump(&self, task_id: TaskId) {
        self.latest.fetch_max(task_id.0, Ordering::AcqRel);
    }
}

/// A single load attempt as seen by the staleness machinery.
///
/// Staleness is latched: once a check finds the task stale, every later
/// check returns stale without consulting the record again.
#[derive(Debug)]
pub struct Task {
    id: TaskId,
    record: Option<Arc<TaskRecord>>,
    created_at: Instant,
    stale: AtomicBool,
}

impl Task {
    pub(crate) fn new(id: TaskId, record: Option<Arc<TaskRecord>>) -> Self {
        Self {
            id,
            record,
            created_at: Instant::now(),
            stale: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// The slot this task loads into; `None` for detached loads.
    pub fn slot(&self) -> Option<SlotId> {
        self.record.as_ref().map(|r| r.slot())
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// True if a newer task has been created for the same slot.
    pub fn is_superseded(&self) -> bool {
        self.record
            .as_ref()
            .is_some_and(|r| r.latest_task() > self.id)
    }

    pub(crate) fn is_latched_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    pub(crate) fn latch_stale(&self) {
        self.stale.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_bump_is_monotonic() {
        let record = TaskRecord::new(SlotId(1), TaskId(5));
        record.bump(TaskId(9));
        record.bump(TaskId(7));
        assert_eq!(record.latest_task(), TaskId(9));
    }

    #[test]
    fn test_task_superseded_through_shared_record() {
        let record = Arc::new(TaskRecord::new(SlotId(3), TaskId(1)));
        let older = Task::new(TaskId(1), Some(Arc::clone(&record)));
        assert!(!older.is_superseded());

        record.bump(TaskId(2));
        assert!(older.is_superseded());
        assert_eq!(older.slot(), Some(SlotId(3)));
    }

    #[test]
    fn test_detached_task_is_never_superseded() {
        let task = Task::new(TaskId(4), None);
        assert!(!task.is_superseded());
        assert_eq!(task.slot(), None);
    }

    #[test]
    fn test_slot_id_of_arc_is_stable() {
        let target = Arc::new(String::from("slot"));
        let clone = Arc::clone(&target);
        assert_eq!(SlotId::of(&target), SlotId::of(&clone));

        let other = Arc::new(String::from("slot"));
        assert_ne!(SlotId::of(&target), SlotId::of(&other));
    }

    #[test]
    fn test_display_formats() {
        assert_eq!(TaskId(12).to_string(), "task-12");
        assert_eq!(SlotId(255).to_string(), "slot-ff");
    }
}
