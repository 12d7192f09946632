//! Per-slot task bookkeeping.
//!
//! Every load creates a [`Task`]. Loads bound to a display slot share that
//! slot's [`TaskRecord`], whose latest-task id moves forward each time the
//! slot is re-requested. Older tasks compare their own id against it to
//! learn they have been superseded.

mod manager;
mod record;

pub use manager::{TaskManager, TaskManagerTerminated};
pub use record::{SlotId, Task, TaskId, TaskRecord};
