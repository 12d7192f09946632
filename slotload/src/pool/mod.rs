//! Worker pools that execute load units.
//!
//! ```text
//!   dispatcher ──► ExecutorPools::submit(source)
//!                      │
//!          slow ───────┼────────► primary pool
//!          fast ──┬────┘
//!                 └─ primary saturated ──► fallback pool (lazy)
//! ```

mod selector;
mod worker;

pub use selector::{ExecutorPools, PoolKind};
pub use worker::{Job, PoolError, WorkerPool};
