//! The load orchestrator and its moving parts.
//!
//! ```text
//!  display()/load()
//!        │  memory hit ──► deliver on caller thread
//!        │  disk hit ────► unit reads the blob, source as fallback
//!        ▼
//!  TaskManager::create_task(slot)          (supersedes older tasks)
//!        │
//!        ▼
//!  Dispatcher<LoadUnit> ── UnitHandler ──► pause gate, cancel predecessors
//!                                   │
//!                                   ▼
//!                     ExecutorPools (primary │ fallback)
//!                                   │  LoadUnit::run: decode, write back
//!                                   ▼
//!                     delivery thread ──► DisplayTarget / LoadListener
//!                                          (stale results dropped)
//! ```

mod builder;
mod context;
pub(crate) mod delivery;
mod future;
mod handler;
mod inflight;
mod loader;
mod request;
mod state;
mod unit;

pub use builder::{SlotLoaderBuilder, DISPATCHER_THREAD_NAME, POOL_NAME};
pub use delivery::DELIVERY_THREAD_NAME;
pub use future::{LoadFuture, LoadStatus};
pub use loader::{EngineStats, SlotLoader};
pub use request::{LoadOutcome, LoadRequest};
pub use state::{EngineState, Freezer};
