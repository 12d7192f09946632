//! Shared engine context.

use super::delivery::DeliverySender;
use super::inflight::InFlight;
use super::state::StateGate;
use crate::cache::TieredCacheManager;
use crate::decode::DecoderRegistry;
use crate::pool::ExecutorPools;
use crate::task::TaskManager;
use std::sync::Arc;

/// Everything the loader, the dispatcher handler and the workers share.
///
/// Built once by [`SlotLoaderBuilder`](super::SlotLoaderBuilder) and passed
/// around behind an `Arc`.
pub(crate) struct EngineContext {
    pub(crate) task_manager: Arc<TaskManager>,
    pub(crate) cache: TieredCacheManager,
    pub(crate) pools: ExecutorPools,
    pub(crate) registry: DecoderRegistry,
    pub(crate) in_flight: InFlight,
    pub(crate) delivery: DeliverySender,
    pub(crate) state: StateGate,
}
