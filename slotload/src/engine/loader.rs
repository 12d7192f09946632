//! The load orchestrator.

use super::builder::SlotLoaderBuilder;
use super::context::EngineContext;
use super::delivery::{DeliveryLoop, Recipient};
use super::future::{LoadFuture, LoadStatus};
use super::request::{LoadOutcome, LoadRequest};
use super::state::EngineState;
use super::unit::LoadUnit;
use crate::asset::{Asset, DecodeSpec};
use crate::cache::{CacheStats, TieredCacheManager, Tiers};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::queue::Dispatcher;
use crate::source::Locator;
use crate::target::{slot_of, spec_for, DisplayTarget};
use crate::task::{SlotId, Task, TaskManager};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Point-in-time view of the engine.
#[derive(Debug, Clone)]
pub struct EngineStats {
    pub state: EngineState,
    /// Scheduled loads that have not finished.
    pub in_flight: usize,
    /// Units still waiting in the request queue.
    pub queued: usize,
    pub primary_active: usize,
    /// `None` until the fallback pool has been started.
    pub fallback_active: Option<usize>,
    pub tracked_slots: usize,
    /// Results handed to targets or listeners by the delivery thread.
    pub delivered: u64,
    pub cache: CacheStats,
}

/// Loads assets into display slots.
///
/// A request first checks the memory tier and, on a hit, delivers on the
/// calling thread. Otherwise a disk-tier hit is rewritten to a `file://`
/// load, and the request is queued by priority. A single dispatcher thread
/// hands units to the primary or fallback worker pool; results go through
/// one delivery thread, which drops anything superseded by a newer request
/// for the same slot.
///
/// After [`terminate`](Self::terminate) every operation fails with
/// [`EngineError::Terminated`].
pub struct SlotLoader {
    ctx: Arc<EngineContext>,
    dispatcher: Dispatcher<LoadUnit>,
    delivery: DeliveryLoop,
    config: EngineConfig,
}

impl SlotLoader {
    pub fn builder() -> SlotLoaderBuilder {
        SlotLoaderBuilder::new()
    }

    pub(crate) fn from_parts(
        ctx: Arc<EngineContext>,
        dispatcher: Dispatcher<LoadUnit>,
        delivery: DeliveryLoop,
        config: EngineConfig,
    ) -> Self {
        Self {
            ctx,
            dispatcher,
            delivery,
            config,
        }
    }

    /// Loads an asset into `target`.
    ///
    /// Creating the task supersedes every earlier load for the same slot,
    /// whether it is still queued, decoding, or waiting for delivery.
    pub fn display(
        &self,
        target: &Arc<dyn DisplayTarget>,
        request: LoadRequest,
    ) -> Result<LoadOutcome, EngineError> {
        self.ensure_running()?;
        let task = self
            .ctx
            .task_manager
            .create_task(slot_of(target))
            .map_err(|_| EngineError::Terminated)?;
        let spec = request
            .spec()
            .unwrap_or_else(|| spec_for(target.as_ref()));
        self.submit(task, Some(Arc::clone(target)), spec, request)
    }

    /// Loads an asset without a display target (prefetch, cache warming).
    ///
    /// Detached loads only go stale through [`clear_tasks`](Self::clear_tasks).
    pub fn load(&self, request: LoadRequest) -> Result<LoadOutcome, EngineError> {
        self.ensure_running()?;
        let task = self
            .ctx
            .task_manager
            .create_detached_task()
            .map_err(|_| EngineError::Terminated)?;
        let spec = request.spec().unwrap_or_default();
        self.submit(task, None, spec, request)
    }

    fn submit(
        &self,
        task: Arc<Task>,
        target: Option<Arc<dyn DisplayTarget>>,
        spec: DecodeSpec,
        request: LoadRequest,
    ) -> Result<LoadOutcome, EngineError> {
        let cache = &self.ctx.cache;
        let key = cache.key_for(request.locator(), &spec);

        if !request.skips_memory_cache() {
            if let Some(asset) = cache.get(&key) {
                debug!(task_id = %task.id(), key = %key, "Memory cache hit");
                deliver_now(target.as_ref(), &request, &asset);
                return Ok(LoadOutcome::Cached(asset));
            }
        }

        let mut persisted = None;
        if !request.skips_disk_cache() {
            if let Some(path) = cache.get_persisted_path(&key) {
                // Another load may have filled memory while we looked at disk
                if !request.skips_memory_cache() {
                    if let Some(asset) = cache.get(&key) {
                        deliver_now(target.as_ref(), &request, &asset);
                        return Ok(LoadOutcome::Cached(asset));
                    }
                }
                trace!(task_id = %task.id(), path = %path.display(), "Disk cache hit");
                persisted = Some(path);
            }
        }

        let future = Arc::new(LoadFuture::new(
            Arc::clone(&task),
            request.locator().clone(),
            key.clone(),
            request.priority(),
            request.cancels_predecessor(),
        ));
        let recipient = Arc::new(Recipient {
            task,
            future: Arc::clone(&future),
            target,
            listener: request.listener().cloned(),
        });
        let write_back = Tiers {
            memory: !request.skips_memory_cache(),
            disk: !request.skips_disk_cache(),
        };
        let from_disk = persisted.is_some();
        let unit = LoadUnit::new(
            Arc::clone(&recipient),
            request.locator().clone(),
            persisted,
            spec,
            key,
            write_back,
        );

        self.ctx.in_flight.track(recipient);
        if self.dispatcher.push(unit, request.priority()).is_err() {
            self.ctx.in_flight.remove(future.task_id());
            future.transition(LoadStatus::Cancelled);
            return Err(EngineError::Terminated);
        }

        debug!(
            task_id = %future.task_id(),
            slot = ?future.slot(),
            locator = %request.locator(),
            priority = %request.priority(),
            from_disk,
            "Queued load"
        );
        Ok(LoadOutcome::Scheduled(future))
    }

    /// Stops handing new work to the pools.
    ///
    /// Takes effect at the dispatcher's next step; loads already running
    /// finish normally. Pausing a paused loader is a no-op.
    pub fn pause(&self) -> Result<(), EngineError> {
        self.ensure_running()?;
        if self.ctx.state.request_pause() {
            info!("Slot loader pause requested");
        }
        Ok(())
    }

    /// Lifts a pause. Resuming a running loader is a no-op.
    pub fn resume(&self) -> Result<(), EngineError> {
        self.ensure_running()?;
        if self.ctx.state.resume() {
            info!("Slot loader resumed");
        }
        Ok(())
    }

    /// Shuts the loader down for good.
    ///
    /// Stops the dispatcher, cancels every in-flight load, drains the worker
    /// pools, invalidates all tasks and stops the delivery thread. Calling it
    /// again does nothing.
    pub fn terminate(&self) {
        if !self.ctx.state.terminate() {
            return;
        }
        info!("Terminating slot loader");

        self.dispatcher.terminate();
        let cancelled = self
            .ctx
            .in_flight
            .cancel_all(&self.ctx.delivery, &self.ctx.task_manager);
        let dropped = self.dispatcher.queue().drain().len();

        self.ctx.pools.shutdown();
        self.ctx.pools.join();
        self.ctx.task_manager.terminate();
        self.ctx.cache.shutdown();
        self.delivery.shutdown();

        info!(cancelled, dropped, "Slot loader terminated");
    }

    pub fn state(&self) -> EngineState {
        self.ctx.state.get()
    }

    pub fn is_terminated(&self) -> bool {
        self.state().is_terminated()
    }

    /// Cancels in-flight loads requested for `locator`. Returns how many
    /// were cancelled.
    pub fn cancel_by_locator(&self, locator: &Locator) -> Result<usize, EngineError> {
        self.ensure_running()?;
        Ok(self
            .ctx
            .in_flight
            .cancel_by_locator(locator, &self.ctx.delivery, &self.ctx.task_manager))
    }

    /// Cancels in-flight loads bound to `slot`.
    pub fn cancel_by_slot(&self, slot: SlotId) -> Result<usize, EngineError> {
        self.ensure_running()?;
        Ok(self
            .ctx
            .in_flight
            .cancel_by_slot(slot, &self.ctx.delivery, &self.ctx.task_manager))
    }

    /// Cancels in-flight loads bound to `target`'s slot.
    pub fn cancel_target(&self, target: &Arc<dyn DisplayTarget>) -> Result<usize, EngineError> {
        self.cancel_by_slot(slot_of(target))
    }

    pub fn cancel_all(&self) -> Result<usize, EngineError> {
        self.ensure_running()?;
        Ok(self
            .ctx
            .in_flight
            .cancel_all(&self.ctx.delivery, &self.ctx.task_manager))
    }

    /// Makes every load created so far stale without cancelling anything.
    ///
    /// Their results are still cached, but nothing is delivered.
    pub fn clear_tasks(&self) -> Result<(), EngineError> {
        self.ensure_running()?;
        self.ctx.task_manager.clear_tasks();
        Ok(())
    }

    pub fn evict_memory(&self) -> Result<usize, EngineError> {
        self.ensure_running()?;
        Ok(self.ctx.cache.evict_memory())
    }

    pub fn evict_persistent(&self) -> Result<usize, EngineError> {
        self.ensure_running()?;
        Ok(self.ctx.cache.evict_persistent()?)
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            state: self.state(),
            in_flight: self.ctx.in_flight.len(),
            queued: self.dispatcher.queue().pending(),
            primary_active: self.ctx.pools.primary().active_count(),
            fallback_active: self.ctx.pools.fallback().map(|p| p.active_count()),
            tracked_slots: self.ctx.task_manager.tracked_slots(),
            delivered: self.delivery.delivered_count(),
            cache: self.ctx.cache.stats(),
        }
    }

    pub fn cache(&self) -> &TieredCacheManager {
        &self.ctx.cache
    }

    pub fn task_manager(&self) -> &TaskManager {
        &self.ctx.task_manager
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn ensure_running(&self) -> Result<(), EngineError> {
        if self.ctx.state.get().is_terminated() {
            return Err(EngineError::Terminated);
        }
        Ok(())
    }
}

/// Delivers a memory-tier hit on the calling thread.
fn deliver_now(target: Option<&Arc<dyn DisplayTarget>>, request: &LoadRequest, asset: &Arc<Asset>) {
    if let Some(target) = target {
        target.deliver(Arc::clone(asset));
        if asset.is_animated() {
            target.start_animation(asset);
        }
    }
    if let Some(listener) = request.listener() {
        listener.on_complete(asset);
    }
}

impl fmt::Debug for SlotLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotLoader")
            .field("state", &self.state())
            .field("in_flight", &self.ctx.in_flight.len())
            .finish()
    }
}

impl Drop for SlotLoader {
    fn drop(&mut self) {
        self.terminate();
    }
}
