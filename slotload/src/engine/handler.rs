//! Dispatcher-side handling of queued load units.

use super::context::EngineContext;
use super::future::LoadStatus;
use super::unit::LoadUnit;
use crate::queue::RequestHandler;
use std::sync::Arc;
use tracing::{debug, warn};

/// Hands drained units to a worker pool.
///
/// Runs on the dispatcher thread, so a pending pause parks the whole drain
/// loop here until resume.
pub(crate) struct UnitHandler {
    ctx: Arc<EngineContext>,
}

impl UnitHandler {
    pub(crate) fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    fn drop_unit(&self, unit: &LoadUnit, status: LoadStatus) {
        unit.future().transition(status);
        self.ctx.in_flight.remove(unit.recipient().task.id());
    }
}

impl RequestHandler<LoadUnit> for UnitHandler {
    fn handle_request(&self, unit: LoadUnit) -> bool {
        let ctx = &self.ctx;

        if !ctx.state.await_running() {
            debug!(task_id = %unit.future().task_id(), "Dropping unit, loader terminated");
            self.drop_unit(&unit, LoadStatus::Cancelled);
            return false;
        }

        if unit.future().is_cancelled() {
            self.drop_unit(&unit, LoadStatus::Cancelled);
            return false;
        }

        let future = Arc::clone(unit.future());
        if future.cancels_predecessor() {
            if let Some(slot) = future.slot() {
                let cancelled = ctx.in_flight.cancel_predecessors(
                    slot,
                    future.task_id(),
                    &ctx.delivery,
                    &ctx.task_manager,
                );
                if cancelled > 0 {
                    debug!(slot = %slot, cancelled, "Cancelled predecessors");
                }
            }
        }

        let source = unit.source_kind();
        let job_ctx = Arc::clone(ctx);
        match ctx
            .pools
            .submit(source, Box::new(move || unit.run(&job_ctx)))
        {
            Ok(pool) => {
                debug!(
                    task_id = %future.task_id(),
                    priority = %future.priority(),
                    pool = %pool,
                    "Dispatched load"
                );
                true
            }
            Err(e) => {
                warn!(task_id = %future.task_id(), error = %e, "Could not submit load");
                future.transition(LoadStatus::Cancelled);
                ctx.in_flight.remove(future.task_id());
                false
            }
        }
    }
}
