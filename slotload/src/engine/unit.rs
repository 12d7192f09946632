//! The scheduling unit a worker runs for one load.

use super::context::EngineContext;
use super::delivery::{DeliveryEvent, Recipient};
use super::future::{LoadFuture, LoadStatus};
use crate::asset::{Asset, DecodeSpec};
use crate::cache::{CacheKey, Tiers};
use crate::decode::{BlobFileDecoder, DecodeRequest, Decoder};
use crate::error::LoadError;
use crate::listener::{ErrorDelegate, ProgressDelegate};
use crate::source::{Locator, SourceKind};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// One load, as queued on the dispatcher and run on a worker.
pub(crate) struct LoadUnit {
    recipient: Arc<Recipient>,
    /// The requested source.
    locator: Locator,
    /// Disk-tier blob found at submission time. Read with the blob decoder
    /// regardless of what is registered for `file://`.
    persisted: Option<PathBuf>,
    spec: DecodeSpec,
    /// Key of the original request; results are written back under it.
    key: CacheKey,
    /// Tiers a decode from `locator` is written back to.
    write_back: Tiers,
}

impl LoadUnit {
    pub(crate) fn new(
        recipient: Arc<Recipient>,
        locator: Locator,
        persisted: Option<PathBuf>,
        spec: DecodeSpec,
        key: CacheKey,
        write_back: Tiers,
    ) -> Self {
        Self {
            recipient,
            locator,
            persisted,
            spec,
            key,
            write_back,
        }
    }

    pub(crate) fn recipient(&self) -> &Arc<Recipient> {
        &self.recipient
    }

    pub(crate) fn future(&self) -> &Arc<LoadFuture> {
        &self.recipient.future
    }

    /// Persisted hits are local reads even when the source is remote.
    pub(crate) fn source_kind(&self) -> SourceKind {
        if self.persisted.is_some() {
            SourceKind::File
        } else {
            self.locator.kind()
        }
    }

    /// Runs the load on the current (worker) thread.
    ///
    /// Order: skip if cancelled or stale, decode, write back to the cache
    /// (even when the task went stale meanwhile), then post the result for
    /// delivery.
    pub(crate) fn run(self, ctx: &EngineContext) {
        let task_id = self.recipient.task.id();
        self.execute(ctx);
        ctx.in_flight.remove(task_id);
    }

    fn execute(&self, ctx: &EngineContext) {
        let future = &self.recipient.future;
        if future.is_cancelled() {
            debug!(task_id = %self.recipient.task.id(), "Skipping cancelled load");
            return;
        }
        if ctx.task_manager.interrupt_execute(&self.recipient.task) {
            future.transition(LoadStatus::Superseded);
            return;
        }
        future.transition(LoadStatus::Running);

        let progress = ProgressDelegate::new(&ctx.task_manager, &self.recipient, &ctx.delivery);
        let (result, write_back) = self.load(ctx, &progress);
        match result {
            Ok(asset) => {
                let asset = Arc::new(asset);
                ctx.cache.cache_in(&self.key, &asset, write_back);
                ctx.delivery.post(DeliveryEvent::Loaded {
                    recipient: Arc::clone(&self.recipient),
                    asset,
                });
            }
            Err(error) => match ErrorDelegate::surface(&self.recipient, error) {
                Some(error) => {
                    warn!(
                        task_id = %self.recipient.task.id(),
                        locator = %self.locator,
                        error = %error,
                        "Load failed"
                    );
                    ctx.delivery.post(DeliveryEvent::Failed {
                        recipient: Arc::clone(&self.recipient),
                        error,
                    });
                }
                None => {
                    future.transition(LoadStatus::Cancelled);
                }
            },
        }
    }

    /// Decodes the persisted copy if there is one, else the source.
    ///
    /// A persisted copy that was evicted or is unreadable falls back to the
    /// source, and the result is written to disk again. Returns the tiers
    /// the result goes to.
    fn load(
        &self,
        ctx: &EngineContext,
        progress: &ProgressDelegate<'_>,
    ) -> (Result<Asset, LoadError>, Tiers) {
        let Some(path) = &self.persisted else {
            return (self.decode_source(ctx, progress), self.write_back);
        };

        let blob = Locator::from_path(path);
        let from_disk = Tiers {
            disk: false,
            ..self.write_back
        };
        match self.decode_with(&BlobFileDecoder, &blob, progress) {
            Ok(asset) => (Ok(asset), from_disk),
            Err(error) if error.is_benign() => (Err(error), from_disk),
            Err(error) => {
                debug!(
                    task_id = %self.recipient.task.id(),
                    path = %path.display(),
                    error = %error,
                    "Persisted copy unusable, decoding source"
                );
                (self.decode_source(ctx, progress), self.write_back)
            }
        }
    }

    fn decode_source(
        &self,
        ctx: &EngineContext,
        progress: &ProgressDelegate<'_>,
    ) -> Result<Asset, LoadError> {
        let decoder = ctx.registry.resolve(&self.locator)?;
        self.decode_with(decoder.as_ref(), &self.locator, progress)
    }

    fn decode_with(
        &self,
        decoder: &dyn Decoder,
        locator: &Locator,
        progress: &ProgressDelegate<'_>,
    ) -> Result<Asset, LoadError> {
        let request = DecodeRequest {
            locator,
            spec: self.spec,
            cancel: self.recipient.future.cancellation_token(),
        };
        panic::catch_unwind(AssertUnwindSafe(|| decoder.decode(&request, progress)))
            .unwrap_or_else(|_| Err(LoadError::Unknown("decoder panicked".to_string())))
    }
}
