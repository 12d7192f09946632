//! Load listeners and the staleness-aware delegates that feed them.

use crate::asset::Asset;
use crate::engine::delivery::{DeliveryEvent, DeliverySender, Recipient};
use crate::error::LoadError;
use crate::task::TaskManager;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Observes one load request.
///
/// Every callback runs on the delivery thread. A superseded request never
/// hears anything again, so a listener may see `on_start` without any
/// terminal callback.
pub trait LoadListener: Send + Sync {
    fn on_start(&self) {}

    /// `total` is `None` when the decoder cannot tell the final size.
    fn on_progress(&self, _read: u64, _total: Option<u64>) {}

    fn on_complete(&self, _asset: &Arc<Asset>) {}

    /// Receives every failure except cancellation interrupts.
    fn on_failed(&self, _error: &LoadError) {}

    fn on_cancelled(&self) {}
}

/// Progress reporting interface handed to decoders.
pub trait ProgressSink {
    /// Called once per decode attempt, before any progress.
    fn on_start(&self);

    fn on_progress(&self, read: u64, total: Option<u64>);
}

/// Sink that discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_start(&self) {}

    fn on_progress(&self, _read: u64, _total: Option<u64>) {}
}

/// Forwards decoder progress to the delivery thread while the task is
/// still current.
///
/// The listener hears `on_start` once per load, even when a load falls
/// back from its persisted copy to the source and both decoders report it.
pub(crate) struct ProgressDelegate<'a> {
    task_manager: &'a TaskManager,
    recipient: &'a Arc<Recipient>,
    sender: &'a DeliverySender,
    started: AtomicBool,
}

impl<'a> ProgressDelegate<'a> {
    pub(crate) fn new(
        task_manager: &'a TaskManager,
        recipient: &'a Arc<Recipient>,
        sender: &'a DeliverySender,
    ) -> Self {
        Self {
            task_manager,
            recipient,
            sender,
            started: AtomicBool::new(false),
        }
    }

    fn suppressed(&self) -> bool {
        self.recipient.listener.is_none()
            || self.recipient.future.is_cancelled()
            || self.task_manager.is_stale(&self.recipient.task)
    }
}

impl ProgressSink for ProgressDelegate<'_> {
    fn on_start(&self) {
        if self.started.swap(true, Ordering::Relaxed) || self.suppressed() {
            return;
        }
        self.sender.post(DeliveryEvent::Started {
            recipient: Arc::clone(self.recipient),
        });
    }

    fn on_progress(&self, read: u64, total: Option<u64>) {
        if self.suppressed() {
            return;
        }
        self.sender.post(DeliveryEvent::Progress {
            recipient: Arc::clone(self.recipient),
            read,
            total,
        });
    }
}

/// Filters decode errors before they reach a listener.
///
/// Interrupts are what a successful cancellation looks like from inside a
/// decoder, so they are swallowed. Everything else is surfaced.
pub(crate) struct ErrorDelegate;

impl ErrorDelegate {
    pub(crate) fn surface(recipient: &Recipient, error: LoadError) -> Option<LoadError> {
        if error.is_benign() {
            debug!(task_id = %recipient.task.id(), "Swallowing cancellation interrupt");
            return None;
        }
        Some(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_progress_is_silent() {
        let sink = NoProgress;
        sink.on_start();
        sink.on_progress(10, Some(20));
    }

    struct Quiet;
    impl LoadListener for Quiet {}

    #[test]
    fn test_listener_defaults_are_no_ops() {
        let listener = Quiet;
        listener.on_start();
        listener.on_progress(1, None);
        listener.on_failed(&LoadError::NotFound("x".into()));
        listener.on_cancelled();
    }
}
