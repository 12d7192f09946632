//! Single-threaded delivery of results to targets and listeners.
//!
//! Workers never touch a display target. They post typed
//! [`DeliveryEvent`]s to one channel, and one dedicated thread applies them
//! in the order they were posted. Staleness is checked again on this
//! thread, right before anything reaches the target.

use super::future::{LoadFuture, LoadStatus};
use crate::asset::Asset;
use crate::error::LoadError;
use crate::listener::LoadListener;
use crate::target::DisplayTarget;
use crate::task::{Task, TaskManager};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

/// Name of the delivery thread.
pub const DELIVERY_THREAD_NAME: &str = "slotload-delivery";

/// Everyone who hears about one load.
pub(crate) struct Recipient {
    pub(crate) task: Arc<Task>,
    pub(crate) future: Arc<LoadFuture>,
    pub(crate) target: Option<Arc<dyn DisplayTarget>>,
    pub(crate) listener: Option<Arc<dyn LoadListener>>,
}

/// Work items for the delivery thread.
pub(crate) enum DeliveryEvent {
    Started {
        recipient: Arc<Recipient>,
    },
    Progress {
        recipient: Arc<Recipient>,
        read: u64,
        total: Option<u64>,
    },
    Loaded {
        recipient: Arc<Recipient>,
        asset: Arc<Asset>,
    },
    Failed {
        recipient: Arc<Recipient>,
        error: LoadError,
    },
    Cancelled {
        recipient: Arc<Recipient>,
    },
    Shutdown,
}

impl DeliveryEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Progress { .. } => "progress",
            Self::Loaded { .. } => "loaded",
            Self::Failed { .. } => "failed",
            Self::Cancelled { .. } => "cancelled",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Posting side of the delivery channel.
#[derive(Clone)]
pub(crate) struct DeliverySender {
    tx: mpsc::UnboundedSender<DeliveryEvent>,
}

impl DeliverySender {
    pub(crate) fn post(&self, event: DeliveryEvent) {
        if let Err(e) = self.tx.send(event) {
            trace!(event = e.0.name(), "Delivery loop stopped, dropping event");
        }
    }
}

/// Owns the delivery thread.
pub(crate) struct DeliveryLoop {
    sender: DeliverySender,
    delivered: Arc<AtomicU64>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl DeliveryLoop {
    pub(crate) fn start(task_manager: Arc<TaskManager>) -> io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let delivered = Arc::new(AtomicU64::new(0));
        let loop_delivered = Arc::clone(&delivered);

        let handle = thread::Builder::new()
            .name(DELIVERY_THREAD_NAME.to_string())
            .spawn(move || run_loop(rx, &task_manager, &loop_delivered))?;

        debug!("Delivery loop started");

        Ok(Self {
            sender: DeliverySender { tx },
            delivered,
            thread: Mutex::new(Some(handle)),
        })
    }

    pub(crate) fn sender(&self) -> DeliverySender {
        self.sender.clone()
    }

    /// Results handed to a target or listener so far.
    pub(crate) fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Applies every event posted so far, then stops the thread.
    ///
    /// Joins unless called from the delivery thread itself.
    pub(crate) fn shutdown(&self) {
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(handle) = handle else {
            return;
        };

        self.sender.post(DeliveryEvent::Shutdown);
        if handle.thread().id() != thread::current().id() {
            let _ = handle.join();
        }
        info!("Delivery loop stopped");
    }
}

impl Drop for DeliveryLoop {
    fn drop(&mut self) {
        self.sender.post(DeliveryEvent::Shutdown);
    }
}

fn run_loop(
    mut rx: mpsc::UnboundedReceiver<DeliveryEvent>,
    task_manager: &TaskManager,
    delivered: &AtomicU64,
) {
    while let Some(event) = rx.blocking_recv() {
        if matches!(event, DeliveryEvent::Shutdown) {
            break;
        }

        let name = event.name();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            apply(event, task_manager, delivered);
        }));
        if outcome.is_err() {
            error!(event = name, "Delivery callback panicked; continuing");
        }
    }
    debug!("Delivery loop exited");
}

fn apply(event: DeliveryEvent, task_manager: &TaskManager, delivered: &AtomicU64) {
    match event {
        DeliveryEvent::Started { recipient } => {
            if let Some(listener) = live_listener(&recipient, task_manager) {
                listener.on_start();
            }
        }
        DeliveryEvent::Progress {
            recipient,
            read,
            total,
        } => {
            if let Some(listener) = live_listener(&recipient, task_manager) {
                listener.on_progress(read, total);
            }
        }
        DeliveryEvent::Loaded { recipient, asset } => {
            if !admit(&recipient, task_manager) {
                return;
            }
            if let Some(target) = recipient.target.as_ref() {
                target.deliver(Arc::clone(&asset));
                if asset.is_animated() {
                    target.start_animation(&asset);
                }
            }
            if let Some(listener) = recipient.listener.as_ref() {
                listener.on_complete(&asset);
            }
            delivered.fetch_add(1, Ordering::Relaxed);
            recipient.future.transition(LoadStatus::Completed);
            trace!(task_id = %recipient.task.id(), "Delivered");
        }
        DeliveryEvent::Failed { recipient, error } => {
            if !admit(&recipient, task_manager) {
                return;
            }
            if let Some(listener) = recipient.listener.as_ref() {
                listener.on_failed(&error);
            }
            recipient.future.transition(LoadStatus::Failed(error));
        }
        DeliveryEvent::Cancelled { recipient } => {
            if let Some(listener) = recipient.listener.as_ref() {
                listener.on_cancelled();
            }
        }
        DeliveryEvent::Shutdown => {}
    }
}

fn live_listener<'a>(
    recipient: &'a Recipient,
    task_manager: &TaskManager,
) -> Option<&'a Arc<dyn LoadListener>> {
    if recipient.future.is_cancelled() || task_manager.is_stale(&recipient.task) {
        return None;
    }
    recipient.listener.as_ref()
}

/// Final gate before a terminal result reaches the target.
fn admit(recipient: &Recipient, task_manager: &TaskManager) -> bool {
    if recipient.future.is_cancelled() {
        trace!(task_id = %recipient.task.id(), "Dropping result of cancelled load");
        return false;
    }
    if task_manager.interrupt_display(&recipient.task) {
        recipient.future.transition(LoadStatus::Superseded);
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheKey;
    use crate::queue::Priority;
    use crate::source::Locator;
    use crate::task::SlotId;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Recorder {
        events: StdMutex<Vec<String>>,
    }

    impl LoadListener for Recorder {
        fn on_start(&self) {
            self.events.lock().unwrap().push("start".into());
        }
        fn on_complete(&self, _asset: &Arc<Asset>) {
            self.events.lock().unwrap().push("complete".into());
        }
        fn on_failed(&self, error: &LoadError) {
            self.events.lock().unwrap().push(format!("failed:{}", error.kind()));
        }
        fn on_cancelled(&self) {
            self.events.lock().unwrap().push("cancelled".into());
        }
    }

    fn recipient(manager: &TaskManager, slot: u64, listener: Arc<Recorder>) -> Arc<Recipient> {
        let task = manager.create_task(SlotId(slot)).unwrap();
        let future = Arc::new(LoadFuture::new(
            Arc::clone(&task),
            Locator::new("http://host/a"),
            CacheKey::new("k"),
            Priority::Normal,
            false,
        ));
        Arc::new(Recipient {
            task,
            future,
            target: None,
            listener: Some(listener),
        })
    }

    fn asset() -> Arc<Asset> {
        Arc::new(Asset::image(1, 1, vec![1u8, 2, 3, 4]))
    }

    #[test]
    fn test_events_applied_in_post_order() {
        let manager = Arc::new(TaskManager::new());
        let delivery = DeliveryLoop::start(Arc::clone(&manager)).unwrap();
        let listener = Arc::new(Recorder::default());
        let r = recipient(&manager, 1, Arc::clone(&listener));

        let sender = delivery.sender();
        sender.post(DeliveryEvent::Started {
            recipient: Arc::clone(&r),
        });
        sender.post(DeliveryEvent::Loaded {
            recipient: Arc::clone(&r),
            asset: asset(),
        });
        delivery.shutdown();

        assert_eq!(*listener.events.lock().unwrap(), vec!["start", "complete"]);
        assert_eq!(r.future.status(), LoadStatus::Completed);
        assert_eq!(delivery.delivered_count(), 1);
    }

    #[test]
    fn test_stale_result_is_superseded_not_delivered() {
        let manager = Arc::new(TaskManager::new());
        let delivery = DeliveryLoop::start(Arc::clone(&manager)).unwrap();
        let listener = Arc::new(Recorder::default());
        let older = recipient(&manager, 7, Arc::clone(&listener));
        let _newer = manager.create_task(SlotId(7)).unwrap();

        delivery.sender().post(DeliveryEvent::Failed {
            recipient: Arc::clone(&older),
            error: LoadError::NotFound("a".into()),
        });
        delivery.shutdown();

        assert!(listener.events.lock().unwrap().is_empty());
        assert_eq!(older.future.status(), LoadStatus::Superseded);
    }

    #[test]
    fn test_cancelled_future_drops_result() {
        let manager = Arc::new(TaskManager::new());
        let delivery = DeliveryLoop::start(Arc::clone(&manager)).unwrap();
        let listener = Arc::new(Recorder::default());
        let r = recipient(&manager, 2, Arc::clone(&listener));
        r.future.cancel();

        let sender = delivery.sender();
        sender.post(DeliveryEvent::Cancelled {
            recipient: Arc::clone(&r),
        });
        sender.post(DeliveryEvent::Loaded {
            recipient: Arc::clone(&r),
            asset: asset(),
        });
        delivery.shutdown();

        assert_eq!(*listener.events.lock().unwrap(), vec!["cancelled"]);
        assert_eq!(r.future.status(), LoadStatus::Cancelled);
    }

    #[test]
    fn test_post_after_shutdown_is_dropped() {
        let manager = Arc::new(TaskManager::new());
        let delivery = DeliveryLoop::start(Arc::clone(&manager)).unwrap();
        let sender = delivery.sender();
        delivery.shutdown();
        delivery.shutdown();

        let listener = Arc::new(Recorder::default());
        sender.post(DeliveryEvent::Started {
            recipient: recipient(&manager, 3, Arc::clone(&listener)),
        });
        assert!(listener.events.lock().unwrap().is_empty());
    }
}
