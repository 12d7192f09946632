//! Single-threaded draining loop over a [`RequestQueue`].

use super::priority::Priority;
use super::request_queue::RequestQueue;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Receives each request drained by a [`Dispatcher`].
pub trait RequestHandler<T>: Send + Sync {
    /// Handles one drained request.
    ///
    /// The return value is advisory: `true` means the handler passed the
    /// request on for execution, `false` that it was dropped.
    fn handle_request(&self, request: T) -> bool;
}

/// Owns one background thread that drains a queue into a handler.
///
/// The loop runs until [`terminate`](Self::terminate), which deactivates the
/// queue. A handler that panics is logged and the loop keeps going; anything
/// it was holding is dropped.
pub struct Dispatcher<T> {
    name: String,
    queue: Arc<RequestQueue<T>>,
    terminated: Arc<AtomicBool>,
    handled: Arc<AtomicU64>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> Dispatcher<T> {
    /// Spawns the draining thread.
    pub fn start(
        name: impl Into<String>,
        queue: Arc<RequestQueue<T>>,
        handler: Arc<dyn RequestHandler<T>>,
    ) -> io::Result<Self> {
        let name = name.into();
        let terminated = Arc::new(AtomicBool::new(false));
        let handled = Arc::new(AtomicU64::new(0));

        let loop_queue = Arc::clone(&queue);
        let loop_terminated = Arc::clone(&terminated);
        let loop_handled = Arc::clone(&handled);
        let loop_name = name.clone();

        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            Self::run_loop(
                &loop_name,
                &loop_queue,
                handler.as_ref(),
                &loop_terminated,
                &loop_handled,
            );
        })?;

        info!(dispatcher = %name, "Dispatcher started");

        Ok(Self {
            name,
            queue,
            terminated,
            handled,
            thread: Mutex::new(Some(handle)),
        })
    }

    fn run_loop(
        name: &str,
        queue: &RequestQueue<T>,
        handler: &dyn RequestHandler<T>,
        terminated: &AtomicBool,
        handled: &AtomicU64,
    ) {
        while !terminated.load(Ordering::Acquire) {
            let Some(request) = queue.next() else {
                break;
            };

            if terminated.load(Ordering::Acquire) {
                debug!(dispatcher = %name, "Dropping request drained after terminate");
                break;
            }

            handled.fetch_add(1, Ordering::Relaxed);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.handle_request(request)));

            if outcome.is_err() {
                error!(dispatcher = %name, "Request handler panicked; continuing");
            }
        }

        debug!(dispatcher = %name, "Dispatcher loop exited");
    }
}

impl<T> Dispatcher<T> {
    /// Enqueues a request at the given priority.
    ///
    /// Returns the request back when the dispatcher has been terminated.
    pub fn push(&self, request: T, priority: Priority) -> Result<(), T> {
        self.queue.add(request, priority)
    }

    /// Enqueues a request at [`Priority::Normal`].
    pub fn push_normal(&self, request: T) -> Result<(), T> {
        self.push(request, Priority::Normal)
    }

    pub fn queue(&self) -> &Arc<RequestQueue<T>> {
        &self.queue
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of requests handed to the handler so far.
    pub fn handled_count(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Stops the loop and deactivates the queue.
    ///
    /// Joins the draining thread unless called from it. Queued requests that
    /// were never drained are left in the queue for the owner to discard.
    pub fn terminate(&self) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        self.queue.deactivate();

        let handle = self
            .thread
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }

        info!(dispatcher = %self.name, "Dispatcher terminated");
    }
}

impl<T> Drop for Dispatcher<T> {
    fn drop(&mut self) {
        self.terminated.store(true, Ordering::Release);
        self.queue.deactivate();
    }
}
