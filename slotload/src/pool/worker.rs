//! Fixed-size pool of named worker threads.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

/// How long an idle worker waits for work before re-checking shutdown.
const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A unit of work run on a pool thread.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Errors from submitting work to a pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Worker pool '{0}' has been shut down")]
    Shutdown(String),

    #[error("Failed to spawn worker thread for pool '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Counters shared between the pool handle and its workers.
#[derive(Debug, Default)]
struct PoolCounters {
    active: AtomicUsize,
    peak_active: AtomicUsize,
    queued: AtomicUsize,
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// A bounded pool of worker threads fed from an unbounded job queue.
///
/// At most `max_threads` jobs run at once; the rest wait in submission
/// order. [`is_saturated`](Self::is_saturated) reports when every worker is
/// busy, which is what the executor selection uses to divert fast work to
/// a fallback pool.
pub struct WorkerPool {
    name: String,
    max_threads: usize,
    sender: Mutex<Option<Sender<Job>>>,
    counters: Arc<PoolCounters>,
    shutdown: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawns `threads` workers (at least one) named `{name}-{i}`.
    pub fn new(name: impl Into<String>, threads: usize) -> Result<Self, PoolError> {
        let name = name.into();
        let max_threads = threads.max(1);
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let counters = Arc::new(PoolCounters::default());
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(max_threads);
        for i in 0..max_threads {
            let receiver = Arc::clone(&receiver);
            let counters = Arc::clone(&counters);
            let shutdown = Arc::clone(&shutdown);
            let worker_name = format!("{}-{}", name, i);

            let handle = thread::Builder::new()
                .name(worker_name.clone())
                .spawn(move || Self::worker_loop(&worker_name, &receiver, &counters, &shutdown))
                .map_err(|source| PoolError::Spawn {
                    name: name.clone(),
                    source,
                })?;
            workers.push(handle);
        }

        info!(pool = %name, threads = max_threads, "Worker pool started");

        Ok(Self {
            name,
            max_threads,
            sender: Mutex::new(Some(sender)),
            counters,
            shutdown,
            workers: Mutex::new(workers),
        })
    }

    fn worker_loop(
        name: &str,
        receiver: &Mutex<Receiver<Job>>,
        counters: &PoolCounters,
        shutdown: &AtomicBool,
    ) {
        loop {
            let next = {
                let receiver = receiver.lock().unwrap_or_else(|e| e.into_inner());
                receiver.recv_timeout(WORKER_POLL_INTERVAL)
            };

            let job = match next {
                Ok(job) => job,
                Err(RecvTimeoutError::Timeout) => {
                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            };

            counters.queued.fetch_sub(1, Ordering::AcqRel);
            let active = counters.active.fetch_add(1, Ordering::AcqRel) + 1;
            counters.peak_active.fetch_max(active, Ordering::AcqRel);

            if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                counters.panicked.fetch_add(1, Ordering::Relaxed);
                error!(worker = %name, "Job panicked on worker thread");
            }

            counters.active.fetch_sub(1, Ordering::AcqRel);
            counters.completed.fetch_add(1, Ordering::Relaxed);
        }

        debug!(worker = %name, "Worker exited");
    }

    /// Queues a job for execution.
    pub fn execute(&self, job: Job) -> Result<(), PoolError> {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = sender.as_ref() else {
            return Err(PoolError::Shutdown(self.name.clone()));
        };

        self.counters.queued.fetch_add(1, Ordering::AcqRel);
        if sender.send(job).is_err() {
            self.counters.queued.fetch_sub(1, Ordering::AcqRel);
            return Err(PoolError::Shutdown(self.name.clone()));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Number of jobs currently running.
    pub fn active_count(&self) -> usize {
        self.counters.active.load(Ordering::Acquire)
    }

    /// True when every worker is busy.
    pub fn is_saturated(&self) -> bool {
        self.active_count() >= self.max_threads
    }

    /// Number of jobs submitted but not yet picked up by a worker.
    pub fn queued_count(&self) -> usize {
        self.counters.queued.load(Ordering::Acquire)
    }

    pub fn peak_active(&self) -> usize {
        self.counters.peak_active.load(Ordering::Acquire)
    }

    pub fn completed_count(&self) -> u64 {
        self.counters.completed.load(Ordering::Relaxed)
    }

    pub fn panicked_count(&self) -> u64 {
        self.counters.panicked.load(Ordering::Relaxed)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Stops accepting jobs. Already queued jobs still run; workers exit
    /// once the queue is empty.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        info!(pool = %self.name, "Worker pool shutting down");
    }

    /// Shuts down and waits for the workers to exit.
    ///
    /// A worker calling this on its own pool skips joining itself.
    pub fn join(&self) {
        self.shutdown();
        let workers: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        let current = thread::current().id();
        for handle in workers {
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("max_threads", &self.max_threads)
            .field("active", &self.active_count())
            .field("queued", &self.queued_count())
            .finish()
    }
}
