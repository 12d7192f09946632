//! Priority-ordered request queue with per-class timeout fallthrough.

use super::deque::PriorityDeque;
use super::priority::{PollTimeouts, Priority, QueuePolicy};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Callback invoked when the queue goes idle.
pub type IdleCallback = Arc<dyn Fn() + Send + Sync>;

/// Composes one [`PriorityDeque`] per priority class.
///
/// # Draining
///
/// [`next`](Self::next) first takes the head of the highest non-empty class
/// without waiting. If every class is empty it enters the blocking phase:
/// each class is polled in priority order with its own timeout, demoting to
/// the next class when the timeout elapses. A full cycle with nothing found
/// fires the idle callback (once per idle transition) and starts over.
///
/// # Deactivation
///
/// After [`deactivate`](Self::deactivate), `add` rejects items and no more
/// idle signals fire. A blocked `next` returns `None` at the end of its
/// current cycle, so consumers unblock within the sum of the class timeouts.
pub struct RequestQueue<T> {
    deques: [PriorityDeque<T>; 3],
    timeouts: PollTimeouts,
    active: AtomicBool,
    idle: AtomicBool,
    idle_callback: Mutex<Option<IdleCallback>>,
}

impl<T> RequestQueue<T> {
    pub fn new(policy: QueuePolicy, timeouts: PollTimeouts) -> Self {
        Self {
            deques: [
                PriorityDeque::new(policy),
                PriorityDeque::new(policy),
                PriorityDeque::new(policy),
            ],
            timeouts,
            active: AtomicBool::new(true),
            idle: AtomicBool::new(false),
            idle_callback: Mutex::new(None),
        }
    }

    /// Installs the callback fired when the queue transitions to idle.
    pub fn set_idle_callback(&self, callback: IdleCallback) {
        *self.idle_callback.lock().unwrap_or_else(|e| e.into_inner()) = Some(callback);
    }

    /// Enqueues an item in its priority class.
    ///
    /// Returns the item back as `Err` when the queue has been deactivated.
    pub fn add(&self, item: T, priority: Priority) -> Result<(), T> {
        if !self.is_active() {
            return Err(item);
        }
        self.idle.store(false, Ordering::Release);
        self.deques[priority.index()].push(item);
        Ok(())
    }

    /// Blocks until an item is available, returning the highest-priority one.
    ///
    /// Returns `None` only once the queue has been deactivated and a full
    /// poll cycle came up empty.
    pub fn next(&self) -> Option<T> {
        loop {
            for priority in Priority::DRAIN_ORDER {
                if let Some(item) = self.deques[priority.index()].try_pop() {
                    return Some(item);
                }
            }

            for priority in Priority::DRAIN_ORDER {
                let timeout = self.timeouts.for_priority(priority);
                if let Some(item) = self.deques[priority.index()].poll(timeout) {
                    return Some(item);
                }
            }

            if !self.is_active() {
                return None;
            }

            if !self.idle.swap(true, Ordering::AcqRel) {
                self.signal_idle();
            }
        }
    }

    fn signal_idle(&self) {
        let callback = self
            .idle_callback
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Stops accepting items and suppresses further idle signals.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Returns true once a full empty poll cycle has completed since the
    /// last `add`.
    pub fn is_idle(&self) -> bool {
        self.idle.load(Ordering::Acquire)
    }

    /// Number of queued items in one class.
    pub fn pending_in(&self, priority: Priority) -> usize {
        self.deques[priority.index()].len()
    }

    /// Number of queued items across all classes.
    pub fn pending(&self) -> usize {
        self.deques.iter().map(PriorityDeque::len).sum()
    }

    /// Removes every queued item, highest priority first.
    pub fn drain(&self) -> Vec<T> {
        Priority::DRAIN_ORDER
            .iter()
            .flat_map(|p| self.deques[p.index()].drain())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::{Duration, Instant};

    fn fast_timeouts() -> PollTimeouts {
        PollTimeouts {
            high: Duration::from_millis(5),
            normal: Duration::from_millis(5),
            low: Duration::from_millis(5),
        }
    }

    fn queue(policy: QueuePolicy) -> RequestQueue<u32> {
        RequestQueue::new(policy, fast_timeouts())
    }

    #[test]
    fn test_higher_priority_drains_first() {
        let q = queue(QueuePolicy::Fifo);
        q.add(1, Priority::Low).unwrap();
        q.add(2, Priority::Normal).unwrap();
        q.add(3, Priority::High).unwrap();

        assert_eq!(q.next(), Some(3));
        assert_eq!(q.next(), Some(2));
        assert_eq!(q.next(), Some(1));
    }

    #[test]
    fn test_lifo_within_class() {
        let q = queue(QueuePolicy::Lifo);
        q.add(1, Priority::Normal).unwrap();
        q.add(2, Priority::Normal).unwrap();
        assert_eq!(q.next(), Some(2));
        assert_eq!(q.next(), Some(1));
    }

    #[test]
    fn test_add_after_deactivate_is_rejected() {
        let q = queue(QueuePolicy::Fifo);
        q.deactivate();
        assert_eq!(q.add(7, Priority::High), Err(7));
        assert_eq!(q.pending(), 0);
    }

    #[test]
    fn test_next_returns_none_after_deactivate() {
        let q = Arc::new(queue(QueuePolicy::Fifo));
        let consumer = Arc::clone(&q);
        let handle = thread::spawn(move || consumer.next());

        thread::sleep(Duration::from_millis(20));
        q.deactivate();

        assert_eq!(handle.join().unwrap(), None);
    }

    #[test]
    fn test_items_queued_before_deactivate_still_drain() {
        let q = queue(QueuePolicy::Fifo);
        q.add(5, Priority::Low).unwrap();
        q.deactivate();
        assert_eq!(q.next(), Some(5));
        assert_eq!(q.next(), None);
    }

    #[test]
    fn test_idle_fires_once_per_transition() {
        let q = Arc::new(queue(QueuePolicy::Fifo));
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        q.set_idle_callback(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let consumer = Arc::clone(&q);
        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            while let Some(item) = consumer.next() {
                seen.push(item);
            }
            seen
        });

        // Several empty cycles, one idle transition
        thread::sleep(Duration::from_millis(60));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(q.is_idle());

        // New work resets the idle state, next empty stretch signals again
        q.add(1, Priority::Normal).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while count.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(count.load(Ordering::SeqCst), 2);

        q.deactivate();
        assert_eq!(handle.join().unwrap(), vec![1]);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_drain_returns_all_classes() {
        let q = queue(QueuePolicy::Fifo);
        q.add(1, Priority::Low).unwrap();
        q.add(2, Priority::High).unwrap();
        assert_eq!(q.pending_in(Priority::High), 1);
        assert_eq!(q.drain(), vec![2, 1]);
        assert_eq!(q.pending(), 0);
    }

    fn priority_strategy() -> impl Strategy<Value = Priority> {
        prop_oneof![
            Just(Priority::High),
            Just(Priority::Normal),
            Just(Priority::Low),
        ]
    }

    proptest! {
        /// Property: with everything queued up front, items come out in
        /// non-increasing priority order.
        #[test]
        fn prop_drain_order_is_priority_descending(
            priorities in proptest::collection::vec(priority_strategy(), 1..40)
        ) {
            let q: RequestQueue<Priority> = RequestQueue::new(QueuePolicy::Fifo, fast_timeouts());
            for p in &priorities {
                q.add(*p, *p).unwrap();
            }

            let mut out = Vec::new();
            for _ in 0..priorities.len() {
                out.push(q.next().unwrap());
            }

            prop_assert!(out.windows(2).all(|w| w[0] >= w[1]));
        }
    }
}
