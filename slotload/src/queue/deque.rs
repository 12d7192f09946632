//! Blocking double-ended queue for a single priority class.

use super::priority::QueuePolicy;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// One priority class worth of pending requests.
///
/// Insertion honours the configured [`QueuePolicy`]; removal always takes
/// from the head. Consumers block in [`poll`](Self::poll) for at most the
/// given timeout.
pub struct PriorityDeque<T> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
    policy: QueuePolicy,
}

impl<T> PriorityDeque<T> {
    pub fn new(policy: QueuePolicy) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            policy,
        }
    }

    pub fn policy(&self) -> QueuePolicy {
        self.policy
    }

    /// Inserts an item per policy and wakes one waiting consumer.
    pub fn push(&self, item: T) {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        match self.policy {
            QueuePolicy::Fifo => items.push_back(item),
            QueuePolicy::Lifo => items.push_front(item),
        }
        drop(items);
        self.available.notify_one();
    }

    /// Removes the head item without waiting.
    pub fn try_pop(&self) -> Option<T> {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }

    /// Removes the head item, waiting up to `timeout` for one to arrive.
    pub fn poll(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());

        loop {
            if let Some(item) = items.pop_front() {
                return Some(item);
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }

            let (guard, _) = self
                .available
                .wait_timeout(items, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            items = guard;
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every queued item and returns them.
    pub fn drain(&self) -> Vec<T> {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_drains_oldest_first() {
        let deque = PriorityDeque::new(QueuePolicy::Fifo);
        deque.push(1);
        deque.push(2);
        deque.push(3);
        assert_eq!(deque.try_pop(), Some(1));
        assert_eq!(deque.try_pop(), Some(2));
        assert_eq!(deque.try_pop(), Some(3));
        assert_eq!(deque.try_pop(), None);
    }

    #[test]
    fn test_lifo_drains_newest_first() {
        let deque = PriorityDeque::new(QueuePolicy::Lifo);
        deque.push(1);
        deque.push(2);
        deque.push(3);
        assert_eq!(deque.try_pop(), Some(3));
        assert_eq!(deque.try_pop(), Some(2));
        assert_eq!(deque.try_pop(), Some(1));
    }

    #[test]
    fn test_poll_times_out_when_empty() {
        let deque: PriorityDeque<u32> = PriorityDeque::new(QueuePolicy::Fifo);
        let start = Instant::now();
        assert_eq!(deque.poll(Duration::from_millis(20)), None);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_poll_wakes_on_push() {
        let deque = Arc::new(PriorityDeque::new(QueuePolicy::Fifo));
        let producer = Arc::clone(&deque);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            producer.push(42);
        });

        assert_eq!(deque.poll(Duration::from_secs(5)), Some(42));
        handle.join().unwrap();
    }

    #[test]
    fn test_drain_empties_deque() {
        let deque = PriorityDeque::new(QueuePolicy::Fifo);
        deque.push("a");
        deque.push("b");
        assert_eq!(deque.len(), 2);
        assert_eq!(deque.drain(), vec!["a", "b"]);
        assert!(deque.is_empty());
    }
}
