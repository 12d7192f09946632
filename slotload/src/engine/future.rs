//! Handle to a scheduled load.

use crate::cache::CacheKey;
use crate::error::LoadError;
use crate::queue::Priority;
use crate::source::Locator;
use crate::task::{SlotId, Task, TaskId};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Status of a scheduled load.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadStatus {
    /// Waiting in the request queue.
    #[default]
    Queued,
    /// Decoding on a worker.
    Running,
    /// Delivered to its target and listener.
    Completed,
    /// Decoding failed and the failure was reported.
    Failed(LoadError),
    Cancelled,
    /// A newer request for the same slot (or a bulk clear) made this one
    /// obsolete. Its result, if any, was cached but not delivered.
    Superseded,
}

impl LoadStatus {
    /// Completed, Failed, Cancelled and Superseded are terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued | Self::Running)
    }
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "Queued"),
            Self::Running => write!(f, "Running"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed(e) => write!(f, "Failed ({})", e.kind()),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::Superseded => write!(f, "Superseded"),
        }
    }
}

/// Handle to one scheduled load.
///
/// Shared between the caller, the in-flight registry and the worker running
/// the load. Status moves forward only; the first terminal status wins.
///
/// # Example
///
/// ```ignore
/// if let LoadOutcome::Scheduled(future) = loader.load(request)? {
///     match future.wait().await {
///         LoadStatus::Completed => {}
///         other => eprintln!("load ended as {other}"),
///     }
/// }
/// ```
pub struct LoadFuture {
    task: Arc<Task>,
    locator: Locator,
    key: CacheKey,
    priority: Priority,
    cancel_predecessor: bool,
    token: CancellationToken,
    status: watch::Sender<LoadStatus>,
}

impl LoadFuture {
    pub(crate) fn new(
        task: Arc<Task>,
        locator: Locator,
        key: CacheKey,
        priority: Priority,
        cancel_predecessor: bool,
    ) -> Self {
        let (status, _) = watch::channel(LoadStatus::Queued);
        Self {
            task,
            locator,
            key,
            priority,
            cancel_predecessor,
            token: CancellationToken::new(),
            status,
        }
    }

    /// Cancels the load.
    ///
    /// Returns false if it had already finished or been cancelled. Work that
    /// is already decoding sees the cancellation token fire; its result is
    /// still cached but never delivered.
    pub fn cancel(&self) -> bool {
        if !self.transition(LoadStatus::Cancelled) {
            return false;
        }
        self.token.cancel();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// True once the status is terminal.
    pub fn is_done(&self) -> bool {
        self.status.borrow().is_terminal()
    }

    pub fn status(&self) -> LoadStatus {
        self.status.borrow().clone()
    }

    /// Receiver that observes every status change.
    pub fn subscribe(&self) -> watch::Receiver<LoadStatus> {
        self.status.subscribe()
    }

    /// Waits for a terminal status.
    pub async fn wait(&self) -> LoadStatus {
        let mut rx = self.status.subscribe();
        let result = rx.wait_for(LoadStatus::is_terminal).await.map(|s| s.clone());
        result.unwrap_or_else(|_| self.status())
    }

    /// Moves to `next` unless a terminal status was already reached.
    pub(crate) fn transition(&self, next: LoadStatus) -> bool {
        self.status.send_if_modified(|current| {
            if current.is_terminal() || *current == next {
                return false;
            }
            *current = next;
            true
        })
    }

    pub fn task_id(&self) -> TaskId {
        self.task.id()
    }

    /// `None` for detached loads.
    pub fn slot(&self) -> Option<SlotId> {
        self.task.slot()
    }

    /// The locator as requested, before any disk-cache rewrite.
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn cache_key(&self) -> &CacheKey {
        &self.key
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn cancels_predecessor(&self) -> bool {
        self.cancel_predecessor
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }
}

impl fmt::Debug for LoadFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadFuture")
            .field("task_id", &self.task.id())
            .field("locator", &self.locator)
            .field("priority", &self.priority)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskManager;
    use std::time::Duration;

    fn future() -> Arc<LoadFuture> {
        let manager = TaskManager::new();
        Arc::new(LoadFuture::new(
            manager.create_task(SlotId(1)).unwrap(),
            Locator::new("http://host/a"),
            CacheKey::new("http://host/a#0x0"),
            Priority::Normal,
            false,
        ))
    }

    #[test]
    fn test_status_moves_forward_only() {
        let future = future();
        assert_eq!(future.status(), LoadStatus::Queued);
        assert!(future.transition(LoadStatus::Running));
        assert!(future.transition(LoadStatus::Completed));
        assert!(!future.transition(LoadStatus::Failed(LoadError::Interrupted)));
        assert_eq!(future.status(), LoadStatus::Completed);
        assert!(future.is_done());
    }

    #[test]
    fn test_cancel_fires_token_once() {
        let future = future();
        assert!(future.cancel());
        assert!(future.is_cancelled());
        assert!(future.cancellation_token().is_cancelled());
        assert!(!future.cancel());
        assert_eq!(future.status(), LoadStatus::Cancelled);
    }

    #[test]
    fn test_cancel_after_completion_is_refused() {
        let future = future();
        future.transition(LoadStatus::Completed);
        assert!(!future.cancel());
        assert!(!future.is_cancelled());
    }

    #[tokio::test]
    async fn test_wait_returns_terminal_status() {
        let future = future();
        let worker = Arc::clone(&future);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            worker.transition(LoadStatus::Running);
            worker.transition(LoadStatus::Failed(LoadError::NotFound("a".into())));
        });

        let status = future.wait().await;
        assert_eq!(status, LoadStatus::Failed(LoadError::NotFound("a".into())));
    }

    #[tokio::test]
    async fn test_wait_on_finished_future_returns_immediately() {
        let future = future();
        future.transition(LoadStatus::Superseded);
        assert_eq!(future.wait().await, LoadStatus::Superseded);
    }
}
