//! Engine lifecycle state and the pause gate.

use std::fmt;
use std::sync::{Condvar, Mutex};
use std::time::Duration;
use tracing::info;

/// Lifecycle of a [`SlotLoader`](super::SlotLoader).
///
/// ```text
/// Running ──pause()──► PauseRequested ──(next dispatch)──► Paused
///    ▲                        │                              │
///    └────────resume()────────┴──────────────────────────────┘
///
/// any ──terminate()──► Terminated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Running,
    /// Pause was requested; the dispatcher has not reached it yet.
    PauseRequested,
    /// The dispatcher is parked on the freezer.
    Paused,
    Terminated,
}

impl EngineState {
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::PauseRequested => write!(f, "PauseRequested"),
            Self::Paused => write!(f, "Paused"),
            Self::Terminated => write!(f, "Terminated"),
        }
    }
}

/// Resettable blocking gate.
///
/// While frozen, [`wait`](Self::wait) blocks. [`release`](Self::release)
/// wakes every waiter and leaves the gate open until the next
/// [`freeze`](Self::freeze).
#[derive(Debug, Default)]
pub struct Freezer {
    frozen: Mutex<bool>,
    thawed: Condvar,
}

impl Freezer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn freeze(&self) {
        *self.frozen.lock().unwrap_or_else(|e| e.into_inner()) = true;
    }

    pub fn release(&self) {
        *self.frozen.lock().unwrap_or_else(|e| e.into_inner()) = false;
        self.thawed.notify_all();
    }

    pub fn is_frozen(&self) -> bool {
        *self.frozen.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Blocks until the gate is open.
    pub fn wait(&self) {
        let mut frozen = self.frozen.lock().unwrap_or_else(|e| e.into_inner());
        while *frozen {
            frozen = self
                .thawed
                .wait(frozen)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Blocks until the gate is open or `timeout` elapses. Returns true if
    /// the gate is open.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let frozen = self.frozen.lock().unwrap_or_else(|e| e.into_inner());
        let (frozen, _) = self
            .thawed
            .wait_timeout_while(frozen, timeout, |frozen| *frozen)
            .unwrap_or_else(|e| e.into_inner());
        !*frozen
    }
}

/// Engine state plus the freezer the dispatcher parks on.
#[derive(Debug, Default)]
pub(crate) struct StateGate {
    state: Mutex<EngineState>,
    freezer: Freezer,
}

impl StateGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self) -> EngineState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Running → PauseRequested. Returns false if the engine was not
    /// running.
    pub(crate) fn request_pause(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state != EngineState::Running {
            return false;
        }
        self.freezer.freeze();
        *state = EngineState::PauseRequested;
        true
    }

    /// PauseRequested | Paused → Running. Returns false if there was no
    /// pause to lift.
    pub(crate) fn resume(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !matches!(*state, EngineState::PauseRequested | EngineState::Paused) {
            return false;
        }
        *state = EngineState::Running;
        self.freezer.release();
        true
    }

    /// Moves to Terminated and opens the freezer. Returns false if already
    /// terminated.
    pub(crate) fn terminate(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.is_terminated() {
            return false;
        }
        *state = EngineState::Terminated;
        self.freezer.release();
        true
    }

    /// Called by the dispatcher before each submission.
    ///
    /// Parks on the freezer when a pause is pending and returns once the
    /// engine runs again. Returns false if the engine is terminated.
    pub(crate) fn await_running(&self) -> bool {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match *state {
                EngineState::Running => return true,
                EngineState::Terminated => return false,
                EngineState::PauseRequested => *state = EngineState::Paused,
                EngineState::Paused => {}
            }
        }

        info!("Dispatcher paused");
        self.freezer.wait();
        let resumed = !self.get().is_terminated();
        if resumed {
            info!("Dispatcher resumed");
        }
        resumed
    }
}
