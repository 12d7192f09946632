//! Priority request queue and its dispatcher.
//!
//! ```text
//!   push(item, priority)
//!          │
//!          ▼
//!  ┌────────────────────────────┐
//!  │ RequestQueue               │
//!  │  HIGH   [PriorityDeque]    │  poll(high timeout)
//!  │  NORMAL [PriorityDeque]    │  poll(normal timeout)
//!  │  LOW    [PriorityDeque]    │  poll(low timeout)
//!  └─────────────┬──────────────┘
//!                │ next()
//!                ▼
//!     Dispatcher thread ──► RequestHandler::handle_request(item)
//! ```

mod deque;
mod dispatcher;
mod priority;
mod request_queue;

pub use deque::PriorityDeque;
pub use dispatcher::{Dispatcher, RequestHandler};
pub use priority::{
    PollTimeouts, Priority, QueuePolicy, DEFAULT_HIGH_POLL_TIMEOUT, DEFAULT_LOW_POLL_TIMEOUT,
    DEFAULT_NORMAL_POLL_TIMEOUT,
};
pub use request_queue::{IdleCallback, RequestQueue};
