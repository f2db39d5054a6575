//! Button dispatcher
//!
//! Maps debounced presses to actions and runs at most one action at a time.
//! Presses that arrive while an action is running are dropped, not queued.

pub mod dispatcher;

pub use dispatcher::{Dispatcher, Outcome, EVENT_QUEUE_DEPTH};
