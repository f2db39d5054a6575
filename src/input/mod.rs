//! Button input
//!
//! Provides:
//! - `ButtonEvent` and `Edge` types shared with the dispatcher
//! - A per-pin `Debouncer`
//! - `GpioButtons`, sysfs GPIO edge pollers feeding a bounded channel

pub mod event;
pub mod gpio;

pub use event::{ButtonEvent, Edge, Pull};
pub use gpio::GpioButtons;
