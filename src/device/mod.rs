//! Shared devices and the foreign display process
//!
//! This module provides:
//! - The backlight brightness attribute
//! - The console character device the display process also writes to
//! - Signal-based control of the display process via its PID file

pub mod backlight;
pub mod console;
pub mod process;

pub use backlight::{Backlight, BacklightError};
pub use console::{Console, ConsoleError};
pub use process::{PidFileProcess, ProcessController, ProcessError};
