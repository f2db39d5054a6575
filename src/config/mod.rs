//! Daemon configuration
//!
//! All device paths, pin assignments and timings live in one TOML file
//! (default `/etc/pi-buttons.toml`). Every field has a default matching the
//! stock PADD + PiTFT setup, so a missing file or a partial file is fine.

pub mod settings;

pub use settings::{ButtonSettings, Config};
