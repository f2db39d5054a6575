//! Button events and debouncing

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Signal edge that marks a press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Rising,
    Falling,
}

impl Edge {
    pub fn as_str(self) -> &'static str {
        match self {
            Edge::Rising => "rising",
            Edge::Falling => "falling",
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal pull resistor on a button line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pull {
    /// Buttons switch to ground (stock PiTFT wiring)
    Up,
    Down,
    Off,
}

impl Pull {
    /// `pinctrl`/`raspi-gpio` pull argument
    pub fn flag(self) -> &'static str {
        match self {
            Pull::Up => "pu",
            Pull::Down => "pd",
            Pull::Off => "pn",
        }
    }
}

/// One debounced button press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    /// BCM pin number (without any chip base offset)
    pub pin: u32,
    pub edge: Edge,
}

impl ButtonEvent {
    pub fn new(pin: u32, edge: Edge) -> Self {
        Self { pin, edge }
    }
}

/// Coalesces transitions that arrive within a fixed window on the same pin
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last_accepted: HashMap<u32, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: HashMap::new(),
        }
    }

    /// Returns true if a transition on `pin` at `now` is a new press
    pub fn accept(&mut self, pin: u32, now: Instant) -> bool {
        match self.last_accepted.get(&pin) {
            Some(last) if now.saturating_duration_since(*last) < self.window => false,
            _ => {
                self.last_accepted.insert(pin, now);
                true
            }
        }
    }
}
