//! Sysfs GPIO button source
//!
//! Arms each button line for edge interrupts through the kernel's sysfs GPIO
//! interface and waits on each one from its own thread. Accepted presses are
//! pushed into the dispatcher channel without blocking; a full channel means
//! the dispatcher is busy and the press is dropped.

use super::event::{ButtonEvent, Debouncer, Edge};
use crate::config::ButtonSettings;
use std::io;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use sysfs_gpio::{Direction, Pin, PinPoller};
use thiserror::Error;
use tokio::sync::mpsc::{error::TrySendError, Sender};

/// How long a wait lasts before re-checking the running flag
const POLL_TIMEOUT_MS: isize = 200;

/// udev may need a moment to create `gpioN/` after an export
const EXPORT_RETRIES: u32 = 20;
const EXPORT_RETRY_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum GpioError {
    #[error("failed to export GPIO line {line}: {source}")]
    Export {
        line: u32,
        source: sysfs_gpio::Error,
    },

    #[error("GPIO line {line} did not appear after export")]
    NotExported { line: u32 },

    #[error("failed to configure {attribute} of GPIO line {line}: {source}")]
    Configure {
        line: u32,
        attribute: &'static str,
        source: sysfs_gpio::Error,
    },

    #[error("failed to set pull on GPIO {pin} with `{command}`: {reason}")]
    Pull {
        pin: u32,
        command: String,
        reason: String,
    },

    #[error("button poller is already running")]
    AlreadyStarted,

    #[error("failed to spawn button poller: {0}")]
    Spawn(io::Error),
}

/// The sysfs operations the button source needs from one line
pub trait InputLine {
    type Poller: EdgePoller + Send + 'static;

    fn is_exported(&self) -> bool;
    fn export(&self) -> sysfs_gpio::Result<()>;
    fn unexport(&self) -> sysfs_gpio::Result<()>;
    fn set_direction(&self, direction: Direction) -> sysfs_gpio::Result<()>;
    fn set_edge(&self, edge: sysfs_gpio::Edge) -> sysfs_gpio::Result<()>;
    fn poller(&self) -> sysfs_gpio::Result<Self::Poller>;
}

/// Blocks until the next interrupt on a line
pub trait EdgePoller {
    /// `Some(value)` on an edge, `None` on timeout
    fn poll(&mut self, timeout_ms: isize) -> sysfs_gpio::Result<Option<u8>>;
}

impl InputLine for Pin {
    type Poller = PinPoller;

    fn is_exported(&self) -> bool {
        Pin::is_exported(self)
    }

    fn export(&self) -> sysfs_gpio::Result<()> {
        Pin::export(self)
    }

    fn unexport(&self) -> sysfs_gpio::Result<()> {
        Pin::unexport(self)
    }

    fn set_direction(&self, direction: Direction) -> sysfs_gpio::Result<()> {
        Pin::set_direction(self, direction)
    }

    fn set_edge(&self, edge: sysfs_gpio::Edge) -> sysfs_gpio::Result<()> {
        Pin::set_edge(self, edge)
    }

    fn poller(&self) -> sysfs_gpio::Result<PinPoller> {
        self.get_poller()
    }
}

impl EdgePoller for PinPoller {
    fn poll(&mut self, timeout_ms: isize) -> sysfs_gpio::Result<Option<u8>> {
        PinPoller::poll(self, timeout_ms)
    }
}

fn sysfs_edge(edge: Edge) -> sysfs_gpio::Edge {
    match edge {
        Edge::Rising => sysfs_gpio::Edge::RisingEdge,
        Edge::Falling => sysfs_gpio::Edge::FallingEdge,
    }
}

/// A line configured for edge interrupts
struct ArmedLine<L> {
    pin: u32,
    line: u32,
    gpio: L,
    /// Only lines we exported are unexported again
    exported_here: bool,
}

/// Armed sysfs GPIO buttons
pub struct GpioButtons<L: InputLine = Pin> {
    edge: Edge,
    debounce: Duration,
    armed: Vec<ArmedLine<L>>,
    running: Arc<AtomicBool>,
    pollers: Vec<JoinHandle<()>>,
}

impl GpioButtons<Pin> {
    /// Export and configure every button pin. Any failure releases the pins
    /// armed so far and is returned, since the daemon cannot run without them.
    pub fn arm(settings: &ButtonSettings) -> Result<Self, GpioError> {
        Self::arm_with(settings, |line| Pin::new(u64::from(line)))
    }
}

impl<L: InputLine> GpioButtons<L> {
    /// Arm using `open` to get a handle on each sysfs line number
    pub fn arm_with(
        settings: &ButtonSettings,
        open: impl Fn(u32) -> L,
    ) -> Result<Self, GpioError> {
        let mut buttons = Self {
            edge: settings.edge,
            debounce: settings.debounce(),
            armed: Vec::new(),
            running: Arc::new(AtomicBool::new(false)),
            pollers: Vec::new(),
        };

        for pin in settings.pins() {
            let line = settings.gpio_base + pin;
            if let Err(e) = buttons.arm_line(settings, pin, line, open(line)) {
                buttons.release();
                return Err(e);
            }
            log::info!("Armed GPIO {} (line {}) on {} edge", pin, line, settings.edge);
        }

        Ok(buttons)
    }

    fn arm_line(
        &mut self,
        settings: &ButtonSettings,
        pin: u32,
        line: u32,
        gpio: L,
    ) -> Result<(), GpioError> {
        let exported_here = !gpio.is_exported();
        if exported_here {
            gpio.export()
                .map_err(|source| GpioError::Export { line, source })?;
            wait_for_export(&gpio, line)?;
        } else {
            log::debug!("GPIO line {} already exported", line);
        }

        let configured = configure_line(&gpio, line, settings.edge);
        self.armed.push(ArmedLine {
            pin,
            line,
            gpio,
            exported_here,
        });
        configured?;

        apply_pull(settings, pin)
    }

    /// Start delivering presses into `events`, one poller thread per line
    pub fn start(&mut self, events: Sender<ButtonEvent>) -> Result<(), GpioError> {
        if !self.pollers.is_empty() {
            return Err(GpioError::AlreadyStarted);
        }
        self.running.store(true, Ordering::SeqCst);

        for armed in &self.armed {
            let poller = armed.gpio.poller().map_err(|source| GpioError::Configure {
                line: armed.line,
                attribute: "value",
                source,
            })?;

            let pin = armed.pin;
            let edge = self.edge;
            let debounce = self.debounce;
            let running = Arc::clone(&self.running);
            let events = events.clone();

            let handle = thread::Builder::new()
                .name(format!("gpio-button-{}", pin))
                .spawn(move || watch_line(poller, pin, edge, debounce, running, events))
                .map_err(GpioError::Spawn)?;
            self.pollers.push(handle);
        }

        Ok(())
    }

    /// Stop the pollers and unexport the lines this process exported
    pub fn release(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        for handle in self.pollers.drain(..) {
            if handle.join().is_err() {
                log::warn!("Button poller panicked");
            }
        }

        for armed in self.armed.drain(..) {
            if !armed.exported_here {
                log::debug!("Leaving GPIO line {} exported", armed.line);
                continue;
            }
            match armed.gpio.unexport() {
                Ok(()) => log::debug!("Released GPIO line {}", armed.line),
                Err(e) => log::warn!("Failed to unexport GPIO line {}: {}", armed.line, e),
            }
        }
    }

    /// Lines exported by this process
    pub fn exported(&self) -> Vec<u32> {
        self.armed
            .iter()
            .filter(|a| a.exported_here)
            .map(|a| a.line)
            .collect()
    }
}

impl<L: InputLine> Drop for GpioButtons<L> {
    fn drop(&mut self) {
        self.release();
    }
}

fn wait_for_export<L: InputLine>(gpio: &L, line: u32) -> Result<(), GpioError> {
    let mut retries = EXPORT_RETRIES;
    while !gpio.is_exported() {
        if retries == 0 {
            return Err(GpioError::NotExported { line });
        }
        retries -= 1;
        thread::sleep(EXPORT_RETRY_DELAY);
    }
    Ok(())
}

fn configure_line<L: InputLine>(gpio: &L, line: u32, edge: Edge) -> Result<(), GpioError> {
    gpio.set_direction(Direction::In)
        .map_err(|source| GpioError::Configure {
            line,
            attribute: "direction",
            source,
        })?;
    gpio.set_edge(sysfs_edge(edge))
        .map_err(|source| GpioError::Configure {
            line,
            attribute: "edge",
            source,
        })
}

/// Sysfs has no pull control, so the configured tool sets it on the BCM pin
fn apply_pull(settings: &ButtonSettings, pin: u32) -> Result<(), GpioError> {
    let Some((program, args)) = settings.pull_command.split_first() else {
        return Ok(());
    };

    let command = format!(
        "{} {} ip {}",
        settings.pull_command.join(" "),
        pin,
        settings.pull.flag()
    );
    let pull_error = |reason: String| GpioError::Pull {
        pin,
        command: command.clone(),
        reason,
    };

    let output = Command::new(program)
        .args(args)
        .arg(pin.to_string())
        .arg("ip")
        .arg(settings.pull.flag())
        .output()
        .map_err(|e| pull_error(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(pull_error(format!("{} {}", output.status, stderr.trim())));
    }

    log::debug!("Pull set: {}", command);
    Ok(())
}

/// What happened to one edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Sent,
    Bounced,
    /// The dispatcher queue was full
    Dropped,
    /// The dispatcher is gone
    Closed,
}

fn deliver(
    debouncer: &mut Debouncer,
    event: ButtonEvent,
    now: Instant,
    events: &Sender<ButtonEvent>,
) -> Delivery {
    if !debouncer.accept(event.pin, now) {
        log::trace!("Bounce on GPIO {}", event.pin);
        return Delivery::Bounced;
    }

    match events.try_send(event) {
        Ok(()) => {
            log::debug!("Press on GPIO {}", event.pin);
            Delivery::Sent
        }
        Err(TrySendError::Full(_)) => {
            log::debug!("Press on GPIO {} dropped, dispatcher busy", event.pin);
            Delivery::Dropped
        }
        Err(TrySendError::Closed(_)) => Delivery::Closed,
    }
}

fn watch_line<P: EdgePoller>(
    mut poller: P,
    pin: u32,
    edge: Edge,
    debounce: Duration,
    running: Arc<AtomicBool>,
    events: Sender<ButtonEvent>,
) {
    let mut debouncer = Debouncer::new(debounce);

    // The first wait returns at once for the line's initial state
    if let Err(e) = poller.poll(0) {
        log::warn!("Initial read of GPIO {} failed: {}", pin, e);
    }

    while running.load(Ordering::SeqCst) {
        match poller.poll(POLL_TIMEOUT_MS) {
            Ok(None) => continue,
            Ok(Some(_)) => {
                let event = ButtonEvent::new(pin, edge);
                if deliver(&mut debouncer, event, Instant::now(), &events) == Delivery::Closed {
                    log::debug!("Dispatcher gone, stopping poller for GPIO {}", pin);
                    return;
                }
            }
            Err(e) => {
                log::error!("Waiting on GPIO {} failed: {}", pin, e);
                return;
            }
        }
    }
}
