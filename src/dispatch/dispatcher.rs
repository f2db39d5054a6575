//! Dispatcher state machine

use crate::actions::{self, Action, ActionContext, ActionError};
use crate::config::Config;
use crate::device::{Backlight, Console, ProcessController};
use crate::input::ButtonEvent;
use crate::net::Fetcher;
use colored::Colorize;
use tokio::sync::mpsc::Receiver;

/// Presses buffered between the button poller and the dispatcher
pub const EVENT_QUEUE_DEPTH: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Idle,
    Busy(Action),
}

/// What a single press led to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Another action was running
    Dropped { active: Action },
    /// No button is wired to this pin
    Unmapped { pin: u32 },
    /// The backlight was off; it was turned on instead of running `requested`
    WokeDisplay { requested: Action },
    Completed(Action),
    Failed(Action),
}

pub struct Dispatcher<P, F> {
    config: Config,
    backlight: Backlight,
    console: Console,
    process: P,
    fetcher: F,
    state: DispatcherState,
}

impl<P, F> Dispatcher<P, F>
where
    P: ProcessController,
    F: Fetcher,
{
    pub fn new(config: Config, process: P, fetcher: F) -> Self {
        Self {
            backlight: Backlight::new(&config.paths.backlight),
            console: Console::new(&config.paths.console),
            config,
            process,
            fetcher,
            state: DispatcherState::Idle,
        }
    }

    /// Handle one press. Always ends Idle, whatever the action did.
    pub async fn on_event(&mut self, event: ButtonEvent) -> Outcome {
        if let DispatcherState::Busy(active) = self.state {
            log::debug!("GPIO {} ignored, {} is running", event.pin, active);
            return Outcome::Dropped { active };
        }

        let Some(requested) = Action::for_pin(&self.config.buttons, event.pin) else {
            log::debug!("No action wired to GPIO {}", event.pin);
            return Outcome::Unmapped { pin: event.pin };
        };

        let backlight_on = match self.backlight.is_on() {
            Ok(on) => on,
            Err(e) => {
                log::error!("{}: {}", requested, e);
                return Outcome::Failed(requested);
            }
        };

        // With the screen dark, the first press of any button only lights it
        if !backlight_on && requested != Action::ToggleBacklight {
            return match self.backlight.set(true) {
                Ok(()) => {
                    log::info!("Display woken, {} not run", requested);
                    Outcome::WokeDisplay { requested }
                }
                Err(e) => {
                    log::error!("Waking display for {} failed: {}", requested, e);
                    Outcome::Failed(requested)
                }
            };
        }

        let action = requested;
        log::info!("GPIO {} {} edge, running {}", event.pin, event.edge, action);
        self.state = DispatcherState::Busy(action);
        let result = {
            let ctx = ActionContext {
                config: &self.config,
                backlight: &self.backlight,
                console: &self.console,
                process: &self.process,
                fetcher: &self.fetcher,
            };
            actions::perform(action, &ctx).await
        };
        self.state = DispatcherState::Idle;

        match result {
            Ok(()) => {
                log::info!("{} finished", action);
                Outcome::Completed(action)
            }
            Err(e) => {
                log::error!("{} failed: {}", action, e);
                self.report_failure(action, &e);
                Outcome::Failed(action)
            }
        }
    }

    /// Consume presses until every sender is gone
    pub async fn run(&mut self, events: &mut Receiver<ButtonEvent>) {
        while let Some(event) = events.recv().await {
            let outcome = self.on_event(event).await;
            log::debug!("GPIO {} -> {:?}", event.pin, outcome);

            // Anything queued now was pressed while the action ran
            let mut dropped = 0;
            while events.try_recv().is_ok() {
                dropped += 1;
            }
            if dropped > 0 {
                log::info!("Dropped {} press(es) received while busy", dropped);
            }
        }

        log::info!("Button source closed, dispatcher stopping");
    }

    /// Best-effort error line on the console
    fn report_failure(&self, action: Action, error: &ActionError) {
        // Toggling never owns the console, so leave the screen to PADD
        if action == Action::ToggleBacklight {
            return;
        }

        let line = format!("[ERR] {}: {}", action, error);
        let written = self
            .console
            .open()
            .and_then(|mut tty| tty.line(&line.red().to_string()));

        if let Err(e) = written {
            log::debug!("Could not report failure on console: {}", e);
        }
    }
}
