//! Button actions
//!
//! Each action may assume exclusive use of the console and the right to
//! pause the display process for its whole run. Every action leaves the
//! display process running, except `UpdateScript`, which kills it so its
//! supervisor restarts it with the new script.

pub mod help;
pub mod messages;
pub mod update_script;
pub mod update_system;

use crate::config::{ButtonSettings, Config};
use crate::device::{Backlight, BacklightError, Console, ConsoleError, ProcessController, ProcessError};
use crate::net::Fetcher;
use std::fmt;
use std::future::Future;
use std::io;
use thiserror::Error;

/// The four button actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ToggleBacklight,
    UpdateSystem,
    UpdateScript,
    ShowHelp,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::ToggleBacklight,
        Action::UpdateSystem,
        Action::UpdateScript,
        Action::ShowHelp,
    ];

    /// Look up the action wired to `pin`
    pub fn for_pin(buttons: &ButtonSettings, pin: u32) -> Option<Action> {
        Self::ALL.into_iter().find(|a| a.pin(buttons) == pin)
    }

    pub fn pin(self, buttons: &ButtonSettings) -> u32 {
        match self {
            Action::ToggleBacklight => buttons.backlight,
            Action::UpdateSystem => buttons.update_system,
            Action::UpdateScript => buttons.update_script,
            Action::ShowHelp => buttons.help,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::ToggleBacklight => "toggle-backlight",
            Action::UpdateSystem => "update-system",
            Action::UpdateScript => "update-display-script",
            Action::ShowHelp => "show-help",
        }
    }

    /// One-line description for the help overlay
    pub fn description(self) -> &'static str {
        match self {
            Action::ToggleBacklight => "Backlight on/off",
            Action::UpdateSystem => "Update Pi-hole",
            Action::UpdateScript => "Update PADD + restart",
            Action::ShowHelp => "This help",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Console(#[from] ConsoleError),

    #[error(transparent)]
    Backlight(#[from] BacklightError),

    #[error("failed to run updater `{command}`: {source}")]
    Updater { command: String, source: io::Error },
}

/// Everything an action may touch
pub struct ActionContext<'a, P, F> {
    pub config: &'a Config,
    pub backlight: &'a Backlight,
    pub console: &'a Console,
    pub process: &'a P,
    pub fetcher: &'a F,
}

/// Run `action` to completion
pub async fn perform<P, F>(action: Action, ctx: &ActionContext<'_, P, F>) -> Result<(), ActionError>
where
    P: ProcessController,
    F: Fetcher,
{
    match action {
        Action::ToggleBacklight => {
            ctx.backlight.toggle()?;
            Ok(())
        }
        Action::UpdateSystem => update_system::run(ctx).await,
        Action::UpdateScript => update_script::run(ctx).await,
        Action::ShowHelp => help::run(ctx).await,
    }
}

/// Pause the display process around `body`. The process is resumed even
/// when `body` fails, so an error never leaves the screen frozen.
pub(crate) async fn with_display_paused<P, Fut>(process: &P, body: Fut) -> Result<(), ActionError>
where
    P: ProcessController,
    Fut: Future<Output = Result<(), ActionError>>,
{
    process.pause()?;
    let result = body.await;
    let resumed = process.resume();

    if let (Err(_), Err(e)) = (&result, &resumed) {
        log::error!("Display process left paused: {}", e);
    }

    result?;
    resumed?;
    Ok(())
}
