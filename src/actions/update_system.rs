//! System update
//!
//! Runs the updater with its output on the console, waits for it to finish,
//! leaves the result on screen for the grace interval, then resumes PADD.

use super::{messages, with_display_paused, ActionContext, ActionError};
use crate::device::ProcessController;
use colored::Color;
use std::io;
use std::process::Stdio;
use tokio::process::Command;

pub async fn run<P: ProcessController, F>(ctx: &ActionContext<'_, P, F>) -> Result<(), ActionError> {
    let settings = &ctx.config.update_system;

    with_display_paused(ctx.process, async {
        let command_line = settings.command.join(" ");
        let (program, args) = settings
            .command
            .split_first()
            .ok_or_else(|| ActionError::Updater {
                command: command_line.clone(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
            })?;

        let mut tty = ctx.console.open()?;
        tty.colored(&messages::update_system_banner(&settings.command), Color::Blue)?;

        log::info!("Running updater: {}", command_line);
        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(tty.stdio()?)
            .stderr(tty.stdio()?)
            .status()
            .await
            .map_err(|source| ActionError::Updater {
                command: command_line.clone(),
                source,
            })?;

        log::info!("Updater finished: {}", status);
        tty.status(&format!("Update finished ({})", status), status.success())?;
        drop(tty);

        tokio::time::sleep(settings.grace()).await;
        Ok(())
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::Rig;
    use crate::device::process::ProcessSignal;

    #[tokio::test]
    async fn test_updater_output_reaches_console() {
        let rig = Rig::new();
        let (backlight, console, process, fetcher) =
            (rig.backlight(), rig.console(), rig.process(), rig.fetcher(true));
        let ctx = ActionContext {
            config: &rig.config,
            backlight: &backlight,
            console: &console,
            process: &process,
            fetcher: &fetcher,
        };

        run(&ctx).await.unwrap();

        assert_eq!(rig.signals(), vec![ProcessSignal::Stop, ProcessSignal::Continue]);
        let screen = rig.screen();
        assert!(screen.contains("Updating Pi-hole"));
        assert!(screen.contains("updating pihole\n"));
        assert!(screen.contains("Update finished"));
    }

    #[tokio::test]
    async fn test_failing_updater_is_reported_not_fatal() {
        let mut rig = Rig::new();
        rig.config.update_system.command =
            vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()];
        let (backlight, console, process, fetcher) =
            (rig.backlight(), rig.console(), rig.process(), rig.fetcher(true));
        let ctx = ActionContext {
            config: &rig.config,
            backlight: &backlight,
            console: &console,
            process: &process,
            fetcher: &fetcher,
        };

        run(&ctx).await.unwrap();

        assert!(rig.screen().contains("ERR"));
        assert_eq!(rig.signals(), vec![ProcessSignal::Stop, ProcessSignal::Continue]);
    }

    #[tokio::test]
    async fn test_missing_updater_resumes_display() {
        let mut rig = Rig::new();
        rig.config.update_system.command = vec!["/nonexistent/pihole".to_string()];
        let (backlight, console, process, fetcher) =
            (rig.backlight(), rig.console(), rig.process(), rig.fetcher(true));
        let ctx = ActionContext {
            config: &rig.config,
            backlight: &backlight,
            console: &console,
            process: &process,
            fetcher: &fetcher,
        };

        assert!(matches!(run(&ctx).await, Err(ActionError::Updater { .. })));
        assert_eq!(rig.signals(), vec![ProcessSignal::Stop, ProcessSignal::Continue]);
    }
}
