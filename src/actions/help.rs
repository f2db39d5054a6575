//! Help overlay

use super::{messages, with_display_paused, ActionContext, ActionError};
use crate::device::ProcessController;
use colored::Color;

pub async fn run<P: ProcessController, F>(ctx: &ActionContext<'_, P, F>) -> Result<(), ActionError> {
    with_display_paused(ctx.process, async {
        {
            let mut tty = ctx.console.open()?;
            tty.colored(messages::HELP_HEADER, Color::Blue)?;
            tty.colored(&messages::help_text(&ctx.config.buttons), Color::Green)?;
            tty.colored(messages::HELP_FOOTER, Color::Blue)?;
        }

        tokio::time::sleep(ctx.config.help.display_time()).await;
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
    async fn test_help_pauses_and_resumes() {
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
        assert!(screen.contains("HELP MENU"));
        assert!(screen.contains("Update PADD + restart"));
    }

    #[tokio::test]
    async fn test_console_failure_still_resumes() {
        let rig = Rig::new();
        std::fs::remove_file(&rig.config.paths.console).unwrap();
        let (backlight, console, process, fetcher) =
            (rig.backlight(), rig.console(), rig.process(), rig.fetcher(true));
        let ctx = ActionContext {
            config: &rig.config,
            backlight: &backlight,
            console: &console,
            process: &process,
            fetcher: &fetcher,
        };

        assert!(matches!(run(&ctx).await, Err(ActionError::Console(_))));
        assert_eq!(rig.signals(), vec![ProcessSignal::Stop, ProcessSignal::Continue]);
    }
}
