//! Display script update
//!
//! Downloads a fresh PADD script, checks who owns it, counts down on screen
//! and kills PADD so its supervisor restarts it with the new script. A failed
//! download is reported and the restart still happens.

use super::{messages, ActionContext, ActionError};
use crate::device::ProcessController;
use crate::net::Fetcher;
use colored::{Color, Colorize};
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

pub async fn run<P, F>(ctx: &ActionContext<'_, P, F>) -> Result<(), ActionError>
where
    P: ProcessController,
    F: Fetcher,
{
    ctx.process.pause()?;

    match prepare_restart(ctx).await {
        Ok(()) => {
            log::info!("Restarting display process");
            ctx.process.terminate()?;
            Ok(())
        }
        Err(e) => {
            // Never restarted, so it must not stay stopped either
            if let Err(resume_err) = ctx.process.resume() {
                log::error!("Display process left paused: {}", resume_err);
            }
            Err(e)
        }
    }
}

async fn prepare_restart<P, F>(ctx: &ActionContext<'_, P, F>) -> Result<(), ActionError>
where
    F: Fetcher,
{
    let settings = &ctx.config.update_script;
    let mut tty = ctx.console.open()?;
    tty.colored(&messages::update_script_banner(&settings.url), Color::Blue)?;

    match ctx.fetcher.fetch(&settings.url, &settings.destination).await {
        Ok(report) => {
            log::info!(
                "Saved {} bytes to {}",
                report.bytes,
                settings.destination.display()
            );
            tty.line(&format!("Return code: {}, msg: {}", report.status, report.reason))?;
        }
        Err(e) => {
            log::warn!("Script download failed: {}", e);
            tty.line(&format!("Download failed: {}", e.to_string().red()))?;
        }
    }

    tty.colored("Checking file permissions\n", Color::Magenta)?;
    tty.status("File permissions", owned_by(&settings.destination, settings.owner_uid))?;

    tty.line("Attempting PADD restart in:")?;
    for n in (1..=settings.countdown_from).rev() {
        let (number, bar) = messages::countdown_bar(n);
        tty.line(&format!("{} {}", number.blue(), bar.magenta()))?;
        tokio::time::sleep(settings.countdown_step()).await;
    }

    Ok(())
}

fn owned_by(path: &Path, uid: u32) -> bool {
    match fs::metadata(path) {
        Ok(meta) => meta.uid() == uid,
        Err(e) => {
            log::warn!("Cannot stat {}: {}", path.display(), e);
            false
        }
    }
}
