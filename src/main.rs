//! Pi Buttons
//!
//! Hardware button daemon for a Raspberry Pi running the PADD status display
//! for Pi-hole. Four buttons on the display board are mapped to actions:
//!
//! - **Backlight**: toggle the display backlight
//! - **Update Pi-hole**: run the updater with its output on the console
//! - **Update PADD**: download a fresh PADD script and restart the display
//! - **Help**: show which button does what
//!
//! While the screen is dark, the first press of any button only turns the
//! backlight back on. Presses that arrive while an action runs are dropped.
//!
//! # Usage
//!
//! ```bash
//! # Run the daemon (needs root for GPIO and signals)
//! sudo pi-buttons run --config /etc/pi-buttons.toml
//!
//! # Fire one button without touching the hardware
//! sudo pi-buttons press 17
//!
//! # Write a starting configuration
//! pi-buttons config --output /etc/pi-buttons.toml
//!
//! # Check the backlight
//! pi-buttons backlight
//! ```

mod actions;
mod config;
mod device;
mod dispatch;
mod input;
mod net;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use actions::Action;
use config::Config;
use device::{Backlight, PidFileProcess};
use dispatch::{Dispatcher, Outcome, EVENT_QUEUE_DEPTH};
use input::{ButtonEvent, Edge, GpioButtons};
use net::HttpFetcher;

/// Pi Buttons
///
/// Button daemon for the PADD status display
#[derive(Parser)]
#[command(name = "pi-buttons")]
#[command(author = "Prasanna Gautam")]
#[command(version = "0.1.0")]
#[command(about = "Hardware button daemon for a Raspberry Pi status display")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Arm the buttons and handle presses until Ctrl+C
    Run {
        /// Config file (default: /etc/pi-buttons.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Deliver one press as if the button on PIN was pushed
    Press {
        /// BCM pin number of the button
        pin: u32,

        /// Config file (default: /etc/pi-buttons.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the default configuration as TOML
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the current backlight state
    Backlight {
        /// Config file (default: /etc/pi-buttons.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Run { config } => handle_run(config.as_deref()).await,
        Commands::Press { pin, config } => handle_press(pin, config.as_deref()).await,
        Commands::Config { output } => handle_config(output),
        Commands::Backlight { config } => handle_backlight(config.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = Config::resolve(path)?;
    colored::control::set_override(config.console.color);
    Ok(config)
}

/// GPIO export and signalling both need root
fn check_root() {
    // SAFETY: geteuid has no preconditions and cannot fail
    let euid = unsafe { libc::geteuid() };
    if euid != 0 {
        eprintln!(
            "{} pi-buttons must be run as root (effective uid is {})",
            "[ERROR]".red().bold(),
            euid
        );
        std::process::exit(1);
    }
}

fn dispatcher(config: &Config) -> Result<Dispatcher<PidFileProcess, HttpFetcher>> {
    let fetcher = HttpFetcher::new().context("Failed to set up script downloader")?;
    Ok(Dispatcher::new(
        config.clone(),
        PidFileProcess::new(&config.paths.pid_file),
        fetcher,
    ))
}

async fn handle_run(config_path: Option<&Path>) -> Result<()> {
    check_root();
    let config = load_config(config_path)?;

    println!("{} Arming buttons", "[*]".cyan().bold());
    let mut buttons = GpioButtons::arm(&config.buttons).context("Failed to arm GPIO buttons")?;

    for action in Action::ALL {
        println!(
            "  GPIO {:>2}  {}",
            action.pin(&config.buttons),
            action.description()
        );
    }

    log::info!("Exported GPIO lines {:?}", buttons.exported());

    let (tx, mut rx) = mpsc::channel::<ButtonEvent>(EVENT_QUEUE_DEPTH);
    buttons.start(tx).context("Failed to start button poller")?;

    let mut dispatcher = dispatcher(&config)?;
    println!(
        "{} Listening for presses (Ctrl+C to stop)",
        "[OK]".green().bold()
    );
    log::info!(
        "Dispatcher running, display PID file {}",
        config.paths.pid_file.display()
    );

    tokio::select! {
        _ = dispatcher.run(&mut rx) => {
            log::warn!("Button poller stopped");
            buttons.release();
            Ok(())
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            println!("\n{} Interrupted, releasing buttons", "[*]".cyan().bold());
            buttons.release();
            log::info!("Shut down on interrupt");
            std::process::exit(2);
        }
    }
}

async fn handle_press(pin: u32, config_path: Option<&Path>) -> Result<()> {
    check_root();
    let config = load_config(config_path)?;

    let mut dispatcher = dispatcher(&config)?;
    let outcome = dispatcher
        .on_event(ButtonEvent::new(pin, Edge::Falling))
        .await;

    match outcome {
        Outcome::Completed(action) => {
            println!("{} {} finished", "[OK]".green().bold(), action);
        }
        Outcome::WokeDisplay { requested } => {
            println!(
                "{} Backlight was off; turned it on instead of running {}",
                "[*]".cyan().bold(),
                requested
            );
        }
        Outcome::Unmapped { pin } => {
            println!("{} No button is wired to GPIO {}", "[*]".yellow().bold(), pin);
        }
        Outcome::Dropped { active } => {
            println!("{} Busy with {}", "[*]".yellow().bold(), active);
        }
        Outcome::Failed(action) => {
            eprintln!("{} {} failed, see log", "[ERROR]".red().bold(), action);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn handle_config(output: Option<PathBuf>) -> Result<()> {
    let content = Config::default().to_toml()?;

    match output {
        Some(path) => {
            fs::write(&path, &content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "{} Wrote default configuration to {}",
                "[OK]".green().bold(),
                path.display()
            );
        }
        None => print!("{}", content),
    }

    Ok(())
}

fn handle_backlight(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let backlight = Backlight::new(&config.paths.backlight);

    let state = if backlight.is_on()? {
        "on".green().bold()
    } else {
        "off".dimmed()
    };
    println!("Backlight ({}): {}", backlight.path().display(), state);

    Ok(())
}
