//! Configuration structures and loading

use crate::input::{Edge, Pull};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where the daemon looks for its configuration when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pi-buttons.toml";

/// Complete daemon configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathSettings,
    pub buttons: ButtonSettings,
    pub update_system: UpdateSettings,
    pub update_script: ScriptSettings,
    pub help: HelpSettings,
    pub console: ConsoleSettings,
}

/// Files and devices shared with the rest of the system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// PID file written by the display process
    pub pid_file: PathBuf,
    /// Backlight brightness attribute
    pub backlight: PathBuf,
    /// Character device of the visible screen
    pub console: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            pid_file: PathBuf::from("/home/pi/PADD.pid"),
            backlight: PathBuf::from("/sys/class/backlight/soc:backlight/brightness"),
            console: PathBuf::from("/dev/tty1"),
        }
    }
}

/// Button wiring (BCM numbering)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonSettings {
    /// Offset added to BCM numbers when exporting (512 on recent Pi kernels)
    pub gpio_base: u32,
    /// Edge that counts as a press
    pub edge: Edge,
    /// Transitions closer together than this are one press
    pub debounce_ms: u64,
    /// Pull resistor applied to every button line
    pub pull: Pull,
    /// Tool that sets the pull, run as `<command...> <pin> ip <pu|pd|pn>`.
    /// Empty leaves the pulls as they are.
    pub pull_command: Vec<String>,
    pub backlight: u32,
    pub update_system: u32,
    pub update_script: u32,
    pub help: u32,
}

impl Default for ButtonSettings {
    fn default() -> Self {
        Self {
            gpio_base: 0,
            edge: Edge::Falling,
            debounce_ms: 600,
            pull: Pull::Up,
            pull_command: vec!["pinctrl".to_string(), "set".to_string()],
            backlight: 27,
            update_system: 23,
            update_script: 22,
            help: 17,
        }
    }
}

impl ButtonSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// All monitored pins, in table order
    pub fn pins(&self) -> [u32; 4] {
        [self.backlight, self.update_system, self.update_script, self.help]
    }
}

/// System update action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateSettings {
    /// Updater command and its arguments
    pub command: Vec<String>,
    /// Time the output stays on screen before the display resumes
    pub grace_secs: u64,
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self {
            command: vec!["pihole".to_string(), "-up".to_string()],
            grace_secs: 10,
        }
    }
}

impl UpdateSettings {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

/// Display script update action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptSettings {
    /// URL of the script
    pub url: String,
    /// Where the script is saved
    pub destination: PathBuf,
    /// Uid that must own the saved script
    pub owner_uid: u32,
    /// First number of the restart countdown
    pub countdown_from: u32,
    /// Time between countdown lines
    pub countdown_step_ms: u64,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            url: "https://raw.githubusercontent.com/jpmck/PADD/master/padd.sh".to_string(),
            destination: PathBuf::from("/home/pi/padd.sh"),
            owner_uid: 1000,
            countdown_from: 10,
            countdown_step_ms: 1000,
        }
    }
}

impl ScriptSettings {
    pub fn countdown_step(&self) -> Duration {
        Duration::from_millis(self.countdown_step_ms)
    }
}

/// Help overlay action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelpSettings {
    pub display_secs: u64,
}

impl Default for HelpSettings {
    fn default() -> Self {
        Self { display_secs: 10 }
    }
}

impl HelpSettings {
    pub fn display_time(&self) -> Duration {
        Duration::from_secs(self.display_secs)
    }
}

/// Console output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSettings {
    /// Emit ANSI colours on the console device
    pub color: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self { color: true }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// Load from `path` if given, else from the default location, else defaults
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::load(default)
                } else {
                    log::info!(
                        "No config at {}, using built-in defaults",
                        DEFAULT_CONFIG_PATH
                    );
                    Ok(Self::default())
                }
            }
        }
    }

    /// Parse and validate TOML content
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    fn validate(&self) -> Result<()> {
        let pins = self.buttons.pins();
        for (i, pin) in pins.iter().enumerate() {
            if pins[i + 1..].contains(pin) {
                bail!("GPIO {} is assigned to more than one button", pin);
            }
        }

        if self.buttons.debounce_ms == 0 {
            bail!("buttons.debounce_ms must be greater than zero");
        }

        if self.update_system.command.is_empty() {
            bail!("update_system.command must name a program");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_stock_wiring() {
        let config = Config::default();
        assert_eq!(config.buttons.pins(), [27, 23, 22, 17]);
        assert_eq!(config.buttons.edge, Edge::Falling);
        assert_eq!(config.buttons.debounce(), Duration::from_millis(600));
        assert_eq!(config.buttons.pull, Pull::Up);
        assert!(config.update_script.url.starts_with("https://"));
        assert_eq!(config.paths.console, PathBuf::from("/dev/tty1"));
        assert_eq!(config.update_script.owner_uid, 1000);
        assert_eq!(config.update_script.countdown_from, 10);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            [paths]
            console = "/dev/tty2"

            [buttons]
            edge = "rising"
            gpio_base = 512
            pull = "off"
            pull_command = []
            "#,
        )
        .unwrap();

        assert_eq!(config.paths.console, PathBuf::from("/dev/tty2"));
        assert_eq!(config.paths.pid_file, PathBuf::from("/home/pi/PADD.pid"));
        assert_eq!(config.buttons.edge, Edge::Rising);
        assert_eq!(config.buttons.gpio_base, 512);
        assert_eq!(config.buttons.pull, Pull::Off);
        assert!(config.buttons.pull_command.is_empty());
        assert_eq!(config.buttons.help, 17);
    }

    #[test]
    fn test_generated_config_loads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pi-buttons.toml");
        fs::write(&path, Config::default().to_toml().unwrap()).unwrap();

        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_duplicate_pins_rejected() {
        let err = Config::parse("[buttons]\nhelp = 27\n").unwrap_err();
        assert!(format!("{:#}", err).contains("GPIO 27"));
    }

    #[test]
    fn test_empty_updater_rejected() {
        assert!(Config::parse("[update_system]\ncommand = []\n").is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempdir().unwrap();
        assert!(Config::resolve(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
