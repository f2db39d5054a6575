//! Text shown on the console
//!
//! The PiTFT console is roughly 40 columns wide, so every line stays short.

use super::Action;
use crate::config::ButtonSettings;
use chrono::Local;

pub const HELP_HEADER: &str = "################ HELP MENU ###############\n";
pub const HELP_FOOTER: &str = "##########################################\n";

fn stamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn update_system_banner(command: &[String]) -> String {
    format!(
        "\n\n========= Updating Pi-hole =========\n\
         Started {}\n\
         Running `{}`\n\
         PADD resumes when it finishes.\n\n",
        stamp(),
        command.join(" ")
    )
}

pub fn update_script_banner(url: &str) -> String {
    format!(
        "\n\n=========== Updating PADD ==========\n\
         Started {}\n\
         Downloading {}\n\n",
        stamp(),
        url
    )
}

/// Button table for the help overlay, built from the configured wiring
pub fn help_text(buttons: &ButtonSettings) -> String {
    let mut text = String::new();
    for action in Action::ALL {
        text.push_str(&format!(
            "  GPIO {:>2}  {}\n",
            action.pin(buttons),
            action.description()
        ));
    }
    text.push_str("\n  With the backlight off, any button\n");
    text.push_str("  turns it on first.\n");
    text
}

/// One countdown line: the number and a bar of that many stars
pub fn countdown_bar(n: u32) -> (String, String) {
    (n.to_string(), "*".repeat(n as usize))
}
