//! Console character device
//!
//! The visible screen is a tty that the display process also writes to.
//! A session is opened fresh for every action and relies on the display
//! process being paused; nothing here locks the device.

use colored::{Color, Colorize};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("failed to open console {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to write to console {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// The shared console device
#[derive(Debug, Clone)]
pub struct Console {
    path: PathBuf,
}

impl Console {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Open a writer on the device. The device must already exist.
    pub fn open(&self) -> Result<ConsoleSession, ConsoleError> {
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|source| ConsoleError::Open {
                path: self.path.clone(),
                source,
            })?;

        Ok(ConsoleSession {
            file,
            path: self.path.clone(),
        })
    }
}

/// An open writer on the console
pub struct ConsoleSession {
    file: File,
    path: PathBuf,
}

impl ConsoleSession {
    /// Write raw text
    pub fn write_str(&mut self, text: &str) -> Result<(), ConsoleError> {
        self.file
            .write_all(text.as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|source| ConsoleError::Write {
                path: self.path.clone(),
                source,
            })
    }

    /// Write one line
    pub fn line(&mut self, text: &str) -> Result<(), ConsoleError> {
        self.write_str(&format!("{}\n", text))
    }

    /// Write a block of text in one colour
    pub fn colored(&mut self, text: &str, color: Color) -> Result<(), ConsoleError> {
        self.write_str(&text.color(color).to_string())
    }

    /// `label...[OK]` or `label...[ERR]`
    pub fn status(&mut self, label: &str, ok: bool) -> Result<(), ConsoleError> {
        let tag = if ok { "OK".green() } else { "ERR".red() };
        self.line(&format!("{}...[{}]", label, tag))
    }

    /// A handle for child process output
    pub fn stdio(&self) -> Result<Stdio, ConsoleError> {
        self.file
            .try_clone()
            .map(Stdio::from)
            .map_err(|source| ConsoleError::Open {
                path: self.path.clone(),
                source,
            })
    }
}
