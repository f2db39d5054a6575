//! Backlight attribute file
//!
//! The file holds a single integer. Anything non-zero counts as on. The value
//! is never cached because other agents may change it between presses.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BacklightError {
    #[error("failed to read backlight {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("backlight {path} holds {content:?}, expected an integer")]
    Parse { path: PathBuf, content: String },

    #[error("failed to write backlight {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// File-backed backlight switch
#[derive(Debug, Clone)]
pub struct Backlight {
    path: PathBuf,
}

impl Backlight {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current state
    pub fn is_on(&self) -> Result<bool, BacklightError> {
        let content = fs::read_to_string(&self.path).map_err(|source| BacklightError::Read {
            path: self.path.clone(),
            source,
        })?;

        let value: u32 = content
            .trim()
            .parse()
            .map_err(|_| BacklightError::Parse {
                path: self.path.clone(),
                content: content.clone(),
            })?;

        Ok(value != 0)
    }

    /// Switch the backlight on or off
    pub fn set(&self, on: bool) -> Result<(), BacklightError> {
        let value = if on { "1\n" } else { "0\n" };
        fs::write(&self.path, value).map_err(|source| BacklightError::Write {
            path: self.path.clone(),
            source,
        })
    }

    /// Invert the current state, returning the new one
    pub fn toggle(&self) -> Result<bool, BacklightError> {
        let on = !self.is_on()?;
        log::info!("Turning display {}", if on { "on" } else { "off" });
        self.set(on)?;
        Ok(on)
    }
}
