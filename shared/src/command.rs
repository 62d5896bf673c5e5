//! Command vocabulary understood by the executor
//!
//! Every command travels as its human-readable literal (e.g. `"Volume Up"`).
//! Unknown literals are rejected here, at the parse boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A command the executor knows how to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    #[serde(rename = "Volume Up")]
    VolumeUp,
    #[serde(rename = "Volume Down")]
    VolumeDown,
    #[serde(rename = "Open Calculator")]
    OpenCalculator,
    #[serde(rename = "Screenshot")]
    Screenshot,
    #[serde(rename = "AltTab")]
    AltTab,
    #[serde(rename = "PlayPause")]
    PlayPause,
    #[serde(rename = "Scroll Up")]
    ScrollUp,
    #[serde(rename = "Scroll Down")]
    ScrollDown,
    #[serde(rename = "Task Manager")]
    TaskManager,
}

/// Error returned when a literal is not part of the vocabulary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown command: {0}")]
pub struct ParseCommandError(pub String);

impl Command {
    /// All known commands, in display order
    pub const ALL: [Command; 9] = [
        Command::VolumeUp,
        Command::VolumeDown,
        Command::OpenCalculator,
        Command::Screenshot,
        Command::AltTab,
        Command::PlayPause,
        Command::ScrollUp,
        Command::ScrollDown,
        Command::TaskManager,
    ];

    /// The wire literal for this command
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::VolumeUp => "Volume Up",
            Command::VolumeDown => "Volume Down",
            Command::OpenCalculator => "Open Calculator",
            Command::Screenshot => "Screenshot",
            Command::AltTab => "AltTab",
            Command::PlayPause => "PlayPause",
            Command::ScrollUp => "Scroll Up",
            Command::ScrollDown => "Scroll Down",
            Command::TaskManager => "Task Manager",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseCommandError(s.to_string()))
    }
}
