//! Server configuration loaded from environment variables

use gesture_bridge_shared::{
    env::{env_string, parse_env, parse_env_bool, parse_env_duration_ms},
    protocol::{DEFAULT_PORT, READ_CHUNK_SIZE},
};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// A config value that names none of the known options
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} {value:?}")]
pub struct ParseOptionError {
    kind: &'static str,
    value: String,
}

/// How command frames are cut out of the byte stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    /// Persistent partial-frame buffer; every complete frame is executed
    Buffered,
    /// One command per read: the text before the first delimiter, rest dropped
    FirstToken,
}

impl FromStr for FrameMode {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buffered" => Ok(FrameMode::Buffered),
            "first-token" | "first_token" => Ok(FrameMode::FirstToken),
            _ => Err(ParseOptionError {
                kind: "frame mode",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for FrameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameMode::Buffered => write!(f, "buffered"),
            FrameMode::FirstToken => write!(f, "first-token"),
        }
    }
}

/// Which [`SystemActions`](crate::command::SystemActions) backend to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionsKind {
    Desktop,
    DryRun,
}

impl FromStr for ActionsKind {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desktop" => Ok(ActionsKind::Desktop),
            "dry-run" | "dry_run" | "dryrun" => Ok(ActionsKind::DryRun),
            _ => Err(ParseOptionError {
                kind: "actions backend",
                value: s.to_string(),
            }),
        }
    }
}

/// Configuration for the command server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Bytes requested per socket read
    pub read_chunk_size: usize,
    pub frame_mode: FrameMode,
    /// Write each response back as a frame
    pub reply_enabled: bool,
    pub actions: ActionsKind,
    /// Upper bound on one accept wait before the loop re-checks for shutdown
    pub accept_poll: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{}", DEFAULT_PORT),
            read_chunk_size: READ_CHUNK_SIZE,
            frame_mode: FrameMode::Buffered,
            reply_enabled: true,
            actions: ActionsKind::Desktop,
            accept_poll: Duration::from_secs(1),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            listen_addr: env_string("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            read_chunk_size: parse_env("READ_CHUNK_SIZE", defaults.read_chunk_size).max(1),
            frame_mode: parse_env("FRAME_MODE", defaults.frame_mode),
            reply_enabled: parse_env_bool("REPLY_ENABLED", defaults.reply_enabled),
            actions: parse_env("ACTIONS", defaults.actions),
            accept_poll: parse_env_duration_ms("ACCEPT_POLL_MS", defaults.accept_poll),
        }
    }
}
