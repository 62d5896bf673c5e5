//! Gesture Bridge Shared Protocol Types
//!
//! This crate provides the command vocabulary, the `|` delimiter codec and the
//! link state machine shared by the gesture client and the command server.

pub mod codec;
pub mod command;
pub mod env;
pub mod signal;
pub mod state_machine;

pub use command::{Command, ParseCommandError};

/// Wire protocol parameters
pub mod protocol {
    /// Byte terminating every frame on the wire
    pub const FRAME_DELIMITER: u8 = b'|';

    /// Delimiter as a char, for text handling
    pub const FRAME_DELIMITER_CHAR: char = '|';

    /// Default executor port
    pub const DEFAULT_PORT: u16 = 9000;

    /// Bytes read from the socket per iteration on the executor side
    pub const READ_CHUNK_SIZE: usize = 1024;

    /// Only every Nth recognition event is considered for dispatch
    pub const DEFAULT_SAMPLE_EVERY: u64 = 10;
}
