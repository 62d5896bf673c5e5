//! Command execution for the server
//!
//! This module handles:
//! - Parsing frames into known commands
//! - Dispatching each command to its action handler
//! - Suppressing repeated launches of an already running application

mod actions;
mod executor;
mod handlers;

pub use actions::{App, DesktopActions, DryRunActions, SystemActions};
pub use executor::{CommandExecutor, CommandOutcome, ConnectionState};

#[cfg(test)]
pub(crate) mod testing;
