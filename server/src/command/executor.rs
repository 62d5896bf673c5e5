//! Command executor - parses frames and dispatches them to actions

use super::actions::{App, SystemActions};
use super::handlers;
use gesture_bridge_shared::Command;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-connection execution state
///
/// Created on accept, dropped on disconnect.
#[derive(Debug, Default)]
pub struct ConnectionState {
    last_command: Option<Command>,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Previous known command on this connection, whatever its outcome
    pub fn last_command(&self) -> Option<Command> {
        self.last_command
    }
}

/// Result of executing one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The action ran; carries its response text
    Executed(String),
    /// A repeated launch was skipped because the app is still running
    Suppressed(String),
    /// The frame is not a known command; nothing ran
    Unknown(String),
    /// The action itself failed
    Failed(String),
}

impl CommandOutcome {
    /// Text written back to the client
    pub fn response(&self) -> &str {
        match self {
            CommandOutcome::Executed(text)
            | CommandOutcome::Suppressed(text)
            | CommandOutcome::Unknown(text)
            | CommandOutcome::Failed(text) => text,
        }
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.response())
    }
}

/// Executes commands received from the gesture client
///
/// Shared by every connection; all per-connection memory lives in
/// [`ConnectionState`].
#[derive(Clone)]
pub struct CommandExecutor {
    actions: Arc<dyn SystemActions>,
}

impl CommandExecutor {
    pub fn new(actions: Arc<dyn SystemActions>) -> Self {
        Self { actions }
    }

    /// Execute one decoded frame
    pub async fn execute(&self, frame: &str, state: &mut ConnectionState) -> CommandOutcome {
        let command: Command = match frame.parse() {
            Ok(command) => command,
            Err(e) => {
                warn!("{}", e);
                return CommandOutcome::Unknown(e.to_string());
            }
        };

        let previous = state.last_command.replace(command);

        if let Some(app) = App::for_command(command) {
            if previous == Some(command) && self.app_running(app).await {
                info!("{} already running, skipping command", app);
                return CommandOutcome::Suppressed(format!(
                    "{} already running, skipping command",
                    app
                ));
            }
        }

        let actions = self.actions.as_ref();
        let result = match command {
            Command::VolumeUp => handlers::handle_volume_up(actions).await,
            Command::VolumeDown => handlers::handle_volume_down(actions).await,
            Command::AltTab => handlers::handle_alt_tab(actions).await,
            Command::PlayPause => handlers::handle_play_pause(actions).await,
            Command::Screenshot => handlers::handle_screenshot(actions).await,
            Command::ScrollUp => handlers::handle_scroll(actions, true).await,
            Command::ScrollDown => handlers::handle_scroll(actions, false).await,
            Command::OpenCalculator => handlers::handle_launch(actions, App::Calculator).await,
            Command::TaskManager => handlers::handle_launch(actions, App::TaskManager).await,
        };

        match result {
            Ok(response) => CommandOutcome::Executed(response),
            Err(e) => {
                warn!("Command '{}' failed: {:#}", command, e);
                CommandOutcome::Failed(format!("{} failed: {}", command, e))
            }
        }
    }

    /// A failed running check counts as not running so the launch goes ahead
    async fn app_running(&self, app: App) -> bool {
        match self.actions.is_running(app).await {
            Ok(running) => running,
            Err(e) => {
                warn!("Could not check whether {} is running: {:#}", app, e);
                false
            }
        }
    }
}
