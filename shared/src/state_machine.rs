//! Transport Link State Machine
//!
//! Defines the valid transitions of the client's link to the executor:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> (I/O error) Disconnected -> ...
//! ```
//!
//! `Stopped` is terminal and is reached only on the close sentinel or an
//! external termination signal.

use std::fmt;

/// State of the link to the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Stopped,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Disconnected => write!(f, "disconnected"),
            LinkState::Connecting => write!(f, "connecting"),
            LinkState::Connected => write!(f, "connected"),
            LinkState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Events that can trigger link transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A connect attempt is starting
    ConnectStarted,
    /// The connect attempt succeeded
    ConnectSucceeded,
    /// Connect, read or write failed
    IoFailed,
    /// The close sentinel was dequeued
    CloseRequested,
    /// External termination signal
    Terminated,
}

/// Result of a transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid and state changed
    Success(LinkState),
    /// Transition was invalid from current state
    Invalid { from: LinkState, event: LinkEvent },
}

/// State machine for one transport session
#[derive(Debug)]
pub struct LinkStateMachine {
    current_state: LinkState,
    /// Successful connects so far
    connects: u64,
}

impl Default for LinkStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkStateMachine {
    /// Create a new state machine in Disconnected state
    pub fn new() -> Self {
        Self {
            current_state: LinkState::Disconnected,
            connects: 0,
        }
    }

    /// Get current state
    pub fn state(&self) -> LinkState {
        self.current_state
    }

    /// Number of times the link reached Connected
    pub fn connects(&self) -> u64 {
        self.connects
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: LinkEvent) -> TransitionResult {
        match self.get_next_state(&event) {
            Some(state) => {
                if state == LinkState::Connected {
                    self.connects += 1;
                }
                self.current_state = state;
                TransitionResult::Success(state)
            }
            None => TransitionResult::Invalid {
                from: self.current_state,
                event,
            },
        }
    }

    /// Get the next state for a given event, if the transition is valid
    fn get_next_state(&self, event: &LinkEvent) -> Option<LinkState> {
        use LinkEvent::*;
        use LinkState::*;

        match (self.current_state, event) {
            // Nothing leaves Stopped
            (Stopped, _) => None,

            // Shutdown is accepted from any live state
            (_, CloseRequested | Terminated) => Some(Stopped),

            (Disconnected, ConnectStarted) => Some(Connecting),
            (Connecting, ConnectSucceeded) => Some(Connected),
            (Connecting | Connected, IoFailed) => Some(Disconnected),

            _ => None,
        }
    }
}
