//! Persistent link to the command executor
//!
//! This module handles:
//! - Draining the command queue onto one TCP connection
//! - Automatic reconnection with bounded backoff
//! - The liveness flag read by health checks
//! - Clean shutdown on the close sentinel or a termination signal

mod liveness;
mod session;

pub use liveness::{HealthReport, LivenessFlag};
pub use session::{SessionConfig, SessionEvent, StopReason, TransportSession};
