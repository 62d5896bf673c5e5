//! Shared liveness flag for the executor link

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Whether the transport's TCP link is currently up
///
/// Written only by the transport session, read by any number of health
/// checks. Starts out `true`.
#[derive(Debug, Clone)]
pub struct LivenessFlag {
    up: Arc<AtomicBool>,
}

impl LivenessFlag {
    pub fn new() -> Self {
        Self {
            up: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_up(&self) {
        self.up.store(true, Ordering::SeqCst);
    }

    pub(crate) fn mark_down(&self) {
        self.up.store(false, Ordering::SeqCst);
    }

    /// Snapshot for the configurator's health query
    pub fn report(&self) -> HealthReport {
        HealthReport::from_flag(self.is_up())
    }
}

impl Default for LivenessFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Answer to a health-check query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub connected: bool,
    pub message: &'static str,
}

impl HealthReport {
    fn from_flag(connected: bool) -> Self {
        let message = if connected {
            "Connection established."
        } else {
            "Connection to executor lost."
        };
        Self { connected, message }
    }
}
