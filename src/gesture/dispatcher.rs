//! Gesture dispatcher - samples recognition events and enqueues commands

use super::label::Recognition;
use super::mapping::SharedMapping;
use crate::queue::CommandQueue;
use gesture_bridge_shared::Command;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// What the dispatcher did with one recognition event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not a considered event; discarded by the sampling policy
    Skipped,
    /// Considered, but nothing was recognized
    NoGesture,
    /// Considered, but the gesture has no command
    Unmapped,
    /// Considered and the mapped command was enqueued
    Dispatched(Command),
}

/// One-slot cell holding the last considered label, for display
///
/// Every publish overwrites the previous value.
#[derive(Debug, Clone)]
pub struct LastGesture {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl LastGesture {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn publish(&self, label: impl Into<String>) {
        self.tx.send_replace(Some(label.into()));
    }

    pub fn current(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}

impl Default for LastGesture {
    fn default() -> Self {
        Self::new()
    }
}

/// Decides whether and what to enqueue for each recognition event
///
/// Only every `sample_every`-th event is considered; a considered gesture
/// with a mapped command enqueues that command.
pub struct GestureDispatcher {
    counter: u64,
    sample_every: u64,
    mapping: SharedMapping,
    queue: CommandQueue,
    last_gesture: LastGesture,
}

impl GestureDispatcher {
    pub fn new(
        mapping: SharedMapping,
        queue: CommandQueue,
        last_gesture: LastGesture,
        sample_every: u64,
    ) -> Self {
        Self {
            counter: 0,
            sample_every: sample_every.max(1),
            mapping,
            queue,
            last_gesture,
        }
    }

    /// Events seen so far
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Handle one recognition event
    pub async fn on_recognition(&mut self, recognition: Recognition) -> DispatchOutcome {
        self.counter += 1;
        if self.counter % self.sample_every != 0 {
            return DispatchOutcome::Skipped;
        }

        self.last_gesture.publish(recognition.to_string());

        let label = match recognition {
            Recognition::NoGesture => {
                debug!("No gesture recognized");
                return DispatchOutcome::NoGesture;
            }
            Recognition::Gesture(label) => label,
        };

        match self.mapping.lookup(label).await {
            Some(command) => {
                info!("Gesture '{}' -> sending command: {}", label, command);
                self.queue.enqueue(command);
                DispatchOutcome::Dispatched(command)
            }
            None => {
                info!("Gesture '{}' not mapped to any command", label);
                DispatchOutcome::Unmapped
            }
        }
    }
}
