//! Gesture-to-command dispatch
//!
//! This module handles:
//! - Parsing recognizer labels
//! - The mutable label -> command mapping and its named snapshots
//! - Sampling high-frequency recognition events down to commands

mod dispatcher;
mod label;
mod mapping;
mod store;

pub use dispatcher::{DispatchOutcome, GestureDispatcher, LastGesture};
pub use label::{GestureLabel, ParseLabelError, Recognition, NO_GESTURE_LABEL};
pub use mapping::{Mapping, SharedMapping};
pub use store::{MappingStore, StoreError};
