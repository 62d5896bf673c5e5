//! Per-connection handling
//!
//! This module handles:
//! - Cutting command frames out of the byte stream
//! - Executing each command with connection-local state
//! - Writing response frames back to the client

mod connection;

pub use connection::ClientSession;
