//! Wire protocol for client-server communication.
//!
//! Every frame is a JSON envelope `{"type": ..., "payload": {...}}` in both
//! directions. The transport itself lives in the server crate.

/// Protocol decoding errors.
pub mod errors;

/// Request and response message types.
pub mod messages;
