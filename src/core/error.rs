//! Gateway error taxonomy.
//!
//! Propagation rules:
//! - `Connection` / `NodeResolution`: the session is discarded and the outer
//!   loop retries after the reconnect backoff.
//! - `Decode` / `Write` / `Read`: per-message, logged and dropped.
//! - `Publish`: best effort, logged.
//! - `Config`: fatal at startup.

use opcgate_opcua::SessionError;
use thiserror::Error;

/// Why a node could not be accessed.
#[derive(Debug, Error)]
pub enum NodeAccess {
    /// No session is active, so there are no resolved handles.
    #[error("nodes are not resolved (no active session)")]
    NotReady,

    #[error(transparent)]
    Failed(#[from] SessionError),
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Session establishment failed.
    #[error("Connection error: {0}")]
    Connection(#[source] SessionError),

    /// A configured node could not be resolved at session start.
    #[error("Node resolution error: {0}")]
    NodeResolution(#[source] SessionError),

    /// An inbound command payload is not a decimal integer.
    #[error("Decode error: payload {payload:?} is not a decimal integer")]
    Decode { payload: String },

    #[error("Write error: {0}")]
    Write(#[source] NodeAccess),

    #[error("Read error: {0}")]
    Read(#[source] NodeAccess),

    #[error("Publish error on {topic}: {reason}")]
    Publish { topic: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// True when the failure only means "no session yet".
    pub fn is_not_ready(&self) -> bool {
        matches!(
            self,
            GatewayError::Write(NodeAccess::NotReady) | GatewayError::Read(NodeAccess::NotReady)
        )
    }
}
