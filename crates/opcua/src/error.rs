//! Error type for automation-server operations.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport to the server could not be opened.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The node does not exist on the server, or the session went away while
    /// resolving it.
    #[error("Node resolution error for {address}: {reason}")]
    NodeResolution { address: String, reason: String },

    /// Node address text could not be parsed.
    #[error("Invalid node address '{0}'")]
    InvalidAddress(String),

    #[error("Session is closed")]
    SessionClosed,

    /// A handle resolved in one session was presented to another.
    #[error("Node handle for {address} belongs to session {handle_session}, active session is {active_session}")]
    StaleHandle {
        address: String,
        handle_session: u64,
        active_session: u64,
    },

    #[error("Read of {address} failed: {reason}")]
    Read { address: String, reason: String },

    #[error("Write of {address} failed: {reason}")]
    Write { address: String, reason: String },

    /// The server returned a value of an unexpected type.
    #[error("Unexpected value type for {address}: expected {expected}, got {actual}")]
    TypeMismatch {
        address: String,
        expected: &'static str,
        actual: String,
    },

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl SessionError {
    /// Errors after which the session must be considered lost.
    pub fn is_session_lost(&self) -> bool {
        matches!(
            self,
            SessionError::Connection(_) | SessionError::SessionClosed | SessionError::Timeout(_)
        )
    }
}
