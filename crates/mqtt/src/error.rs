//! Error type for the broker adapter.
//!
//! `TransferError` aggregates failures from client construction, the rumqttc
//! request channel, the network connection and the reconnect policy. Callers
//! distinguish two situations:
//!
//! - **Startup failures** (`Startup`, `ClientSetup`, `ConfigError`): the broker
//!   is mandatory at boot, so the binary treats these as fatal and exits.
//! - **Runtime failures** (`ClientRequest`, `ClientConnection`): the connection
//!   kernel recovers from them on its own; publishers only log them.

use thiserror::Error;

/// The unified error type for broker operations.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The client could not be constructed from the given configuration.
    #[error("Client setup error: {0}")]
    ClientSetup(String),

    /// Configuration validation failed.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] validator::ValidationErrors),

    /// The local request channel refused a publish/subscribe/disconnect.
    ///
    /// Usually means the event loop has already stopped.
    #[error("Client request error: {0}")]
    ClientRequest(#[from] rumqttc::ClientError),

    /// Network-level connection error reported by the event loop.
    ///
    /// Boxed, `rumqttc::ConnectionError` is large.
    #[error("Client connection error: {0}")]
    ClientConnection(#[from] Box<rumqttc::ConnectionError>),

    /// The first connection attempt did not reach CONNACK.
    #[error("Broker connection could not be established: {0}")]
    Startup(String),

    /// The reconnect backoff refused another attempt.
    #[error("Retry policy error: {0}")]
    RetriesPolicy(#[from] super::backoff::BackoffError),

    /// The connection kernel is gone (shut down or crashed).
    #[error("Connection kernel error: {0}")]
    ConnectionKernel(String),
}

impl From<rumqttc::ConnectionError> for TransferError {
    fn from(err: rumqttc::ConnectionError) -> Self {
        TransferError::ClientConnection(Box::new(err))
    }
}

impl TransferError {
    /// Returns true for errors that make the adapter unusable at boot.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            TransferError::Startup(_)
                | TransferError::ClientSetup(_)
                | TransferError::ConfigError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_error_display() {
        let err = TransferError::Startup("connection refused".into());
        assert_eq!(
            err.to_string(),
            "Broker connection could not be established: connection refused"
        );
        assert!(err.is_startup_fatal());
    }

    #[test]
    fn test_runtime_errors_are_not_startup_fatal() {
        let err = TransferError::ConnectionKernel("stopped".into());
        assert!(!err.is_startup_fatal());

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: TransferError = rumqttc::ConnectionError::Io(io).into();
        assert!(!err.is_startup_fatal());
        assert!(err.to_string().contains("reset"));
    }
}
