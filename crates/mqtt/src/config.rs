//! Broker connection configuration.
//!
//! Deserialized from the `[mqtt]` table of the gateway configuration file and
//! validated with `validator` before any connection is attempted.
//!
//! ```toml
//! [mqtt]
//! host = "broker.local"
//! port = 1883
//! client_id = "plant-gw"
//! keep_alive = 60
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Broker connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// Broker hostname or IP address.
    #[validate(length(
        min = 1,
        max = 255,
        message = "Host must be between 1 and 255 characters"
    ))]
    pub host: String,

    #[validate(range(min = 1, max = 65535, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    /// Client identifier sent in CONNECT. A random one is generated when empty.
    #[validate(length(max = 36, message = "Client ID must not exceed 36 characters"))]
    pub client_id: String,

    /// Keep-alive interval in seconds.
    #[validate(range(
        min = 5,
        max = 3600,
        message = "Keep alive must be between 5 and 3600 seconds"
    ))]
    pub keep_alive: u64,

    pub clean_session: bool,

    #[validate(range(
        min = 1,
        max = 1000,
        message = "Max inflight must be between 1 and 1000"
    ))]
    pub max_inflight: u16,

    #[validate(range(
        min = 64,
        max = 65535,
        message = "Max packet size must be between 64 and 65535 bytes"
    ))]
    pub max_packet_size: Option<u32>,

    /// Capacity of the client request channel (pending publishes/subscribes).
    #[validate(range(
        min = 1,
        max = 1024,
        message = "Request channel capacity must be between 1 and 1024"
    ))]
    pub request_channel_capacity: usize,

    /// Capacity of the inbound message channel towards the command router.
    #[validate(range(
        min = 1,
        max = 1024,
        message = "Inbound channel capacity must be between 1 and 1024"
    ))]
    pub inbound_channel_capacity: usize,

    /// Seconds to wait for the first CONNACK at boot.
    #[validate(range(
        min = 1,
        max = 300,
        message = "Connection timeout must be between 1 and 300 seconds"
    ))]
    pub connection_timeout: u64,

    /// First reconnect delay after a lost connection, in seconds.
    #[validate(range(
        min = 1,
        max = 60,
        message = "Reconnect delay must be between 1 and 60 seconds"
    ))]
    pub reconnect_delay: u64,

    /// Upper bound for the reconnect delay, in seconds.
    #[validate(range(
        min = 1,
        max = 3600,
        message = "Reconnect max delay must be between 1 and 3600 seconds"
    ))]
    pub reconnect_max_delay: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "localhost".to_string(),
            port: 1883,
            client_id: String::new(),
            keep_alive: 60,
            clean_session: true,
            max_inflight: 10,
            max_packet_size: Some(65_535),
            request_channel_capacity: 64,
            inbound_channel_capacity: 256,
            connection_timeout: 10,
            reconnect_delay: 1,
            reconnect_max_delay: 30,
        }
    }
}

impl Config {
    /// Client id to put on the wire; generated when the configured one is empty.
    pub fn effective_client_id(&self) -> String {
        if self.client_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            self.client_id.clone()
        }
    }

    /// Cross-field check not expressible with field attributes.
    pub fn check_delays(&self) -> Result<(), ValidationError> {
        if self.reconnect_max_delay < self.reconnect_delay {
            let mut err = ValidationError::new("reconnect_delays");
            err.message = Some(
                format!(
                    "reconnect_max_delay ({}) must not be below reconnect_delay ({})",
                    self.reconnect_max_delay, self.reconnect_delay
                )
                .into(),
            );
            return Err(err);
        }
        Ok(())
    }
}
