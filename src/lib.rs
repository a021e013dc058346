//! opcgate: MQTT <-> OPC UA gateway for one flag and one counter.
//!
//! The gateway mirrors a boolean flag node and an integer counter node of an
//! automation server onto broker topics, and writes counter commands from
//! the broker back into the server.
//!
//! ## Modules
//!
//! * `config` : TOML configuration (`[logger]`, `[mqtt]`, `[opcua]`,
//!   `[bridge]`), validated with `validator`.
//! * `core` : connection supervisor, change detector, command router and the
//!   gateway loop.
//! * `logger` : `tracing` subscriber setup (console and journald).
//!
//! ## Features
//!
//! * `opcua-client` : the real OPC UA binding (default: enabled). Without it
//!   only the session traits are available.

use std::time::Duration;

use opcgate_mqtt::{InboundMessage, MqttInstance, MqttManager, TransferError};
use tokio::sync::mpsc;

pub mod config;
pub mod core;
pub mod logger;

/// Starts the broker adapter and waits for the first CONNACK.
///
/// # Errors
///
/// Fails when the broker cannot be reached within the configured connection
/// timeout. The gateway must not start in that case.
pub async fn connect_broker(
    config: &config::Config,
) -> Result<(MqttInstance, mpsc::Receiver<InboundMessage>), TransferError> {
    let manager = MqttManager::from_config(config.mqtt.clone())?;
    let (instance, inbound) = manager.build_and_start(config.bridge.subscriptions())?;

    let timeout = Duration::from_secs(config.mqtt.connection_timeout);
    if let Err(e) = instance.wait_connected(timeout).await {
        instance.shutdown().await;
        return Err(e);
    }
    Ok((instance, inbound))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_broker_is_startup_error() {
        let mut config = config::Config::default();
        config.mqtt.host = "127.0.0.1".into();
        config.mqtt.port = 1;
        config.mqtt.connection_timeout = 5;

        let result = connect_broker(&config).await;
        assert!(matches!(result, Err(TransferError::Startup(_))));
    }
}
