//! rumqttc client construction.
//!
//! `ClientBuilder` turns a validated [`Config`] into an `AsyncClient` (used
//! for publish/subscribe/disconnect requests) and its `EventLoop` (driven by
//! the connection kernel). Both come out of `build()` together.
//!
//! ```ignore
//! let (client, event_loop) = ClientBuilder::from_config(&config)?.build()?;
//! ```

use std::time::Duration;

use rumqttc::{AsyncClient, EventLoop, MqttOptions};
use validator::Validate;

use super::{config::Config, error::TransferError};

/// Fluent builder for the broker client.
pub struct ClientBuilder {
    opts: MqttOptions,

    /// Request channel capacity; bounds how many publishes can be queued.
    cap: usize,
}

impl ClientBuilder {
    pub fn new(
        client_id: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        cap: usize,
    ) -> Result<Self, TransferError> {
        if cap == 0 {
            return Err(TransferError::ClientSetup(
                "request channel capacity must be positive".into(),
            ));
        }
        Ok(Self {
            opts: MqttOptions::new(client_id, host, port),
            cap,
        })
    }

    /// Creates a builder from configuration, validating it first.
    pub fn from_config(config: &Config) -> Result<Self, TransferError> {
        config.validate()?;
        config
            .check_delays()
            .map_err(|e| TransferError::ClientSetup(e.to_string()))?;

        let builder = Self::new(
            config.effective_client_id(),
            config.host.clone(),
            config.port,
            config.request_channel_capacity,
        )?
        .keep_alive(config.keep_alive)
        .clean_session(config.clean_session)
        .max_inflight(config.max_inflight);

        Ok(match config.max_packet_size {
            Some(size) => builder.max_packet_size(size as usize, size as usize),
            None => builder,
        })
    }

    /// Keep-alive interval; the client pings the broker when idle this long.
    pub fn keep_alive(mut self, secs: u64) -> Self {
        self.opts.set_keep_alive(Duration::from_secs(secs));
        self
    }

    pub fn max_packet_size(mut self, incoming: usize, outgoing: usize) -> Self {
        self.opts.set_max_packet_size(incoming, outgoing);
        self
    }

    pub fn clean_session(mut self, clean: bool) -> Self {
        self.opts.set_clean_session(clean);
        self
    }

    pub fn max_inflight(mut self, max: u16) -> Self {
        self.opts.set_inflight(max);
        self
    }

    pub fn build(self) -> Result<(AsyncClient, EventLoop), TransferError> {
        let (client, event_loop) = AsyncClient::new(self.opts, self.cap);
        Ok((client, event_loop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_rejects_zero_capacity() {
        assert!(ClientBuilder::new("gw", "localhost", 1883, 0).is_err());
    }

    #[test]
    fn test_build_tcp_client() {
        let result = ClientBuilder::new("gw", "localhost", 1883, 10)
            .unwrap()
            .keep_alive(30)
            .clean_session(true)
            .max_inflight(20)
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_build_from_config() {
        let config = Config {
            client_id: "test_client".into(),
            ..Default::default()
        };
        let (client, event_loop) = ClientBuilder::from_config(&config).unwrap().build().unwrap();
        assert!(!format!("{:?}", client).is_empty());
        assert_eq!(event_loop.mqtt_options.client_id(), "test_client");
    }

    #[test]
    fn test_build_from_invalid_config() {
        let config = Config {
            host: String::new(),
            ..Default::default()
        };
        assert!(ClientBuilder::from_config(&config).is_err());
    }
}
