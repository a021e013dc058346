//! Gateway topics and timing (`[bridge]`).
//!
//! ```toml
//! [bridge]
//! flag_topic = "UEA/MPEE/sic/Flag"
//! counter_topic = "UEA/MPEE/sic/gw/Contador"
//! write_topic = "UEA/MPEE/sic/Contador"
//! read_topic = "UEA/MPEE/sic/gw/LerDados"
//! poll_interval_ms = 1000
//! reconnect_backoff_ms = 2000
//! snapshot_delay_ms = 3000
//! ```

use std::time::Duration;

use opcgate_mqtt::SubscriptionSet;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_subscriptions"))]
pub struct BridgeConfig {
    /// Published: flag state, "True" / "False".
    #[validate(length(min = 1), custom(function = "validate_topic"))]
    pub flag_topic: String,

    /// Published: counter value as decimal text.
    #[validate(length(min = 1), custom(function = "validate_topic"))]
    pub counter_topic: String,

    /// Subscribed: decimal integer to write into the counter node.
    #[validate(length(min = 1), custom(function = "validate_topic"))]
    pub write_topic: String,

    /// Subscribed: any payload triggers a counter/flag snapshot.
    #[validate(length(min = 1), custom(function = "validate_topic"))]
    pub read_topic: String,

    #[validate(range(min = 1))]
    pub poll_interval_ms: u64,

    /// Wait before retrying the automation server after any failure.
    #[validate(range(min = 1))]
    pub reconnect_backoff_ms: u64,

    /// Pause between the counter and the flag publish of a snapshot.
    #[validate(range(min = 1))]
    pub snapshot_delay_ms: u64,
}

/// Topics are used literally, never as filters.
fn validate_topic(topic: &str) -> Result<(), ValidationError> {
    if topic.contains(['+', '#']) {
        let mut err = ValidationError::new("wildcard_topic");
        err.message = Some(format!("Topic '{topic}' must not contain wildcards").into());
        return Err(err);
    }
    Ok(())
}

fn validate_subscriptions(config: &BridgeConfig) -> Result<(), ValidationError> {
    if config.write_topic == config.read_topic {
        let mut err = ValidationError::new("ambiguous_subscription");
        err.message = Some("write_topic and read_topic must differ".into());
        return Err(err);
    }
    Ok(())
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            flag_topic: "UEA/MPEE/sic/Flag".into(),
            counter_topic: "UEA/MPEE/sic/gw/Contador".into(),
            write_topic: "UEA/MPEE/sic/Contador".into(),
            read_topic: "UEA/MPEE/sic/gw/LerDados".into(),
            poll_interval_ms: 1_000,
            reconnect_backoff_ms: 2_000,
            snapshot_delay_ms: 3_000,
        }
    }
}

impl BridgeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub fn snapshot_delay(&self) -> Duration {
        Duration::from_millis(self.snapshot_delay_ms)
    }

    /// The fixed set the broker adapter subscribes to.
    pub fn subscriptions(&self) -> SubscriptionSet {
        SubscriptionSet::new([self.write_topic.clone(), self.read_topic.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BridgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.snapshot_delay(), Duration::from_secs(3));
        assert_eq!(config.reconnect_backoff(), Duration::from_secs(2));
    }

    #[test]
    fn test_subscriptions_are_write_and_read_topics() {
        let config = BridgeConfig::default();
        let set = config.subscriptions();
        assert_eq!(set.topics().len(), 2);
        assert!(set.contains("UEA/MPEE/sic/Contador"));
        assert!(set.contains("UEA/MPEE/sic/gw/LerDados"));
    }

    #[test]
    fn test_rejects_wildcards() {
        let config = BridgeConfig {
            read_topic: "plant/#".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_interval() {
        let config = BridgeConfig {
            reconnect_backoff_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_same_write_and_read_topic() {
        let config = BridgeConfig {
            read_topic: "UEA/MPEE/sic/Contador".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
