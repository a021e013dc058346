//! Outbound seam towards the broker.

use async_trait::async_trait;
use opcgate_mqtt::MqttInstance;

use super::error::GatewayError;

/// Fire-and-forget publishing, safe to call from the detector and the router
/// at the same time.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), GatewayError>;

    /// Flushes what is queued and disconnects. Repeated calls are no-ops.
    async fn close(&self);
}

/// Flag payload, capitalized the way downstream consumers expect.
pub fn flag_payload(value: bool) -> String {
    if value { "True" } else { "False" }.to_string()
}

pub fn counter_payload(value: i32) -> String {
    value.to_string()
}

#[async_trait]
impl Publisher for MqttInstance {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), GatewayError> {
        MqttInstance::publish(self, topic, payload)
            .await
            .map_err(|e| GatewayError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn close(&self) {
        self.shutdown().await;
    }
}
