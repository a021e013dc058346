//! Inbound messages delivered from the connection kernel to the application.

use bytes::Bytes;

/// A PUBLISH received on one of the subscribed topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

impl From<rumqttc::Publish> for InboundMessage {
    fn from(publish: rumqttc::Publish) -> Self {
        Self {
            topic: publish.topic,
            payload: publish.payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use rumqttc::QoS;

    use super::*;

    #[test]
    fn test_from_publish_keeps_topic_and_payload() {
        let publish = rumqttc::Publish::new("plant/counter/set", QoS::AtMostOnce, "42");
        let message = InboundMessage::from(publish);
        assert_eq!(message.topic, "plant/counter/set");
        assert_eq!(&message.payload[..], b"42");
    }
}
