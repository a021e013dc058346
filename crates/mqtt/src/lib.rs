//! # opcgate_mqtt: broker adapter
//!
//! Owns the single MQTT connection of the gateway. Built on `rumqttc`, it adds:
//!
//! - **Boot check**: the first connection attempt is decisive, see
//!   [`MqttInstance::wait_connected`]
//! - **Automatic reconnection** with exponential backoff after boot
//! - **Subscription persistence**: the fixed [`SubscriptionSet`] is re-issued on
//!   every CONNACK
//! - **Inbound channel**: messages on subscribed topics arrive as
//!   [`InboundMessage`] on a bounded `mpsc` receiver
//! - **Graceful shutdown**: pending publishes are flushed before DISCONNECT
//!
//! # Quick Start
//!
//! ```ignore
//! use std::time::Duration;
//! use opcgate_mqtt::{MqttManager, SubscriptionSet};
//!
//! let manager = MqttManager::new("broker.local", 1883)?;
//! let (instance, mut inbound) =
//!     manager.build_and_start(SubscriptionSet::new(["plant/counter/set"]))?;
//! instance.wait_connected(Duration::from_secs(10)).await?;
//!
//! instance.publish("plant/flag", "True").await?;
//! if let Some(message) = inbound.recv().await {
//!     println!("{} -> {:?}", message.topic, message.payload);
//! }
//! instance.shutdown().await;
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ MqttManager / MqttInstance           │
//! └────────────┬─────────────────────────┘
//!              │
//! ┌────────────▼─────────────────────────┐
//! │ Supervisor        ConnectionKernel   │
//! │ (subscribe on     (event loop task,  │
//! │  CONNACK)          state, inbound)   │
//! └────────────┬─────────────────────────┘
//!              │
//! ┌────────────▼─────────────────────────┐
//! │ rumqttc AsyncClient / EventLoop      │
//! └──────────────────────────────────────┘
//! ```
//!
//! Publishes are QoS 0 and never retained. Subscriptions use QoS 1.

pub mod backoff;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod manager;
pub mod message;
pub mod state;
pub mod supervisor;

pub use backoff::{Backoff, BackoffError};
pub use config::Config;
pub use connection::ConnectionKernel;
pub use error::TransferError;
pub use manager::{MqttInstance, MqttManager};
pub use message::InboundMessage;
pub use state::ConnectionState;
pub use supervisor::{SubscriptionSet, Supervisor};

/// Result type for broker adapter operations.
pub type Result<T> = std::result::Result<T, TransferError>;
