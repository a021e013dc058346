//! # opcgate_opcua: automation-server side of the gateway
//!
//! - [`NodeAddress`]: textual node id (`ns=1;i=1000`, `ns=2;s=Name`)
//! - [`NodeHandle`]: a node resolved within one session, refused by others
//! - [`NodeValue`]: the Boolean and integer values the gateway exchanges
//! - [`Connector`] / [`Session`]: the seam the gateway is written against
//!
//! With the default `client` feature, [`OpcUaConnector`] implements the
//! traits on top of `async-opcua` (anonymous, security policy None).
//!
//! ```ignore
//! let connector = OpcUaConnector::new(&ClientSettings::default())?;
//! let session = connector.connect("opc.tcp://localhost:4840").await?;
//! let counter = session.resolve(&"ns=1;i=1001".parse()?).await?;
//! session.write(&counter, NodeValue::Int32(42)).await?;
//! session.close().await;
//! ```

pub mod error;
pub mod node;
pub mod session;
pub mod settings;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "client")]
pub use client::{OpcUaConnector, OpcUaSession};
pub use error::SessionError;
pub use node::{Identifier, NodeAddress, NodeHandle, NodeValue};
pub use session::{next_session_id, Connector, Session};
pub use settings::ClientSettings;

pub type Result<T> = std::result::Result<T, SessionError>;
