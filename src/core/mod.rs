//! Gateway runtime.
//!
//! - `session`: connection supervisor (establish, resolve, teardown)
//! - `detector`: change detector polling the flag node
//! - `router`: command router for inbound broker messages
//! - `gateway`: the supervised outer loop and shutdown
//! - `context`: state shared by the loop and the router

pub mod context;
pub mod detector;
pub mod error;
pub mod gateway;
pub mod publisher;
pub mod readiness;
pub mod router;
pub mod session;

#[cfg(test)]
pub(crate) mod fakes;

pub use context::{BoundNodes, GatewayContext};
pub use error::{GatewayError, NodeAccess};
pub use gateway::Gateway;
pub use publisher::Publisher;
