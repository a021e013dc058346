//! Transport-independent session traits.
//!
//! The gateway only talks to the automation server through these two traits,
//! so tests can substitute in-memory implementations.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use async_trait::async_trait;

use super::{
    error::SessionError,
    node::{NodeAddress, NodeHandle, NodeValue},
};

/// Opens sessions against an endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<Arc<dyn Session>, SessionError>;
}

/// A live session. At most one exists at a time in the gateway.
#[async_trait]
pub trait Session: Send + Sync {
    /// Identifier unique within the process; stamped on every handle.
    fn id(&self) -> u64;

    fn is_active(&self) -> bool;

    /// Checks the node exists and returns a handle bound to this session.
    async fn resolve(&self, address: &NodeAddress) -> Result<NodeHandle, SessionError>;

    async fn read(&self, handle: &NodeHandle) -> Result<NodeValue, SessionError>;

    async fn write(&self, handle: &NodeHandle, value: NodeValue) -> Result<(), SessionError>;

    /// Closes the session. Calling it again is a no-op.
    async fn close(&self);
}

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates a process-unique session id.
pub fn next_session_id() -> u64 {
    NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_unique() {
        let a = next_session_id();
        let b = next_session_id();
        assert_ne!(a, b);
        assert!(b > a);
    }
}
