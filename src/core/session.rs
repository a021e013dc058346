//! Connection supervisor: automation-server session lifecycle.
//!
//! Opens a session and resolves both configured nodes. A node that cannot
//! be resolved ends the session: it is closed before the error is returned,
//! and the caller retries from scratch after its backoff.

use std::sync::Arc;

use opcgate_opcua::{Connector, NodeAddress, NodeHandle, Session};
use tracing::{debug, info};

use super::{context::BoundNodes, error::GatewayError};
use crate::config::opcua::OpcUaConfig;

pub struct SessionSupervisor {
    connector: Arc<dyn Connector>,
    endpoint: String,
    flag: NodeAddress,
    counter: NodeAddress,
}

impl SessionSupervisor {
    pub fn new(connector: Arc<dyn Connector>, config: &OpcUaConfig) -> Self {
        Self {
            connector,
            endpoint: config.endpoint.clone(),
            flag: config.flag_node.clone(),
            counter: config.counter_node.clone(),
        }
    }

    /// Opens a new session.
    pub async fn establish(&self) -> Result<Arc<dyn Session>, GatewayError> {
        info!("Connecting to automation server {}...", self.endpoint);
        let session = self
            .connector
            .connect(&self.endpoint)
            .await
            .map_err(GatewayError::Connection)?;
        info!("Automation server session {} established", session.id());
        Ok(session)
    }

    /// Resolves one node within `session`.
    pub async fn resolve(
        &self,
        session: &dyn Session,
        address: &NodeAddress,
    ) -> Result<NodeHandle, GatewayError> {
        let handle = session
            .resolve(address)
            .await
            .map_err(GatewayError::NodeResolution)?;
        debug!("Resolved {} in session {}", address, session.id());
        Ok(handle)
    }

    /// Establishes a session and binds both nodes to it.
    pub async fn open(&self) -> Result<BoundNodes, GatewayError> {
        let session = self.establish().await?;

        let resolved = async {
            let flag = self.resolve(session.as_ref(), &self.flag).await?;
            let counter = self.resolve(session.as_ref(), &self.counter).await?;
            Ok::<_, GatewayError>((flag, counter))
        }
        .await;

        match resolved {
            Ok((flag, counter)) => Ok(BoundNodes {
                session,
                flag,
                counter,
            }),
            Err(e) => {
                session.close().await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fakes::FakeServer;

    fn supervisor_for(server: &Arc<FakeServer>) -> SessionSupervisor {
        SessionSupervisor::new(server.connector(), &OpcUaConfig::default())
    }

    #[tokio::test]
    async fn test_open_binds_both_nodes_to_one_session() {
        let server = FakeServer::new();
        let nodes = supervisor_for(&server).open().await.unwrap();

        assert_eq!(nodes.flag.session_id(), nodes.session_id());
        assert_eq!(nodes.counter.session_id(), nodes.session_id());
        assert_eq!(nodes.flag.address(), server.flag_address());
        assert_eq!(nodes.counter.address(), server.counter_address());
    }

    #[tokio::test]
    async fn test_establish_failure_is_connection_error() {
        let server = FakeServer::new();
        server.fail_next_connects(1);

        let result = supervisor_for(&server).open().await;
        assert!(matches!(result, Err(GatewayError::Connection(_))));
        assert!(server.resolutions().is_empty());
    }

    #[tokio::test]
    async fn test_resolution_failure_closes_session() {
        let server = FakeServer::new();
        server.remove_node(&server.counter_address().clone());

        let result = supervisor_for(&server).open().await;
        assert!(matches!(result, Err(GatewayError::NodeResolution(_))));

        let sessions = server.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].closes(), 1);
        assert_eq!(server.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_each_open_gets_fresh_handles() {
        let server = FakeServer::new();
        let supervisor = supervisor_for(&server);

        let first = supervisor.open().await.unwrap();
        let second = supervisor.open().await.unwrap();
        assert_ne!(first.session_id(), second.session_id());
        assert!(second.counter.check_session(first.session_id()).is_err());
    }
}
