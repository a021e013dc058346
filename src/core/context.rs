//! Shared gateway context.
//!
//! Replaces process-wide state: one `GatewayContext` is cloned into the
//! gateway loop (which owns the change detector) and into the command router.
//! The only thing both sides touch is the node slot; `GatewayState` stays
//! inside the detector.

use std::{sync::Arc, time::Duration};

use opcgate_opcua::{NodeHandle, Session};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use super::{
    publisher::Publisher,
    readiness::{Readiness, ReadinessState},
};
use crate::config::bridge::BridgeConfig;

/// Handles resolved in one session, together with that session.
#[derive(Clone)]
pub struct BoundNodes {
    pub session: Arc<dyn Session>,
    pub flag: NodeHandle,
    pub counter: NodeHandle,
}

impl BoundNodes {
    pub fn session_id(&self) -> u64 {
        self.session.id()
    }
}

impl std::fmt::Debug for BoundNodes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundNodes")
            .field("session", &self.session.id())
            .field("flag", &self.flag)
            .field("counter", &self.counter)
            .finish()
    }
}

pub type NodeSlot = Arc<RwLock<Option<BoundNodes>>>;

#[derive(Clone)]
pub struct GatewayContext {
    pub bridge: Arc<BridgeConfig>,
    pub publisher: Arc<dyn Publisher>,
    pub nodes: NodeSlot,
    pub readiness: Readiness,
    /// Cancelled on operator stop; "running" is `!cancel.is_cancelled()`.
    pub cancel: CancellationToken,
    /// Held by the router while it handles one message.
    pub command: Arc<Mutex<()>>,
}

impl GatewayContext {
    pub fn new(bridge: BridgeConfig, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            bridge: Arc::new(bridge),
            publisher,
            nodes: Arc::new(RwLock::new(None)),
            readiness: Readiness::new(),
            cancel: CancellationToken::new(),
            command: Arc::new(Mutex::new(())),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Publishes freshly resolved handles.
    pub async fn bind(&self, nodes: BoundNodes) {
        let session_id = nodes.session_id();
        *self.nodes.write().await = Some(nodes);
        self.readiness.set_state(ReadinessState::Ready(session_id));
    }

    /// Drops the handles; nothing can use them afterwards.
    pub async fn unbind(&self, reason: &str) -> Option<BoundNodes> {
        let previous = self.nodes.write().await.take();
        self.readiness
            .set_state(ReadinessState::NotReadyYet(reason.to_string()));
        previous
    }

    /// A snapshot of the current handles, if a session is active.
    pub async fn bound(&self) -> Option<BoundNodes> {
        self.nodes
            .read()
            .await
            .as_ref()
            .filter(|nodes| nodes.session.is_active())
            .cloned()
    }

    /// Sleeps unless stopped first. Returns false when stopped.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fakes::{FakeServer, RecordingPublisher};

    #[tokio::test]
    async fn test_bind_and_unbind_track_readiness() {
        let server = FakeServer::new();
        let ctx = GatewayContext::new(BridgeConfig::default(), RecordingPublisher::new());
        let nodes = server.bound_nodes().await;
        let id = nodes.session_id();

        ctx.bind(nodes).await;
        assert_eq!(ctx.readiness.current_state(), ReadinessState::Ready(id));
        assert!(ctx.bound().await.is_some());

        let previous = ctx.unbind("lost").await;
        assert_eq!(previous.map(|n| n.session_id()), Some(id));
        assert!(ctx.bound().await.is_none());
        assert!(!ctx.readiness.current_state().is_ready());
    }

    #[tokio::test]
    async fn test_bound_hides_inactive_session() {
        let server = FakeServer::new();
        let ctx = GatewayContext::new(BridgeConfig::default(), RecordingPublisher::new());
        ctx.bind(server.bound_nodes().await).await;

        server.drop_sessions();
        assert!(ctx.bound().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_is_cut_short_by_cancel() {
        let ctx = GatewayContext::new(BridgeConfig::default(), RecordingPublisher::new());
        let sleeper = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.sleep(Duration::from_secs(60)).await })
        };
        ctx.cancel.cancel();
        assert!(!sleeper.await.unwrap());
        assert!(!ctx.is_running());
    }
}
