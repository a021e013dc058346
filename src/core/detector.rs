//! Change detector: polls the flag node within one session.
//!
//! Publication is edge-triggered: the flag (and a counter snapshot right
//! after it) is published when the value differs from the last published
//! one, and unconditionally on the first poll of every session. A failed
//! read ends the detector after the reconnect backoff.

use opcgate_opcua::{NodeHandle, SessionError};
use tracing::{debug, error, info, trace};

use super::{
    context::{BoundNodes, GatewayContext},
    error::{GatewayError, NodeAccess},
    publisher::{counter_payload, flag_payload},
};

/// Edge-detection memory, reset on every new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayState {
    last_flag: bool,
    first_poll: bool,
}

impl Default for GatewayState {
    fn default() -> Self {
        Self {
            last_flag: false,
            first_poll: true,
        }
    }
}

impl GatewayState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Records `flag` and returns whether it must be published.
    pub fn observe(&mut self, flag: bool) -> bool {
        let publish = self.first_poll || flag != self.last_flag;
        if publish {
            self.last_flag = flag;
            self.first_poll = false;
        }
        publish
    }

    pub fn is_first_poll(&self) -> bool {
        self.first_poll
    }
}

/// Why the detector returned.
#[derive(Debug)]
pub enum DetectorExit {
    /// The session failed; it must be discarded.
    Disconnected(GatewayError),
    /// Operator stop.
    Stopped,
}

pub struct ChangeDetector {
    ctx: GatewayContext,
    nodes: BoundNodes,
    state: GatewayState,
}

impl ChangeDetector {
    pub fn new(ctx: GatewayContext, nodes: BoundNodes) -> Self {
        Self {
            ctx,
            nodes,
            state: GatewayState::default(),
        }
    }

    pub async fn run(mut self) -> DetectorExit {
        info!(
            "Monitoring started (session {}, every {:?})",
            self.nodes.session_id(),
            self.ctx.bridge.poll_interval()
        );
        self.state.reset();

        loop {
            if !self.ctx.is_running() {
                return DetectorExit::Stopped;
            }

            if let Err(e) = self.tick().await {
                error!("Polling failed, dropping session {}: {}", self.nodes.session_id(), e);
                if !self.ctx.sleep(self.ctx.bridge.reconnect_backoff()).await {
                    return DetectorExit::Stopped;
                }
                return DetectorExit::Disconnected(e);
            }

            if !self.ctx.sleep(self.ctx.bridge.poll_interval()).await {
                return DetectorExit::Stopped;
            }
        }
    }

    async fn tick(&mut self) -> Result<(), GatewayError> {
        let flag = read_flag(&self.nodes).await?;
        if !self.state.observe(flag) {
            trace!("Flag unchanged ({})", flag);
            return Ok(());
        }

        let bridge = &self.ctx.bridge;
        self.publish(&bridge.flag_topic, flag_payload(flag)).await;
        let counter = read_counter(&self.nodes).await?;
        self.publish(&bridge.counter_topic, counter_payload(counter))
            .await;

        info!("Flag changed to {} (counter {}), published", flag, counter);
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: String) {
        debug!("Publishing {} -> {}", topic, payload);
        if let Err(e) = self.ctx.publisher.publish(topic, payload).await {
            error!("{}", e);
        }
    }
}

async fn read_node(
    nodes: &BoundNodes,
    handle: &NodeHandle,
) -> Result<opcgate_opcua::NodeValue, GatewayError> {
    nodes
        .session
        .read(handle)
        .await
        .map_err(|e| GatewayError::Read(NodeAccess::Failed(e)))
}

/// Reads the flag node; only a Boolean is accepted.
pub async fn read_flag(nodes: &BoundNodes) -> Result<bool, GatewayError> {
    let value = read_node(nodes, &nodes.flag).await?;
    value.as_bool().ok_or_else(|| {
        GatewayError::Read(NodeAccess::Failed(SessionError::TypeMismatch {
            address: nodes.flag.address().to_string(),
            expected: "Boolean",
            actual: value.type_name().to_string(),
        }))
    })
}

/// Reads the counter node; any integer that fits in `i32` is accepted.
pub async fn read_counter(nodes: &BoundNodes) -> Result<i32, GatewayError> {
    let value = read_node(nodes, &nodes.counter).await?;
    value.as_i32().ok_or_else(|| {
        GatewayError::Read(NodeAccess::Failed(SessionError::TypeMismatch {
            address: nodes.counter.address().to_string(),
            expected: "integer within i32",
            actual: format!("{} {}", value.type_name(), value),
        }))
    })
}
