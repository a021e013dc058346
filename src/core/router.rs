//! Command router: handles inbound broker messages.
//!
//! Runs on its own task, fed by the adapter's inbound channel, and processes
//! one message at a time. A read request holds the router for the snapshot
//! delay, so messages behind it wait.

use opcgate_mqtt::InboundMessage;
use opcgate_opcua::NodeValue;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{
    context::{BoundNodes, GatewayContext},
    detector::{read_counter, read_flag},
    error::{GatewayError, NodeAccess},
    publisher::{counter_payload, flag_payload},
};

pub struct CommandRouter {
    ctx: GatewayContext,
}

impl CommandRouter {
    pub fn new(ctx: GatewayContext) -> Self {
        Self { ctx }
    }

    /// Consumes inbound messages until stopped or the channel closes.
    pub async fn run(self, mut inbound: mpsc::Receiver<InboundMessage>) {
        debug!("Command router started");
        loop {
            let message = tokio::select! {
                biased;
                _ = self.ctx.cancel.cancelled() => break,
                message = inbound.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            self.handle(message).await;
        }
        debug!("Command router stopped");
    }

    /// Dispatches one message and logs its outcome.
    pub async fn handle(&self, message: InboundMessage) {
        let _command = self.ctx.command.lock().await;
        let bridge = &self.ctx.bridge;
        let result = if message.topic == bridge.write_topic {
            self.handle_write(&message.payload).await
        } else if message.topic == bridge.read_topic {
            info!("Read request received");
            self.handle_read_request().await
        } else {
            debug!("Ignoring message on unexpected topic {}", message.topic);
            Ok(())
        };

        match result {
            Ok(()) => {}
            Err(e) if e.is_not_ready() => warn!("{}; message on {} dropped", e, message.topic),
            Err(e) => error!("{}; message on {} dropped", e, message.topic),
        }
    }

    /// Writes the decimal integer in `payload` to the counter node.
    pub async fn handle_write(&self, payload: &[u8]) -> Result<(), GatewayError> {
        let value = decode_counter(payload)?;
        let nodes = self.bound().await.map_err(GatewayError::Write)?;

        nodes
            .session
            .write(&nodes.counter, NodeValue::Int32(value))
            .await
            .map_err(|e| GatewayError::Write(NodeAccess::Failed(e)))?;
        info!("Wrote {} to counter node {}", value, nodes.counter.address());
        Ok(())
    }

    /// Publishes the counter, waits the snapshot delay, then publishes the flag.
    ///
    /// The delay is not cut short by a stop request once the counter is out.
    pub async fn handle_read_request(&self) -> Result<(), GatewayError> {
        let nodes = self.bound().await.map_err(GatewayError::Read)?;
        let bridge = &self.ctx.bridge;

        let counter = read_counter(&nodes).await?;
        self.ctx
            .publisher
            .publish(&bridge.counter_topic, counter_payload(counter))
            .await?;

        tokio::time::sleep(bridge.snapshot_delay()).await;

        let flag = read_flag(&nodes).await?;
        self.ctx
            .publisher
            .publish(&bridge.flag_topic, flag_payload(flag))
            .await?;

        info!("Snapshot sent: counter={}, flag={}", counter, flag);
        Ok(())
    }

    async fn bound(&self) -> Result<BoundNodes, NodeAccess> {
        self.ctx.bound().await.ok_or(NodeAccess::NotReady)
    }
}

/// Parses a UTF-8 decimal integer, surrounding whitespace allowed.
pub fn decode_counter(payload: &[u8]) -> Result<i32, GatewayError> {
    let decode_error = || GatewayError::Decode {
        payload: String::from_utf8_lossy(payload).into_owned(),
    };
    std::str::from_utf8(payload)
        .map_err(|_| decode_error())?
        .trim()
        .parse::<i32>()
        .map_err(|_| decode_error())
}
