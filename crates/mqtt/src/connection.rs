//! Connection kernel: drives the rumqttc event loop.
//!
//! The kernel is the adapter's own execution context. It runs on a dedicated
//! tokio task and is responsible for:
//!
//! 1. Pumping the event loop so queued publishes reach the broker
//! 2. Forwarding inbound PUBLISH packets to the application channel
//! 3. Broadcasting [`ConnectionState`] changes over a watch channel
//! 4. Reconnecting with [`Backoff`] once the broker has been reached at least once
//! 5. Flushing the request queue and disconnecting on cancellation
//!
//! A failure before the first CONNACK ends the kernel with
//! `TransferError::Startup`: the broker is mandatory at boot.

use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, Outgoing, Packet};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::{
    backoff::Backoff, error::TransferError, message::InboundMessage, state::ConnectionState,
};

/// Upper bound for flushing queued requests on shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ConnectionKernel {
    client: AsyncClient,
    event_loop: EventLoop,
    backoff: Backoff,
    cancel: CancellationToken,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    inbound_tx: mpsc::Sender<InboundMessage>,
    /// Set on the first successful CONNACK; switches errors from fatal to retryable.
    ever_connected: bool,
}

impl ConnectionKernel {
    pub fn new(
        client: AsyncClient,
        event_loop: EventLoop,
        backoff: Backoff,
        inbound_tx: mpsc::Sender<InboundMessage>,
        cancel: CancellationToken,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        Self {
            client,
            event_loop,
            backoff,
            cancel,
            state_tx,
            state_rx,
            inbound_tx,
            ever_connected: false,
        }
    }

    /// Subscribes to connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Broadcasts `state` if it differs from the current one.
    fn update_state(&self, state: ConnectionState) {
        let changed = *self.state_tx.borrow() != state;
        if changed {
            debug!("Broker connection state -> {}", state);
            // Receivers may all be gone during shutdown; nothing to report then.
            let _ = self.state_tx.send(state);
        }
    }

    /// Runs until cancellation or a boot-time connection failure.
    pub async fn run(&mut self) -> Result<(), TransferError> {
        self.update_state(ConnectionState::Connecting);
        self.backoff.reset();
        info!("Starting broker event loop...");

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    self.drain_and_disconnect().await;
                    return Ok(());
                }

                event = self.event_loop.poll() => match event {
                    Ok(event) => self.handle_event(event),
                    Err(e) => {
                        let reason = get_error_message(&e);
                        if !self.ever_connected {
                            self.update_state(ConnectionState::Disconnected(reason.clone()));
                            return Err(TransferError::Startup(reason));
                        }

                        let delay = self.backoff.next_sleep()?;
                        error!(
                            "Broker connection lost ({}); reconnecting in {:.2} seconds",
                            reason,
                            delay.as_secs_f64()
                        );
                        self.update_state(ConnectionState::Reconnecting(delay.as_secs_f64()));

                        tokio::select! {
                            _ = self.cancel.cancelled() => {
                                self.drain_and_disconnect().await;
                                return Ok(());
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                        self.update_state(ConnectionState::Connecting);
                    }
                },
            }
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Incoming(Packet::ConnAck(ack)) => {
                if ack.code == ConnectReturnCode::Success {
                    info!("Connected to broker");
                    self.ever_connected = true;
                    self.backoff.reset();
                    self.update_state(ConnectionState::Connected);
                } else {
                    warn!("Broker refused connection: {:?}", ack.code);
                }
            }
            Event::Incoming(Packet::Publish(publish)) => {
                trace!("Received publish on topic {}", publish.topic);
                self.forward(InboundMessage::from(publish));
            }
            Event::Incoming(Packet::Disconnect) => {
                warn!("Disconnected by broker");
            }
            Event::Incoming(packet) => {
                trace!("Incoming packet: {:?}", packet);
            }
            Event::Outgoing(outgoing) => {
                trace!("Outgoing packet: {:?}", outgoing);
            }
        }
    }

    /// Hands an inbound message to the application without stalling the event loop.
    fn forward(&self, message: InboundMessage) {
        match self.inbound_tx.try_send(message) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(message)) => {
                error!(
                    "Inbound queue full, dropping message on topic {}",
                    message.topic
                );
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                debug!(
                    "Inbound receiver closed, dropping message on topic {}",
                    message.topic
                );
            }
        }
    }

    /// Queues DISCONNECT behind every pending request and keeps polling until
    /// it has been written, so publishes queued before shutdown still go out.
    async fn drain_and_disconnect(&mut self) {
        info!("Shutdown requested, flushing broker queue...");

        let client = self.client.clone();
        tokio::spawn(async move {
            if let Err(e) = client.disconnect().await {
                warn!("Error queueing disconnect packet: {}", e);
            }
        });

        let event_loop = &mut self.event_loop;
        let flushed = tokio::time::timeout(DRAIN_TIMEOUT, async {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => return true,
                    Ok(_) => continue,
                    Err(e) => {
                        debug!("Event loop ended while flushing: {}", e);
                        return false;
                    }
                }
            }
        })
        .await;

        match flushed {
            Ok(true) => info!("Broker queue flushed, disconnected"),
            Ok(false) => warn!("Broker connection ended before the queue was flushed"),
            Err(_) => warn!(
                "Timed out after {:?} flushing broker queue",
                DRAIN_TIMEOUT
            ),
        }
        self.update_state(ConnectionState::Disconnected("shutdown".into()));
    }
}

/// Extracts the innermost message from an error chain.
fn get_error_message(e: &dyn std::error::Error) -> String {
    let mut current = e;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string().trim_matches('"').to_string()
}
