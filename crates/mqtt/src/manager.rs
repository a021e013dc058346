//! High-level broker adapter.
//!
//! `MqttManager` wires the client, the connection kernel and the supervisor
//! together and hands back an [`MqttInstance`] plus the receiving end of the
//! inbound message channel:
//!
//! ```ignore
//! let manager = MqttManager::from_config(config)?;
//! let (instance, mut inbound) = manager.build_and_start(subscriptions)?;
//! instance.wait_connected(Duration::from_secs(10)).await?;
//!
//! while let Some(message) = inbound.recv().await {
//!     // route message.topic / message.payload
//! }
//! ```
//!
//! Shutdown ordering: new publishes are refused, publishes already inside
//! `publish()` are awaited, and only then is the kernel told to flush and
//! disconnect.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use bytes::Bytes;
use rumqttc::{AsyncClient, QoS};
use tokio::{
    sync::{mpsc, watch, Mutex, Notify},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    backoff::Backoff,
    client::ClientBuilder,
    config::Config,
    connection::ConnectionKernel,
    error::TransferError,
    message::InboundMessage,
    state::ConnectionState,
    supervisor::{SubscriptionSet, Supervisor},
};

/// Tracks publishes currently inside `MqttInstance::publish`.
#[derive(Debug, Default)]
pub struct PublishDrain {
    inflight: AtomicUsize,
    notify: Notify,
}

impl PublishDrain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(self: &Arc<Self>) -> PublishGuard {
        self.inflight.fetch_add(1, Ordering::AcqRel);
        PublishGuard {
            drain: self.clone(),
        }
    }

    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    /// Resolves once no publish is in flight.
    pub async fn wait_idle(&self) {
        loop {
            // Registered before the check so a concurrent last guard drop is not missed.
            let notified = self.notify.notified();
            if self.inflight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

pub struct PublishGuard {
    drain: Arc<PublishDrain>,
}

impl Drop for PublishGuard {
    fn drop(&mut self) {
        if self.drain.inflight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.drain.notify.notify_waiters();
        }
    }
}

/// Entry point for building the broker adapter.
pub struct MqttManager {
    config: Config,
}

impl MqttManager {
    pub fn from_config(config: Config) -> Result<Self, TransferError> {
        Ok(Self { config })
    }

    /// Creates a manager with default settings for `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, TransferError> {
        Self::from_config(Config {
            host: host.into(),
            port,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Builds the client, spawns the connection kernel and the supervisor.
    ///
    /// The connection itself happens asynchronously; use
    /// [`MqttInstance::wait_connected`] to learn whether the broker was reached.
    pub fn build_and_start(
        self,
        subscriptions: SubscriptionSet,
    ) -> Result<(MqttInstance, mpsc::Receiver<InboundMessage>), TransferError> {
        let (client, event_loop) = ClientBuilder::from_config(&self.config)?.build()?;
        info!(
            "Connecting to broker {}:{}...",
            self.config.host, self.config.port
        );

        let (inbound_tx, inbound_rx) = mpsc::channel(self.config.inbound_channel_capacity);
        let backoff = Backoff::new(
            Duration::from_secs(self.config.reconnect_delay),
            Duration::from_secs(self.config.reconnect_max_delay),
            2.0,
        );

        // Shutdown request for the application side; the kernel gets its own
        // token that only fires after the publish drain.
        let cancel_token = CancellationToken::new();
        let connection_cancel = CancellationToken::new();

        let mut kernel = ConnectionKernel::new(
            client.clone(),
            event_loop,
            backoff,
            inbound_tx,
            connection_cancel.clone(),
        );
        let state_rx = kernel.subscribe_state();

        let supervisor = Supervisor::new(
            state_rx.clone(),
            subscriptions,
            client.clone(),
            cancel_token.clone(),
        );
        supervisor.monitor();

        let kernel_handle = tokio::spawn(async move {
            match kernel.run().await {
                Ok(()) => debug!("Broker connection kernel stopped"),
                Err(TransferError::Startup(reason)) => {
                    debug!("Broker connection kernel failed at startup: {}", reason)
                }
                Err(e) => error!("Broker connection kernel exited with error: {}", e),
            }
        });

        let instance = MqttInstance {
            client,
            state_rx,
            cancel_token,
            connection_cancel,
            publish_drain: Arc::new(PublishDrain::new()),
            kernel_handle: Arc::new(Mutex::new(Some(kernel_handle))),
            shut_down: Arc::new(AtomicBool::new(false)),
        };
        Ok((instance, inbound_rx))
    }
}

/// A running broker adapter.
///
/// Cheap to clone; every clone shares the same connection.
#[derive(Debug, Clone)]
pub struct MqttInstance {
    client: AsyncClient,
    state_rx: watch::Receiver<ConnectionState>,
    cancel_token: CancellationToken,
    connection_cancel: CancellationToken,
    publish_drain: Arc<PublishDrain>,
    kernel_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
    shut_down: Arc<AtomicBool>,
}

impl MqttInstance {
    /// Waits for the first CONNACK.
    ///
    /// Fails with `TransferError::Startup` when the first attempt fails or
    /// nothing is decided within `timeout`.
    pub async fn wait_connected(&self, timeout: Duration) -> Result<(), TransferError> {
        let mut state_rx = self.state_rx.clone();
        let decided = tokio::time::timeout(timeout, state_rx.wait_for(|s| !s.is_connecting()))
            .await
            .map_err(|_| {
                TransferError::Startup(format!("no CONNACK within {}s", timeout.as_secs()))
            })?
            .map_err(|_| TransferError::ConnectionKernel("connection kernel stopped".into()))?
            .clone();

        match decided {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Disconnected(reason) => Err(TransferError::Startup(reason)),
            other => Err(TransferError::Startup(format!("unexpected state {other}"))),
        }
    }

    /// Queues a QoS 0, non-retained publish without waiting.
    ///
    /// Never blocks: while the broker is unreachable the client queue fills
    /// up and further publishes are dropped with a warning. Delivery is best
    /// effort either way.
    pub async fn publish(
        &self,
        topic: &str,
        payload: impl Into<Bytes>,
    ) -> Result<(), TransferError> {
        if self.cancel_token.is_cancelled() {
            return Err(TransferError::ConnectionKernel(
                "adapter is shutting down".into(),
            ));
        }
        let _guard = self.publish_drain.enter();
        let payload: Bytes = payload.into();
        if let Err(e) = self
            .client
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())
        {
            warn!("Broker request queue full, dropping publish on {}: {}", topic, e);
        }
        Ok(())
    }

    /// Gracefully stops the adapter. Safe to call more than once.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            debug!("Broker adapter already shut down");
            return;
        }

        self.cancel_token.cancel();
        self.publish_drain.wait_idle().await;
        self.connection_cancel.cancel();

        if let Some(handle) = self.kernel_handle.lock().await.take() {
            if let Err(e) = handle.await {
                error!("Broker connection kernel task failed: {}", e);
            }
        }
        info!("Broker adapter stopped");
    }
}
