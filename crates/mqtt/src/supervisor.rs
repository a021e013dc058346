//! Subscribe-on-connect supervision.
//!
//! The `Supervisor` watches the kernel's connection state and re-issues the
//! fixed subscription set every time the broker acknowledges a connection.
//! With a clean session the broker forgets subscriptions on disconnect, so this
//! is what keeps command delivery alive across broker outages.

use std::sync::Arc;

use rumqttc::{AsyncClient, QoS, SubscribeFilter};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{error::TransferError, state::ConnectionState};

/// The topics the adapter subscribes to. Fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct SubscriptionSet {
    topics: Arc<[String]>,
}

impl SubscriptionSet {
    pub fn new<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for topic in topics.into_iter().map(Into::into) {
            if !unique.contains(&topic) {
                unique.push(topic);
            }
        }
        Self {
            topics: unique.into(),
        }
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.iter().any(|t| t == topic)
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    fn filters(&self) -> Vec<SubscribeFilter> {
        self.topics
            .iter()
            .map(|topic| SubscribeFilter::new(topic.clone(), QoS::AtLeastOnce))
            .collect()
    }
}

/// Monitors connection state and subscribes on every CONNACK.
#[derive(Debug, Clone)]
pub struct Supervisor {
    state_rx: watch::Receiver<ConnectionState>,
    subscriptions: SubscriptionSet,
    client: AsyncClient,
    cancel_token: CancellationToken,
}

impl Supervisor {
    pub fn new(
        state_rx: watch::Receiver<ConnectionState>,
        subscriptions: SubscriptionSet,
        client: AsyncClient,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            state_rx,
            subscriptions,
            client,
            cancel_token,
        }
    }

    async fn on_connect(&self) -> Result<(), TransferError> {
        if self.subscriptions.is_empty() {
            debug!("No topics to subscribe to");
            return Ok(());
        }
        self.client.subscribe_many(self.subscriptions.filters()).await?;
        for topic in self.subscriptions.topics() {
            info!("Subscribed to: {}", topic);
        }
        Ok(())
    }

    /// Spawns the monitoring task and returns immediately.
    pub fn monitor(&self) -> JoinHandle<()> {
        let supervisor = self.clone();
        tokio::spawn(async move {
            supervisor.run_monitor_loop().await;
        })
    }

    async fn run_monitor_loop(mut self) {
        debug!("Supervisor monitoring started");

        // The kernel may have connected before this task was scheduled.
        if self.state_rx.borrow_and_update().is_connected() {
            if let Err(e) = self.on_connect().await {
                error!("Subscription after connect failed: {}", e);
            }
        }

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    debug!("Supervisor shutting down due to cancellation");
                    break;
                }

                changed = self.state_rx.changed() => {
                    if changed.is_err() {
                        debug!("State channel closed, supervisor exiting");
                        break;
                    }

                    let state = self.state_rx.borrow_and_update().clone();
                    match state {
                        ConnectionState::Connected => {
                            if let Err(e) = self.on_connect().await {
                                error!("Subscription after connect failed: {}", e);
                            }
                        }
                        ConnectionState::Reconnecting(secs) => {
                            warn!("Broker unavailable, retrying in {:.1}s", secs);
                        }
                        _ => {}
                    }
                }
            }
        }

        debug!("Supervisor monitoring stopped");
    }
}
