//! Gateway process: the supervised outer loop and graceful shutdown.
//!
//! ```text
//! loop while running:
//!     open session + resolve nodes   --fail--> backoff, retry
//!     bind handles, run detector     --lost--> unbind, close, retry
//! on stop: router drains, session closed, broker flushed and closed
//! ```

use std::{future::Future, sync::Arc};

use opcgate_mqtt::InboundMessage;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::{
    context::GatewayContext,
    detector::{ChangeDetector, DetectorExit},
    readiness::ReadinessState,
    router::CommandRouter,
    session::SessionSupervisor,
};

pub struct Gateway {
    ctx: GatewayContext,
    sessions: SessionSupervisor,
}

impl Gateway {
    pub fn new(ctx: GatewayContext, sessions: SessionSupervisor) -> Self {
        Self { ctx, sessions }
    }

    pub fn context(&self) -> &GatewayContext {
        &self.ctx
    }

    /// Requests a stop. Safe to call repeatedly.
    pub fn stop(&self) {
        if self.ctx.is_running() {
            info!("Stop requested");
        }
        self.ctx.cancel.cancel();
    }

    /// Runs the router and the session loop until `shutdown` resolves, then
    /// shuts everything down in order.
    pub async fn serve(
        self: Arc<Self>,
        inbound: mpsc::Receiver<InboundMessage>,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) {
        let router = tokio::spawn(CommandRouter::new(self.ctx.clone()).run(inbound));

        let watcher = {
            let gateway = self.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = shutdown => gateway.stop(),
                    _ = gateway.ctx.cancel.cancelled() => {}
                }
            })
        };

        self.run().await;

        if let Err(e) = router.await {
            error!("Command router task failed: {}", e);
        }
        watcher.abort();
        self.ctx.publisher.close().await;
        info!("Gateway stopped");
    }

    /// The supervised session loop. Returns once stopped, with no session open.
    pub async fn run(&self) {
        info!("Gateway started");

        while self.ctx.is_running() {
            self.ctx
                .readiness
                .set_state(ReadinessState::NotReadyYet("connecting".into()));

            let nodes = match self.sessions.open().await {
                Ok(nodes) => nodes,
                Err(e) => {
                    error!("{}", e);
                    info!(
                        "Retrying automation server in {:?}",
                        self.ctx.bridge.reconnect_backoff()
                    );
                    if !self.ctx.sleep(self.ctx.bridge.reconnect_backoff()).await {
                        break;
                    }
                    continue;
                }
            };

            let session = nodes.session.clone();
            if !self.ctx.is_running() {
                session.close().await;
                break;
            }
            self.ctx.bind(nodes.clone()).await;

            let exit = ChangeDetector::new(self.ctx.clone(), nodes).run().await;

            // On stop, a command already in progress keeps the session until it is done.
            let _command = match &exit {
                DetectorExit::Stopped => Some(self.ctx.command.lock().await),
                DetectorExit::Disconnected(_) => None,
            };
            self.ctx.unbind("session closed").await;
            session.close().await;

            match exit {
                DetectorExit::Stopped => break,
                DetectorExit::Disconnected(e) => {
                    warn!("Automation server session {} lost ({}); reconnecting", session.id(), e)
                }
            }
        }

        self.ctx
            .readiness
            .set_state(ReadinessState::NotReadyYet("stopped".into()));
        info!("Gateway loop finished");
    }
}
