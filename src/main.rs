use std::{process, sync::Arc};

use opcgate::{
    config::Config,
    connect_broker,
    core::{session::SessionSupervisor, Gateway, GatewayContext},
    logger::LoggerManager,
    print_error,
};
use opcgate_opcua::Connector;
use tracing::{debug, error, info};

#[cfg(feature = "opcua-client")]
fn connector(config: &Config) -> Result<Arc<dyn Connector>, opcgate_opcua::SessionError> {
    let connector = opcgate_opcua::OpcUaConnector::new(&config.opcua.client_settings())?;
    Ok(Arc::new(connector))
}

#[cfg(not(feature = "opcua-client"))]
fn connector(_config: &Config) -> Result<Arc<dyn Connector>, opcgate_opcua::SessionError> {
    Err(opcgate_opcua::SessionError::Connection(
        "built without the opcua-client feature".into(),
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, initiating graceful shutdown...");
}

#[tokio::main]
async fn main() {
    let cfg = Config::new().unwrap_or_else(|e| {
        print_error!("{}", e);
        process::exit(1);
    });

    let logger_manager = LoggerManager::new(cfg.logger.clone()).unwrap_or_else(|e| {
        print_error!("Failed to setup Log Manager: {}", e);
        process::exit(1);
    });
    logger_manager.init().unwrap_or_else(|e| {
        print_error!("Failed to init Log Manager: {}", e);
        process::exit(1);
    });
    info!("Starting opcgate version {}...", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", logger_manager.level());
    debug!("{:#?}", cfg);

    let (instance, inbound) = match connect_broker(&cfg).await {
        Ok(connected) => connected,
        Err(e) => {
            error!("fatal: broker {}:{} unavailable: {}", cfg.mqtt.host, cfg.mqtt.port, e);
            process::exit(1);
        }
    };
    info!("Broker adapter started");

    let connector = connector(&cfg).unwrap_or_else(|e| {
        error!("fatal: cannot create OPC UA client: {}", e);
        process::exit(1);
    });

    let ctx = GatewayContext::new(cfg.bridge.clone(), Arc::new(instance));
    let sessions = SessionSupervisor::new(connector, &cfg.opcua);
    info!(
        "Gateway {} <-> {}; press Ctrl+C to stop",
        cfg.opcua.endpoint, cfg.mqtt.host
    );

    Arc::new(Gateway::new(ctx, sessions))
        .serve(inbound, shutdown_signal())
        .await;

    info!("Shutdown complete");
}
