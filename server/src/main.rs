mod command;
mod config;
mod server;
mod session;

use command::{DesktopActions, DryRunActions, SystemActions};
use config::{ActionsKind, ServerConfig};
use gesture_bridge_shared::signal::TerminationSignals;
use server::CommandServer;
use std::sync::Arc;
use tokio::sync::watch;

use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    if let Err(e) = dotenvy::dotenv() {
        debug!("No .env file loaded: {}", e);
    }

    let config = ServerConfig::from_env();

    let actions: Arc<dyn SystemActions> = match config.actions {
        ActionsKind::Desktop => Arc::new(DesktopActions::new()),
        ActionsKind::DryRun => Arc::new(DryRunActions::default()),
    };
    info!("Command server starting with {:?} actions", config.actions);

    let server = CommandServer::bind(config, actions).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut signals = TerminationSignals::install()?;

    tokio::spawn(async move {
        let name = signals.recv().await;
        info!("Received {}, stopping server", name);
        shutdown_tx.send_replace(true);
    });

    server.run(shutdown_rx).await?;
    info!("Server stopped");
    Ok(())
}
