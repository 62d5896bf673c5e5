mod config;
mod connection;
mod context;
mod gesture;
mod queue;
mod recognizer;
mod transport;

use config::ClientConfig;
use connection::SessionEvent;
use context::BridgeContext;
use gesture_bridge_shared::signal::TerminationSignals;
use recognizer::LineSource;
use tokio::sync::{mpsc, watch};

use tracing::{debug, info, warn};
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

    let config = ClientConfig::from_env();

    info!("Gesture client starting");
    info!("  Executor: {}", config.executor_addr);
    info!("  Mapping dir: {}", config.mapping_dir.display());
    info!("  Sampling every {} recognition events", config.sample_every);

    let (mut ctx, events) = BridgeContext::start(config).await?;

    tokio::spawn(log_session_events(events));
    tokio::spawn(log_last_gesture(ctx.last_gesture()));

    ctx.start_recognition(LineSource::stdin());
    info!("Reading gesture labels from stdin");

    let mut signals = TerminationSignals::install()?;

    tokio::select! {
        name = signals.recv() => {
            info!("Received {}, shutting down", name);
        }
        _ = ctx.wait_recognition() => {
            info!("Recognition input closed, shutting down");
        }
    }

    let health = ctx.health();
    debug!("Final health: connected={} ({})", health.connected, health.message);

    ctx.shutdown().await;
    Ok(())
}

/// Main event log for the transport session
async fn log_session_events(mut events: mpsc::UnboundedReceiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Connecting { target } => {
                debug!("Connecting to executor at {}", target);
            }
            SessionEvent::Connected => {
                info!("Link to executor up");
            }
            SessionEvent::Disconnected { reason } => {
                warn!("Link to executor down: {}", reason);
            }
            SessionEvent::ConnectionFailed { reason } => {
                debug!("Connect attempt failed: {}", reason);
            }
            SessionEvent::Sent(command) => {
                debug!("Delivered: {}", command);
            }
            SessionEvent::Dropped(command) => {
                warn!("Lost command: {}", command);
            }
            SessionEvent::Reply(reply) => {
                info!("Executor: {}", reply);
            }
            SessionEvent::Stopped { reason } => {
                info!("Transport finished ({})", reason);
                break;
            }
        }
    }
}

/// Stand-in for the configurator's "last gesture" display
async fn log_last_gesture(mut last: watch::Receiver<Option<String>>) {
    while last.changed().await.is_ok() {
        if let Some(label) = last.borrow_and_update().as_deref() {
            debug!("Last gesture: {}", label);
        }
    }
}
