//! Accept loop for the command server

use crate::command::{CommandExecutor, SystemActions};
use crate::config::ServerConfig;
use crate::session::ClientSession;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Listens for gesture clients and serves each on its own task
pub struct CommandServer {
    listener: TcpListener,
    config: ServerConfig,
    executor: CommandExecutor,
}

impl CommandServer {
    pub async fn bind(config: ServerConfig, actions: Arc<dyn SystemActions>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .with_context(|| format!("binding {}", config.listen_addr))?;

        Ok(Self {
            listener,
            config,
            executor: CommandExecutor::new(actions),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` is raised, then wait for the
    /// open sessions to close
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            "Server listening on {} ({} framing)",
            self.local_addr()?,
            self.config.frame_mode
        );

        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                _ = wait_for_shutdown(&mut shutdown) => break,

                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        warn!("Session task failed: {}", e);
                    }
                }

                accepted = timeout(self.config.accept_poll, self.listener.accept()) => {
                    let (stream, addr) = match accepted {
                        Err(_) => continue,
                        Ok(Err(e)) => {
                            warn!("Accept failed: {}", e);
                            continue;
                        }
                        Ok(Ok(conn)) => conn,
                    };

                    info!("Accepted connection from {}", addr);
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                    }

                    let session = ClientSession::new(
                        stream,
                        addr,
                        self.executor.clone(),
                        self.config.frame_mode,
                        self.config.reply_enabled,
                        self.config.read_chunk_size,
                    );
                    sessions.spawn(session.run(shutdown.clone()));
                }
            }
        }

        info!("Server shutting down, {} sessions open", sessions.len());
        while let Some(joined) = sessions.join_next().await {
            if let Ok(handled) = joined {
                debug!("Session closed after {} frames", handled);
            }
        }
        Ok(())
    }
}

/// Resolves once shutdown is raised; never if its sender is gone
pub(crate) async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let raised = shutdown.wait_for(|stop| *stop).await.is_ok();
    if !raised {
        std::future::pending::<()>().await;
    }
}
