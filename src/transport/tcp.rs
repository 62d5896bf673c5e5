//! TCP transport to the command executor

use crate::transport::traits::{TransportConnector, TransportStream};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

#[async_trait]
impl TransportStream for TcpStream {
    async fn shutdown(&mut self) -> Result<()> {
        AsyncWriteExt::shutdown(self).await?;
        Ok(())
    }
}

/// TCP connector for the fixed executor address
pub struct TcpConnector {
    address: String,
    connect_timeout: Duration,
}

impl TcpConnector {
    /// Create a connector for `host:port`
    pub fn new(address: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl TransportConnector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> Result<Self::Stream> {
        let stream = timeout(self.connect_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| anyhow!("Connect to {} timed out", self.address))??;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    fn target(&self) -> &str {
        &self.address
    }
}
