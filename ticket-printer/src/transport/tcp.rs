//! Network printer transport (TCP port 9100)
//!
//! Most thermal printers accept raw ESC/POS on TCP port 9100 with no
//! framing on top.

use super::{DeviceConnection, DeviceTransport};
use crate::error::{ConnectionError, PrintResult, TransmissionError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn};

/// Raw TCP transport
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }

    /// Check if the printer accepts connections
    #[instrument]
    pub async fn probe(host: &str, port: u16, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_)) => {
                info!("Printer online");
                true
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Printer offline");
                false
            }
            Err(_) => {
                warn!("Printer check timeout");
                false
            }
        }
    }
}

#[async_trait]
impl DeviceTransport for TcpTransport {
    #[instrument(skip(self), fields(addr = %format!("{}:{}", host, port)))]
    async fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> PrintResult<Box<dyn DeviceConnection>> {
        let addr = format!("{}:{}", host, port);
        info!("Connecting to printer");

        // The connect future owns the socket; on timeout it is dropped with it
        let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| ConnectionError::Timeout {
                addr: addr.clone(),
                timeout_ms: timeout.as_millis() as u64,
            })?
            .map_err(|e| match e.kind() {
                ErrorKind::ConnectionRefused => ConnectionError::Refused(addr.clone()),
                _ => ConnectionError::Other(format!("{}: {}", addr, e)),
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Could not disable Nagle");
        }

        info!("Connected");
        Ok(Box::new(TcpConnection {
            stream: Some(stream),
            addr,
        }))
    }
}

/// Live TCP connection, closed by dropping the stream
struct TcpConnection {
    stream: Option<TcpStream>,
    addr: String,
}

#[async_trait]
impl DeviceConnection for TcpConnection {
    async fn write(&mut self, bytes: &[u8], timeout: Duration) -> PrintResult<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| TransmissionError::Write(format!("{}: connection closed", self.addr)))?;

        let send = async {
            stream.write_all(bytes).await?;
            stream.flush().await
        };

        tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| TransmissionError::WriteTimeout {
                timeout_ms: timeout.as_millis() as u64,
            })?
            .map_err(|e| TransmissionError::Write(format!("{}: {}", self.addr, e)))?;

        debug!(addr = %self.addr, bytes = bytes.len(), "Frame sent");
        Ok(())
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!(addr = %self.addr, "Connection closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}
