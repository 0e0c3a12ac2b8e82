//! Byte-stream transports to the printer
//!
//! Supports:
//! - Network printers (raw TCP, port 9100)
//! - An in-memory stub for tests and dry runs

mod stub;
mod tcp;

pub use stub::{ConnectBehavior, StubLog, StubTransport, WriteBehavior};
pub use tcp::TcpTransport;

use crate::error::PrintResult;
use async_trait::async_trait;
use std::time::Duration;

/// Opens connections to a printer
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Connect to `host:port`, giving up after `timeout`
    ///
    /// On timeout no connection is left behind.
    async fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> PrintResult<Box<dyn DeviceConnection>>;
}

/// A live byte stream to the printer
#[async_trait]
pub trait DeviceConnection: Send {
    /// Send one frame, bounded by `timeout`
    ///
    /// Partial writes are retried internally; any error is final.
    async fn write(&mut self, bytes: &[u8], timeout: Duration) -> PrintResult<()>;

    /// Release the stream. Idempotent, never fails.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}
