//! In-memory transport
//!
//! Scripts the device's behaviour and records what the session did to it.
//! Backs the test suite and the CLI dry run.

use super::{DeviceConnection, DeviceTransport};
use crate::error::{ConnectionError, PrintResult, TransmissionError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// How `connect` behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectBehavior {
    #[default]
    Succeed,
    Refuse,
    Fail,
    /// Never completes; resolves to a timeout once the bound elapses
    Hang,
}

/// How writes behave. Indices are 1-based over the connection's writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteBehavior {
    #[default]
    Succeed,
    FailAt(usize),
    HangAt(usize),
}

/// What the stub observed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StubLog {
    pub connect_calls: usize,
    /// Connections handed out
    pub opened: usize,
    /// Frames accepted by the "device", in order
    pub frames: Vec<Vec<u8>>,
    /// `close` invocations, including redundant ones
    pub close_calls: usize,
    /// Closes that actually released a connection
    pub released: usize,
}

impl StubLog {
    /// All accepted bytes concatenated
    pub fn bytes(&self) -> Vec<u8> {
        self.frames.concat()
    }
}

/// Transport double, cheap to clone; clones share one log
#[derive(Debug, Clone, Default)]
pub struct StubTransport {
    connect: ConnectBehavior,
    write: WriteBehavior,
    log: Arc<Mutex<StubLog>>,
}

impl StubTransport {
    /// A device that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect(mut self, behavior: ConnectBehavior) -> Self {
        self.connect = behavior;
        self
    }

    pub fn with_write(mut self, behavior: WriteBehavior) -> Self {
        self.write = behavior;
        self
    }

    /// Snapshot of the log
    pub fn log(&self) -> StubLog {
        lock(&self.log).clone()
    }
}

fn lock(log: &Mutex<StubLog>) -> MutexGuard<'_, StubLog> {
    // A panicking test thread must not hide the log from the others
    log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl DeviceTransport for StubTransport {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> PrintResult<Box<dyn DeviceConnection>> {
        let addr = format!("{}:{}", host, port);
        lock(&self.log).connect_calls += 1;
        debug!(addr = %addr, behavior = ?self.connect, "Stub connect");

        match self.connect {
            ConnectBehavior::Succeed => {}
            ConnectBehavior::Refuse => return Err(ConnectionError::Refused(addr).into()),
            ConnectBehavior::Fail => {
                return Err(ConnectionError::Other(format!("{}: network unreachable", addr)).into());
            }
            ConnectBehavior::Hang => {
                let _ = tokio::time::timeout(timeout, std::future::pending::<()>()).await;
                return Err(ConnectionError::Timeout {
                    addr,
                    timeout_ms: timeout.as_millis() as u64,
                }
                .into());
            }
        }

        lock(&self.log).opened += 1;
        Ok(Box::new(StubConnection {
            write: self.write,
            writes: 0,
            closed: false,
            log: Arc::clone(&self.log),
        }))
    }
}

struct StubConnection {
    write: WriteBehavior,
    writes: usize,
    closed: bool,
    log: Arc<Mutex<StubLog>>,
}

#[async_trait]
impl DeviceConnection for StubConnection {
    async fn write(&mut self, bytes: &[u8], timeout: Duration) -> PrintResult<()> {
        if self.closed {
            return Err(TransmissionError::Write("connection closed".into()).into());
        }

        self.writes += 1;
        match self.write {
            WriteBehavior::FailAt(n) if n == self.writes => {
                return Err(TransmissionError::Write("broken pipe".into()).into());
            }
            WriteBehavior::HangAt(n) if n == self.writes => {
                let _ = tokio::time::timeout(timeout, std::future::pending::<()>()).await;
                return Err(TransmissionError::WriteTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                }
                .into());
            }
            _ => {}
        }

        lock(&self.log).frames.push(bytes.to_vec());
        Ok(())
    }

    fn close(&mut self) {
        let mut log = lock(&self.log);
        log.close_calls += 1;
        if !self.closed {
            self.closed = true;
            log.released += 1;
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
