//! Print session orchestration
//!
//! One session prints one [`PrintRequest`]: connect, send the encoded
//! command frames in order, disconnect. Progress is reported as a stream of
//! [`SessionEvent`]s ending in `Completed` or `Failed`.
//!
//! ```ignore
//! use ticket_printer::{PrintRequest, PrintSession, TcpTransport};
//!
//! let session = PrintSession::new(TcpTransport::new());
//! let mut events = session.start(PrintRequest::new("192.168.1.100", "Hello"))?;
//! while let Some(event) = events.recv().await {
//!     println!("{}", event.message);
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{Instrument, error, info, info_span, warn};

use crate::command::{self, CommandSequence};
use crate::config::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, DEFAULT_WRITE_TIMEOUT, PrinterConfig};
use crate::error::{ConnectionError, PrintError, PrintResult, TransmissionError};
use crate::escpos::{DeviceProtocol, EscPosProtocol};
use crate::script::detect_direction;
use crate::transport::{DeviceConnection, DeviceTransport};

/// What to print and where
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintRequest {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub text: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl PrintRequest {
    /// Request on the default raw printing port
    pub fn new(host: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            text: text.into(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> PrintResult<()> {
        if self.host.trim().is_empty() {
            return Err(PrintError::Validation("printer host is empty".into()));
        }
        if self.port == 0 {
            return Err(PrintError::Validation("printer port must not be 0".into()));
        }
        if self.text.is_empty() {
            return Err(PrintError::Validation("nothing to print".into()));
        }
        Ok(())
    }
}

/// Lifecycle of a session
///
/// Serializes as `{"state": "connecting"}`, or with the error for
/// `{"state": "failed", "error": {"kind": ..., "message": ...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Sending,
    Completed,
    Failed(PrintError),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Sending => "sending",
            SessionState::Completed => "completed",
            SessionState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed(_))
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_advance_to(&self, next: &SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Connecting, Connected)
                | (Connecting, Failed(_))
                | (Connected, Sending)
                | (Sending, Completed)
                | (Sending, Failed(_))
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A state transition plus its human-readable notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionEvent {
    #[serde(flatten)]
    pub state: SessionState,
    pub message: String,
}

/// Receiving end of a started session
#[derive(Debug)]
pub struct SessionEvents {
    rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionEvents {
    /// Next transition, `None` once the session has finished
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    /// Drain the remaining events
    pub async fn collect(mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }

    /// Wait for the terminal state
    ///
    /// A stream that ends without `Completed` or `Failed` (the session task
    /// panicked or its runtime shut down) yields [`PrintError::Aborted`].
    pub async fn outcome(self) -> PrintResult<()> {
        match self.collect().await.pop().map(|e| e.state) {
            Some(SessionState::Completed) => Ok(()),
            Some(SessionState::Failed(e)) => Err(e),
            _ => Err(PrintError::Aborted),
        }
    }
}

/// Print session orchestrator
///
/// Cheap to clone; clones share the busy flag, so at most one session runs
/// across all of them.
#[derive(Clone)]
pub struct PrintSession {
    transport: Arc<dyn DeviceTransport>,
    protocol: Arc<dyn DeviceProtocol>,
    connect_timeout: Duration,
    write_timeout: Duration,
    active: Arc<AtomicBool>,
}

impl fmt::Debug for PrintSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrintSession")
            .field("connect_timeout", &self.connect_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl PrintSession {
    /// Session with ESC/POS encoding and default timeouts
    pub fn new(transport: impl DeviceTransport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            protocol: Arc::new(EscPosProtocol::default()),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_config(config: &PrinterConfig, transport: impl DeviceTransport + 'static) -> Self {
        Self::new(transport)
            .with_protocol(EscPosProtocol::new(config.charset))
            .with_timeouts(config.connect_timeout, config.write_timeout)
    }

    pub fn with_protocol(mut self, protocol: impl DeviceProtocol + 'static) -> Self {
        self.protocol = Arc::new(protocol);
        self
    }

    pub fn with_timeouts(mut self, connect: Duration, write: Duration) -> Self {
        self.connect_timeout = connect;
        self.write_timeout = write;
        self
    }

    /// Whether a session is currently running
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Run a session to completion on the current task
    ///
    /// Validation and busy errors are returned before any event is sent.
    /// Dropping the returned future still closes the connection.
    pub async fn run(
        &self,
        request: PrintRequest,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> PrintResult<()> {
        request.validate()?;
        let active = ActiveGuard::acquire(&self.active)?;
        self.execute(request, events, active).await
    }

    /// Validate, claim the session slot and run it in the background
    ///
    /// Dropping the returned receiver does not cancel the print.
    pub fn start(&self, request: PrintRequest) -> PrintResult<SessionEvents> {
        request.validate()?;
        let active = ActiveGuard::acquire(&self.active)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let session = self.clone();
        tokio::spawn(async move {
            // The outcome is also the last event
            let _ = session.execute(request, tx, active).await;
        });

        Ok(SessionEvents { rx })
    }

    async fn execute(
        &self,
        request: PrintRequest,
        events: mpsc::UnboundedSender<SessionEvent>,
        active: ActiveGuard,
    ) -> PrintResult<()> {
        let addr = request.addr();
        let direction = detect_direction(&request.text);
        let commands = command::encode(&request.text, direction);
        let span = info_span!("print_session", addr = %addr, ?direction, commands = commands.len());

        let mut machine = StateMachine::new(events);
        let result = async {
            machine.advance(SessionState::Connecting, format!("Connecting to {}...", addr));

            // Bounded here as well, whatever the transport does with the timeout
            let connect = self
                .transport
                .connect(&request.host, request.port, self.connect_timeout);
            let connected = timeout(self.connect_timeout, connect).await.unwrap_or_else(|_| {
                Err(ConnectionError::Timeout {
                    addr: addr.clone(),
                    timeout_ms: self.connect_timeout.as_millis() as u64,
                }
                .into())
            });

            let conn = match connected {
                Ok(conn) => conn,
                Err(e) => {
                    machine.fail(e.clone());
                    return Err(e);
                }
            };
            let mut conn = ConnectionGuard(conn);

            machine.advance(SessionState::Connected, format!("Connected to {}", addr));
            machine.advance(SessionState::Sending, "Printing...".to_string());

            let result = self.send(&mut conn, &commands).await;
            conn.release();

            match result {
                Ok(()) => {
                    machine.advance(SessionState::Completed, "Print job completed".to_string());
                    Ok(())
                }
                Err(e) => {
                    machine.fail(e.clone());
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await;

        // Free the slot before the event stream ends
        drop(active);
        drop(machine);
        result
    }

    /// Write every command as its own frame, stopping at the first failure
    async fn send(&self, conn: &mut ConnectionGuard, commands: &CommandSequence) -> PrintResult<()> {
        for (index, command) in commands.iter().enumerate() {
            if conn.0.is_closed() {
                return Err(TransmissionError::Write("connection already closed".into()).into());
            }

            let frame = self.protocol.encode(command);
            let written = timeout(self.write_timeout, conn.0.write(&frame, self.write_timeout))
                .await
                .unwrap_or_else(|_| {
                    Err(TransmissionError::WriteTimeout {
                        timeout_ms: self.write_timeout.as_millis() as u64,
                    }
                    .into())
                });
            if let Err(e) = written {
                warn!(command = index + 1, error = %e, "Command failed");
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Tracks the current state and publishes transitions
struct StateMachine {
    state: SessionState,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl StateMachine {
    fn new(events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            state: SessionState::Idle,
            events,
        }
    }

    fn advance(&mut self, next: SessionState, message: String) {
        debug_assert!(
            self.state.can_advance_to(&next),
            "illegal transition {} -> {}",
            self.state,
            next
        );

        match &next {
            SessionState::Failed(e) => error!(kind = e.kind(), error = %e, "Session failed"),
            state => info!(state = %state, "{}", message),
        }

        self.state = next.clone();
        // The caller may have stopped listening; the session still finishes
        let _ = self.events.send(SessionEvent {
            state: next,
            message,
        });
    }

    fn fail(&mut self, error: PrintError) {
        let message = format!("Print failed: {}", error);
        self.advance(SessionState::Failed(error), message);
    }
}

/// Owns the connection and closes it exactly once, on drop at the latest
struct ConnectionGuard(Box<dyn DeviceConnection>);

impl ConnectionGuard {
    fn release(self) {}
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Claim on the single session slot
struct ActiveGuard(Arc<AtomicBool>);

impl ActiveGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> PrintResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PrintError::Busy)?;
        Ok(Self(Arc::clone(flag)))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
