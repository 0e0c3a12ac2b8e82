// ticket-printer/tests/session.rs
// Print session scenarios against the stub and a local TCP listener

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ticket_printer::transport::{ConnectBehavior, WriteBehavior};
use ticket_printer::{
    Alignment, Charset, DeviceConnection, DeviceTransport, EscPosProtocol, PrintCommand, PrintError,
    PrintRequest, PrintResult, PrintSession, PrinterConfig, SessionEvent, SessionState, StubTransport,
    TcpTransport, TextDirection, TransmissionError, detect_direction, encode,
};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

fn states(events: &[SessionEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.state.name()).collect()
}

/// Device whose connect never finishes and ignores the timeout it is given
struct UnresponsiveDevice;

#[async_trait]
impl DeviceTransport for UnresponsiveDevice {
    async fn connect(
        &self,
        _host: &str,
        _port: u16,
        _timeout: Duration,
    ) -> PrintResult<Box<dyn DeviceConnection>> {
        std::future::pending().await
    }
}

/// Device that accepts the connection but never takes a byte
#[derive(Clone, Default)]
struct StalledDevice {
    closes: Arc<AtomicUsize>,
}

struct StalledConnection {
    closes: Arc<AtomicUsize>,
    closed: bool,
}

#[async_trait]
impl DeviceTransport for StalledDevice {
    async fn connect(
        &self,
        _host: &str,
        _port: u16,
        _timeout: Duration,
    ) -> PrintResult<Box<dyn DeviceConnection>> {
        Ok(Box::new(StalledConnection {
            closes: Arc::clone(&self.closes),
            closed: false,
        }))
    }
}

#[async_trait]
impl DeviceConnection for StalledConnection {
    async fn write(&mut self, _bytes: &[u8], _timeout: Duration) -> PrintResult<()> {
        std::future::pending().await
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

async fn run(session: &PrintSession, request: PrintRequest) -> (Result<(), PrintError>, Vec<SessionEvent>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let result = session.run(request, tx).await;
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (result, events)
}

#[tokio::test]
async fn test_hello_completes() {
    let stub = StubTransport::new();
    let session = PrintSession::new(stub.clone());

    let (result, events) = run(&session, PrintRequest::new("192.168.1.100", "Hello")).await;

    assert!(result.is_ok());
    assert_eq!(states(&events), ["connecting", "connected", "sending", "completed"]);
    assert!(events[0].message.contains("192.168.1.100:9100"));

    let log = stub.log();
    assert_eq!(log.connect_calls, 1);
    assert_eq!(log.frames.len(), 4);
    assert_eq!(log.frames[1], b"Hello\n".to_vec());
    assert_eq!(log.released, 1);
    assert_eq!(log.close_calls, 1);
    assert!(!session.is_active());

    let seq = encode("Hello", detect_direction("Hello"));
    match &seq.commands()[0] {
        PrintCommand::SetStyle(style) => assert_eq!(style.alignment, Alignment::Left),
        other => panic!("expected style first, got {:?}", other),
    }
    assert_eq!(
        &seq.commands()[1..],
        &[
            PrintCommand::EmitText("Hello".into()),
            PrintCommand::Feed(4),
            PrintCommand::Cut,
        ]
    );
}

#[tokio::test]
async fn test_arabic_ticket_right_aligned() {
    let stub = StubTransport::new();
    let session = PrintSession::new(stub.clone()).with_protocol(EscPosProtocol::new(Charset::Cp1256));

    let text = "مرحبا";
    assert_eq!(detect_direction(text), TextDirection::RightToLeft);

    let (result, _) = run(&session, PrintRequest::new("192.168.1.100", text)).await;
    assert!(result.is_ok());

    // ESC a 2 in the style frame
    let style_frame = &stub.log().frames[0];
    assert!(style_frame.windows(3).any(|w| w == [0x1B, 0x61, 0x02]));
}

#[tokio::test]
async fn test_empty_host_never_connects() {
    let stub = StubTransport::new();
    let session = PrintSession::new(stub.clone());

    let (result, events) = run(&session, PrintRequest::new("", "Hello")).await;

    assert!(matches!(result, Err(PrintError::Validation(_))));
    assert!(events.is_empty());
    assert_eq!(stub.log().connect_calls, 0);

    assert!(matches!(
        session.start(PrintRequest::new("192.168.1.100", "")),
        Err(PrintError::Validation(_))
    ));
    assert_eq!(stub.log().connect_calls, 0);
}

#[tokio::test(start_paused = true)]
async fn test_connect_hang_times_out_after_five_seconds() {
    let stub = StubTransport::new().with_connect(ConnectBehavior::Hang);
    let session = PrintSession::new(stub.clone());

    let started = tokio::time::Instant::now();
    let (result, events) = run(&session, PrintRequest::new("192.168.1.100", "Hello")).await;

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6));
    assert_eq!(result.unwrap_err().kind(), "connect_timeout");
    assert_eq!(states(&events), ["connecting", "failed"]);

    let log = stub.log();
    assert_eq!(log.opened, 0);
    assert_eq!(log.close_calls, 0);
}

#[tokio::test(start_paused = true)]
async fn test_session_bounds_connect_that_never_finishes() {
    let session = PrintSession::new(UnresponsiveDevice);

    let started = tokio::time::Instant::now();
    let (result, events) = tokio::time::timeout(
        Duration::from_secs(60),
        run(&session, PrintRequest::new("192.168.1.100", "Hello")),
    )
    .await
    .expect("session stuck in connecting");

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6));

    let err = result.unwrap_err();
    assert_eq!(err.kind(), "connect_timeout");
    assert!(err.to_string().contains("192.168.1.100:9100"));
    assert_eq!(states(&events), ["connecting", "failed"]);
    assert!(!session.is_active());
    assert!(session.start(PrintRequest::new("192.168.1.100", "again")).is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_session_bounds_write_that_never_finishes() {
    let device = StalledDevice::default();
    let session = PrintSession::new(device.clone())
        .with_timeouts(Duration::from_secs(5), Duration::from_millis(500));

    let (result, events) = tokio::time::timeout(
        Duration::from_secs(60),
        run(&session, PrintRequest::new("192.168.1.100", "Hello")),
    )
    .await
    .expect("session stuck in sending");

    let err = result.unwrap_err();
    assert_eq!(err, TransmissionError::WriteTimeout { timeout_ms: 500 }.into());
    assert!(err.is_partial_print_possible());
    assert_eq!(states(&events), ["connecting", "connected", "sending", "failed"]);
    assert_eq!(device.closes.load(Ordering::SeqCst), 1);
    assert!(!session.is_active());
}

#[tokio::test]
async fn test_connect_error_fails_without_frames() {
    let stub = StubTransport::new().with_connect(ConnectBehavior::Fail);
    let session = PrintSession::new(stub.clone());

    let (result, events) = run(&session, PrintRequest::new("192.168.1.100", "Hello")).await;

    let err = result.unwrap_err();
    assert_eq!(err.kind(), "connect_error");
    assert!(!err.is_partial_print_possible());
    assert_eq!(states(&events), ["connecting", "failed"]);
    assert_eq!(events[1].state, SessionState::Failed(err));

    let log = stub.log();
    assert_eq!(log.connect_calls, 1);
    assert!(log.frames.is_empty());
    assert_eq!(log.close_calls, 0);
    assert!(!session.is_active());
}

#[tokio::test]
async fn test_refused_connection() {
    let stub = StubTransport::new().with_connect(ConnectBehavior::Refuse);
    let session = PrintSession::new(stub.clone());

    let (result, events) = run(&session, PrintRequest::new("192.168.1.100", "Hello")).await;

    assert_eq!(result.unwrap_err().kind(), "connect_refused");
    match &events.last().unwrap().state {
        SessionState::Failed(e) => assert_eq!(e.kind(), "connect_refused"),
        other => panic!("unexpected terminal state {:?}", other),
    }
    assert!(stub.log().frames.is_empty());
}

#[tokio::test]
async fn test_second_write_fails_closes_once() {
    let stub = StubTransport::new().with_write(WriteBehavior::FailAt(2));
    let session = PrintSession::new(stub.clone());

    let (result, events) = run(&session, PrintRequest::new("192.168.1.100", "Hello")).await;

    let err = result.unwrap_err();
    assert!(matches!(err, PrintError::Transmission(_)));
    assert!(err.is_partial_print_possible());
    assert_eq!(states(&events), ["connecting", "connected", "sending", "failed"]);

    let log = stub.log();
    assert_eq!(log.frames.len(), 1);
    assert_eq!(log.close_calls, 1);
    assert_eq!(log.released, 1);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_device_write_timeout() {
    let stub = StubTransport::new().with_write(WriteBehavior::HangAt(3));
    let session = PrintSession::new(stub.clone())
        .with_timeouts(Duration::from_secs(5), Duration::from_millis(500));

    let (result, _) = run(&session, PrintRequest::new("192.168.1.100", "Hello")).await;

    assert_eq!(result.unwrap_err().kind(), "write_timeout");
    assert_eq!(stub.log().close_calls, 1);
}

#[tokio::test]
async fn test_overlapping_start_is_busy() {
    let stub = StubTransport::new().with_connect(ConnectBehavior::Hang);
    let session = PrintSession::new(stub).with_timeouts(Duration::from_millis(200), Duration::from_secs(1));

    let events = session.start(PrintRequest::new("192.168.1.100", "first")).unwrap();
    assert!(session.is_active());

    let second = session.clone().start(PrintRequest::new("192.168.1.100", "second"));
    assert!(matches!(second, Err(PrintError::Busy)));

    // Slot is free again once the first session has failed
    assert_eq!(events.outcome().await.unwrap_err().kind(), "connect_timeout");
    assert!(!session.is_active());
    assert!(session.start(PrintRequest::new("192.168.1.100", "third")).is_ok());
}

#[tokio::test]
async fn test_abandoned_run_still_closes() {
    let stub = StubTransport::new().with_write(WriteBehavior::HangAt(2));
    let session = PrintSession::new(stub.clone())
        .with_timeouts(Duration::from_secs(5), Duration::from_secs(3600));

    let (tx, _rx) = mpsc::unbounded_channel();
    let task = {
        let session = session.clone();
        tokio::spawn(async move { session.run(PrintRequest::new("192.168.1.100", "Hello"), tx).await })
    };

    // Wait until the first frame went out, then walk away
    while stub.log().frames.is_empty() {
        tokio::task::yield_now().await;
    }
    task.abort();
    let _ = task.await;

    let log = stub.log();
    assert_eq!(log.close_calls, 1);
    assert_eq!(log.released, 1);
    assert!(!session.is_active());
}

#[tokio::test]
async fn test_dropped_receiver_does_not_cancel() {
    let stub = StubTransport::new();
    let session = PrintSession::new(stub.clone());

    drop(session.start(PrintRequest::new("192.168.1.100", "Hello")).unwrap());

    while session.is_active() {
        tokio::task::yield_now().await;
    }
    let log = stub.log();
    assert_eq!(log.frames.len(), 4);
    assert_eq!(log.released, 1);
}

#[tokio::test]
async fn test_new_run_uses_fresh_connection() {
    let stub = StubTransport::new();
    let session = PrintSession::new(stub.clone());

    for _ in 0..2 {
        let (result, _) = run(&session, PrintRequest::new("192.168.1.100", "Hello")).await;
        assert!(result.is_ok());
    }

    let log = stub.log();
    assert_eq!(log.connect_calls, 2);
    assert_eq!(log.opened, 2);
    assert_eq!(log.released, 2);
}

#[tokio::test]
async fn test_tcp_device_receives_ticket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let device = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        socket.read_to_end(&mut buf).await.unwrap();
        buf
    });

    let config = PrinterConfig::default().with_port(port);
    let session = PrintSession::from_config(&config, TcpTransport::new());
    let events = session
        .start(PrintRequest::new("127.0.0.1", "Hello").with_port(port))
        .unwrap();
    assert!(events.outcome().await.is_ok());

    let received = device.await.unwrap();
    assert!(received.starts_with(&[0x1B, 0x40]));
    assert!(received.windows(6).any(|w| w == b"Hello\n"));
    assert!(received.ends_with(&[0x1B, 0x64, 4, 0x1D, 0x56, 0x00]));
}
