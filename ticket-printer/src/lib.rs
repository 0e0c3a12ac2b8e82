//! # ticket-printer
//!
//! Prints text tickets on ESC/POS receipt printers reachable over the
//! network, with a paginated-document fallback.
//!
//! ## Scope
//!
//! - Text direction detection (Arabic → right-aligned)
//! - Device-independent command sequences and their ESC/POS encoding
//! - Raw TCP transport (port 9100) with bounded connect and write
//! - Print sessions: connect → send → disconnect, reported as state events
//! - Document rendering for the non-device path
//!
//! Forms, settings screens and the generic print backend stay in the
//! application.
//!
//! ## Example
//!
//! ```ignore
//! use ticket_printer::{PrintRequest, PrintSession, TcpTransport};
//!
//! let session = PrintSession::new(TcpTransport::new());
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!
//! session.run(PrintRequest::new("192.168.1.100", "Hello"), tx).await?;
//! while let Ok(event) = rx.try_recv() {
//!     println!("{}", event.message);
//! }
//! ```

mod command;
mod config;
mod encoding;
mod error;
mod escpos;
mod render;
mod script;
mod session;
pub mod transport;

// Re-exports
pub use command::{Alignment, CommandSequence, FEED_LINES, PrintCommand, TextStyle, encode};
pub use config::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, DEFAULT_WRITE_TIMEOUT, PrinterConfig};
pub use encoding::Charset;
pub use error::{ConnectionError, PrintError, PrintResult, TransmissionError};
pub use escpos::{DeviceProtocol, EscPosBuilder, EscPosProtocol};
pub use render::{DocumentRenderer, Page, PagedTextRenderer, RenderableDocument, render_document};
pub use script::{TextDirection, detect_direction};
pub use session::{PrintRequest, PrintSession, SessionEvent, SessionEvents, SessionState};
pub use transport::{DeviceConnection, DeviceTransport, StubTransport, TcpTransport};
