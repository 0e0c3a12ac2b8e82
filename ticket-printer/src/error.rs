//! Error types for the printer library

use serde::ser::{Serialize, SerializeStruct, Serializer};
use thiserror::Error;

/// Failure while establishing the connection. No bytes reached the device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// No connection within the connect bound
    #[error("Connection to {addr} timed out after {timeout_ms} ms")]
    Timeout { addr: String, timeout_ms: u64 },

    /// The device actively refused the connection
    #[error("Connection refused by {0}")]
    Refused(String),

    /// Any other connect failure (unreachable, DNS, ...)
    #[error("Connection failed: {0}")]
    Other(String),
}

/// Failure while sending commands. The device may hold a partial ticket.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransmissionError {
    /// The device stopped accepting bytes within the write bound
    #[error("Printer stopped responding after {timeout_ms} ms")]
    WriteTimeout { timeout_ms: u64 },

    /// Unrecoverable write failure
    #[error("Write failed: {0}")]
    Write(String),
}

/// Printer error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrintError {
    /// Bad input, nothing was attempted
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Transmission(#[from] TransmissionError),

    /// Another session is still running
    #[error("A print job is already in progress")]
    Busy,

    /// Document generation failed (fallback path only)
    #[error("Could not render document: {0}")]
    Render(String),

    /// Invalid printer configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// The session stopped without reaching `Completed` or `Failed`
    #[error("Print session ended without a result")]
    Aborted,
}

impl PrintError {
    /// Stable code for the error kind, suitable for logs and JSON output
    pub fn kind(&self) -> &'static str {
        match self {
            PrintError::Validation(_) => "validation_error",
            PrintError::Connection(ConnectionError::Timeout { .. }) => "connect_timeout",
            PrintError::Connection(ConnectionError::Refused(_)) => "connect_refused",
            PrintError::Connection(ConnectionError::Other(_)) => "connect_error",
            PrintError::Transmission(TransmissionError::WriteTimeout { .. }) => "write_timeout",
            PrintError::Transmission(TransmissionError::Write(_)) => "write_error",
            PrintError::Busy => "busy",
            PrintError::Render(_) => "render_error",
            PrintError::InvalidConfig(_) => "invalid_config",
            PrintError::Aborted => "session_aborted",
        }
    }

    /// Whether the device may have received part of the ticket
    pub fn is_partial_print_possible(&self) -> bool {
        matches!(self, PrintError::Transmission(_))
    }
}

/// Serialized as `{"kind": ..., "message": ...}`
impl Serialize for PrintError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PrintError", 2)?;
        state.serialize_field("kind", self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_distinct() {
        let errors = [
            PrintError::Validation("empty host".into()),
            ConnectionError::Timeout {
                addr: "10.0.0.1:9100".into(),
                timeout_ms: 5000,
            }
            .into(),
            ConnectionError::Refused("10.0.0.1:9100".into()).into(),
            ConnectionError::Other("unreachable".into()).into(),
            TransmissionError::WriteTimeout { timeout_ms: 3000 }.into(),
            TransmissionError::Write("broken pipe".into()).into(),
            PrintError::Busy,
            PrintError::Render("no pages".into()),
            PrintError::InvalidConfig("port 0".into()),
            PrintError::Aborted,
        ];

        let mut kinds: Vec<_> = errors.iter().map(PrintError::kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());

        let mut messages: Vec<_> = errors.iter().map(ToString::to_string).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), errors.len());
    }

    #[test]
    fn test_partial_print_only_for_transmission() {
        assert!(PrintError::from(TransmissionError::Write("x".into())).is_partial_print_possible());
        assert!(!PrintError::from(ConnectionError::Refused("x".into())).is_partial_print_possible());
        assert!(!PrintError::Busy.is_partial_print_possible());
        assert!(!PrintError::Aborted.is_partial_print_possible());
    }

    #[test]
    fn test_serialize_kind_and_message() {
        let error = PrintError::from(ConnectionError::Refused("10.0.0.1:9100".into()));
        let value = serde_json::to_value(&error).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "kind": "connect_refused",
                "message": "Connection refused by 10.0.0.1:9100",
            })
        );
    }
}
