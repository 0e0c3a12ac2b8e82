//! Printer configuration
//!
//! # Environment variables
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | PRINTER_HOST | - | Default printer host |
//! | PRINTER_PORT | 9100 | Printer port |
//! | PRINTER_CONNECT_TIMEOUT_MS | 5000 | Connect timeout (ms) |
//! | PRINTER_WRITE_TIMEOUT_MS | 3000 | Per-command write timeout (ms) |
//! | PRINTER_CHARSET | utf8 | utf8, gbk or cp1256 |
//! | PRINTER_PAPER_WIDTH | 48 | Characters per line (document path) |
//! | PRINTER_LINES_PER_PAGE | 60 | Lines per page (document path) |

use std::time::Duration;

use crate::encoding::Charset;
use crate::error::{PrintError, PrintResult};
use tracing::warn;

pub const DEFAULT_PORT: u16 = 9100;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(3);

/// Printer settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterConfig {
    /// Default destination when a request does not name one
    pub host: Option<String>,
    pub port: u16,
    pub connect_timeout: Duration,
    /// Bound for each command frame
    pub write_timeout: Duration,
    pub charset: Charset,
    /// 58mm paper: 32, 80mm paper: 48
    pub paper_width: usize,
    pub lines_per_page: usize,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            charset: Charset::default(),
            paper_width: 48,
            lines_per_page: 60,
        }
    }
}

impl PrinterConfig {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let charset = match lookup("PRINTER_CHARSET") {
            Some(v) => v.parse().unwrap_or_else(|e| {
                warn!(error = %e, "Ignoring PRINTER_CHARSET");
                defaults.charset
            }),
            None => defaults.charset,
        };

        Self {
            host: lookup("PRINTER_HOST").filter(|h| !h.trim().is_empty()),
            port: lookup("PRINTER_PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            connect_timeout: parse("PRINTER_CONNECT_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.connect_timeout),
            write_timeout: parse("PRINTER_WRITE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.write_timeout),
            charset,
            paper_width: parse("PRINTER_PAPER_WIDTH")
                .map(|v| v as usize)
                .unwrap_or(defaults.paper_width),
            lines_per_page: parse("PRINTER_LINES_PER_PAGE")
                .map(|v| v as usize)
                .unwrap_or(defaults.lines_per_page),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    pub fn validate(&self) -> PrintResult<()> {
        if self.port == 0 {
            return Err(PrintError::InvalidConfig("port must not be 0".into()));
        }
        if self.connect_timeout.is_zero() || self.write_timeout.is_zero() {
            return Err(PrintError::InvalidConfig("timeouts must be positive".into()));
        }
        if self.paper_width == 0 || self.lines_per_page == 0 {
            return Err(PrintError::InvalidConfig("page geometry must be positive".into()));
        }
        Ok(())
    }
}
