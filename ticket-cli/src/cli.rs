//! Command-line arguments

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use ticket_printer::{Charset, PrinterConfig};

/// ticket - print text on network receipt printers
#[derive(Parser, Debug)]
#[command(name = "ticket")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Also write logs to daily files in this directory
    #[arg(long, global = true, value_name = "DIR", env = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print text on the receipt printer
    Print {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        input: Input,

        /// Code page for text: utf8, gbk or cp1256
        #[arg(long)]
        charset: Option<Charset>,

        /// Use an in-memory printer and dump the bytes instead of connecting
        #[arg(long)]
        dry_run: bool,

        /// Report progress as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Lay the text out as a paginated document
    Render {
        #[command(flatten)]
        input: Input,

        /// Characters per line
        #[arg(long)]
        width: Option<usize>,

        /// Lines per page
        #[arg(long)]
        lines_per_page: Option<usize>,
    },

    /// Check whether the printer accepts connections
    Probe {
        #[command(flatten)]
        target: Target,

        /// Probe timeout in milliseconds
        #[arg(long, default_value = "500")]
        timeout_ms: u64,
    },
}

/// Printer address
#[derive(Args, Debug)]
pub struct Target {
    /// Printer host or IP (defaults to PRINTER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Printer port (defaults to PRINTER_PORT, then 9100)
    #[arg(long)]
    pub port: Option<u16>,
}

impl Target {
    /// Resolve against the configuration, arguments first
    pub fn resolve(&self, config: &PrinterConfig) -> (String, u16) {
        let host = self
            .host
            .clone()
            .or_else(|| config.host.clone())
            .unwrap_or_default();
        (host, self.port.unwrap_or(config.port))
    }
}

/// Where the ticket text comes from
#[derive(Args, Debug)]
pub struct Input {
    /// Text to print
    #[arg(long, conflicts_with = "file")]
    pub text: Option<String>,

    /// Read the text from a file (stdin when neither is given)
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,
}

impl Input {
    pub fn read(&self) -> anyhow::Result<String> {
        if let Some(text) = &self.text {
            return Ok(text.clone());
        }
        if let Some(path) = &self.file {
            return std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()));
        }

        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        Ok(text)
    }
}

impl Commands {
    /// Apply command overrides on top of the environment configuration
    pub fn apply(&self, mut config: PrinterConfig) -> PrinterConfig {
        match self {
            Commands::Print { charset, .. } => {
                if let Some(charset) = charset {
                    config = config.with_charset(*charset);
                }
            }
            Commands::Render {
                width,
                lines_per_page,
                ..
            } => {
                if let Some(width) = width {
                    config.paper_width = *width;
                }
                if let Some(lines) = lines_per_page {
                    config.lines_per_page = *lines;
                }
            }
            Commands::Probe { .. } => {}
        }
        config
    }
}

pub fn probe_timeout(timeout_ms: u64) -> Duration {
    Duration::from_millis(timeout_ms.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_print() {
        let cli = Cli::try_parse_from([
            "ticket", "print", "--host", "192.168.1.100", "--text", "Hello", "--dry-run",
        ])
        .unwrap();

        match cli.command {
            Commands::Print {
                target,
                input,
                dry_run,
                json,
                ..
            } => {
                assert_eq!(target.resolve(&PrinterConfig::default()), ("192.168.1.100".to_string(), 9100));
                assert_eq!(input.read().unwrap(), "Hello");
                assert!(dry_run);
                assert!(!json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_text_and_file_conflict() {
        let result = Cli::try_parse_from(["ticket", "print", "--text", "a", "--file", "b.txt"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_target_falls_back_to_config() {
        let target = Target {
            host: None,
            port: None,
        };
        let config = PrinterConfig::default().with_host("10.0.0.7").with_port(9101);
        assert_eq!(target.resolve(&config), ("10.0.0.7".to_string(), 9101));
    }

    #[test]
    fn test_charset_override() {
        let cli = Cli::try_parse_from(["ticket", "print", "--text", "x", "--charset", "cp1256"]).unwrap();
        let config = cli.command.apply(PrinterConfig::default());
        assert_eq!(config.charset, Charset::Cp1256);
    }
}
