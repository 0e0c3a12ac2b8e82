//! # ticket
//!
//! Command-line front end for `ticket-printer`.
//!
//! ## Usage
//!
//! ```bash
//! # Print a ticket on a network printer
//! ticket print --host 192.168.1.100 --text "Hello"
//!
//! # Arabic text on a printer set to the Arabic code page
//! ticket print --host 192.168.1.100 --charset cp1256 --text "مرحبا"
//!
//! # Show the bytes without a printer
//! ticket print --dry-run --text "Hello"
//!
//! # Paginated document instead of a device ticket
//! ticket render --file notes.txt --width 32
//!
//! # Is the printer there?
//! ticket probe --host 192.168.1.100
//! ```

mod cli;
mod logger;

use std::process::ExitCode;

use clap::Parser;
use serde_json::json;
use ticket_printer::{
    CommandSequence, PagedTextRenderer, PrintRequest, PrintSession, PrinterConfig, SessionEvent,
    SessionState, StubTransport, TcpTransport, detect_direction, encode, render_document,
};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = logger::init_logger(&cli.log_level, cli.log_json, cli.log_dir.as_deref())?;

    let config = cli.command.apply(PrinterConfig::from_env());
    config.validate()?;
    tracing::debug!(?config, "Configuration loaded");

    match &cli.command {
        Commands::Print {
            target,
            input,
            dry_run,
            json,
            ..
        } => {
            let (mut host, port) = target.resolve(&config);
            if *dry_run && host.trim().is_empty() {
                host = "dry-run".to_string();
            }
            let text = input.read()?;
            let request = PrintRequest::new(host, text).with_port(port);
            print_ticket(&config, request, *dry_run, *json).await
        }
        Commands::Render { input, .. } => {
            let text = input.read()?;
            let renderer = PagedTextRenderer::new(config.paper_width, config.lines_per_page);
            let document = render_document(&renderer, &text)?;

            for (index, page) in document.pages.iter().enumerate() {
                println!("--- page {}/{} ---", index + 1, document.page_count());
                for line in &page.lines {
                    println!("{}", line);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Probe { target, timeout_ms } => {
            let (host, port) = target.resolve(&config);
            if host.trim().is_empty() {
                anyhow::bail!("No printer host given (use --host or PRINTER_HOST)");
            }

            let online = TcpTransport::probe(&host, port, cli::probe_timeout(*timeout_ms)).await;
            println!("{}:{} {}", host, port, if online { "online" } else { "offline" });
            Ok(if online {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

async fn print_ticket(
    config: &PrinterConfig,
    request: PrintRequest,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let stub = StubTransport::new();
    let session = if dry_run {
        PrintSession::from_config(config, stub.clone())
    } else {
        PrintSession::from_config(config, TcpTransport::new())
    };

    let commands = encode(&request.text, detect_direction(&request.text));
    let mut events = session.start(request)?;

    let mut completed = false;
    while let Some(event) = events.recv().await {
        report(&event, json)?;
        completed = event.state == SessionState::Completed;
    }

    if dry_run {
        dump_frames(&commands, &stub.log().frames, json)?;
    }

    Ok(if completed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn report(event: &SessionEvent, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    match &event.state {
        SessionState::Failed(_) => eprintln!("{}", event.message),
        _ => println!("{}", event.message),
    }
    Ok(())
}

fn dump_frames(commands: &CommandSequence, frames: &[Vec<u8>], json: bool) -> anyhow::Result<()> {
    for (command, frame) in commands.iter().zip(frames) {
        if json {
            println!(
                "{}",
                json!({ "command": serde_json::to_value(command)?, "bytes": hex::encode_upper(frame) })
            );
        } else {
            println!("{:<40} {}", format!("{:?}", command), hex::encode_upper(frame));
        }
    }
    Ok(())
}
