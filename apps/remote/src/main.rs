use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use client_core::{HttpTransport, RobotSession, SessionEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    StreamExt,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod console;

use config::load_settings;
use console::{execute, parse_command, render_event, Reply};

#[derive(Parser, Debug)]
#[command(name = "robot-remote", about = "Drive a WiFi robot from the terminal")]
struct Args {
    /// Robot host, optionally with a port.
    #[arg(long)]
    address: Option<String>,
    /// TOML settings file (defaults to ./robot.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    probe_interval_ms: Option<u64>,
    #[arg(long)]
    status_interval_ms: Option<u64>,
    /// `0` turns the autonomous distances feed off.
    #[arg(long)]
    distances_interval_ms: Option<u64>,
    #[arg(long)]
    request_timeout_ms: Option<u64>,
    #[arg(long)]
    speed: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(address) = args.address {
        settings.robot_address = address;
    }
    if let Some(ms) = args.probe_interval_ms {
        settings.probe_interval_ms = ms;
    }
    if let Some(ms) = args.status_interval_ms {
        settings.status_interval_ms = ms;
    }
    if let Some(ms) = args.distances_interval_ms {
        settings.distances_interval_ms = ms;
    }
    if let Some(ms) = args.request_timeout_ms {
        settings.request_timeout_ms = ms;
    }
    if let Some(speed) = args.speed {
        settings.default_speed = speed;
    }

    let transport = Arc::new(HttpTransport::new(settings.request_timeout())?);
    let session = RobotSession::new(transport, settings.session_settings()?);
    let renderer = tokio::spawn(print_events(BroadcastStream::new(
        session.subscribe_events(),
    )));
    session.start().await;
    info!(address = %settings.robot_address, "remote: session started");
    println!("{}", console::render_snapshot(&session.snapshot().await));
    println!("type 'help' for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Ok(Some(command)) => match execute(session.as_ref(), command).await {
                        Reply::Silent => {}
                        Reply::Text(text) => println!("{text}"),
                        Reply::Quit => break,
                    },
                    Ok(None) => {}
                    Err(err) => println!("! {err}"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.shutdown().await;
    renderer.abort();
    Ok(())
}

async fn print_events(mut events: BroadcastStream<SessionEvent>) {
    while let Some(item) = events.next().await {
        match item {
            Ok(event) => println!("{}", render_event(&event)),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "remote: console fell behind session events");
            }
        }
    }
}
