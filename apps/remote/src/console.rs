//! Line-oriented operator console: parses intents, forwards them to the
//! session and renders what the session reports back.

use anyhow::{anyhow, bail, Result};
use client_core::{SessionEvent, SessionHandle, SessionSnapshot};
use shared::{
    domain::{Direction, Mode, StatusSnapshot},
    protocol::ObstacleDistances,
};

pub const HELP: &str = "\
commands:
  address <host[:port]>   point the session at another robot
  mode manual|auto        select a control mode (from home)
  home                    return to the mode selection
  go <direction>          hold a direction (avance, recule, gauche, droite,
                          avancegauche, avancedroite, reculegauche, reculedroite)
  stop                    release the held direction
  speed <0-100>           set the motion speed
  distances               read the obstacle range finders
  status                  print the session state
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Address(String),
    SelectMode(Mode),
    Home,
    Go(Direction),
    Stop,
    Speed(i64),
    Distances,
    Status,
    Help,
    Quit,
}

impl ConsoleCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ConsoleCommand::Address(_) => "address",
            ConsoleCommand::SelectMode(_) => "mode",
            ConsoleCommand::Home => "home",
            ConsoleCommand::Go(_) => "go",
            ConsoleCommand::Stop => "stop",
            ConsoleCommand::Speed(_) => "speed",
            ConsoleCommand::Distances => "distances",
            ConsoleCommand::Status => "status",
            ConsoleCommand::Help => "help",
            ConsoleCommand::Quit => "quit",
        }
    }
}

/// `Ok(None)` for blank lines.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let argument = words.next();
    if words.next().is_some() {
        bail!("too many arguments for '{verb}'");
    }
    let required = |what: &str| argument.ok_or_else(|| anyhow!("'{verb}' needs {what}"));

    let command = match verb.to_ascii_lowercase().as_str() {
        "address" | "ip" => ConsoleCommand::Address(required("a host")?.to_string()),
        "mode" => ConsoleCommand::SelectMode(required("manual or auto")?.parse()?),
        "manual" => ConsoleCommand::SelectMode(Mode::Manual),
        "auto" => ConsoleCommand::SelectMode(Mode::Autonomous),
        "home" | "back" => ConsoleCommand::Home,
        "go" => match required("a direction")?.parse::<Direction>()? {
            Direction::Stop => ConsoleCommand::Stop,
            direction => ConsoleCommand::Go(direction),
        },
        "stop" => ConsoleCommand::Stop,
        "speed" => {
            let raw = required("a value")?;
            ConsoleCommand::Speed(
                raw.parse()
                    .map_err(|_| anyhow!("speed '{raw}' is not a number"))?,
            )
        }
        "distances" => ConsoleCommand::Distances,
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => bail!("unknown command '{other}' (try 'help')"),
    };
    Ok(Some(command))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Silent,
    Text(String),
    Quit,
}

pub async fn execute(session: &dyn SessionHandle, command: ConsoleCommand) -> Reply {
    tracing::debug!(command = command.name(), "console: executing");
    match command {
        ConsoleCommand::Address(raw) => {
            session.set_address(&raw).await;
            Reply::Silent
        }
        ConsoleCommand::SelectMode(Mode::Idle) | ConsoleCommand::Home => {
            session.go_home().await;
            Reply::Silent
        }
        ConsoleCommand::SelectMode(mode) => {
            session.select_mode(mode).await;
            Reply::Silent
        }
        ConsoleCommand::Go(direction) => match session.start_direction(direction).await {
            Ok(()) => Reply::Silent,
            Err(err) => Reply::Text(format!("! {err}")),
        },
        ConsoleCommand::Stop => {
            session.stop_direction().await;
            Reply::Silent
        }
        ConsoleCommand::Speed(value) => match session.set_speed(value).await {
            Ok(_) => Reply::Silent,
            Err(err) => Reply::Text(format!("! {err}")),
        },
        ConsoleCommand::Distances => match session.read_distances().await {
            Ok(distances) => Reply::Text(render_distances(&distances)),
            Err(err) if err.is_unreachable() => {
                Reply::Text(format!("! robot unreachable, no distances: {err}"))
            }
            Err(err) => Reply::Text(format!("! {err}")),
        },
        ConsoleCommand::Status => Reply::Text(render_snapshot(&session.snapshot().await)),
        ConsoleCommand::Help => Reply::Text(HELP.to_string()),
        ConsoleCommand::Quit => Reply::Quit,
    }
}

pub fn render_event(event: &SessionEvent) -> String {
    match event {
        SessionEvent::AddressChanged(address) => format!("robot address: {address}"),
        SessionEvent::ConnectionChanged(state) => format!("connection: {state}"),
        SessionEvent::ActiveDirectionChanged(Some(direction)) => {
            format!("moving: {}", direction.label())
        }
        SessionEvent::ActiveDirectionChanged(None) => "moving: -".to_string(),
        SessionEvent::ModeChanged(mode) => format!("mode: {mode}"),
        SessionEvent::SpeedChanged(speed) => format!("speed: {speed}"),
        SessionEvent::StatusUpdated(Some(status)) => render_status(status),
        SessionEvent::StatusUpdated(None) => "robot status: -".to_string(),
        SessionEvent::DistancesUpdated(Some(distances)) => render_distances(distances),
        SessionEvent::DistancesUpdated(None) => "distances: -".to_string(),
        SessionEvent::Notice(message) => format!("! {message}"),
    }
}

fn render_distances(distances: &ObstacleDistances) -> String {
    format!(
        "distances: left {} cm, right {} cm",
        distances.left_cm, distances.right_cm
    )
}

fn render_status(status: &StatusSnapshot) -> String {
    format!("robot status: {} ({})", status.category, status.raw)
}

pub fn render_snapshot(snapshot: &SessionSnapshot) -> String {
    let moving = snapshot
        .active_direction
        .map_or("-", |direction| direction.label());
    let status = snapshot
        .status
        .as_ref()
        .map_or_else(|| "-".to_string(), render_status);
    let mut line = format!(
        "address {} | {} | mode {} | speed {} | moving {} | {}",
        snapshot.address, snapshot.connection, snapshot.mode, snapshot.speed, moving, status
    );
    if let Some(distances) = &snapshot.distances {
        line.push_str(" | ");
        line.push_str(&render_distances(distances));
    }
    line
}

#[cfg(test)]
#[path = "tests/console_tests.rs"]
mod tests;
