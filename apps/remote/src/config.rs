use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use client_core::SessionSettings;
use serde::Deserialize;
use shared::domain::{RobotAddress, Speed, DEFAULT_ROBOT_ADDRESS};

pub const DEFAULT_CONFIG_FILE: &str = "robot.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub robot_address: String,
    pub probe_interval_ms: u64,
    pub status_interval_ms: u64,
    /// Range-finder refresh while autonomous; `0` turns the feed off.
    pub distances_interval_ms: u64,
    /// Per-request timeout; `0` leaves requests bounded only by the OS.
    pub request_timeout_ms: u64,
    pub default_speed: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            robot_address: DEFAULT_ROBOT_ADDRESS.into(),
            probe_interval_ms: 3000,
            status_interval_ms: 1000,
            distances_interval_ms: 3000,
            request_timeout_ms: 2500,
            default_speed: 50,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    robot_address: Option<String>,
    probe_interval_ms: Option<u64>,
    status_interval_ms: Option<u64>,
    distances_interval_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    default_speed: Option<i64>,
}

/// Defaults, then the TOML file, then environment overrides.
///
/// An explicitly requested file must exist; the default `robot.toml` is
/// optional.
pub fn load_settings(explicit_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let path = explicit_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    match fs::read_to_string(&path) {
        Ok(raw) => {
            apply_file(&mut settings, &raw)
                .with_context(|| format!("invalid config file '{}'", path.display()))?;
        }
        Err(err) if explicit_path.is_some() => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()));
        }
        Err(_) => {}
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.robot_address {
        settings.robot_address = v;
    }
    if let Some(v) = file_cfg.probe_interval_ms {
        settings.probe_interval_ms = v;
    }
    if let Some(v) = file_cfg.status_interval_ms {
        settings.status_interval_ms = v;
    }
    if let Some(v) = file_cfg.distances_interval_ms {
        settings.distances_interval_ms = v;
    }
    if let Some(v) = file_cfg.request_timeout_ms {
        settings.request_timeout_ms = v;
    }
    if let Some(v) = file_cfg.default_speed {
        settings.default_speed = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("ROBOT_ADDRESS") {
        settings.robot_address = v;
    }
    if let Some(v) = lookup("APP__ROBOT_ADDRESS") {
        settings.robot_address = v;
    }

    let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
    if let Some(v) = parsed("APP__PROBE_INTERVAL_MS") {
        settings.probe_interval_ms = v;
    }
    if let Some(v) = parsed("APP__STATUS_INTERVAL_MS") {
        settings.status_interval_ms = v;
    }
    if let Some(v) = parsed("APP__DISTANCES_INTERVAL_MS") {
        settings.distances_interval_ms = v;
    }
    if let Some(v) = parsed("APP__REQUEST_TIMEOUT_MS") {
        settings.request_timeout_ms = v;
    }
    if let Some(v) = lookup("APP__DEFAULT_SPEED").and_then(|v| v.trim().parse::<i64>().ok()) {
        settings.default_speed = v;
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    pub fn session_settings(&self) -> anyhow::Result<SessionSettings> {
        if self.probe_interval_ms == 0 || self.status_interval_ms == 0 {
            bail!("poll intervals must be greater than zero");
        }
        let default_speed = Speed::new(self.default_speed).context("invalid default speed")?;
        Ok(SessionSettings {
            initial_address: RobotAddress::new(&self.robot_address),
            probe_interval: Duration::from_millis(self.probe_interval_ms),
            status_interval: Duration::from_millis(self.status_interval_ms),
            distances_interval: (self.distances_interval_ms > 0)
                .then(|| Duration::from_millis(self.distances_interval_ms)),
            default_speed,
        })
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
