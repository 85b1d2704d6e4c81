use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

pub const DEFAULT_ROBOT_ADDRESS: &str = "192.168.121.133";
pub const LOADING_STATUS_TEXT: &str = "Chargement...";
pub const COMMUNICATION_ERROR_TEXT: &str = "Erreur de communication avec le robot";

/// Host and optional port of the robot, stored without any scheme prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RobotAddress(String);

impl RobotAddress {
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        let without_scheme = ["http://", "https://"]
            .iter()
            .find_map(|scheme| strip_prefix_ignore_ascii_case(trimmed, scheme))
            .unwrap_or(trimmed);
        Self(without_scheme.trim_end_matches('/').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RobotAddress {
    fn default() -> Self {
        Self(DEFAULT_ROBOT_ADDRESS.to_string())
    }
}

impl fmt::Display for RobotAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn strip_prefix_ignore_ascii_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
    ForwardLeft,
    ForwardRight,
    BackwardLeft,
    BackwardRight,
    Stop,
}

impl Direction {
    pub const ALL: [Direction; 9] = [
        Direction::Forward,
        Direction::Backward,
        Direction::Left,
        Direction::Right,
        Direction::ForwardLeft,
        Direction::ForwardRight,
        Direction::BackwardLeft,
        Direction::BackwardRight,
        Direction::Stop,
    ];

    /// Path segment the robot firmware routes this direction on.
    pub fn slug(self) -> &'static str {
        match self {
            Direction::Forward => "avance",
            Direction::Backward => "recule",
            Direction::Left => "gauche",
            Direction::Right => "droite",
            Direction::ForwardLeft => "avancegauche",
            Direction::ForwardRight => "avancedroite",
            Direction::BackwardLeft => "reculegauche",
            Direction::BackwardRight => "reculedroite",
            Direction::Stop => "stop",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
            Direction::Left => "turn left",
            Direction::Right => "turn right",
            Direction::ForwardLeft => "forward left",
            Direction::ForwardRight => "forward right",
            Direction::BackwardLeft => "backward left",
            Direction::BackwardRight => "backward right",
            Direction::Stop => "stop",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Direction {
    type Err = DomainError;

    /// Accepts either the robot slug (`avancegauche`) or the English name
    /// (`forward_left`, `forward-left`).
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let needle = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let direction = match needle.as_str() {
            "avance" | "forward" => Direction::Forward,
            "recule" | "backward" => Direction::Backward,
            "gauche" | "left" => Direction::Left,
            "droite" | "right" => Direction::Right,
            "avancegauche" | "forward_left" => Direction::ForwardLeft,
            "avancedroite" | "forward_right" => Direction::ForwardRight,
            "reculegauche" | "backward_left" => Direction::BackwardLeft,
            "reculedroite" | "backward_right" => Direction::BackwardRight,
            "stop" => Direction::Stop,
            _ => return Err(DomainError::UnknownDirection(raw.to_string())),
        };
        Ok(direction)
    }
}

/// Motion speed as a percentage of the robot's maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Speed(u8);

impl Speed {
    pub const MIN: Speed = Speed(0);
    pub const MAX: Speed = Speed(100);

    pub fn new(value: i64) -> Result<Self, DomainError> {
        if (0..=100).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(DomainError::InvalidSpeed(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Speed {
    fn default() -> Self {
        Self(50)
    }
}

impl TryFrom<i64> for Speed {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Speed> for u8 {
    fn from(value: Speed) -> Self {
        value.0
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Idle,
    Manual,
    Autonomous,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Idle => "idle",
            Mode::Manual => "manual",
            Mode::Autonomous => "autonomous",
        })
    }
}

impl FromStr for Mode {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "idle" | "home" => Ok(Mode::Idle),
            "manual" | "manuel" => Ok(Mode::Manual),
            "auto" | "autonomous" | "autonome" => Ok(Mode::Autonomous),
            _ => Err(DomainError::UnknownMode(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    #[default]
    Disconnected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    /// No poll has completed since autonomous mode was entered.
    Loading,
    Advancing,
    Reversing,
    TurningLeft,
    TurningRight,
    Obstacle,
    CommunicationError,
    Unknown,
}

// Checked in order; the first keyword found in the status text wins.
const STATUS_VOCABULARY: [(&str, StatusCategory); 6] = [
    ("avance", StatusCategory::Advancing),
    ("recule", StatusCategory::Reversing),
    ("gauche", StatusCategory::TurningLeft),
    ("droite", StatusCategory::TurningRight),
    ("obstacle", StatusCategory::Obstacle),
    ("erreur", StatusCategory::CommunicationError),
];

impl StatusCategory {
    pub fn classify(raw: &str) -> Self {
        let lowered = raw.to_lowercase();
        STATUS_VOCABULARY
            .iter()
            .find(|(keyword, _)| lowered.contains(keyword))
            .map(|(_, category)| *category)
            .unwrap_or(StatusCategory::Unknown)
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StatusCategory::Loading => "loading",
            StatusCategory::Advancing => "advancing",
            StatusCategory::Reversing => "reversing",
            StatusCategory::TurningLeft => "turning left",
            StatusCategory::TurningRight => "turning right",
            StatusCategory::Obstacle => "obstacle",
            StatusCategory::CommunicationError => "communication error",
            StatusCategory::Unknown => "unknown",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub raw: String,
    pub category: StatusCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    pub fn loading() -> Self {
        Self {
            raw: LOADING_STATUS_TEXT.to_string(),
            category: StatusCategory::Loading,
            received_at: None,
        }
    }

    pub fn from_text(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            category: StatusCategory::classify(&raw),
            raw,
            received_at: Some(Utc::now()),
        }
    }

    pub fn communication_error() -> Self {
        Self {
            raw: COMMUNICATION_ERROR_TEXT.to_string(),
            category: StatusCategory::CommunicationError,
            received_at: Some(Utc::now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scheme_prefix_case_insensitively() {
        assert_eq!(RobotAddress::new("http://10.0.0.5").as_str(), "10.0.0.5");
        assert_eq!(RobotAddress::new("HTTPS://10.0.0.5:8080/").as_str(), "10.0.0.5:8080");
        assert_eq!(RobotAddress::new("  robot.local ").as_str(), "robot.local");
    }

    #[test]
    fn keeps_hosts_that_only_look_like_schemes() {
        assert_eq!(RobotAddress::new("httpbin.local").as_str(), "httpbin.local");
    }

    #[test]
    fn speed_bounds_are_inclusive() {
        assert_eq!(Speed::new(0).expect("min").value(), 0);
        assert_eq!(Speed::new(100).expect("max").value(), 100);
        assert!(matches!(Speed::new(101), Err(DomainError::InvalidSpeed(101))));
        assert!(matches!(Speed::new(-1), Err(DomainError::InvalidSpeed(-1))));
        assert_eq!(Speed::default().value(), 50);
    }

    #[test]
    fn parses_directions_from_slugs_and_names() {
        assert_eq!("avancegauche".parse::<Direction>().expect("slug"), Direction::ForwardLeft);
        assert_eq!("backward-right".parse::<Direction>().expect("name"), Direction::BackwardRight);
        assert_eq!("Forward".parse::<Direction>().expect("label"), Direction::Forward);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn classifies_robot_vocabulary() {
        assert_eq!(StatusCategory::classify("Le robot avance"), StatusCategory::Advancing);
        assert_eq!(StatusCategory::classify("recule..."), StatusCategory::Reversing);
        assert_eq!(StatusCategory::classify("tourne à gauche"), StatusCategory::TurningLeft);
        assert_eq!(StatusCategory::classify("tourne à droite"), StatusCategory::TurningRight);
        assert_eq!(StatusCategory::classify("Obstacle détecté"), StatusCategory::Obstacle);
        assert_eq!(StatusCategory::classify("Erreur capteur"), StatusCategory::CommunicationError);
        assert_eq!(StatusCategory::classify("en attente"), StatusCategory::Unknown);
        assert_eq!(StatusCategory::classify(""), StatusCategory::Unknown);
    }

    #[test]
    fn classification_follows_keyword_priority() {
        assert_eq!(StatusCategory::classify("AVANCE à gauche"), StatusCategory::Advancing);
        assert_eq!(StatusCategory::classify("obstacle, tourne à droite"), StatusCategory::TurningRight);
    }

    #[test]
    fn loading_is_distinct_from_unknown() {
        let snapshot = StatusSnapshot::loading();
        assert_eq!(snapshot.category, StatusCategory::Loading);
        assert_eq!(snapshot.raw, LOADING_STATUS_TEXT);
        assert!(snapshot.received_at.is_none());
    }
}
