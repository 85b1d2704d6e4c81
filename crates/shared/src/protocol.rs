use serde::{Deserialize, Serialize};

use crate::domain::{Direction, Speed};

/// Routes served by the robot firmware. Every route is a plain `GET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Ping,
    Move { direction: Direction, speed: Speed },
    Stop,
    EnableAutonomous,
    DisableAutonomous,
    Status,
    Distances,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Ping => "ping",
            Endpoint::Move { direction, .. } => direction.slug(),
            Endpoint::Stop => "stop",
            Endpoint::EnableAutonomous => "autonome",
            Endpoint::DisableAutonomous => "stopauto",
            Endpoint::Status => "etat",
            Endpoint::Distances => "distances",
        }
    }

    pub fn query(&self) -> Option<(&'static str, String)> {
        match self {
            Endpoint::Move { speed, .. } => Some(("speed", speed.value().to_string())),
            _ => None,
        }
    }
}

/// Range-finder readings in centimetres, as served on `/distances`.
///
/// The default (both sides at zero) stands in for a reading that failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ObstacleDistances {
    #[serde(rename = "gauche")]
    pub left_cm: f64,
    #[serde(rename = "droite")]
    pub right_cm: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_endpoint_routes_on_direction_slug_with_speed() {
        let endpoint = Endpoint::Move {
            direction: Direction::BackwardLeft,
            speed: Speed::new(75).expect("speed"),
        };
        assert_eq!(endpoint.path(), "reculegauche");
        assert_eq!(endpoint.query(), Some(("speed", "75".to_string())));
        assert_eq!(Endpoint::Stop.query(), None);
    }

    #[test]
    fn decodes_distances_payload() {
        let distances: ObstacleDistances =
            serde_json::from_str(r#"{"gauche": 25, "droite": 18.5}"#).expect("decode");
        assert_eq!(distances.left_cm, 25.0);
        assert_eq!(distances.right_cm, 18.5);
    }
}
