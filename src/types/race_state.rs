//! Track-wide race state and qualifying segments

use serde::{Deserialize, Serialize};
use std::fmt;

/// Track-wide race state.
///
/// `Red` is only left through a detected restart, never through a flag message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RaceState {
    #[default]
    #[serde(rename = "GREEN")]
    Green,
    #[serde(rename = "YELLOW")]
    Yellow,
    #[serde(rename = "SAFETY CAR")]
    SafetyCar,
    #[serde(rename = "RED")]
    Red,
}

impl RaceState {
    pub fn as_str(self) -> &'static str {
        match self {
            RaceState::Green => "GREEN",
            RaceState::Yellow => "YELLOW",
            RaceState::SafetyCar => "SAFETY CAR",
            RaceState::Red => "RED",
        }
    }

    /// Local yellows are only honoured while the whole track is not neutralised.
    pub fn accepts_local_yellow(self) -> bool {
        !matches!(self, RaceState::Red | RaceState::SafetyCar)
    }
}

impl fmt::Display for RaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualifying segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualiSegment {
    #[default]
    Q1,
    Q2,
    Q3,
}

impl QualiSegment {
    /// Segment after this one. Q3 is final and has no successor.
    pub fn next(self) -> Option<QualiSegment> {
        match self {
            QualiSegment::Q1 => Some(QualiSegment::Q2),
            QualiSegment::Q2 => Some(QualiSegment::Q3),
            QualiSegment::Q3 => None,
        }
    }
}

impl fmt::Display for QualiSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QualiSegment::Q1 => "Q1",
            QualiSegment::Q2 => "Q2",
            QualiSegment::Q3 => "Q3",
        };
        f.write_str(name)
    }
}
