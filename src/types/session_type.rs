//! Session type selection and its command-line aliases

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{DrsError, Result};

/// Kind of session being relayed. Fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Practice,
    Qualifying,
    Race,
}

impl SessionType {
    /// Accepted spellings, matched case-insensitively.
    pub const ALIASES: &'static [(&'static str, SessionType)] = &[
        ("p", SessionType::Practice),
        ("fp", SessionType::Practice),
        ("practice", SessionType::Practice),
        ("free practice", SessionType::Practice),
        ("q", SessionType::Qualifying),
        ("sq", SessionType::Qualifying),
        ("qualifying", SessionType::Qualifying),
        ("sprint qualifying", SessionType::Qualifying),
        ("r", SessionType::Race),
        ("sr", SessionType::Race),
        ("race", SessionType::Race),
        ("sprint race", SessionType::Race),
    ];

    /// Whether the leader is derived from lap times rather than track position.
    pub fn uses_lap_times(self) -> bool {
        matches!(self, SessionType::Practice | SessionType::Qualifying)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionType::Practice => "practice",
            SessionType::Qualifying => "qualifying",
            SessionType::Race => "race",
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionType {
    type Err = DrsError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        let found = Self::ALIASES.iter().find(|(alias, _)| *alias == wanted);
        found.map(|(_, ty)| *ty).ok_or_else(|| {
            let valid: Vec<&str> = Self::ALIASES.iter().map(|(alias, _)| *alias).collect();
            DrsError::config(
                "session type",
                format!("invalid session type '{}'; valid options are: {}", s, valid.join(", ")),
            )
        })
    }
}
