//! Static driver and team reference data.
//!
//! Loaded once at startup from a file shaped like:
//!
//! ```yaml
//! drivers:
//!   "10": { abbreviation: GAS, team_key: alpine }
//! teams:
//!   alpine: { name: Alpine, color_hex: 00A1E8 }
//! ```
//!
//! JSON files with the same shape load as well.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::{DrsError, Result};

/// Abbreviation used when a driver number is not in the reference data.
pub const UNKNOWN_DRIVER: &str = "UNK";
/// Team name used when a driver or team is not in the reference data.
pub const UNKNOWN_TEAM: &str = "UNKNOWN";
/// Colour used when the team is not in the reference data.
pub const UNKNOWN_COLOR: &str = "FFFFFF";

/// Driver entry keyed by racing number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverEntry {
    pub abbreviation: String,
    pub team_key: String,
}

/// Team entry keyed by team key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamEntry {
    pub name: String,
    pub color_hex: String,
}

/// Driver numbers and teams known for this event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceData {
    pub drivers: HashMap<String, DriverEntry>,
    pub teams: HashMap<String, TeamEntry>,
}

/// Everything published about a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverIdentity {
    pub abbreviation: String,
    pub driver_number: String,
    pub team: String,
    pub team_color: String,
}

impl ReferenceData {
    /// Parse reference data from YAML or JSON text.
    pub fn parse(text: &str) -> Result<Self> {
        serde_yaml_ng::from_str(text)
            .map_err(|e| DrsError::config("reference data", e.to_string()))
    }

    /// Load reference data from a file. A missing or invalid file is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DrsError::config("reference data", format!("{}: {}", path.display(), e))
        })?;
        let data = Self::parse(&text)?;
        debug!(
            drivers = data.drivers.len(),
            teams = data.teams.len(),
            "Loaded reference data from {}",
            path.display()
        );
        Ok(data)
    }

    /// Strict lookup of a driver number.
    pub fn lookup(&self, driver_number: &str) -> Result<DriverIdentity> {
        let unknown = || DrsError::UnknownDriver { driver_number: driver_number.to_string() };
        let driver = self.drivers.get(driver_number).ok_or_else(unknown)?;
        let team = self.teams.get(&driver.team_key).ok_or_else(unknown)?;

        Ok(DriverIdentity {
            abbreviation: driver.abbreviation.clone(),
            driver_number: driver_number.to_string(),
            team: team.name.clone(),
            team_color: team.color_hex.clone(),
        })
    }

    /// Lookup that never fails: misses degrade to the `UNK`/`UNKNOWN` sentinels.
    pub fn resolve(&self, driver_number: &str) -> DriverIdentity {
        match self.lookup(driver_number) {
            Ok(identity) => identity,
            Err(e) => {
                warn!("{}, publishing unknown driver", e);
                // A known driver whose team key is missing keeps the abbreviation
                let abbreviation = self
                    .drivers
                    .get(driver_number)
                    .map(|d| d.abbreviation.clone())
                    .unwrap_or_else(|| UNKNOWN_DRIVER.to_string());
                DriverIdentity {
                    abbreviation,
                    driver_number: driver_number.to_string(),
                    team: UNKNOWN_TEAM.to_string(),
                    team_color: UNKNOWN_COLOR.to_string(),
                }
            }
        }
    }

    /// Colour of the team with the given display name.
    pub fn color_for_team(&self, team_name: &str) -> Option<&str> {
        self.teams.values().find(|t| t.name == team_name).map(|t| t.color_hex.as_str())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::reference_data;
    use super::*;

    #[test]
    fn known_driver_resolves_with_team_colour() {
        let identity = reference_data().lookup("10").unwrap();
        assert_eq!(identity.abbreviation, "GAS");
        assert_eq!(identity.team, "Alpine");
        assert_eq!(identity.team_color, "00A1E8");
    }

    #[test]
    fn unknown_driver_degrades_to_sentinels() {
        let data = reference_data();
        assert!(matches!(data.lookup("7"), Err(DrsError::UnknownDriver { .. })));

        let identity = data.resolve("7");
        assert_eq!(identity.abbreviation, UNKNOWN_DRIVER);
        assert_eq!(identity.driver_number, "7");
        assert_eq!(identity.team, UNKNOWN_TEAM);
    }

    #[test]
    fn missing_team_keeps_abbreviation() {
        let identity = reference_data().resolve("99");
        assert_eq!(identity.abbreviation, "TST");
        assert_eq!(identity.team, UNKNOWN_TEAM);
        assert_eq!(identity.team_color, UNKNOWN_COLOR);
    }

    #[test]
    fn yaml_form_is_accepted() {
        let data = ReferenceData::parse(
            "drivers:\n  \"44\": { abbreviation: HAM, team_key: ferrari }\n\
             teams:\n  ferrari: { name: Ferrari, color_hex: ED1131 }\n",
        )
        .unwrap();
        assert_eq!(data.lookup("44").unwrap().team, "Ferrari");
        assert_eq!(data.color_for_team("Ferrari"), Some("ED1131"));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let result = ReferenceData::load("/nonexistent/drs_data.json");
        assert!(matches!(result, Err(DrsError::Config { .. })));
    }
}
