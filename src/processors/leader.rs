//! Leader derivation: fastest lap for practice and qualifying, track position
//! for races.

use serde_json::Value;
use tracing::{debug, info};

use crate::event::{RawEvent, category};
use crate::reference::UNKNOWN_COLOR;
use crate::state::SessionState;
use crate::topics::{LeaderPayload, Outbox, Topic, encode};
use crate::types::{SessionType, parse_lap_time};
use crate::Result;

/// How the session leader is derived. Chosen once from the session type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderStrategy {
    /// Leader is the holder of the fastest `LastLapTime` (`TimingData`).
    FastestLap,
    /// Leader is P1 of the `TopThree` feed.
    TrackPosition,
}

impl LeaderStrategy {
    pub fn for_session(session_type: SessionType) -> Self {
        if session_type.uses_lap_times() {
            LeaderStrategy::FastestLap
        } else {
            LeaderStrategy::TrackPosition
        }
    }

    pub fn process(
        self,
        event: &RawEvent,
        state: &mut SessionState,
        outbox: &mut dyn Outbox,
    ) -> Result<()> {
        match self {
            LeaderStrategy::FastestLap => process_lap_times(event, state, outbox),
            LeaderStrategy::TrackPosition => process_race_lead(event, state, outbox),
        }
    }
}

/// Update the fastest lap, and with it the leader, from a `TimingData` event.
pub fn process_lap_times(
    event: &RawEvent,
    state: &mut SessionState,
    outbox: &mut dyn Outbox,
) -> Result<()> {
    if !event.is(category::TIMING_DATA) {
        return Ok(());
    }
    let Some(lines) = event.payload.get("Lines").and_then(Value::as_object) else {
        return Ok(());
    };

    for (number, data) in lines {
        let Some(text) = data
            .get("LastLapTime")
            .filter(|v| v.is_object())
            .and_then(|v| v.get("Value"))
            .and_then(Value::as_str)
        else {
            continue;
        };
        let Some(lap_time) = parse_lap_time(text) else {
            debug!(driver_number = %number, "Ignoring unparsable lap time {:?}", text);
            continue;
        };
        if lap_time >= state.fastest_lap_info.time {
            continue;
        }

        let identity = state.reference().resolve(number);
        info!(
            driver = %identity.abbreviation,
            team = %identity.team,
            "New fastest lap {} ({:?})",
            text,
            lap_time
        );
        state.set_fastest_lap(lap_time, &identity);
        state.set_session_lead(&identity);
        outbox.enqueue(Topic::Leader, encode(&LeaderPayload::from(&identity))?)?;
    }
    Ok(())
}

/// Update the leader from the P1 entry of a `TopThree` event.
pub fn process_race_lead(
    event: &RawEvent,
    state: &mut SessionState,
    outbox: &mut dyn Outbox,
) -> Result<()> {
    if !event.is(category::TOP_THREE) {
        return Ok(());
    }
    let p1 = match event.payload.get("Lines") {
        Some(Value::Object(lines)) => lines.get("0"),
        Some(Value::Array(lines)) => lines.first(),
        _ => None,
    };
    let Some(number) = p1.and_then(|p1| p1.get("RacingNumber")).and_then(racing_number) else {
        return Ok(());
    };
    if state.current_session_lead.driver_number.as_deref() == Some(number.as_str()) {
        return Ok(());
    }

    let identity = state.reference().resolve(&number);
    info!(driver = %identity.abbreviation, team = %identity.team, "New race leader");
    state.set_session_lead(&identity);
    outbox.enqueue(Topic::Leader, encode(&LeaderPayload::from(&identity))?)?;
    Ok(())
}

/// Publish the current leader again. No-op until a leader with a team is known.
pub fn rebroadcast_leader(state: &SessionState, outbox: &mut dyn Outbox) -> Result<()> {
    let lead = &state.current_session_lead;
    let Some(team) = lead.team.clone() else {
        return Ok(());
    };

    let team_color = lead
        .driver_number
        .as_deref()
        .and_then(|n| state.reference().lookup(n).ok())
        .map(|identity| identity.team_color)
        .or_else(|| state.reference().color_for_team(&team).map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_COLOR.to_string());

    let payload = LeaderPayload {
        driver: lead.driver.clone().unwrap_or_default(),
        driver_number: lead.driver_number.clone().unwrap_or_default(),
        team,
        team_color,
    };
    outbox.enqueue(Topic::Leader, encode(&payload)?)
}

fn racing_number(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
