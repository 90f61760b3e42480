//! Session status: start detection and red-flag restarts.

use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

use super::entries;
use super::race_control::{RED_FLAG_CLEARED, return_to_green};
use crate::event::{RawEvent, category};
use crate::state::SessionState;
use crate::topics::Outbox;
use crate::types::RaceState;
use crate::Result;

/// Handle `SessionData.StatusSeries`.
///
/// The first `Started` status records the session start and opens the
/// calibration window. A later one while the session is red-flagged is a
/// restart. Only the first `Started` entry of an event is considered.
pub fn process_session_data(
    event: &RawEvent,
    state: &mut SessionState,
    now: Instant,
    calibration_window: Duration,
    outbox: &mut dyn Outbox,
) -> Result<()> {
    if !event.is(category::SESSION_DATA) {
        return Ok(());
    }

    let started = entries(event.payload.get("StatusSeries"))
        .into_iter()
        .any(|series| series.get("SessionStatus").and_then(Value::as_str) == Some("Started"));
    if !started {
        return Ok(());
    }

    if state.true_session_start_time.is_none() {
        info!(window_secs = calibration_window.as_secs(), "Session start detected from live feed");
        state.record_session_start(now, calibration_window);
    } else if state.race_state == RaceState::Red {
        info!("Session restart detected");
        return_to_green(state, outbox, RED_FLAG_CLEARED)?;
    }
    Ok(())
}
