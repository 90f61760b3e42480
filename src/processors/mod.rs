//! Event processors and the per-line pipeline that drives them.
//!
//! Every feed line is parsed once and offered, in a fixed order, to the leader
//! strategy, the race-control state machine and the session-data handler. Each
//! processor ignores categories it does not own, so a line only ever changes
//! the parts of [`SessionState`] it speaks about.

pub mod leader;
pub mod race_control;
pub mod session_data;

pub use leader::{LeaderStrategy, rebroadcast_leader};
pub use race_control::{process_race_control, return_to_green};
pub use session_data::process_session_data;

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{trace, warn};

use crate::event::{RawEvent, parse_line};
use crate::reference::ReferenceData;
use crate::state::SessionState;
use crate::topics::Outbox;
use crate::types::SessionType;
use crate::{DrsError, Result};

/// Wait after a qualifying chequered flag before moving to the next segment.
pub const DEFAULT_SEGMENT_COOLDOWN: Duration = Duration::from_secs(180);
/// How long after the detected start a `CALIBRATE_START` is honoured.
pub const DEFAULT_CALIBRATION_WINDOW: Duration = Duration::from_secs(300);

/// Session timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    pub segment_cooldown: Duration,
    pub calibration_window: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            segment_cooldown: DEFAULT_SEGMENT_COOLDOWN,
            calibration_window: DEFAULT_CALIBRATION_WINDOW,
        }
    }
}

/// Owns the [`SessionState`] and applies feed events to it.
#[derive(Debug)]
pub struct SessionProcessor {
    state: SessionState,
    strategy: LeaderStrategy,
    timings: SessionTimings,
}

impl SessionProcessor {
    pub fn new(
        session_type: SessionType,
        reference: Arc<ReferenceData>,
        timings: SessionTimings,
    ) -> Self {
        Self {
            state: SessionState::new(session_type, reference),
            strategy: LeaderStrategy::for_session(session_type),
            timings,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn strategy(&self) -> LeaderStrategy {
        self.strategy
    }

    /// Parse one feed line and apply it.
    ///
    /// Returns [`DrsError::MalformedEvent`] for lines that do not decode; the
    /// caller logs and skips those. Processing errors are handled as in
    /// [`process_event`](Self::process_event).
    pub fn process_line(
        &mut self,
        line: &str,
        now: Instant,
        outbox: &mut dyn Outbox,
    ) -> Result<()> {
        let event = parse_line(line)?;
        self.process_event(&event, now, outbox)
    }

    /// Apply a decoded event: leader strategy, then race control, then session
    /// data.
    ///
    /// A failure in one processor is logged with the event's category and the
    /// remaining processors still run. Only [`DrsError::SchedulerClosed`] is
    /// returned, since nothing enqueued after it can ever be published.
    pub fn process_event(
        &mut self,
        event: &RawEvent,
        now: Instant,
        outbox: &mut dyn Outbox,
    ) -> Result<()> {
        trace!(category = %event.category, timestamp = %event.timestamp, "Processing event");

        let leader = self.strategy.process(event, &mut self.state, outbox);
        contain(event, "leader", leader)?;

        let race_control = process_race_control(event, &mut self.state, now, outbox);
        contain(event, "race control", race_control)?;

        let window = self.timings.calibration_window;
        let session_data = process_session_data(event, &mut self.state, now, window, outbox);
        contain(event, "session data", session_data)
    }

    /// Supervising tick, run once per ingest iteration. Returns whether the
    /// qualifying segment advanced.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.state.segment_transition_due(now, self.timings.segment_cooldown) {
            self.state.reset_for_next_quali_segment();
            true
        } else {
            false
        }
    }

    /// Publish delay implied by a `CALIBRATE_START` received at `now`, or
    /// `None` outside the calibration window.
    pub fn calibrate(&self, now: Instant) -> Option<Duration> {
        self.state.calibration_offset(now)
    }
}

fn contain(event: &RawEvent, stage: &str, result: Result<()>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(DrsError::SchedulerClosed) => Err(DrsError::SchedulerClosed),
        Err(e) => {
            warn!(category = %event.category, stage, "Failed to process event: {}", e);
            Ok(())
        }
    }
}

/// Entries of a feed collection that arrives either as an index-keyed mapping
/// or as a list.
pub(crate) fn entries(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Object(map)) => map.values().collect(),
        Some(Value::Array(items)) => items.iter().collect(),
        _ => Vec::new(),
    }
}
