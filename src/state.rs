//! Session state: the single mutable record of how the session is going.
//!
//! [`SessionState`] is owned by the ingest loop and only ever mutated there, so
//! it needs no locking. Timestamps are monotonic [`Instant`]s supplied by the
//! caller, which keeps every transition testable without a wall clock.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

use crate::reference::{DriverIdentity, ReferenceData};
use crate::types::{QualiSegment, RaceState, Sector, SessionType};

/// Fastest lap sentinel at session start, slower than any real lap.
pub const INITIAL_FASTEST_LAP: Duration = Duration::from_secs(24 * 60 * 60);

/// Fastest lap sentinel after a qualifying segment change.
pub const SEGMENT_FASTEST_LAP: Duration = Duration::from_secs(5 * 60);

/// Current fastest lap holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastestLapInfo {
    pub time: Duration,
    pub driver: Option<String>,
    pub team: Option<String>,
}

impl Default for FastestLapInfo {
    fn default() -> Self {
        Self { time: INITIAL_FASTEST_LAP, driver: None, team: None }
    }
}

/// Currently believed session leader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionLeaderInfo {
    pub driver: Option<String>,
    pub driver_number: Option<String>,
    pub team: Option<String>,
}

/// All dynamic and static data for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    session_type: SessionType,
    pub race_state: RaceState,
    pub fastest_lap_info: FastestLapInfo,
    pub current_session_lead: SessionLeaderInfo,
    pub yellow_flags: BTreeSet<Sector>,
    pub quali_session: QualiSegment,
    pub cooldown_active: bool,
    pub session_end_time: Option<Instant>,
    pub true_session_start_time: Option<Instant>,
    pub calibration_window_end_time: Option<Instant>,
    reference: Arc<ReferenceData>,
}

impl SessionState {
    pub fn new(session_type: SessionType, reference: Arc<ReferenceData>) -> Self {
        Self {
            session_type,
            race_state: RaceState::Green,
            fastest_lap_info: FastestLapInfo::default(),
            current_session_lead: SessionLeaderInfo::default(),
            yellow_flags: BTreeSet::new(),
            quali_session: QualiSegment::Q1,
            cooldown_active: false,
            session_end_time: None,
            true_session_start_time: None,
            calibration_window_end_time: None,
            reference,
        }
    }

    pub fn session_type(&self) -> SessionType {
        self.session_type
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn set_race_state(&mut self, state: RaceState) {
        self.race_state = state;
    }

    pub fn add_yellow_sector(&mut self, sector: Sector) {
        self.yellow_flags.insert(sector);
    }

    pub fn remove_yellow_sector(&mut self, sector: Sector) {
        self.yellow_flags.remove(&sector);
    }

    pub fn clear_yellow_flags(&mut self) {
        self.yellow_flags.clear();
    }

    pub fn set_session_lead(&mut self, identity: &DriverIdentity) {
        self.current_session_lead = SessionLeaderInfo {
            driver: Some(identity.abbreviation.clone()),
            driver_number: Some(identity.driver_number.clone()),
            team: Some(identity.team.clone()),
        };
    }

    pub fn set_fastest_lap(&mut self, time: Duration, identity: &DriverIdentity) {
        self.fastest_lap_info = FastestLapInfo {
            time,
            driver: Some(identity.abbreviation.clone()),
            team: Some(identity.team.clone()),
        };
    }

    /// Start the post-chequered cooldown.
    pub fn begin_cooldown(&mut self, now: Instant) {
        self.cooldown_active = true;
        self.session_end_time = Some(now);
    }

    /// Whether the cooldown after a chequered flag has run long enough to move
    /// to the next qualifying segment.
    pub fn segment_transition_due(&self, now: Instant, cooldown: Duration) -> bool {
        if self.session_type != SessionType::Qualifying
            || !self.cooldown_active
            || self.quali_session == QualiSegment::Q3
        {
            return false;
        }
        match self.session_end_time {
            Some(ended) => now.saturating_duration_since(ended) > cooldown,
            None => false,
        }
    }

    /// Move to the next qualifying segment and reset lap tracking.
    pub fn reset_for_next_quali_segment(&mut self) {
        let Some(next) = self.quali_session.next() else {
            return;
        };
        info!("Qualifying segment {} -> {}", self.quali_session, next);

        self.quali_session = next;
        self.fastest_lap_info =
            FastestLapInfo { time: SEGMENT_FASTEST_LAP, driver: None, team: None };
        self.cooldown_active = false;
        self.session_end_time = None;
    }

    /// Record the first detected session start and open the calibration window.
    ///
    /// A window too large to represent as an `Instant` never closes.
    pub fn record_session_start(&mut self, now: Instant, window: Duration) {
        self.true_session_start_time = Some(now);
        self.calibration_window_end_time = now.checked_add(window);
    }

    /// Time since the detected session start, if a calibration is still allowed.
    pub fn calibration_offset(&self, now: Instant) -> Option<Duration> {
        let started = self.true_session_start_time?;
        match self.calibration_window_end_time {
            Some(window_end) if now >= window_end => None,
            _ => Some(now.saturating_duration_since(started)),
        }
    }
}
