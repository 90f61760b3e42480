//! Core value types for the session interpretation.
//!
//! These are the small, copyable vocabulary types shared by the state record,
//! the event processors and the configuration:
//! - [`SessionType`] selects the leader-derivation strategy and accepts the
//!   usual command-line aliases (`fp`, `sq`, `sprint race`, ...)
//! - [`RaceState`] is the track-wide flag state machine's state
//! - [`QualiSegment`] tracks Q1/Q2/Q3 progression
//! - [`Sector`] keys local yellow flags
//! - [`parse_lap_time`] turns `M:SS.fff` timing strings into durations
//!
//! ## Usage Example
//!
//! ```rust
//! use drs::types::{parse_lap_time, QualiSegment, SessionType};
//! use std::time::Duration;
//!
//! let session: SessionType = "sq".parse().unwrap();
//! assert_eq!(session, SessionType::Qualifying);
//! assert_eq!(QualiSegment::Q1.next(), Some(QualiSegment::Q2));
//! assert_eq!(parse_lap_time("1:28.552"), Some(Duration::from_millis(88_552)));
//! ```

mod lap_time;
mod race_state;
mod sector;
mod session_type;

pub use lap_time::parse_lap_time;
pub use race_state::{QualiSegment, RaceState};
pub use sector::Sector;
pub use session_type::SessionType;
