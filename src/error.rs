//! Error types for the race-state relay.
//!
//! Every error implements `std::error::Error` and carries enough context to
//! decide whether the surrounding loop should skip, retry, or stop.
//!
//! ## Error Categories
//!
//! - **Event Errors**: a feed line that does not decode (`MalformedEvent`)
//! - **Lookup Errors**: driver or team missing from the reference data
//! - **Bus Errors**: the message bus is unreachable (`ConnectionLoss`)
//! - **Feed Errors**: the feed file is missing or unreadable (`FeedUnavailable`)
//! - **Configuration Errors**: invalid config, reference data or session type
//! - **Control Errors**: unrecognised commands on the control channel
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use drs::DrsError;
//!
//! let error = DrsError::connection_lost("broker refused connection");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T, E = DrsError> = std::result::Result<T, E>;

/// Main error type for relay operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DrsError {
    #[error("Malformed event at offset {position}: {details}")]
    MalformedEvent { position: usize, details: String },

    #[error("Unknown driver number '{driver_number}'")]
    UnknownDriver { driver_number: String },

    #[error("Message bus unreachable: {reason}")]
    ConnectionLoss {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Feed unavailable: {path}")]
    FeedUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error in {context}: {details}")]
    Config { context: String, details: String },

    #[error("Invalid control command '{command}'")]
    InvalidCommand { command: String },

    #[error("Failed to encode payload")]
    Encode(#[from] serde_json::Error),

    #[error("Publish scheduler has shut down")]
    SchedulerClosed,
}

impl DrsError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            DrsError::ConnectionLoss { .. } => true,
            DrsError::MalformedEvent { .. } => false,
            DrsError::UnknownDriver { .. } => false,
            DrsError::FeedUnavailable { .. } => false,
            DrsError::Config { .. } => false,
            DrsError::InvalidCommand { .. } => false,
            DrsError::Encode(_) => false,
            DrsError::SchedulerClosed => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            DrsError::MalformedEvent { .. } => vec![
                "Check that the live-timing client writes one event per line",
                "Verify the feed file is not being written by two clients",
            ],
            DrsError::UnknownDriver { .. } => vec![
                "Update the reference data file with the current entry list",
                "Check the driver number in the feed line",
            ],
            DrsError::ConnectionLoss { .. } => vec![
                "Check the broker is running and reachable",
                "Verify broker credentials",
                "Pending messages are kept and flushed after reconnect",
            ],
            DrsError::FeedUnavailable { .. } => vec![
                "Start the live-timing client before the relay",
                "Check the feed path in the configuration",
                "Check file permissions",
            ],
            DrsError::Config { .. } => vec![
                "Check the configuration file syntax",
                "Check the reference data file exists and is valid",
                "Run with --help to list valid session types",
            ],
            DrsError::InvalidCommand { .. } => vec![
                "Send CALIBRATE_START or ADJUST:<seconds>",
                "Check the control client for encoding issues",
            ],
            DrsError::Encode(_) => vec!["Check payload fields for values JSON cannot represent"],
            DrsError::SchedulerClosed => {
                vec!["Restart the service", "Check the logs for an earlier publisher failure"]
            }
        }
    }

    /// Helper constructor for malformed feed lines.
    pub fn malformed(position: usize, details: impl Into<String>) -> Self {
        DrsError::MalformedEvent { position, details: details.into() }
    }

    /// Helper constructor for bus connection failures.
    pub fn connection_lost(reason: impl Into<String>) -> Self {
        DrsError::ConnectionLoss { reason: reason.into(), source: None }
    }

    /// Helper constructor for bus connection failures with source.
    pub fn connection_lost_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        DrsError::ConnectionLoss { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for feed errors with path context.
    pub fn feed_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DrsError::FeedUnavailable { path: path.into(), source }
    }

    /// Helper constructor for configuration errors.
    pub fn config(context: impl Into<String>, details: impl Into<String>) -> Self {
        DrsError::Config { context: context.into(), details: details.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
          #[test]
          fn error_messages_carry_their_context(
            reason in ".*",
            details in ".*",
            position in 0usize..4096usize,
            driver_number in "[0-9]{1,2}",
          ) {
            let connection = DrsError::connection_lost(reason.clone());
            let malformed = DrsError::malformed(position, details.clone());
            let unknown = DrsError::UnknownDriver { driver_number: driver_number.clone() };

            prop_assert!(connection.to_string().contains(&reason));
            prop_assert!(malformed.to_string().contains(&details));
            prop_assert!(malformed.to_string().contains(&position.to_string()));
            prop_assert!(unknown.to_string().contains(&driver_number));
          }
        }
    }

    #[test]
    fn only_connection_loss_is_retryable() {
        assert!(DrsError::connection_lost("down").is_retryable());
        assert!(!DrsError::malformed(0, "x").is_retryable());
        assert!(!DrsError::SchedulerClosed.is_retryable());
        assert!(
            !DrsError::feed_unavailable(
                "livetiming_cache.txt",
                std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            )
            .is_retryable()
        );
    }

    #[test]
    fn every_variant_has_suggestions() {
        let errors = vec![
            DrsError::malformed(3, "unexpected ']'"),
            DrsError::UnknownDriver { driver_number: "99".to_string() },
            DrsError::connection_lost("down"),
            DrsError::feed_unavailable("feed.txt", std::io::Error::other("gone")),
            DrsError::config("session type", "unknown alias"),
            DrsError::InvalidCommand { command: "NOPE".to_string() },
            DrsError::SchedulerClosed,
        ];

        for error in errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty(), "no suggestions for {error}");
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn source_chain_is_preserved() {
        let inner = std::io::Error::other("socket closed");
        let error = DrsError::connection_lost_with_source("publish failed", Box::new(inner));

        let source = std::error::Error::source(&error).expect("source should be kept");
        assert_eq!(source.to_string(), "socket closed");
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<DrsError>();
    }
}
