//! Delayed race-state relay for F1 live timing.
//!
//! DRS reads the live-timing feed, works out who leads the session and what
//! flag is out, and republishes that state on a message bus with a delay that
//! keeps it in sync with a broadcast running behind live.
//!
//! # Features
//!
//! - **Leader tracking**: fastest lap in practice and qualifying, P1 in races
//! - **Flag state machine**: yellow sectors, safety car, red flag and restart
//! - **Qualifying segments**: Q1 to Q3 with a cooldown after each chequered flag
//! - **Delayed publishing**: per-topic ordered, survives bus outages, delay can
//!   be calibrated or nudged at runtime
//!
//! # Architecture
//!
//! ```text
//! FeedTail ──line──► SessionProcessor ──Outbox──► PublisherHandle ──► Scheduler ──► Bus
//!                          ▲
//!     ControlSender ──► ControlReceiver (drained once per line)
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use drs::{LogBus, ReferenceData, Service, ServiceConfig, SessionType, control_channel};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> drs::Result<()> {
//!     let config = ServiceConfig::default();
//!     let reference = Arc::new(ReferenceData::load(&config.reference_path)?);
//!     let (control_tx, control_rx) = control_channel(config.control_capacity);
//!
//!     control_tx.submit("ADJUST:-1.5");
//!     Service::new(config, SessionType::Race, reference, LogBus)
//!         .run(control_rx, CancellationToken::new())
//!         .await
//! }
//! ```

mod error;
pub mod types;

pub mod event;
pub mod reference;
pub mod state;
pub mod topics;

pub mod processors;

pub mod bus;
pub mod control;
pub mod scheduler;

pub mod config;
pub mod feed;
pub mod service;

pub use error::*;
pub use types::*;

pub use bus::{Bus, LogBus, MemoryBus, Publication};
pub use config::ServiceConfig;
pub use control::{ControlCommand, ControlReceiver, ControlSender, control_channel};
pub use event::{RawEvent, parse_line};
pub use feed::FeedTail;
pub use processors::{LeaderStrategy, SessionProcessor, SessionTimings};
pub use reference::{DriverIdentity, ReferenceData};
pub use scheduler::{PublisherHandle, Scheduler};
pub use service::Service;
pub use state::SessionState;
pub use topics::{OutboundMessage, Outbox, Topic};
