//! Bus topics, outbound payloads and the [`Outbox`] seam.
//!
//! Processors never talk to the bus. They hand `(topic, payload)` pairs to an
//! [`Outbox`]; in production that is the scheduler's
//! [`PublisherHandle`](crate::scheduler::PublisherHandle), in tests a plain `Vec`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::reference::DriverIdentity;
use crate::Result;

/// Topics the relay publishes to or listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Leader,
    FlagStatus,
    RunningStatus,
    PublishingDelay,
    Control,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Leader => "f1/race/leader",
            Topic::FlagStatus => "f1/race/flag_status",
            Topic::RunningStatus => "f1/service/running_status",
            Topic::PublishingDelay => "f1/service/publishing_delay",
            Topic::Control => "f1/service/control",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running status values for [`Topic::RunningStatus`].
pub const STATUS_ON: &str = "ON";
pub const STATUS_OFF: &str = "OFF";

/// Payload of [`Topic::Leader`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderPayload {
    pub driver: String,
    pub driver_number: String,
    pub team: String,
    pub team_color: String,
}

impl From<&DriverIdentity> for LeaderPayload {
    fn from(identity: &DriverIdentity) -> Self {
        Self {
            driver: identity.abbreviation.clone(),
            driver_number: identity.driver_number.clone(),
            team: identity.team.clone(),
            team_color: identity.team_color.clone(),
        }
    }
}

/// Leader payload forced from the command line, before any feed data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForcedLeaderPayload {
    pub driver: String,
    pub team: String,
}

impl ForcedLeaderPayload {
    pub fn new(team: impl Into<String>) -> Self {
        Self { driver: "FORCE".to_string(), team: team.into() }
    }
}

/// Payload of [`Topic::FlagStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagPayload {
    pub flag: String,
    pub message: String,
}

impl FlagPayload {
    pub fn new(flag: impl Into<String>, message: impl Into<String>) -> Self {
        Self { flag: flag.into(), message: message.into() }
    }
}

/// Encode a payload as a JSON string.
pub fn encode<T: Serialize>(payload: &T) -> Result<String> {
    Ok(serde_json::to_string(payload)?)
}

/// Message handed from a processor to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: Topic,
    pub payload: String,
}

/// Destination for outbound messages.
pub trait Outbox {
    /// Queue a message for delayed publication.
    fn enqueue(&mut self, topic: Topic, payload: String) -> Result<()>;
}

impl Outbox for Vec<OutboundMessage> {
    fn enqueue(&mut self, topic: Topic, payload: String) -> Result<()> {
        self.push(OutboundMessage { topic, payload });
        Ok(())
    }
}
