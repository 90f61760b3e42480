//! Control channel: commands arriving on [`Topic::Control`](crate::topics::Topic::Control).
//!
//! Commands are produced by whatever receives bus messages and consumed by the
//! ingest loop once per iteration. The sender never blocks: a full queue drops
//! the command with a warning rather than stalling the bus client.

use std::fmt;
use std::str::FromStr;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tracing::{debug, warn};

use crate::scheduler::MAX_PUBLISH_DELAY_SECS;
use crate::{DrsError, Result};

/// Default number of commands buffered between the bus client and the loop.
pub const DEFAULT_CONTROL_CAPACITY: usize = 16;

/// A command accepted on the control topic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCommand {
    /// Set the publish delay to the time elapsed since the detected start.
    CalibrateStart,
    /// Shift the publish delay by the given number of seconds.
    Adjust(f64),
}

impl FromStr for ControlCommand {
    type Err = DrsError;

    fn from_str(s: &str) -> Result<Self> {
        let command = s.trim();
        let invalid = || DrsError::InvalidCommand { command: command.to_string() };

        if command == "CALIBRATE_START" {
            return Ok(ControlCommand::CalibrateStart);
        }
        let delta = command.strip_prefix("ADJUST:").ok_or_else(invalid)?;
        let delta: f64 = delta.trim().parse().map_err(|_| invalid())?;
        if !delta.is_finite() || delta.abs() > MAX_PUBLISH_DELAY_SECS {
            return Err(invalid());
        }
        Ok(ControlCommand::Adjust(delta))
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlCommand::CalibrateStart => f.write_str("CALIBRATE_START"),
            ControlCommand::Adjust(delta) => write!(f, "ADJUST:{}", delta),
        }
    }
}

/// Create a bounded control channel.
pub fn control_channel(capacity: usize) -> (ControlSender, ControlReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ControlSender { tx }, ControlReceiver { rx })
}

/// Producer half, held by the bus client.
#[derive(Debug, Clone)]
pub struct ControlSender {
    tx: mpsc::Sender<ControlCommand>,
}

impl ControlSender {
    /// Parse and queue a raw control payload. Invalid payloads are logged and
    /// dropped; returns whether a command was queued.
    pub fn submit(&self, raw: &str) -> bool {
        match raw.parse::<ControlCommand>() {
            Ok(command) => self.send(command),
            Err(e) => {
                warn!("Ignoring control message: {}", e);
                false
            }
        }
    }

    /// Queue a command without blocking.
    pub fn send(&self, command: ControlCommand) -> bool {
        match self.tx.try_send(command) {
            Ok(()) => {
                debug!(%command, "Queued control command");
                true
            }
            Err(TrySendError::Full(command)) => {
                warn!(%command, "Control queue full, dropping command");
                false
            }
            Err(TrySendError::Closed(command)) => {
                debug!(%command, "Control queue closed, dropping command");
                false
            }
        }
    }
}

/// Consumer half, drained by the ingest loop.
#[derive(Debug)]
pub struct ControlReceiver {
    rx: mpsc::Receiver<ControlCommand>,
}

impl ControlReceiver {
    /// Next queued command, without waiting.
    pub fn try_next(&mut self) -> Option<ControlCommand> {
        match self.rx.try_recv() {
            Ok(command) => Some(command),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Every command queued so far, in arrival order.
    pub fn drain(&mut self) -> Vec<ControlCommand> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}
