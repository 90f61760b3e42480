//! Delayed publish scheduler.
//!
//! Processors enqueue messages as soon as the feed reports them; the scheduler
//! holds each one until `enqueue time + delay` so that publication lines up with
//! a broadcast running that far behind live. The scheduler task owns the
//! pending set and the bus. Everything else talks to it through a
//! [`PublisherHandle`].
//!
//! ```text
//! ingest loop ──PublisherHandle──► channel ──► Scheduler task ──► Bus
//!                                             (scan every 100 ms)
//! ```

use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::bus::Bus;
use crate::topics::{Outbox, STATUS_OFF, STATUS_ON, Topic};
use crate::{DrsError, Result};

/// Default interval between scans of the pending set.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound for the publish delay, in seconds.
pub const MAX_PUBLISH_DELAY_SECS: f64 = 86_400.0;

/// A message waiting for its release time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub seq: u64,
    pub topic: Topic,
    pub payload: String,
    pub release_at: Instant,
}

/// Pending messages in enqueue order.
#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: Vec<PendingMessage>,
    next_seq: u64,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, topic: Topic, payload: String, release_at: Instant) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(PendingMessage { seq, topic, payload, release_at });
        seq
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Messages that may be published at `now`, in publish order.
    ///
    /// A message is held back while an earlier message on the same topic is
    /// still pending, even if its own release time has passed.
    pub fn due(&self, now: Instant) -> Vec<PendingMessage> {
        let mut blocked = HashSet::new();
        let mut due = Vec::new();
        for entry in &self.entries {
            if blocked.contains(&entry.topic) {
                continue;
            }
            if entry.release_at <= now {
                due.push(entry.clone());
            } else {
                blocked.insert(entry.topic);
            }
        }
        due
    }

    /// Remove a message once it has been published.
    pub fn remove(&mut self, seq: u64) -> Option<PendingMessage> {
        let index = self.entries.iter().position(|e| e.seq == seq)?;
        Some(self.entries.remove(index))
    }
}

#[derive(Debug)]
enum Command {
    Enqueue { topic: Topic, payload: String, immediate: bool, at: Instant },
    SetDelay(f64),
    AdjustDelay(f64),
}

/// Handle used to feed the scheduler. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PublisherHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl PublisherHandle {
    /// Queue a message for release after the current publish delay.
    pub fn enqueue(&self, topic: Topic, payload: impl Into<String>) -> Result<()> {
        self.send(Command::Enqueue {
            topic,
            payload: payload.into(),
            immediate: false,
            at: Instant::now(),
        })
    }

    /// Queue a message for release on the next scan.
    pub fn enqueue_immediate(&self, topic: Topic, payload: impl Into<String>) -> Result<()> {
        self.send(Command::Enqueue {
            topic,
            payload: payload.into(),
            immediate: true,
            at: Instant::now(),
        })
    }

    /// Replace the publish delay. Values clamp to `0..=MAX_PUBLISH_DELAY_SECS`.
    /// Messages already queued keep their release time.
    pub fn set_delay(&self, seconds: f64) -> Result<()> {
        self.send(Command::SetDelay(seconds))
    }

    /// Shift the publish delay by `delta` seconds, with the same clamping as
    /// [`PublisherHandle::set_delay`].
    pub fn adjust_delay(&self, delta: f64) -> Result<()> {
        self.send(Command::AdjustDelay(delta))
    }

    fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).map_err(|_| DrsError::SchedulerClosed)
    }
}

impl Outbox for PublisherHandle {
    fn enqueue(&mut self, topic: Topic, payload: String) -> Result<()> {
        PublisherHandle::enqueue(self, topic, payload)
    }
}

/// Scheduler task state.
pub struct Scheduler<B> {
    bus: B,
    pending: PendingQueue,
    delay: f64,
    published: u64,
}

impl<B: Bus> Scheduler<B> {
    /// Spawn the scheduler task.
    ///
    /// The task announces `ON` and the initial delay, then releases due
    /// messages every `scan_interval` until `cancel` fires or every handle is
    /// dropped. On exit it publishes `OFF` and drops whatever is still pending.
    pub fn spawn(
        bus: B,
        delay: f64,
        scan_interval: Duration,
        cancel: CancellationToken,
    ) -> (PublisherHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler {
            bus,
            pending: PendingQueue::new(),
            delay: clamp_delay(delay),
            published: 0,
        };

        let task = tokio::spawn(async move {
            scheduler.run(rx, scan_interval, cancel).await;
        });

        (PublisherHandle { tx }, task)
    }

    async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<Command>,
        scan_interval: Duration,
        cancel: CancellationToken,
    ) {
        info!(delay_secs = self.delay, "Publish scheduler started");
        let now = Instant::now();
        self.pending.push(Topic::RunningStatus, STATUS_ON.to_string(), now);
        self.announce_delay(now);

        let mut ticker = interval(scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Publish scheduler cancelled");
                    break;
                }
                command = rx.recv() => match command {
                    Some(command) => self.apply(command),
                    None => {
                        debug!("All publisher handles dropped");
                        break;
                    }
                },
                _ = ticker.tick() => self.scan(Instant::now()).await,
            }
        }

        if !self.pending.is_empty() {
            warn!(pending = self.pending.len(), "Dropping unpublished messages on shutdown");
        }
        if let Err(e) = self.bus.publish(Topic::RunningStatus.as_str(), STATUS_OFF, true).await {
            warn!("Failed to publish OFF status: {}", e);
        }
        info!("Publish scheduler stopped after {} messages", self.published);
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Enqueue { topic, payload, immediate, at } => {
                let release_at = if immediate { at } else { self.release_time(at) };
                let hold = release_at.saturating_duration_since(at);
                debug!(%topic, immediate, "Holding message for {:?}", hold);
                self.pending.push(topic, payload, release_at);
            }
            Command::SetDelay(seconds) => self.change_delay(seconds),
            Command::AdjustDelay(delta) => self.change_delay(self.delay + delta),
        }
    }

    fn release_time(&self, at: Instant) -> Instant {
        let release_at = Duration::try_from_secs_f64(self.delay)
            .ok()
            .and_then(|delay| at.checked_add(delay));
        match release_at {
            Some(release_at) => release_at,
            None => {
                warn!(delay_secs = self.delay, "Publish delay out of range, releasing now");
                at
            }
        }
    }

    fn change_delay(&mut self, seconds: f64) {
        let delay = clamp_delay(seconds);
        info!("Publish delay {}s -> {}s", self.delay, delay);
        self.delay = delay;
        self.announce_delay(Instant::now());
    }

    fn announce_delay(&mut self, now: Instant) {
        self.pending.push(Topic::PublishingDelay, self.delay.to_string(), now);
    }

    async fn scan(&mut self, now: Instant) {
        for message in self.pending.due(now) {
            match self.bus.publish(message.topic.as_str(), &message.payload, true).await {
                Ok(()) => {
                    trace!(topic = %message.topic, "Published {}", message.payload);
                    self.pending.remove(message.seq);
                    self.published += 1;
                }
                Err(e) if e.is_retryable() => {
                    // Keep everything pending and retry on the next scan
                    warn!(pending = self.pending.len(), "Publish failed: {}", e);
                    return;
                }
                Err(e) => {
                    let topic = message.topic;
                    error!(%topic, "Dropping message that cannot be published: {}", e);
                    self.pending.remove(message.seq);
                }
            }
        }
    }
}

fn clamp_delay(seconds: f64) -> f64 {
    if seconds.is_finite() {
        seconds.clamp(0.0, MAX_PUBLISH_DELAY_SECS)
    } else {
        0.0
    }
}
