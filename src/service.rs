//! The relay service: feed in, delayed bus messages out.
//!
//! One ingest task owns the [`SessionProcessor`]. Each iteration it waits up to
//! one poll interval for a feed line, applies it, drains the control queue and
//! runs the qualifying tick. Publishing happens on the scheduler task.

use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bus::Bus;
use crate::config::ServiceConfig;
use crate::control::{ControlCommand, ControlReceiver};
use crate::feed::FeedTail;
use crate::processors::SessionProcessor;
use crate::reference::ReferenceData;
use crate::scheduler::{PublisherHandle, Scheduler};
use crate::topics::{ForcedLeaderPayload, Topic, encode};
use crate::types::SessionType;
use crate::{DrsError, Result};

/// A configured relay, ready to run.
pub struct Service<B> {
    config: ServiceConfig,
    session_type: SessionType,
    reference: Arc<ReferenceData>,
    bus: B,
    force_lead: Option<String>,
}

impl<B: Bus> Service<B> {
    pub fn new(
        config: ServiceConfig,
        session_type: SessionType,
        reference: Arc<ReferenceData>,
        bus: B,
    ) -> Self {
        Self { config, session_type, reference, bus, force_lead: None }
    }

    /// Publish `{"driver":"FORCE","team":<team>}` as soon as the service starts.
    pub fn with_force_lead(mut self, team: impl Into<String>) -> Self {
        self.force_lead = Some(team.into());
        self
    }

    /// Run until `cancel` fires or the feed becomes unavailable.
    ///
    /// The scheduler publishes `OFF` on the way out in both cases. Returns
    /// [`DrsError::FeedUnavailable`] if the feed cannot be opened or read, and
    /// [`DrsError::SchedulerClosed`] if the scheduler stopped underneath us.
    pub async fn run(self, mut control: ControlReceiver, cancel: CancellationToken) -> Result<()> {
        let Service { config, session_type, reference, bus, force_lead } = self;
        info!(%session_type, delay_secs = config.publish_delay_secs, "Starting relay");

        let scheduler_cancel = cancel.child_token();
        let (mut publisher, scheduler_task) = Scheduler::spawn(
            bus,
            config.publish_delay_secs,
            config.scan_interval(),
            scheduler_cancel.clone(),
        );

        let result = async {
            if let Some(team) = force_lead {
                info!(%team, "Forcing leader");
                let payload = encode(&ForcedLeaderPayload::new(team))?;
                publisher.enqueue_immediate(Topic::Leader, payload)?;
            }

            let mut feed =
                FeedTail::open(&config.feed_path, config.from_start, config.poll_interval())
                    .await?;
            let mut processor = SessionProcessor::new(session_type, reference, config.timings());
            ingest(&mut feed, &mut processor, &mut control, &mut publisher, &cancel).await
        }
        .await;

        if let Err(e) = &result {
            error!("Relay stopping: {}", e);
            for suggestion in e.recovery_suggestions() {
                info!("  - {}", suggestion);
            }
        }

        scheduler_cancel.cancel();
        if let Err(e) = scheduler_task.await {
            warn!("Scheduler task ended abnormally: {}", e);
        }
        info!("Relay stopped");
        result
    }
}

async fn ingest(
    feed: &mut FeedTail,
    processor: &mut SessionProcessor,
    control: &mut ControlReceiver,
    publisher: &mut PublisherHandle,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut malformed = 0u64;

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => {
                let lines = feed.lines_read();
                info!(lines, malformed, "Ingest of {} cancelled", feed.path().display());
                return Ok(());
            }
            line = feed.next_line() => line?,
        };

        if let Some(line) = line.filter(|l| !l.trim().is_empty()) {
            match processor.process_line(&line, Instant::now(), publisher) {
                Ok(()) => {}
                Err(DrsError::SchedulerClosed) => return Err(DrsError::SchedulerClosed),
                Err(e @ DrsError::MalformedEvent { .. }) => {
                    malformed += 1;
                    warn!("Skipping feed line: {}", e);
                    debug!(line = %line, "Malformed line");
                }
                Err(e) => warn!("Failed to process feed line: {}", e),
            }
        }

        let now = Instant::now();
        for command in control.drain() {
            apply_control(command, processor, publisher, now)?;
        }
        processor.tick(now);
    }
}

fn apply_control(
    command: ControlCommand,
    processor: &SessionProcessor,
    publisher: &PublisherHandle,
    now: Instant,
) -> Result<()> {
    info!(%command, "Control command received");
    match command {
        ControlCommand::CalibrateStart => match processor.calibrate(now) {
            Some(offset) => {
                let seconds = offset.as_secs_f64();
                info!("Calibrating publish delay to {:.3}s since session start", seconds);
                publisher.set_delay(seconds)
            }
            None => {
                warn!("Ignoring CALIBRATE_START outside the calibration window");
                Ok(())
            }
        },
        ControlCommand::Adjust(delta) => publisher.adjust_delay(delta),
    }
}
