//! Tail of the live-timing cache file.
//!
//! The live-timing client appends one event per line. [`FeedTail`] follows the
//! file like `tail -f`: it starts at the end unless asked to replay, and hands
//! out only complete lines, buffering a partially written one until its newline
//! arrives.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tracing::{debug, info};

use crate::{DrsError, Result};

/// Default wait for a new line before the ingest loop moves on.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Follows an append-only feed file.
#[derive(Debug)]
pub struct FeedTail {
    path: PathBuf,
    reader: BufReader<File>,
    partial: Vec<u8>,
    poll_interval: Duration,
    lines_read: u64,
}

impl FeedTail {
    /// Open the feed. A missing or unreadable file is [`DrsError::FeedUnavailable`].
    pub async fn open<P: AsRef<Path>>(
        path: P,
        from_start: bool,
        poll_interval: Duration,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let unavailable = |e| DrsError::feed_unavailable(&path, e);
        let mut file = File::open(&path).await.map_err(unavailable)?;

        if !from_start {
            let offset = file.seek(SeekFrom::End(0)).await.map_err(unavailable)?;
            debug!(offset, "Skipping existing feed content");
        }
        info!(from_start, "Tailing feed {}", path.display());

        Ok(Self {
            path,
            reader: BufReader::new(file),
            partial: Vec::new(),
            poll_interval,
            lines_read: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    /// Next complete line without its terminator, or `None` if no complete
    /// line arrived within one poll interval.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        let mut waited = false;
        loop {
            let read = self
                .reader
                .read_until(b'\n', &mut self.partial)
                .await
                .map_err(|e| DrsError::feed_unavailable(&self.path, e))?;

            if read > 0 && self.partial.ends_with(b"\n") {
                let bytes = std::mem::take(&mut self.partial);
                let line = String::from_utf8_lossy(&bytes);
                let line = line.trim_end_matches(['\n', '\r']).to_string();
                self.lines_read += 1;
                return Ok(Some(line));
            }
            if waited {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval).await;
            waited = true;
        }
    }
}
