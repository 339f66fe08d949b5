//! Ingestion drivers: read feed lines, run them through the line processor
//! and publish the resulting snapshots.
//!
//! Two sources: a live TCP feed (ADSBSpy on port 47806 by default) and a
//! timed replay of a capture file. Both run on one task, which is the only
//! owner of the plane registry.

use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

use modes_core::{LineProcessor, PlaneSnapshot, ProcessorStats};

use crate::error::{Result, ViewerError};
use crate::mux::Publisher;

/// Minimum spacing between two stale sweeps, in seconds.
const SWEEP_INTERVAL_SECS: f64 = 10.0;

/// Wall-clock time in seconds.
fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Line processor plus the ingress it publishes to.
pub struct Ingest {
    processor: LineProcessor,
    publisher: Publisher<Arc<PlaneSnapshot>>,
    stale_after: Option<f64>,
    last_sweep: Option<f64>,
}

impl Ingest {
    pub fn new(processor: LineProcessor, publisher: Publisher<Arc<PlaneSnapshot>>) -> Self {
        Ingest {
            processor,
            publisher,
            stale_after: None,
            last_sweep: None,
        }
    }

    /// Evict planes not seen for `secs` seconds. Disabled by default.
    pub fn with_stale_after(mut self, secs: Option<f64>) -> Self {
        self.stale_after = secs;
        self
    }

    pub fn stats(&self) -> ProcessorStats {
        self.processor.stats()
    }

    pub async fn handle_line(&mut self, line: &str) -> Result<()> {
        self.handle_line_at(line, now_secs()).await
    }

    /// Process `line` as captured at `now`. Bad lines are logged and skipped;
    /// only a closed multiplexer is an error.
    async fn handle_line_at(&mut self, line: &str, now: f64) -> Result<()> {
        match self.processor.process_line(line, now) {
            Ok(Some(snapshot)) => self.publisher.publish(Arc::new(snapshot)).await?,
            Ok(None) => {}
            Err(e) => tracing::debug!(error = %e, "line discarded"),
        }
        self.sweep(now);
        Ok(())
    }

    fn sweep(&mut self, now: f64) {
        let Some(max_age) = self.stale_after else {
            return;
        };
        if self
            .last_sweep
            .is_some_and(|last| now - last < SWEEP_INTERVAL_SECS)
        {
            return;
        }
        self.last_sweep = Some(now);
        self.processor.registry_mut().prune_stale(now, max_age);
    }
}

/// Follow a live TCP feed. Only returns on failure: a closed connection is
/// an error like any other.
pub async fn run_feed(mut ingest: Ingest, host: &str, port: u16) -> Result<ProcessorStats> {
    let stream = TcpStream::connect((host, port)).await?;
    tracing::info!(host, port, "connected to feed");

    let mut reader = BufReader::new(stream);
    let mut raw = Vec::new();
    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw).await? == 0 {
            break;
        }
        let line = raw.strip_suffix(b"\n").unwrap_or(&raw[..]);
        ingest.handle_line(&decode_line(line)).await?;
    }

    let stats = ingest.stats();
    tracing::error!(host, port, lines = stats.lines, "feed closed");
    Err(ViewerError::FeedClosed(format!("{host}:{port}")))
}

/// Replay a capture file, one line per `interval`, stopping after the last
/// line.
pub async fn run_replay(
    mut ingest: Ingest,
    path: &Path,
    interval: Duration,
) -> Result<ProcessorStats> {
    let bytes = tokio::fs::read(path).await?;
    let lines = capture_lines(&bytes);
    tracing::info!(path = %path.display(), lines = lines.len(), "replaying capture");

    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    for line in lines {
        ticker.tick().await;
        ingest.handle_line(&line).await?;
    }

    let stats = ingest.stats();
    tracing::info!(
        lines = stats.lines,
        frames = stats.frames,
        updates = stats.updates,
        rejected = stats.rejected,
        "replay finished"
    );
    Ok(stats)
}

/// One feed line without its terminator. Invalid UTF-8 is replaced, which
/// leaves the line to be rejected by the processor.
fn decode_line(raw: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(raw.strip_suffix(b"\r").unwrap_or(raw))
}

/// Split a capture file into lines the way `str::lines` would.
pub fn capture_lines(bytes: &[u8]) -> Vec<Cow<'_, str>> {
    if bytes.is_empty() {
        return Vec::new();
    }
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    bytes.split(|&b| b == b'\n').map(decode_line).collect()
}
