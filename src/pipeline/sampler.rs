//! Rate-limited sampling of the snapshot stream
//!
//! Keeping every refresh tick would flood the encoder, so while recording the
//! sampler keeps at most one snapshot per floor interval (5 fps for the
//! default 200ms floor), whatever the refresh rate of the source is.

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, warn};
use std::time::Duration;
use tokio::time::Instant;

use crate::assets::{JPEG_DATA_URI_PREFIX, SAMPLE_FLOOR};
use crate::pipeline::health::PipelineHealth;
use crate::pipeline::session::RecordingSession;
use crate::pipeline::types::{Frame, Snapshot};

/// Result of offering one snapshot to the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    /// Not recording, snapshot ignored
    Idle,
    /// Too close to the previous sample
    Throttled,
    /// Decoded and appended to the session
    Accepted { bytes: usize },
    /// Payload could not be decoded
    Rejected,
}

#[derive(Debug, Clone, Copy)]
pub struct Sampler {
    floor: Duration,
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new(SAMPLE_FLOOR)
    }
}

impl Sampler {
    pub fn new(floor: Duration) -> Self {
        Self { floor }
    }

    pub fn floor(&self) -> Duration {
        self.floor
    }

    /// Whether a snapshot taken at `now` may be kept.
    ///
    /// The very first sample is always taken. After that the elapsed time
    /// must be strictly greater than the floor.
    pub fn should_accept(&self, session: &RecordingSession, now: Instant) -> bool {
        if !session.is_recording() {
            return false;
        }
        match session.last_sample_time() {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.floor,
        }
    }

    /// Filter one snapshot into the session.
    ///
    /// Idle and throttled snapshots are dropped before any decoding happens.
    pub fn offer(
        &self,
        session: &mut RecordingSession,
        snapshot: &Snapshot,
        health: &PipelineHealth,
    ) -> SampleOutcome {
        if !session.is_recording() {
            return SampleOutcome::Idle;
        }
        if !self.should_accept(session, snapshot.captured_at) {
            return SampleOutcome::Throttled;
        }

        match decode_data_uri(&snapshot.data_uri) {
            Ok(frame) => {
                let bytes = frame.len();
                debug!("Sampler: add frame #{} ({} bytes)", snapshot.seq, bytes);
                session.push_sample(frame, snapshot.captured_at);
                health.record_sample(bytes);
                SampleOutcome::Accepted { bytes }
            }
            Err(e) => {
                warn!("Sampler: dropping snapshot #{}: {:#}", snapshot.seq, e);
                health.record_decode_failure();
                SampleOutcome::Rejected
            }
        }
    }
}

/// Turn a `data:image/jpeg;base64,...` URI back into raw JPEG bytes.
pub fn decode_data_uri(uri: &str) -> Result<Frame> {
    let payload = uri
        .strip_prefix(JPEG_DATA_URI_PREFIX)
        .ok_or_else(|| anyhow!("not a JPEG data URI"))?;
    let bytes = STANDARD
        .decode(payload)
        .context("invalid base64 payload")?;
    Ok(Frame::from(bytes))
}
