//! Recording session state
//!
//! A single session slot lives for the whole process. Starting a recording
//! clears the buffered frames; stopping keeps them around so they can be
//! handed to the encoder.

use tokio::time::Instant;

use super::types::Frame;

/// Ordered, append-only frame storage for one recording session.
#[derive(Debug, Default, Clone)]
pub struct SessionBuffer {
    frames: Vec<Frame>,
}

impl SessionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every buffered frame
    pub fn reset(&mut self) {
        self.frames.clear();
    }

    pub fn append(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Frames in insertion order
    pub fn snapshot(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.frames.iter().map(Frame::len).sum()
    }
}

/// What a toggle did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Started,
    Stopped,
    Unchanged,
}

#[derive(Debug, Default)]
pub struct RecordingSession {
    is_recording: bool,
    last_sample_time: Option<Instant>,
    frames: SessionBuffer,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    /// Time of the last accepted sample, across sessions.
    pub fn last_sample_time(&self) -> Option<Instant> {
        self.last_sample_time
    }

    pub fn frames(&self) -> &SessionBuffer {
        &self.frames
    }

    /// Inactive -> active. Clears the buffer; the sampling clock is kept.
    pub fn start(mut self) -> Self {
        if !self.is_recording {
            self.frames.reset();
            self.is_recording = true;
        }
        self
    }

    /// Active -> inactive. Buffered frames stay available for handoff.
    pub fn stop(mut self) -> Self {
        self.is_recording = false;
        self
    }

    /// Apply the state reported by the control surface.
    pub fn apply(self, recording: bool) -> (Self, Toggle) {
        match (self.is_recording, recording) {
            (false, true) => (self.start(), Toggle::Started),
            (true, false) => (self.stop(), Toggle::Stopped),
            _ => (self, Toggle::Unchanged),
        }
    }

    pub(crate) fn push_sample(&mut self, frame: Frame, at: Instant) {
        self.last_sample_time = Some(at);
        self.frames.append(frame);
    }
}
