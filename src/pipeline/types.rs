//! Core types for the pipeline system

use bytes::Bytes;
use tokio::time::Instant;

/// One still image, as raw JPEG bytes.
///
/// Frames are immutable once produced. Cloning only bumps a reference count,
/// so the session buffer and the encode manifest can point at the same
/// payload without copying it.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    data: Bytes,
}

impl Frame {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Get the size of the frame data in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Vec<u8>> for Frame {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame").field("size", &self.len()).finish()
    }
}

/// A single emission of the frame source.
///
/// The image travels in its encoded form (a JPEG data URI); decoding is left
/// to whoever decides to keep it.
#[derive(Clone)]
pub struct Snapshot {
    /// Tick counter of the source, starting at 0
    pub seq: u64,
    /// When the surface was rendered
    pub captured_at: Instant,
    /// `data:image/jpeg;base64,...`
    pub data_uri: String,
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("seq", &self.seq)
            .field("captured_at", &self.captured_at)
            .field("uri_len", &self.data_uri.len())
            .finish()
    }
}
