//! Traits for capture devices

use async_trait::async_trait;
use image::RgbImage;
use thiserror::Error;

/// Playback could not start without a user gesture.
#[derive(Debug, Clone, Error)]
#[error("playback blocked: {reason}")]
pub struct PlaybackBlocked {
    pub reason: String,
}

/// A source of live capture streams (camera, virtual device, ...)
#[async_trait]
pub trait CaptureDevice: Send {
    /// Human readable name, for logging
    fn name(&self) -> &str;

    /// Acquire a stream, ideally at `width` x `height`.
    ///
    /// Failure here (device missing, permission denied, constraints that
    /// cannot be met) is fatal for the whole session.
    async fn open(&mut self, width: u32, height: u32) -> Result<Box<dyn CaptureStream>, anyhow::Error>;
}

/// A live stream attached to a playback surface.
pub trait CaptureStream: Send {
    /// Start playback. Hosts may refuse until the user interacts.
    fn play(&mut self) -> Result<(), PlaybackBlocked>;

    fn is_playing(&self) -> bool;

    /// Negotiated frame size, `(0, 0)` until the stream knows it
    fn dimensions(&self) -> (u32, u32);

    /// Draw the current frame onto `surface`, overwriting its content.
    fn render_into(&mut self, surface: &mut RgbImage);
}
