use anyhow::{Result, anyhow};
use async_trait::async_trait;
use image::{Rgb, RgbImage};
use log::info;
use std::cell::Cell;

use crate::assets::MAX_CAPTURE_PIXELS;
use crate::capture::{CaptureDevice, CaptureStream, PlaybackBlocked};

/// Synthetic camera rendering a moving gradient.
///
/// Used when no real device is wired in, and by the tests. It can be told to
/// take a few polls before reporting its size, to refuse autoplay once, or to
/// fail acquisition entirely.
#[derive(Debug, Clone, Default)]
pub struct TestPatternDevice {
    warmup_polls: u32,
    autoplay_blocked: bool,
    unavailable: Option<String>,
}

impl TestPatternDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `(0, 0)` for the first `polls` dimension queries.
    pub fn with_warmup(mut self, polls: u32) -> Self {
        self.warmup_polls = polls;
        self
    }

    /// Refuse the first `play()` call.
    pub fn with_autoplay_blocked(mut self) -> Self {
        self.autoplay_blocked = true;
        self
    }

    /// Fail every `open()` with the given reason.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            unavailable: Some(reason.into()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl CaptureDevice for TestPatternDevice {
    fn name(&self) -> &str {
        "test-pattern"
    }

    async fn open(&mut self, width: u32, height: u32) -> Result<Box<dyn CaptureStream>> {
        if let Some(reason) = &self.unavailable {
            return Err(anyhow!("Capture device unavailable: {}", reason));
        }
        if width == 0 || height == 0 || u64::from(width) * u64::from(height) > MAX_CAPTURE_PIXELS {
            return Err(anyhow!("Unsatisfiable constraints: {}x{}", width, height));
        }

        info!("TestPatternDevice: opened {}x{}", width, height);
        Ok(Box::new(TestPatternStream {
            width,
            height,
            warmup_left: Cell::new(self.warmup_polls),
            autoplay_blocked: self.autoplay_blocked,
            playing: false,
            tick: 0,
        }))
    }
}

struct TestPatternStream {
    width: u32,
    height: u32,
    warmup_left: Cell<u32>,
    autoplay_blocked: bool,
    playing: bool,
    tick: u32,
}

impl CaptureStream for TestPatternStream {
    fn play(&mut self) -> Result<(), PlaybackBlocked> {
        if self.autoplay_blocked {
            self.autoplay_blocked = false;
            return Err(PlaybackBlocked {
                reason: "autoplay requires a user gesture".to_string(),
            });
        }
        self.playing = true;
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn dimensions(&self) -> (u32, u32) {
        let left = self.warmup_left.get();
        if left > 0 {
            self.warmup_left.set(left - 1);
            return (0, 0);
        }
        (self.width, self.height)
    }

    fn render_into(&mut self, surface: &mut RgbImage) {
        let t = self.tick;
        for (x, y, pixel) in surface.enumerate_pixels_mut() {
            *pixel = Rgb([
                (x.wrapping_add(t) & 0xFF) as u8,
                (y.wrapping_add(t.wrapping_mul(2)) & 0xFF) as u8,
                (t & 0xFF) as u8,
            ]);
        }
        self.tick = self.tick.wrapping_add(1);
    }
}
