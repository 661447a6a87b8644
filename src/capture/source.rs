//! Frame source
//!
//! Turns a capture stream into a lazy, infinite sequence of JPEG snapshots,
//! one per refresh tick, exposed as a cancellable subscription.

use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::assets::{DIMENSION_POLL, MAX_REFRESH_RATE, SNAPSHOT_CHANNEL_CAPACITY};
use crate::capture::surface::RasterSurface;
use crate::capture::{CaptureDevice, CaptureStream};
use crate::pipeline::health::PipelineHealth;
use crate::pipeline::types::Snapshot;

/// Options of the frame source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceOpts {
    pub width: u32,
    pub height: u32,
    pub refresh_hz: u32,
}

impl SourceOpts {
    fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.refresh_hz.clamp(1, MAX_REFRESH_RATE) as f64)
    }
}

/// Live snapshots, until stopped or dropped.
pub struct FrameSubscription {
    rx: mpsc::Receiver<Snapshot>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    dimensions: (u32, u32),
}

impl FrameSubscription {
    /// Next snapshot. `None` once the source has stopped.
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }

    /// Size of the rendered snapshots
    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for FrameSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub struct FrameSource {
    opts: SourceOpts,
    health: Arc<PipelineHealth>,
}

impl FrameSource {
    pub fn new(opts: SourceOpts, health: Arc<PipelineHealth>) -> Self {
        Self { opts, health }
    }

    /// Acquire a stream from `device` and start emitting snapshots.
    ///
    /// Returns once playback runs and the stream reports a non-zero size.
    /// If the host blocks autoplay, playback is retried on each subsequent
    /// user interaction reported through `interactions`.
    pub async fn start(
        &self,
        device: &mut dyn CaptureDevice,
        mut interactions: watch::Receiver<u64>,
    ) -> Result<FrameSubscription> {
        let mut stream = device
            .open(self.opts.width, self.opts.height)
            .await
            .with_context(|| format!("Failed to acquire capture stream from {}", device.name()))?;

        // only interactions that happen after the refusal count
        interactions.borrow_and_update();
        while let Err(blocked) = stream.play() {
            warn!("FrameSource: {}, waiting for the next user interaction", blocked);
            interactions
                .changed()
                .await
                .map_err(|_| anyhow!("Input closed before playback could start"))?;
        }

        let (width, height) = wait_for_dimensions(stream.as_mut()).await;
        info!(
            "FrameSource: playing {}x{} (requested {}x{}) at {} Hz",
            width, height, self.opts.width, self.opts.height, self.opts.refresh_hz
        );

        let (tx, rx) = mpsc::channel::<Snapshot>(SNAPSHOT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(render_loop(
            stream,
            RasterSurface::new(width, height),
            tx,
            cancel.clone(),
            self.opts.tick_period(),
            self.health.clone(),
        ));

        Ok(FrameSubscription {
            rx,
            cancel,
            task,
            dimensions: (width, height),
        })
    }
}

async fn wait_for_dimensions(stream: &mut dyn CaptureStream) -> (u32, u32) {
    loop {
        let (w, h) = stream.dimensions();
        if w != 0 && h != 0 {
            return (w, h);
        }
        tokio::time::sleep(DIMENSION_POLL).await;
    }
}

async fn render_loop(
    mut stream: Box<dyn CaptureStream>,
    mut surface: RasterSurface,
    tx: mpsc::Sender<Snapshot>,
    cancel: CancellationToken,
    period: Duration,
    health: Arc<PipelineHealth>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut seq = 0u64;
    let mut dropped = 0u64;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        stream.render_into(surface.raster_mut());
        let captured_at = Instant::now();
        let data_uri = match surface.to_data_uri() {
            Ok(uri) => uri,
            Err(e) => {
                warn!("FrameSource: snapshot #{} failed: {:#}", seq, e);
                seq += 1;
                continue;
            }
        };
        health.record_snapshot();

        match tx.try_send(Snapshot {
            seq,
            captured_at,
            data_uri,
        }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                dropped += 1;
                health.record_snapshot_drop();
                if dropped % 30 == 1 {
                    // Log every 30 drops to avoid spam
                    debug!("FrameSource: snapshot #{} dropped ({} total)", seq, dropped);
                }
            }
            Err(TrySendError::Closed(_)) => {
                debug!("FrameSource: subscriber gone");
                break;
            }
        }
        seq += 1;
    }

    info!("FrameSource: stopped after {} snapshots, {} dropped", seq, dropped);
}
