//! Recording coordinator
//!
//! The [`Recorder`] owns the recording session and runs one cooperative loop
//! over everything that can happen: encoder events, snapshots, button
//! presses and the optional auto-stop timer. Nothing else mutates the session.

use anyhow::{Result, bail};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::capture::{CaptureDevice, FrameSource, FrameSubscription, SourceOpts};
use crate::encoder::{EncodeLifecycleMonitor, EncodeReport, EncodeRequestBuilder, MonitorAction, ServiceHandle};
use crate::pipeline::health::PipelineHealth;
use crate::pipeline::sampler::{SampleOutcome, Sampler};
use crate::pipeline::session::{RecordingSession, Toggle};
use crate::pipeline::types::Snapshot;
use crate::workers::{ControlEvent, InputListener, ToggleButton, WorkerClose};

pub struct Recorder {
    source: FrameSource,
    sampler: Sampler,
    health: Arc<PipelineHealth>,
    record_for: Option<Duration>,
}

impl Recorder {
    pub fn new(opts: SourceOpts) -> Self {
        let health = Arc::new(PipelineHealth::new());
        Self {
            source: FrameSource::new(opts, health.clone()),
            sampler: Sampler::default(),
            health,
            record_for: None,
        }
    }

    /// Start recording as soon as capture runs and stop after `duration`.
    pub fn record_for(mut self, duration: Option<Duration>) -> Self {
        self.record_for = duration;
        self
    }

    pub fn health(&self) -> Arc<PipelineHealth> {
        self.health.clone()
    }

    /// Drive one recording from encoder startup to encoder exit.
    ///
    /// Returns `None` when the input closed before anything was recorded,
    /// otherwise the report of the single encode that was dispatched.
    pub async fn run(
        self,
        device: &mut dyn CaptureDevice,
        mut service: ServiceHandle,
        mut input: InputListener,
    ) -> Result<Option<EncodeReport>> {
        let mut monitor = EncodeLifecycleMonitor::new();
        let mut session = RecordingSession::new();
        let mut button = ToggleButton::new();
        let mut subscription: Option<FrameSubscription> = None;
        let mut deadline: Option<Instant> = None;
        let mut input_open = true;
        let mut dispatched = false;

        loop {
            let control = tokio::select! {
                event = service.next_event() => {
                    let Some(event) = event else {
                        bail!("{} stopped without reporting exit", service.name());
                    };
                    match monitor.handle(event) {
                        MonitorAction::Continue => None,
                        MonitorAction::StartCapture => {
                            let sub = self.source.start(&mut *device, input.interactions()).await?;
                            let (width, height) = sub.dimensions();
                            info!("Recorder: capture live at {}x{}", width, height);
                            subscription = Some(sub);

                            // presses that only served to unblock playback
                            let stale = input.discard_pending();
                            if stale > 0 {
                                debug!("Recorder: discarded {} presses made before capture", stale);
                            }
                            button.enable();
                            button.render();
                            self.record_for.map(|_| button.press())
                        }
                        MonitorAction::Finished(report) => {
                            if !dispatched {
                                warn!("Recorder: encoder exited before any request was sent");
                            }
                            drop(subscription.take());
                            service.release().await;
                            return Ok(Some(report));
                        }
                    }
                }
                snapshot = next_snapshot(&mut subscription) => {
                    match snapshot {
                        Some(snapshot) => self.sample(&mut session, &snapshot),
                        None => {
                            warn!("Recorder: frame source stopped");
                            subscription = None;
                        }
                    }
                    None
                }
                press = input.next_press(), if input_open => match press {
                    Some(()) => Some(button.press()),
                    None => {
                        input_open = false;
                        if session.is_recording() {
                            info!("Recorder: input closed while recording, stopping");
                            Some(button.press())
                        } else if !dispatched && self.record_for.is_none() {
                            info!("Recorder: input closed, nothing recorded");
                            drop(subscription.take());
                            service.release().await;
                            return Ok(None);
                        } else {
                            None
                        }
                    }
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    info!("Recorder: recording time elapsed");
                    Some(button.press())
                }
            };

            let recording = match control {
                Some(ControlEvent::Toggle(recording)) => recording,
                Some(ControlEvent::Interaction) => {
                    debug!("Recorder: press ignored, capture has not started");
                    continue;
                }
                None => continue,
            };

            let (next, toggle) = std::mem::take(&mut session).apply(recording);
            session = next;
            match toggle {
                Toggle::Started => {
                    info!("Recorder: recording started, one sample per {:?}", self.sampler.floor());
                    deadline = self.record_for.map(|d| Instant::now() + d);
                }
                Toggle::Stopped => {
                    deadline = None;
                    info!(
                        "Recorder: recording stopped with {} frames ({} KB)",
                        session.frames().len(),
                        session.frames().total_bytes() / 1024
                    );
                    info!("Recorder: {}", self.health.summary());

                    EncodeRequestBuilder::dispatch(session.frames().snapshot(), &service)?;
                    dispatched = true;

                    // one request per run: no more capture, no more presses
                    if let Some(sub) = subscription.take() {
                        sub.stop();
                    }
                    input.close();
                    input_open = false;
                }
                Toggle::Unchanged => {}
            }
            button.render();
        }
    }

    fn sample(&self, session: &mut RecordingSession, snapshot: &Snapshot) {
        if let SampleOutcome::Accepted { bytes } = self.sampler.offer(session, snapshot, &self.health) {
            debug!(
                "Recorder: {} frames buffered, last {} bytes",
                session.frames().len(),
                bytes
            );
        }
    }
}

async fn next_snapshot(subscription: &mut Option<FrameSubscription>) -> Option<Snapshot> {
    match subscription {
        Some(sub) => sub.next().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::TestPatternDevice;
    use crate::encoder::LifecycleEvent;
    use crate::encoder::request::manifest_name;
    use crate::encoder::service::testing::ScriptedWorker;

    fn opts() -> SourceOpts {
        SourceOpts {
            width: 32,
            height: 24,
            refresh_hz: 60,
        }
    }

    fn script(code: i32) -> Vec<LifecycleEvent> {
        vec![
            LifecycleEvent::Stdout("frame=5 fps=0.0".into()),
            LifecycleEvent::Stderr("encoding".into()),
            LifecycleEvent::Done,
            LifecycleEvent::Exit(code),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_recording_dispatches_once() {
        let (worker, received) = ScriptedWorker::new(script(0));
        let service = ServiceHandle::spawn(Box::new(worker));
        let (_handle, input) = InputListener::manual();
        let mut device = TestPatternDevice::new().with_warmup(3);

        let recorder = Recorder::new(opts()).record_for(Some(Duration::from_secs(1)));
        let health = recorder.health();
        let report = recorder.run(&mut device, service, input).await.unwrap().unwrap();

        assert_eq!(report.code, 0);
        assert_eq!(report.stdout, "frame=5 fps=0.0\n");
        assert_eq!(report.stderr, "encoding\n");
        assert!(report.into_result().is_ok());

        let request = received.await.unwrap();
        assert_eq!(
            request.arguments,
            vec!["-framerate", "10", "-i", "input%3d.jpg", "out.mp4"]
        );
        // one second at a 200ms floor
        assert!((4..=6).contains(&request.frame_count()), "got {}", request.frame_count());
        for (i, entry) in request.manifest.iter().enumerate() {
            assert_eq!(entry.name, manifest_name(i + 1));
            assert_eq!(&entry.data[..2], &[0xFF, 0xD8]);
        }
        assert_eq!(health.samples_accepted(), request.frame_count() as u64);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_toggle() {
        let (worker, received) = ScriptedWorker::new(script(0));
        let service = ServiceHandle::spawn(Box::new(worker));
        let (handle, input) = InputListener::manual();

        let task = tokio::spawn(async move {
            let mut device = TestPatternDevice::new();
            Recorder::new(opts()).run(&mut device, service, input).await
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.press());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(handle.press());

        let report = task.await.unwrap().unwrap().unwrap();
        assert!(report.succeeded());

        let request = received.await.unwrap();
        assert!((2..=4).contains(&request.frame_count()), "got {}", request.frame_count());
        // input is closed once the request is out
        assert!(!handle.press());
    }

    #[tokio::test(start_paused = true)]
    async fn test_press_unblocking_playback_does_not_record() {
        let (worker, received) = ScriptedWorker::new(script(0));
        let service = ServiceHandle::spawn(Box::new(worker));
        let (handle, input) = InputListener::manual();
        let recorder = Recorder::new(opts());
        let health = recorder.health();

        let task = tokio::spawn(async move {
            let mut device = TestPatternDevice::new().with_autoplay_blocked();
            recorder.run(&mut device, service, input).await
        });

        // capture is stuck on the autoplay refusal until this press
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(health.snapshots_emitted(), 0);
        assert!(handle.press());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(health.snapshots_emitted() > 0);
        assert_eq!(health.samples_accepted(), 0);

        // the next two presses are a full start/stop cycle
        assert!(handle.press());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(handle.press());

        let report = task.await.unwrap().unwrap().unwrap();
        assert!(report.succeeded());
        let request = received.await.unwrap();
        assert!((2..=4).contains(&request.frame_count()), "got {}", request.frame_count());
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_recording_dispatches_nothing() {
        let (worker, received) = ScriptedWorker::new(script(0));
        let service = ServiceHandle::spawn(Box::new(worker));
        let (handle, input) = InputListener::manual();
        drop(handle);

        let mut device = TestPatternDevice::new();
        let outcome = Recorder::new(opts()).run(&mut device, service, input).await.unwrap();

        assert!(outcome.is_none());
        assert!(received.await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_encoder_failure_is_reported() {
        let (worker, _received) = ScriptedWorker::new(vec![
            LifecycleEvent::Stderr("input001.jpg: Invalid data found".into()),
            LifecycleEvent::Exit(1),
        ]);
        let service = ServiceHandle::spawn(Box::new(worker));
        let (_handle, input) = InputListener::manual();
        let mut device = TestPatternDevice::new();

        let report = Recorder::new(opts())
            .record_for(Some(Duration::from_millis(500)))
            .run(&mut device, service, input)
            .await
            .unwrap()
            .unwrap();

        let failure = report.into_result().unwrap_err();
        assert_eq!(failure.code, 1);
        assert_eq!(failure.stderr, "input001.jpg: Invalid data found\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_device_is_fatal() {
        let (worker, _received) = ScriptedWorker::new(script(0));
        let service = ServiceHandle::spawn(Box::new(worker));
        let (_handle, input) = InputListener::manual();
        let mut device = TestPatternDevice::unavailable("permission denied");

        let err = Recorder::new(opts()).run(&mut device, service, input).await.unwrap_err();
        assert!(format!("{:#}", err).contains("permission denied"));
    }
}
