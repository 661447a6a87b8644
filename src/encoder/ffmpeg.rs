//! ffmpeg-backed encoding service
//!
//! Materializes the request manifest in a scratch directory, runs the ffmpeg
//! command line there and streams its output back as lifecycle events.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Local;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::assets::{EXIT_NOT_LAUNCHED, OUTPUT_NAME};
use crate::encoder::request::EncodeRequest;
use crate::encoder::service::{EncodeWorker, LifecycleEvent, ServiceRequest};

pub struct FfmpegService {
    binary: PathBuf,
    output_dir: PathBuf,
}

impl FfmpegService {
    pub fn new(binary: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Run one request to completion and return the exit code to report.
    async fn execute(&self, request: &EncodeRequest, events: &mpsc::Sender<LifecycleEvent>) -> Result<i32> {
        let total = request.total_bytes();
        if total > request.memory_budget {
            events
                .send(LifecycleEvent::Stderr(format!(
                    "manifest of {} bytes exceeds the memory budget of {} bytes",
                    total, request.memory_budget
                )))
                .await?;
            return Ok(1);
        }

        let scratch = tempfile::Builder::new()
            .prefix("snapreel-")
            .tempdir()
            .context("Failed to create scratch directory")?;
        for entry in &request.manifest {
            tokio::fs::write(scratch.path().join(&entry.name), &entry.data)
                .await
                .with_context(|| format!("Failed to write {}", entry.name))?;
        }
        debug!(
            "FfmpegService: wrote {} files to {}",
            request.frame_count(),
            scratch.path().display()
        );

        let spawned = Command::new(&self.binary)
            .args(&request.arguments)
            .current_dir(scratch.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                events
                    .send(LifecycleEvent::Stderr(format!(
                        "failed to launch {}: {}",
                        self.binary.display(),
                        e
                    )))
                    .await?;
                return Ok(EXIT_NOT_LAUNCHED);
            }
        };

        let stdout = child.stdout.take().context("encoder stdout not captured")?;
        let stderr = child.stderr.take().context("encoder stderr not captured")?;
        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let mut out_open = true;
        let mut err_open = true;

        while out_open || err_open {
            tokio::select! {
                line = out_lines.next_line(), if out_open => match line {
                    Ok(Some(line)) => events.send(LifecycleEvent::Stdout(line)).await?,
                    Ok(None) => out_open = false,
                    Err(e) => {
                        warn!("FfmpegService: stdout unreadable: {}", e);
                        out_open = false;
                    }
                },
                line = err_lines.next_line(), if err_open => match line {
                    Ok(Some(line)) => events.send(LifecycleEvent::Stderr(line)).await?,
                    Ok(None) => err_open = false,
                    Err(e) => {
                        warn!("FfmpegService: stderr unreadable: {}", e);
                        err_open = false;
                    }
                },
            }
        }

        let status = child.wait().await.context("Failed to wait for encoder")?;
        // killed by a signal
        let mut code = status.code().unwrap_or(-1);

        if code == 0 {
            match self.save_output(scratch.path()).await {
                Ok(saved) => info!("FfmpegService: saved {}", saved.display()),
                Err(e) => {
                    events
                        .send(LifecycleEvent::Stderr(format!("{:#}", e)))
                        .await?;
                    code = 1;
                }
            }
        }

        events.send(LifecycleEvent::Done).await?;
        Ok(code)
    }

    async fn save_output(&self, scratch: &Path) -> Result<PathBuf> {
        let produced = scratch.join(OUTPUT_NAME);
        let extension = Path::new(OUTPUT_NAME)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4");
        let stamp = Local::now().format("%Y%m%d-%H%M%S-%3f").to_string();

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.output_dir.display()))?;
        let target = self.claim_target(&stamp, extension).await?;
        if let Err(e) = tokio::fs::copy(&produced, &target).await {
            let _ = tokio::fs::remove_file(&target).await;
            return Err(e)
                .with_context(|| format!("Failed to copy {} to {}", OUTPUT_NAME, target.display()));
        }
        Ok(target)
    }

    /// Reserve an output path that no earlier run has written.
    async fn claim_target(&self, stamp: &str, extension: &str) -> Result<PathBuf> {
        let mut attempt = 0u32;
        loop {
            let name = match attempt {
                0 => format!("snapreel-{}.{}", stamp, extension),
                n => format!("snapreel-{}-{}.{}", stamp, n, extension),
            };
            let target = self.output_dir.join(name);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&target)
                .await
            {
                Ok(_) => return Ok(target),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to create {}", target.display()));
                }
            }
        }
    }
}

#[async_trait]
impl EncodeWorker for FfmpegService {
    fn name(&self) -> &'static str {
        "FfmpegService"
    }

    async fn run(
        self: Box<Self>,
        mut requests: mpsc::Receiver<ServiceRequest>,
        events: mpsc::Sender<LifecycleEvent>,
    ) -> Result<()> {
        events.send(LifecycleEvent::Ready).await?;

        let Some(ServiceRequest::Run(request)) = requests.recv().await else {
            debug!("FfmpegService: released before any request");
            return Ok(());
        };
        info!(
            "FfmpegService: running {} {}",
            self.binary.display(),
            request.arguments.join(" ")
        );

        let code = match self.execute(&request, &events).await {
            Ok(code) => code,
            Err(e) => {
                events
                    .send(LifecycleEvent::Stderr(format!("{:#}", e)))
                    .await?;
                1
            }
        };
        events.send(LifecycleEvent::Exit(code)).await?;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::encoder::request::EncodeRequestBuilder;
    use crate::encoder::service::ServiceHandle;
    use crate::pipeline::types::Frame;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("ffmpeg");
        {
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "#!/bin/sh\n{}", body).unwrap();
            file.sync_all().unwrap();
        }
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    async fn run_to_exit(service: FfmpegService, request: EncodeRequest) -> Vec<LifecycleEvent> {
        let mut handle = ServiceHandle::spawn(Box::new(service));
        assert_eq!(handle.next_event().await, Some(LifecycleEvent::Ready));
        handle.dispatch(ServiceRequest::Run(request)).unwrap();

        let mut events = Vec::new();
        while let Some(event) = handle.next_event().await {
            events.push(event);
        }
        handle.release().await;
        events
    }

    fn stdout_of(events: &[LifecycleEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                LifecycleEvent::Stdout(line) => Some(line.as_str()),
                _ => None,
            })
            .collect()
    }

    fn stderr_of(events: &[LifecycleEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                LifecycleEvent::Stderr(line) => Some(line.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_successful_encode_is_saved() {
        let bin = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(
            bin.path(),
            "echo \"args: $*\"\nls input*.jpg\necho encoding >&2\ncat input001.jpg input002.jpg > out.mp4",
        );
        let frames = vec![Frame::from(b"one".to_vec()), Frame::from(b"two".to_vec())];

        let events = run_to_exit(
            FfmpegService::new(&ffmpeg, out.path()),
            EncodeRequestBuilder::build(&frames),
        )
        .await;

        assert_eq!(
            stdout_of(&events),
            vec![
                "args: -framerate 10 -i input%3d.jpg out.mp4",
                "input001.jpg",
                "input002.jpg"
            ]
        );
        assert_eq!(stderr_of(&events), vec!["encoding"]);
        assert_eq!(
            &events[events.len() - 2..],
            &[LifecycleEvent::Done, LifecycleEvent::Exit(0)]
        );

        let saved: Vec<_> = std::fs::read_dir(out.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(saved.len(), 1);
        let name = saved[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("snapreel-") && name.ends_with(".mp4"));
        assert_eq!(std::fs::read(&saved[0]).unwrap(), b"onetwo");
    }

    #[tokio::test]
    async fn test_outputs_in_the_same_second_do_not_collide() {
        let scratch = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let service = FfmpegService::new("/nonexistent/ffmpeg", out.path());

        std::fs::write(scratch.path().join(OUTPUT_NAME), b"first").unwrap();
        let first = service.save_output(scratch.path()).await.unwrap();
        std::fs::write(scratch.path().join(OUTPUT_NAME), b"second").unwrap();
        let second = service.save_output(scratch.path()).await.unwrap();

        // the same stamp twice still gives two files
        let again = service.claim_target("20260101-000000-000", "mp4").await.unwrap();
        let last = service.claim_target("20260101-000000-000", "mp4").await.unwrap();

        assert_ne!(first, second);
        assert_ne!(again, last);
        assert!(last.to_string_lossy().ends_with("-000-1.mp4"));
        assert_eq!(std::fs::read(&first).unwrap(), b"first");
        assert_eq!(std::fs::read(&second).unwrap(), b"second");
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 4);
    }

    #[tokio::test]
    async fn test_failing_encode_reports_code_and_stderr() {
        let bin = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(bin.path(), "echo 'input%3d.jpg: No such file' >&2\nexit 3");

        let events = run_to_exit(
            FfmpegService::new(&ffmpeg, out.path()),
            EncodeRequestBuilder::build(&[]),
        )
        .await;

        assert_eq!(
            events,
            vec![
                LifecycleEvent::Stderr("input%3d.jpg: No such file".into()),
                LifecycleEvent::Done,
                LifecycleEvent::Exit(3),
            ]
        );
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_output_fails_the_encode() {
        let bin = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(bin.path(), "exit 0");

        let events = run_to_exit(
            FfmpegService::new(&ffmpeg, out.path()),
            EncodeRequestBuilder::build(&[Frame::from(vec![1])]),
        )
        .await;

        assert_eq!(stderr_of(&events).len(), 1);
        assert_eq!(events.last(), Some(&LifecycleEvent::Exit(1)));
        // the reserved name is given back
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let out = tempfile::tempdir().unwrap();
        let events = run_to_exit(
            FfmpegService::new("/nonexistent/ffmpeg", out.path()),
            EncodeRequestBuilder::build(&[]),
        )
        .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], LifecycleEvent::Stderr(line) if line.contains("/nonexistent/ffmpeg")));
        assert_eq!(events[1], LifecycleEvent::Exit(EXIT_NOT_LAUNCHED));
    }

    #[tokio::test]
    async fn test_manifest_over_budget_is_refused() {
        let out = tempfile::tempdir().unwrap();
        let mut request = EncodeRequestBuilder::build(&[Frame::from(vec![0u8; 64])]);
        request.memory_budget = 16;

        let events = run_to_exit(FfmpegService::new("/nonexistent/ffmpeg", out.path()), request).await;

        assert_eq!(
            events,
            vec![
                LifecycleEvent::Stderr(
                    "manifest of 64 bytes exceeds the memory budget of 16 bytes".into()
                ),
                LifecycleEvent::Exit(1),
            ]
        );
    }
}
