use crate::capture::{SourceOpts, TestPatternDevice};
use crate::config::Config;
use crate::encoder::{EncodeFailure, FfmpegService, ServiceHandle};
use crate::pipeline::Recorder;
use crate::workers::InputListener;
use anyhow::Result;
use log::{error, info};
use std::{panic, process};
use tracing_subscriber::EnvFilter;

pub mod assets;
pub mod capture;
pub mod config;
pub mod encoder;
pub mod pipeline;
pub mod workers;

#[tokio::main]
async fn main() {
    let matches = config::cli().get_matches();

    let default_filter = matches
        .get_one::<String>("log-level")
        .cloned()
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    // kill the main thread as soon as a secondary thread panics
    let orig_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // invoke the default handler and exit the process
        orig_hook(panic_info);
        process::exit(105);
    }));

    // gracefully close the app when receiving SIGINT, SIGTERM, or SIGHUP
    ctrlc::set_handler(move || {
        process::exit(130);
    })
    .expect("Error setting Ctrl-C handler");

    let code = match Config::from_matches(&matches) {
        Ok(config) => match run(config).await {
            Ok(code) => code,
            Err(e) => {
                error!("{:#}", e);
                1
            }
        },
        Err(e) => {
            error!("{:#}", e);
            2
        }
    };
    process::exit(code);
}

async fn run(config: Config) -> Result<i32> {
    info!("{} {} starting", config::app_name(), config::version());

    let service = ServiceHandle::spawn(Box::new(FfmpegService::new(
        config.ffmpeg.clone(),
        config.output_dir.clone(),
    )));
    let input = InputListener::stdin();
    let mut device = TestPatternDevice::new();

    let recorder = Recorder::new(SourceOpts {
        width: config.width,
        height: config.height,
        refresh_hz: config.refresh_hz,
    })
    .record_for(config.record_for());
    let health = recorder.health();

    let outcome = recorder.run(&mut device, service, input).await?;
    info!("Pipeline: {}", health.summary());
    let Some(report) = outcome else {
        info!("Nothing recorded");
        return Ok(0);
    };

    match report.into_result() {
        Ok(()) => {
            info!("Recording encoded to {}", config.output_dir.display());
            Ok(0)
        }
        Err(EncodeFailure { code, .. }) => {
            error!("Encoding failed with code {}", code);
            Ok(1)
        }
    }
}
