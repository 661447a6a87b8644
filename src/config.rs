use crate::assets::{DEFAULT_HEIGHT, DEFAULT_WIDTH, MAX_CAPTURE_PIXELS, MAX_REFRESH_RATE, REFRESH_RATE};
use anyhow::{Context, Result, bail};
use clap::{Arg, ArgMatches, Command, value_parser};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration.
///
/// Values come from an optional JSON file first, then command line flags
/// override whatever the file set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Requested capture width (the device may negotiate another size)
    pub width: u32,
    /// Requested capture height
    pub height: u32,
    /// Snapshot rate of the frame source, in Hz
    pub refresh_hz: u32,
    /// Path or name of the ffmpeg binary
    pub ffmpeg: PathBuf,
    /// Where the encoded artifact is copied after a successful run
    pub output_dir: PathBuf,
    /// Record automatically for this many seconds instead of waiting for toggles
    pub record_for: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            refresh_hz: REFRESH_RATE,
            ffmpeg: PathBuf::from("ffmpeg"),
            output_dir: PathBuf::from("."),
            record_for: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Build the configuration from parsed command line arguments.
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let mut config = match matches.get_one::<PathBuf>("config") {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        if let Some(width) = matches.get_one::<u32>("width") {
            config.width = *width;
        }
        if let Some(height) = matches.get_one::<u32>("height") {
            config.height = *height;
        }
        if let Some(hz) = matches.get_one::<u32>("refresh-hz") {
            config.refresh_hz = *hz;
        }
        if let Some(ffmpeg) = matches.get_one::<PathBuf>("ffmpeg") {
            config.ffmpeg = ffmpeg.clone();
        }
        if let Some(dir) = matches.get_one::<PathBuf>("output-dir") {
            config.output_dir = dir.clone();
        }
        if let Some(secs) = matches.get_one::<u64>("record-for") {
            config.record_for = Some(*secs);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            bail!("Capture resolution must be non-zero, got {}x{}", self.width, self.height);
        }
        if u64::from(self.width) * u64::from(self.height) > MAX_CAPTURE_PIXELS {
            bail!(
                "Capture resolution {}x{} exceeds {} pixels",
                self.width,
                self.height,
                MAX_CAPTURE_PIXELS
            );
        }
        if self.refresh_hz == 0 || self.refresh_hz > MAX_REFRESH_RATE {
            bail!(
                "Refresh rate must be between 1 and {} Hz, got {}",
                MAX_REFRESH_RATE,
                self.refresh_hz
            );
        }
        if self.record_for == Some(0) {
            bail!("--record-for must be at least one second");
        }
        Ok(())
    }

    pub fn record_for(&self) -> Option<Duration> {
        self.record_for.map(Duration::from_secs)
    }
}

pub fn cli() -> Command {
    Command::new(app_name())
        .version(version())
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file.")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("width")
                .long("width")
                .value_name("PIXELS")
                .help("Requested capture width.")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("height")
                .long("height")
                .value_name("PIXELS")
                .help("Requested capture height.")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("refresh-hz")
                .long("refresh-hz")
                .value_name("HZ")
                .help("Rate at which the capture surface is snapshotted.")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("ffmpeg")
                .long("ffmpeg")
                .value_name("PATH")
                .help("ffmpeg binary used as the encoding service.")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Directory receiving the encoded video.")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("record-for")
                .short('r')
                .long("record-for")
                .value_name("SECONDS")
                .help("Start recording as soon as capture is live and stop after SECONDS.")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("FILTER")
                .help("Log filter used when RUST_LOG is not set.")
                .default_value("info"),
        )
}

/// Returns a version as specified in Cargo.toml
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn app_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}
