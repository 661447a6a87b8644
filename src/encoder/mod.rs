//! Encoding module
//!
//! Frames leave the recorder as one [`EncodeRequest`] and the encoder answers
//! with a stream of [`LifecycleEvent`]s, followed by the
//! [`EncodeLifecycleMonitor`].

pub mod ffmpeg;
pub mod monitor;
pub mod request;
pub mod service;
pub mod state;

pub use ffmpeg::FfmpegService;
pub use monitor::{EncodeFailure, EncodeLifecycleMonitor, EncodeReport, MonitorAction};
pub use request::{EncodeRequest, EncodeRequestBuilder, ManifestEntry};
pub use service::{EncodeWorker, LifecycleEvent, ServiceHandle, ServiceRequest};
pub use state::EncodeState;
