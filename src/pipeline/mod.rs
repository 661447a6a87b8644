//! Recording pipeline
//!
//! Snapshots flow from the frame source through the sampler into the
//! session buffer while recording is on; stopping hands the buffer to the
//! encoder.
//!
//! # Architecture
//!
//! - The frame source runs in its own task and only talks to the recorder
//!   through a bounded channel
//! - The [`Recorder`] owns the [`RecordingSession`] and is the only place
//!   that mutates it
//! - [`PipelineHealth`] counters are shared between both sides

pub mod coordinator;
pub mod health;
pub mod sampler;
pub mod session;
pub mod types;

pub use coordinator::Recorder;
pub use health::{HealthSummary, PipelineHealth};
pub use sampler::{SampleOutcome, Sampler};
pub use session::{RecordingSession, SessionBuffer, Toggle};
pub use types::{Frame, Snapshot};
