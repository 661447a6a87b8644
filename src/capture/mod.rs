//! Frame capture module
//!
//! Devices hand out live streams through [`CaptureDevice`]; the
//! [`FrameSource`] snapshots such a stream once per refresh tick.

mod generic;
pub mod source;
mod surface;
mod traits;

pub use generic::TestPatternDevice;
pub use source::{FrameSource, FrameSubscription, SourceOpts};
pub use traits::{CaptureDevice, CaptureStream, PlaybackBlocked};
