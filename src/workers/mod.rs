//! Background worker tasks
//!
//! User-facing workers: the stdin input listener and the record button it
//! drives.

pub mod input;
pub mod toggle;

pub use input::{InputHandle, InputListener};
pub use toggle::{ControlEvent, ToggleButton};

/// Trait for workers that need graceful shutdown.
pub trait WorkerClose {
    /// Close and clean up worker resources.
    fn close(&mut self);
}
