//! Terminal record button

use log::info;

/// What the control surface reports to the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// New recording state after a toggle
    Toggle(bool),
    /// Any user gesture, toggles included
    Interaction,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ToggleButton {
    enabled: bool,
    is_recording: bool,
}

impl ToggleButton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the button. Until then presses only count as interactions.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    pub fn label(&self) -> &'static str {
        if self.is_recording { "Stop" } else { "Record" }
    }

    /// Flip the button and report the new state.
    pub fn press(&mut self) -> ControlEvent {
        if !self.enabled {
            return ControlEvent::Interaction;
        }
        self.is_recording = !self.is_recording;
        info!("ToggleButton: {}", if self.is_recording { "recording" } else { "stopped" });
        ControlEvent::Toggle(self.is_recording)
    }

    /// Show the current label on the terminal
    pub fn render(&self) {
        println!("[ {} ]  press Enter to {}", self.label(), self.label().to_lowercase());
    }
}
