//! Encoding service state management

use std::time::Instant;

/// Lifecycle of one encoding service, as seen from its events.
///
/// The state only ever moves forward; once terminated, the service is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeState {
    /// Service spawned, `ready` not received yet
    AwaitingReady,

    /// Service initialized and accepting work
    Running {
        /// When `ready` arrived
        ready_at: Instant,
    },

    /// `exit` received
    Terminated {
        /// Status code reported by the service
        code: i32,
    },
}

impl EncodeState {
    /// Check if this state transition is valid
    pub fn can_transition_to(&self, target: &EncodeState) -> bool {
        use EncodeState::*;

        match (self, target) {
            (AwaitingReady, Running { .. }) => true,
            // a service that dies while initializing never reports ready
            (AwaitingReady, Terminated { .. }) => true,

            (Running { .. }, Terminated { .. }) => true,

            (Terminated { .. }, _) => false,

            (a, b) if a == b => true,

            _ => false,
        }
    }

    /// Get a human-readable description of this state
    pub fn description(&self) -> &'static str {
        match self {
            EncodeState::AwaitingReady => "AwaitingReady",
            EncodeState::Running { .. } => "Running",
            EncodeState::Terminated { .. } => "Terminated",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, EncodeState::Running { .. })
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, EncodeState::Terminated { .. })
    }

    /// Time spent since the service became ready (if running)
    pub fn running_duration(&self) -> Option<std::time::Duration> {
        if let EncodeState::Running { ready_at } = self {
            Some(ready_at.elapsed())
        } else {
            None
        }
    }
}

impl std::fmt::Display for EncodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}
