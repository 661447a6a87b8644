//! Encoding lifecycle monitor
//!
//! Follows the event stream of one encoding service: `ready` arms capture,
//! output lines are accumulated, `exit` closes the books.

use log::{debug, error, info, warn};
use std::time::Instant;
use thiserror::Error;

use crate::encoder::service::LifecycleEvent;
use crate::encoder::state::EncodeState;

/// What the caller should do after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorAction {
    Continue,
    /// The service is ready, capture may begin
    StartCapture,
    /// The service exited; release it
    Finished(EncodeReport),
}

/// Everything the encoder said, plus how it ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeReport {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl EncodeReport {
    pub fn succeeded(&self) -> bool {
        self.code == 0
    }

    pub fn into_result(self) -> Result<(), EncodeFailure> {
        if self.succeeded() {
            Ok(())
        } else {
            Err(EncodeFailure {
                code: self.code,
                stderr: self.stderr,
            })
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("encoder exited with code {code}")]
pub struct EncodeFailure {
    pub code: i32,
    pub stderr: String,
}

pub struct EncodeLifecycleMonitor {
    state: EncodeState,
    stdout: String,
    stderr: String,
}

impl Default for EncodeLifecycleMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodeLifecycleMonitor {
    pub fn new() -> Self {
        Self {
            state: EncodeState::AwaitingReady,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn state(&self) -> EncodeState {
        self.state
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Consume one event, in emission order.
    pub fn handle(&mut self, event: LifecycleEvent) -> MonitorAction {
        if self.state.is_terminated() {
            debug!("EncodeLifecycleMonitor: ignoring {:?} after exit", event);
            return MonitorAction::Continue;
        }

        match event {
            LifecycleEvent::Ready => {
                if self.transition(EncodeState::Running {
                    ready_at: Instant::now(),
                }) {
                    info!("Encoder ready");
                    MonitorAction::StartCapture
                } else {
                    MonitorAction::Continue
                }
            }
            LifecycleEvent::Stdout(line) => {
                self.stdout.push_str(&line);
                self.stdout.push('\n');
                MonitorAction::Continue
            }
            LifecycleEvent::Stderr(line) => {
                self.stderr.push_str(&line);
                self.stderr.push('\n');
                MonitorAction::Continue
            }
            LifecycleEvent::Done => {
                info!("Encoder done");
                MonitorAction::Continue
            }
            LifecycleEvent::Exit(code) => {
                let ran_for = self.state.running_duration();
                if !self.transition(EncodeState::Terminated { code }) {
                    return MonitorAction::Continue;
                }
                info!(
                    "Process exited with code {}{}",
                    code,
                    ran_for
                        .map(|d| format!(" after {:.1}s", d.as_secs_f64()))
                        .unwrap_or_default()
                );
                if !self.stdout.is_empty() {
                    info!("{}", self.stdout.trim_end());
                }
                if !self.stderr.is_empty() {
                    error!("{}", self.stderr.trim_end());
                }
                MonitorAction::Finished(EncodeReport {
                    code,
                    stdout: std::mem::take(&mut self.stdout),
                    stderr: std::mem::take(&mut self.stderr),
                })
            }
        }
    }

    fn transition(&mut self, next: EncodeState) -> bool {
        if !self.state.can_transition_to(&next) || self.state == next {
            warn!(
                "EncodeLifecycleMonitor: unexpected transition {} -> {}",
                self.state, next
            );
            return false;
        }
        self.state = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(events: Vec<LifecycleEvent>) -> (EncodeLifecycleMonitor, Vec<MonitorAction>) {
        let mut monitor = EncodeLifecycleMonitor::new();
        let actions = events.into_iter().map(|e| monitor.handle(e)).collect();
        (monitor, actions)
    }

    #[test]
    fn test_ready_starts_capture_once() {
        let (monitor, actions) = run(vec![LifecycleEvent::Ready, LifecycleEvent::Ready]);
        assert_eq!(actions, vec![MonitorAction::StartCapture, MonitorAction::Continue]);
        assert!(monitor.state().is_running());
    }

    #[test]
    fn test_output_is_accumulated_verbatim() {
        let (monitor, _) = run(vec![
            LifecycleEvent::Ready,
            LifecycleEvent::Stdout("first".into()),
            LifecycleEvent::Stderr("  indented warning ".into()),
            LifecycleEvent::Stdout("".into()),
            LifecycleEvent::Done,
        ]);
        assert_eq!(monitor.stdout(), "first\n\n");
        assert_eq!(monitor.stderr(), "  indented warning \n");
        assert!(monitor.state().is_running());
    }

    #[test]
    fn test_success_and_failure_are_distinguishable() {
        let (_, ok) = run(vec![LifecycleEvent::Ready, LifecycleEvent::Done, LifecycleEvent::Exit(0)]);
        let (_, failed) = run(vec![
            LifecycleEvent::Ready,
            LifecycleEvent::Stderr("input001.jpg: Invalid data".into()),
            LifecycleEvent::Exit(1),
        ]);

        let MonitorAction::Finished(ok) = ok.last().cloned().unwrap() else {
            panic!("expected a finished report");
        };
        let MonitorAction::Finished(failed) = failed.last().cloned().unwrap() else {
            panic!("expected a finished report");
        };

        assert_ne!(ok, failed);
        assert_eq!(ok.stderr, "");
        assert!(ok.clone().into_result().is_ok());

        let failure = failed.into_result().unwrap_err();
        assert_eq!(failure.code, 1);
        assert_eq!(failure.stderr, "input001.jpg: Invalid data\n");
        assert_eq!(failure.to_string(), "encoder exited with code 1");
    }

    #[test]
    fn test_events_after_exit_are_ignored() {
        let (monitor, actions) = run(vec![
            LifecycleEvent::Ready,
            LifecycleEvent::Exit(0),
            LifecycleEvent::Stdout("late".into()),
            LifecycleEvent::Exit(2),
        ]);
        assert_eq!(actions[2], MonitorAction::Continue);
        assert_eq!(actions[3], MonitorAction::Continue);
        assert_eq!(monitor.state(), EncodeState::Terminated { code: 0 });
        assert_eq!(monitor.stdout(), "");
    }

    #[test]
    fn test_exit_before_ready_terminates() {
        let (monitor, actions) = run(vec![
            LifecycleEvent::Stderr("failed to load".into()),
            LifecycleEvent::Exit(127),
        ]);
        assert_eq!(
            actions[1],
            MonitorAction::Finished(EncodeReport {
                code: 127,
                stdout: String::new(),
                stderr: "failed to load\n".into(),
            })
        );
        assert!(monitor.state().is_terminated());
    }
}
