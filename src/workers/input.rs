//! User input listener
//!
//! Every line read from stdin is one press of the record button. Presses also
//! count as user interactions, which is what a blocked capture stream waits
//! for before retrying playback.

use log::{debug, warn};
use std::io::BufRead;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::workers::WorkerClose;

pub struct InputListener {
    presses: mpsc::Receiver<()>,
    interactions: watch::Receiver<u64>,
    cancel: CancellationToken,
}

/// Feeding side of a listener.
pub struct InputHandle {
    presses: mpsc::Sender<()>,
    interactions: watch::Sender<u64>,
}

impl InputHandle {
    /// Register one press. Returns false once the listener is gone.
    ///
    /// The press is queued before the interaction counter moves, so whoever
    /// wakes up on the interaction already finds the press in the queue.
    pub fn press(&self) -> bool {
        let open = match self.presses.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("InputHandle: press dropped, listener is busy");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        };
        self.interactions.send_modify(|count| *count += 1);
        open
    }
}

impl InputListener {
    /// Listener fed by hand, not attached to any terminal.
    pub fn manual() -> (InputHandle, InputListener) {
        let (press_tx, press_rx) = mpsc::channel(20);
        let (interact_tx, interact_rx) = watch::channel(0u64);
        (
            InputHandle {
                presses: press_tx,
                interactions: interact_tx,
            },
            InputListener {
                presses: press_rx,
                interactions: interact_rx,
                cancel: CancellationToken::new(),
            },
        )
    }

    /// Listener reading presses from the process stdin.
    ///
    /// Reads on a dedicated thread, since a blocked stdin read would hold up
    /// runtime shutdown.
    pub fn stdin() -> InputListener {
        let (handle, listener) = Self::manual();
        let cancel = listener.cancel.clone();

        std::thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                if let Err(e) = line {
                    warn!("InputListener: failed to read stdin: {}", e);
                    return;
                }
                if cancel.is_cancelled() || !handle.press() {
                    return;
                }
            }
            debug!("InputListener: stdin closed");
        });

        listener
    }

    /// Next press, or `None` once the input is closed.
    pub async fn next_press(&mut self) -> Option<()> {
        self.presses.recv().await
    }

    /// Throw away presses queued so far. Returns how many were dropped.
    pub fn discard_pending(&mut self) -> usize {
        let mut dropped = 0;
        while self.presses.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }

    /// Counter bumped on every interaction
    pub fn interactions(&self) -> watch::Receiver<u64> {
        self.interactions.clone()
    }
}

impl WorkerClose for InputListener {
    fn close(&mut self) {
        self.cancel.cancel();
        self.presses.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_press_is_an_interaction() {
        let (handle, mut listener) = InputListener::manual();
        let mut interactions = listener.interactions();

        assert!(handle.press());
        assert_eq!(listener.next_press().await, Some(()));
        assert!(interactions.has_changed().unwrap());
        assert_eq!(*interactions.borrow_and_update(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_press_is_queued_before_interaction_is_seen() {
        for _ in 0..50 {
            let (handle, mut listener) = InputListener::manual();
            let mut interactions = listener.interactions();

            let waiter = tokio::spawn(async move {
                interactions.changed().await.unwrap();
                // the press that caused the interaction is already queued
                listener.discard_pending()
            });
            // pressed from a plain thread, like the stdin reader
            std::thread::spawn(move || {
                assert!(handle.press());
                handle
            })
            .join()
            .unwrap();

            assert_eq!(waiter.await.unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn test_dropped_handle_closes_input() {
        let (handle, mut listener) = InputListener::manual();
        handle.press();
        drop(handle);

        assert_eq!(listener.next_press().await, Some(()));
        assert_eq!(listener.next_press().await, None);
    }

    #[tokio::test]
    async fn test_discard_pending() {
        let (handle, mut listener) = InputListener::manual();
        handle.press();
        handle.press();
        assert_eq!(listener.discard_pending(), 2);

        handle.press();
        assert_eq!(listener.next_press().await, Some(()));
    }

    #[tokio::test]
    async fn test_close_refuses_presses() {
        let (handle, mut listener) = InputListener::manual();
        listener.close();
        assert!(!handle.press());
    }
}
