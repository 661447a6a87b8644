//! Encoding service boundary
//!
//! The encoder runs as its own task and only talks to the rest of the
//! program through two channels: requests in, lifecycle events out. Events
//! are delivered in emission order and carry no correlation id, since only
//! one request is ever outstanding.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::assets::EVENT_CHANNEL_CAPACITY;
use crate::encoder::request::EncodeRequest;

/// Messages accepted by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServiceRequest {
    Run(EncodeRequest),
}

/// Messages emitted by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum LifecycleEvent {
    /// Initialized, ready for a request
    Ready,
    /// One line of encoder standard output
    Stdout(String),
    /// One line of encoder standard error
    Stderr(String),
    /// The encoder finished its work
    Done,
    /// Terminal event with the encoder status code
    Exit(i32),
}

/// Something that can serve encode requests.
#[async_trait]
pub trait EncodeWorker: Send + 'static {
    /// Name of this worker for logging
    fn name(&self) -> &'static str;

    /// Serve requests until the request channel closes or the work is done.
    ///
    /// Implementations emit `Ready` first and `Exit` last.
    async fn run(
        self: Box<Self>,
        requests: mpsc::Receiver<ServiceRequest>,
        events: mpsc::Sender<LifecycleEvent>,
    ) -> Result<()>;
}

/// Caller side of a running encode worker.
pub struct ServiceHandle {
    name: &'static str,
    requests: mpsc::Sender<ServiceRequest>,
    events: mpsc::Receiver<LifecycleEvent>,
    task: JoinHandle<()>,
}

impl ServiceHandle {
    pub fn spawn(worker: Box<dyn EncodeWorker>) -> Self {
        // a single slot: only one request may be outstanding
        let (req_tx, req_rx) = mpsc::channel::<ServiceRequest>(1);
        let (ev_tx, ev_rx) = mpsc::channel::<LifecycleEvent>(EVENT_CHANNEL_CAPACITY);
        let name = worker.name();

        let task = tokio::spawn(async move {
            if let Err(e) = worker.run(req_rx, ev_tx).await {
                error!("{}: worker failed: {:#}", name, e);
            }
        });
        info!("{}: spawned", name);

        Self {
            name,
            requests: req_tx,
            events: ev_rx,
            task,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Queue a request. Never waits for the encode itself.
    pub fn dispatch(&self, request: ServiceRequest) -> Result<()> {
        match self.requests.try_send(request) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(anyhow!("{}: a request is already outstanding", self.name)),
            Err(TrySendError::Closed(_)) => Err(anyhow!("{}: service is no longer running", self.name)),
        }
    }

    /// Next event, in emission order. `None` once the worker is gone.
    pub async fn next_event(&mut self) -> Option<LifecycleEvent> {
        self.events.recv().await
    }

    /// Tear the worker down.
    pub async fn release(self) {
        drop(self.requests);
        self.task.abort();
        match self.task.await {
            Ok(()) => debug!("{}: released", self.name),
            Err(e) if e.is_cancelled() => debug!("{}: released (aborted)", self.name),
            Err(e) => error!("{}: worker panicked: {}", self.name, e),
        }
    }
}
