//! Rendering-engine abstraction.
//!
//! The headless browser is an external collaborator; renderers drive it
//! through these traits only: load a document, poll the DOM for a terminal
//! condition, measure an element, capture a screenshot or PDF. One concrete
//! adapter ships behind the `chromium` feature.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[cfg(feature = "chromium")]
pub mod chromium;
#[cfg(test)]
pub(crate) mod mock;

/// How often the DOM is probed while waiting for a terminal render state.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to launch rendering engine: {0}")]
    Launch(String),
    #[error("failed to load document: {0}")]
    Load(String),
    #[error("script evaluation failed: {0}")]
    Evaluate(String),
    #[error("snapshot capture failed: {0}")]
    Capture(String),
    #[error("rendering engine already shut down")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFormat {
    Png,
    Jpeg { quality: u8 },
}

/// One isolated page inside the shared engine. No page observes another's
/// DOM state; every render call gets a fresh one and closes it afterwards.
#[async_trait]
pub trait EnginePage: Send + Sync {
    async fn set_content(&mut self, html: &str) -> Result<(), EngineError>;
    async fn element_exists(&self, selector: &str) -> Result<bool, EngineError>;
    async fn element_text(&self, selector: &str) -> Result<Option<String>, EngineError>;
    async fn element_outer_html(&self, selector: &str) -> Result<Option<String>, EngineError>;
    async fn element_bounding_box(&self, selector: &str)
        -> Result<Option<BoundingBox>, EngineError>;
    async fn screenshot(&self, clip: BoundingBox, format: CaptureFormat)
        -> Result<Vec<u8>, EngineError>;
    async fn pdf(&self) -> Result<Vec<u8>, EngineError>;
    async fn close(&mut self) -> Result<(), EngineError>;
}

#[async_trait]
pub trait RenderingEngine: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn EnginePage>, EngineError>;
    /// Idempotent; closing an already-closed engine is a no-op.
    async fn close(&self) -> Result<(), EngineError>;
}

#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn RenderingEngine>, EngineError>;
}

enum HandleState {
    Idle,
    Running(Arc<dyn RenderingEngine>),
    Closed,
}

/// Exclusive owner of one lazily launched engine instance.
///
/// Exposes exactly two operations: `get_or_create` and `close_if_open`.
/// Creation happens under the lock, so concurrent first calls launch a
/// single engine; once closed, the handle stays closed.
pub struct EngineHandle {
    factory: Box<dyn EngineFactory>,
    state: Mutex<HandleState>,
}

impl EngineHandle {
    pub fn new(factory: Box<dyn EngineFactory>) -> Self {
        Self { factory, state: Mutex::new(HandleState::Idle) }
    }

    pub async fn get_or_create(&self) -> Result<Arc<dyn RenderingEngine>, EngineError> {
        let mut state = self.state.lock().await;
        match &*state {
            HandleState::Running(engine) => Ok(engine.clone()),
            HandleState::Closed => Err(EngineError::Closed),
            HandleState::Idle => {
                let engine = self.factory.launch().await?;
                *state = HandleState::Running(engine.clone());
                Ok(engine)
            }
        }
    }

    pub async fn close_if_open(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, HandleState::Closed) {
            HandleState::Running(engine) => engine.close().await,
            HandleState::Idle | HandleState::Closed => Ok(()),
        }
    }
}

/// One DOM probe step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    Pending,
    Ready(T),
    Errored(String),
}

/// Terminal result of a bounded poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready(T),
    Errored(String),
    TimedOut,
}

/// Poll `probe` every `interval` until it reports a terminal state or
/// `deadline` elapses. Engine failures abort the poll immediately.
pub async fn poll_until<T, F, Fut>(
    deadline: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<PollOutcome<T>, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Probe<T>, EngineError>>,
{
    let deadline = Instant::now() + deadline;
    loop {
        match probe().await? {
            Probe::Ready(value) => return Ok(PollOutcome::Ready(value)),
            Probe::Errored(message) => return Ok(PollOutcome::Errored(message)),
            Probe::Pending => {}
        }
        if Instant::now() >= deadline {
            return Ok(PollOutcome::TimedOut);
        }
        tokio::time::sleep(interval).await;
    }
}
