//! Scripted engine double for renderer and adapter tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::{BoundingBox, CaptureFormat, EngineError, EngineFactory, EnginePage, RenderingEngine};

pub(crate) const MOCK_PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
pub(crate) const MOCK_JPEG_PREFIX: &[u8] = &[0xff, 0xd8, 0xff];
pub(crate) const MOCK_PDF_BYTES: &[u8] = b"%PDF-1.4 limner-mock";

/// What every page opened on the mock engine will pretend happened.
#[derive(Debug, Clone)]
pub(crate) enum MockBehavior {
    /// Render completes; the container holds `svg` and measures `bbox`.
    Succeed { svg: String, bbox: BoundingBox },
    /// The library reported an error marker with this message.
    FailWith { message: String },
    /// Neither marker ever appears; callers should time out.
    NeverComplete,
    /// Render completes but the container measures zero extent.
    ZeroSize,
    /// The engine cannot be launched at all.
    LaunchFailure,
}

impl MockBehavior {
    pub(crate) fn succeed_with_svg(svg: &str) -> Self {
        Self::Succeed {
            svg: svg.to_owned(),
            bbox: BoundingBox { x: 8.0, y: 8.0, width: 320.0, height: 200.0 },
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockStats {
    pub pages_opened: AtomicUsize,
    pub pages_closed: AtomicUsize,
    pub engine_closed: AtomicUsize,
}

pub(crate) struct MockFactory {
    behavior: MockBehavior,
    stats: Arc<MockStats>,
    launches: Arc<AtomicUsize>,
}

impl MockFactory {
    pub(crate) fn new(behavior: MockBehavior) -> Self {
        Self { behavior, stats: Arc::new(MockStats::default()), launches: Arc::new(AtomicUsize::new(0)) }
    }

    pub(crate) fn stats(&self) -> Arc<MockStats> {
        self.stats.clone()
    }

    pub(crate) fn launch_count(&self) -> Arc<AtomicUsize> {
        self.launches.clone()
    }
}

#[async_trait]
impl EngineFactory for MockFactory {
    async fn launch(&self) -> Result<Arc<dyn RenderingEngine>, EngineError> {
        if matches!(self.behavior, MockBehavior::LaunchFailure) {
            return Err(EngineError::Launch("mock engine refused to start".to_owned()));
        }
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockEngine { behavior: self.behavior.clone(), stats: self.stats.clone() }))
    }
}

struct MockEngine {
    behavior: MockBehavior,
    stats: Arc<MockStats>,
}

#[async_trait]
impl RenderingEngine for MockEngine {
    async fn new_page(&self) -> Result<Box<dyn EnginePage>, EngineError> {
        self.stats.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockPage {
            behavior: self.behavior.clone(),
            stats: self.stats.clone(),
            html: None,
        }))
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.stats.engine_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockPage {
    behavior: MockBehavior,
    stats: Arc<MockStats>,
    html: Option<String>,
}

impl MockPage {
    fn completed(&self) -> bool {
        matches!(self.behavior, MockBehavior::Succeed { .. } | MockBehavior::ZeroSize)
    }
}

#[async_trait]
impl EnginePage for MockPage {
    async fn set_content(&mut self, html: &str) -> Result<(), EngineError> {
        self.html = Some(html.to_owned());
        Ok(())
    }

    async fn element_exists(&self, selector: &str) -> Result<bool, EngineError> {
        if selector == crate::render::html::ERROR_SELECTOR {
            return Ok(matches!(self.behavior, MockBehavior::FailWith { .. }));
        }
        if selector.contains("data-render-complete") || selector.contains(".plot-container") {
            return Ok(self.completed());
        }
        Ok(false)
    }

    async fn element_text(&self, selector: &str) -> Result<Option<String>, EngineError> {
        if selector == crate::render::html::ERROR_SELECTOR {
            if let MockBehavior::FailWith { message } = &self.behavior {
                return Ok(Some(message.clone()));
            }
        }
        Ok(None)
    }

    async fn element_outer_html(&self, selector: &str) -> Result<Option<String>, EngineError> {
        if selector.ends_with("svg") {
            if let MockBehavior::Succeed { svg, .. } = &self.behavior {
                return Ok(Some(svg.clone()));
            }
        }
        Ok(None)
    }

    async fn element_bounding_box(
        &self,
        _selector: &str,
    ) -> Result<Option<BoundingBox>, EngineError> {
        match &self.behavior {
            MockBehavior::Succeed { bbox, .. } => Ok(Some(*bbox)),
            MockBehavior::ZeroSize => {
                Ok(Some(BoundingBox { x: 0.0, y: 0.0, width: 0.0, height: 0.0 }))
            }
            _ => Ok(None),
        }
    }

    async fn screenshot(
        &self,
        _clip: BoundingBox,
        format: CaptureFormat,
    ) -> Result<Vec<u8>, EngineError> {
        match format {
            CaptureFormat::Png => Ok(MOCK_PNG_BYTES.to_vec()),
            CaptureFormat::Jpeg { quality } => {
                let mut bytes = MOCK_JPEG_PREFIX.to_vec();
                bytes.push(quality);
                Ok(bytes)
            }
        }
    }

    async fn pdf(&self) -> Result<Vec<u8>, EngineError> {
        Ok(MOCK_PDF_BYTES.to_vec())
    }

    async fn close(&mut self) -> Result<(), EngineError> {
        self.stats.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
