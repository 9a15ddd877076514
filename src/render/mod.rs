//! Render-request domain types shared by both renderers.
//!
//! Formats and delivery modes are closed tagged unions validated once at the
//! protocol boundary; everything downstream matches on them instead of
//! re-checking strings.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::{
    poll_until, BoundingBox, CaptureFormat, EngineError, EnginePage, PollOutcome, Probe,
    POLL_INTERVAL,
};

pub mod html;
pub mod mermaid;
pub mod plotly;

/// Output format for a rendered diagram or chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    #[default]
    Svg,
    Png,
    #[serde(alias = "jpeg")]
    Jpg,
    Pdf,
}

impl RenderFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Pdf => "pdf",
        }
    }

    pub fn extension(self) -> &'static str {
        self.as_str()
    }

    /// Vector output is extracted from the DOM as text, never screenshotted.
    pub fn is_vector(self) -> bool {
        matches!(self, Self::Svg)
    }
}

/// How a rendered artifact is handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    #[default]
    Link,
    #[serde(rename = "filepath")]
    FilePath,
    Raw,
}

impl DeliveryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Link => "link",
            Self::FilePath => "filepath",
            Self::Raw => "raw",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

/// The single internal currency between renderers and output delivery.
/// `payload` is SVG markup for vector output, base64 text otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutput {
    pub format: RenderFormat,
    pub payload: String,
    pub size: Option<PixelSize>,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("diagram source is empty")]
    EmptySource,
    #[error("invalid option: {0}")]
    InvalidOption(String),
    #[error("{0}")]
    Syntax(String),
    #[error("render timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("could not measure diagram: rendered element has zero size")]
    ZeroSize,
    #[error("failed to build render document: {0}")]
    Template(#[from] askama::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Wait for the document to reach a terminal render state: the ready marker,
/// the error marker (error text attached), or the deadline.
pub(crate) async fn poll_for_render(
    page: &dyn EnginePage,
    ready_selector: &str,
    deadline: Duration,
) -> Result<PollOutcome<()>, EngineError> {
    poll_until(deadline, POLL_INTERVAL, || probe_document(page, ready_selector)).await
}

async fn probe_document(
    page: &dyn EnginePage,
    ready_selector: &str,
) -> Result<Probe<()>, EngineError> {
    if page.element_exists(html::ERROR_SELECTOR).await? {
        let message = page
            .element_text(html::ERROR_SELECTOR)
            .await?
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| "unknown render error".to_owned());
        return Ok(Probe::Errored(message));
    }
    if page.element_exists(ready_selector).await? {
        return Ok(Probe::Ready(()));
    }
    Ok(Probe::Pending)
}

pub(crate) struct CaptureSpec {
    pub format: RenderFormat,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: u8,
}

/// Measure the container and capture a raster screenshot or PDF, base64-encoded.
pub(crate) async fn capture_snapshot(
    page: &dyn EnginePage,
    container_selector: &str,
    spec: &CaptureSpec,
) -> Result<RenderOutput, RenderError> {
    let bbox = page
        .element_bounding_box(container_selector)
        .await?
        .ok_or(RenderError::ZeroSize)?;
    if bbox.is_empty() {
        return Err(RenderError::ZeroSize);
    }

    let clip = BoundingBox {
        x: bbox.x,
        y: bbox.y,
        width: spec.width.map(f64::from).unwrap_or(bbox.width),
        height: spec.height.map(f64::from).unwrap_or(bbox.height),
    };
    let size = PixelSize { width: clip.width.round() as u32, height: clip.height.round() as u32 };

    let bytes = match spec.format {
        RenderFormat::Svg => {
            return Err(RenderError::InvalidOption(
                "vector output has no snapshot step".to_owned(),
            ));
        }
        RenderFormat::Pdf => page.pdf().await?,
        RenderFormat::Png => page.screenshot(clip, CaptureFormat::Png).await?,
        RenderFormat::Jpg => {
            page.screenshot(clip, CaptureFormat::Jpeg { quality: spec.quality }).await?
        }
    };
    if bytes.is_empty() {
        return Err(RenderError::Engine(EngineError::Capture(
            "engine returned an empty capture".to_owned(),
        )));
    }

    Ok(RenderOutput { format: spec.format, payload: BASE64.encode(bytes), size: Some(size) })
}
