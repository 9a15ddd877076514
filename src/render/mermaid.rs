//! Mermaid diagram renderer.

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::engine::{EngineError, EngineFactory, EngineHandle, EnginePage, PollOutcome};

use super::{
    capture_snapshot, html, poll_for_render, CaptureSpec, RenderError, RenderFormat, RenderOutput,
};

pub const MERMAID_RENDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Mermaid theme names accepted by the library's `initialize` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MermaidTheme {
    #[default]
    Default,
    Base,
    Dark,
    Forest,
    Neutral,
    Null,
}

impl MermaidTheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Base => "base",
            Self::Dark => "dark",
            Self::Forest => "forest",
            Self::Neutral => "neutral",
            Self::Null => "null",
        }
    }
}

/// Flowchart edge curve interpolation styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum CurveStyle {
    Basis,
    BumpX,
    BumpY,
    Cardinal,
    CatmullRom,
    Linear,
    MonotoneX,
    MonotoneY,
    Natural,
    Step,
    StepAfter,
    StepBefore,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlowchartOptions {
    pub use_max_width: Option<bool>,
    pub html_labels: Option<bool>,
    pub curve: Option<CurveStyle>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SequenceOptions {
    pub show_sequence_numbers: Option<bool>,
    pub mirror_actors: Option<bool>,
    pub right_angles: Option<bool>,
    pub wrap: Option<bool>,
}

/// A schema-valid Mermaid render request. Numeric ranges and source shape are
/// still rechecked here so malformed input never reaches the engine.
#[derive(Debug, Clone)]
pub struct MermaidRequest {
    pub source: String,
    pub format: RenderFormat,
    pub theme: MermaidTheme,
    pub background_color: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// JPEG quality, 1-100; meaningful only for lossy raster output.
    pub quality: u8,
    pub font_family: Option<String>,
    pub font_size: Option<u32>,
    pub dark_mode: Option<bool>,
    pub html_labels: Option<bool>,
    pub max_text_size: Option<u64>,
    pub flowchart: Option<FlowchartOptions>,
    pub sequence: Option<SequenceOptions>,
}

impl Default for MermaidRequest {
    fn default() -> Self {
        Self {
            source: String::new(),
            format: RenderFormat::default(),
            theme: MermaidTheme::default(),
            background_color: None,
            width: None,
            height: None,
            quality: 90,
            font_family: None,
            font_size: None,
            dark_mode: None,
            html_labels: None,
            max_text_size: None,
            flowchart: None,
            sequence: None,
        }
    }
}

impl MermaidRequest {
    fn validate(&self) -> Result<(), RenderError> {
        if self.source.trim().is_empty() {
            return Err(RenderError::EmptySource);
        }
        if self.quality == 0 || self.quality > 100 {
            return Err(RenderError::InvalidOption(format!(
                "quality must be between 1 and 100, got {}",
                self.quality
            )));
        }
        for (name, value) in [
            ("width", self.width),
            ("height", self.height),
            ("fontSize", self.font_size),
        ] {
            if value == Some(0) {
                return Err(RenderError::InvalidOption(format!("{name} must be positive")));
            }
        }
        Ok(())
    }

    fn initialize_config(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("startOnLoad".to_owned(), serde_json::json!(false));
        map.insert("securityLevel".to_owned(), serde_json::json!("loose"));
        map.insert("theme".to_owned(), serde_json::json!(self.theme.as_str()));
        if let Some(font_family) = &self.font_family {
            map.insert("fontFamily".to_owned(), serde_json::json!(font_family));
        }
        if let Some(font_size) = self.font_size {
            map.insert("fontSize".to_owned(), serde_json::json!(font_size));
        }
        if let Some(dark_mode) = self.dark_mode {
            map.insert("darkMode".to_owned(), serde_json::json!(dark_mode));
        }
        if let Some(html_labels) = self.html_labels {
            map.insert("htmlLabels".to_owned(), serde_json::json!(html_labels));
        }
        if let Some(max_text_size) = self.max_text_size {
            map.insert("maxTextSize".to_owned(), serde_json::json!(max_text_size));
        }
        if let Some(flowchart) = &self.flowchart {
            let mut section = serde_json::Map::new();
            if let Some(use_max_width) = flowchart.use_max_width {
                section.insert("useMaxWidth".to_owned(), serde_json::json!(use_max_width));
            }
            if let Some(html_labels) = flowchart.html_labels {
                section.insert("htmlLabels".to_owned(), serde_json::json!(html_labels));
            }
            if let Some(curve) = flowchart.curve {
                section.insert("curve".to_owned(), serde_json::json!(curve));
            }
            map.insert("flowchart".to_owned(), serde_json::Value::Object(section));
        }
        if let Some(sequence) = &self.sequence {
            let mut section = serde_json::Map::new();
            if let Some(value) = sequence.show_sequence_numbers {
                section.insert("showSequenceNumbers".to_owned(), serde_json::json!(value));
            }
            if let Some(value) = sequence.mirror_actors {
                section.insert("mirrorActors".to_owned(), serde_json::json!(value));
            }
            if let Some(value) = sequence.right_angles {
                section.insert("rightAngles".to_owned(), serde_json::json!(value));
            }
            if let Some(value) = sequence.wrap {
                section.insert("wrap".to_owned(), serde_json::json!(value));
            }
            map.insert("sequence".to_owned(), serde_json::Value::Object(section));
        }
        serde_json::Value::Object(map)
    }
}

/// Owns one lazily launched engine instance for the process lifetime. Each
/// render call gets its own isolated page on that engine.
pub struct MermaidRenderer {
    engine: EngineHandle,
    timeout: Duration,
}

impl MermaidRenderer {
    pub fn new(factory: Box<dyn EngineFactory>) -> Self {
        Self { engine: EngineHandle::new(factory), timeout: MERMAID_RENDER_TIMEOUT }
    }

    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.engine.close_if_open().await
    }

    pub async fn render(&self, request: &MermaidRequest) -> Result<RenderOutput, RenderError> {
        request.validate()?;

        let engine = self.engine.get_or_create().await?;
        let mut page = engine.new_page().await?;
        let result = self.render_on_page(page.as_mut(), request).await;
        // The page is closed whatever happened; leaking pages across calls is
        // the one way concurrent requests could interfere.
        if let Err(err) = page.close().await {
            warn!(error = %err, "failed to close mermaid render page");
        }
        result
    }

    async fn render_on_page(
        &self,
        page: &mut dyn EnginePage,
        request: &MermaidRequest,
    ) -> Result<RenderOutput, RenderError> {
        let document = html::mermaid_document(
            &request.source,
            &request.initialize_config(),
            request.background_color.as_deref(),
        )?;
        page.set_content(&document).await?;

        match poll_for_render(page, html::MERMAID_READY_SELECTOR, self.timeout).await? {
            PollOutcome::Ready(()) => {}
            PollOutcome::Errored(message) => {
                return Err(RenderError::Syntax(format!("Mermaid syntax error: {message}")));
            }
            PollOutcome::TimedOut => return Err(RenderError::Timeout(self.timeout)),
        }
        debug!(format = request.format.as_str(), "mermaid document reached ready state");

        if request.format.is_vector() {
            let svg = page
                .element_outer_html(html::MERMAID_SVG_SELECTOR)
                .await?
                .ok_or_else(|| {
                    RenderError::Syntax("rendered document contains no SVG element".to_owned())
                })?;
            return Ok(RenderOutput { format: RenderFormat::Svg, payload: svg, size: None });
        }

        capture_snapshot(
            page,
            html::MERMAID_CONTAINER_SELECTOR,
            &CaptureSpec {
                format: request.format,
                width: request.width,
                height: request.height,
                quality: request.quality,
            },
        )
        .await
    }
}
