//! Tool argument and result types exposed over MCP.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::render::mermaid::{FlowchartOptions, MermaidTheme, SequenceOptions};
use crate::render::{DeliveryMode, PixelSize, RenderFormat};

pub const DEFAULT_QUALITY: u8 = 90;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenderMermaidParams {
    /// Mermaid diagram source text.
    pub mermaid_code: String,
    /// Output format; defaults to svg.
    #[serde(default)]
    pub format: RenderFormat,
    /// Mermaid theme; defaults to default.
    #[serde(default)]
    pub theme: MermaidTheme,
    /// CSS background color for the rendered document.
    pub background_color: Option<String>,
    /// Explicit output path, honored when `output` is `filepath`.
    pub file_path: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// JPEG quality, 1-100; defaults to 90.
    pub quality: Option<u8>,
    /// Delivery mode; defaults to link.
    #[serde(default)]
    pub output: DeliveryMode,
    pub font_family: Option<String>,
    pub font_size: Option<u32>,
    pub dark_mode: Option<bool>,
    pub html_labels: Option<bool>,
    pub max_text_size: Option<u64>,
    pub flowchart: Option<FlowchartOptions>,
    pub sequence: Option<SequenceOptions>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenderPlotlyParams {
    /// Plotly JS code; must target the container id `plotly-chart`.
    pub plotly_code: String,
    /// Output format; defaults to svg.
    #[serde(default)]
    pub format: RenderFormat,
    /// CSS background color for the rendered document.
    pub background_color: Option<String>,
    /// Explicit output path, honored when `output` is `filepath`.
    pub file_path: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// JPEG quality, 1-100; defaults to 90.
    pub quality: Option<u8>,
    /// Delivery mode; defaults to link.
    #[serde(default)]
    pub output: DeliveryMode,
    /// Resize the chart with its container; defaults to true.
    pub responsive: Option<bool>,
    /// Show the Plotly mode bar; defaults to false.
    pub display_mode_bar: Option<bool>,
    pub mode_bar_buttons_to_remove: Option<Vec<String>>,
    /// Show the Plotly logo in the mode bar; defaults to false.
    pub displaylogo: Option<bool>,
}

/// The one result shape both tools return, success or failure. Exactly one of
/// `data`/`error` is populated.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<PixelSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn failure(format: RenderFormat, error: String) -> Self {
        Self {
            success: false,
            data: None,
            format: format.as_str().to_owned(),
            size: None,
            output_type: None,
            error: Some(error),
        }
    }
}
