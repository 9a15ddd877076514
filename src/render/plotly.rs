//! Plotly chart renderer.
//!
//! Unlike Mermaid, chart source is executable Plotly code targeting the
//! container the document template provides; completion is observed through
//! the plot container the library injects.

use std::time::Duration;

use tracing::{debug, warn};

use crate::engine::{EngineError, EngineFactory, EngineHandle, EnginePage, PollOutcome};

use super::html::PLOTLY_CONTAINER_ID;
use super::{
    capture_snapshot, html, poll_for_render, CaptureSpec, PixelSize, RenderError, RenderFormat,
    RenderOutput,
};

pub const PLOTLY_RENDER_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct PlotlyRequest {
    /// Plotly JS code; must target the `plotly-chart` container.
    pub source: String,
    pub format: RenderFormat,
    pub background_color: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// JPEG quality, 1-100; meaningful only for lossy raster output.
    pub quality: u8,
    pub responsive: bool,
    pub display_mode_bar: bool,
    pub mode_bar_buttons_to_remove: Vec<String>,
    pub displaylogo: bool,
}

impl Default for PlotlyRequest {
    fn default() -> Self {
        Self {
            source: String::new(),
            format: RenderFormat::default(),
            background_color: None,
            width: None,
            height: None,
            quality: 90,
            responsive: true,
            display_mode_bar: false,
            mode_bar_buttons_to_remove: Vec::new(),
            displaylogo: false,
        }
    }
}

impl PlotlyRequest {
    fn validate(&self) -> Result<(), RenderError> {
        if self.source.trim().is_empty() {
            return Err(RenderError::EmptySource);
        }
        if !self.source.contains(PLOTLY_CONTAINER_ID) {
            return Err(RenderError::InvalidOption(format!(
                "plotly code must contain id '{PLOTLY_CONTAINER_ID}'"
            )));
        }
        if self.quality == 0 || self.quality > 100 {
            return Err(RenderError::InvalidOption(format!(
                "quality must be between 1 and 100, got {}",
                self.quality
            )));
        }
        if self.width == Some(0) || self.height == Some(0) {
            return Err(RenderError::InvalidOption("width and height must be positive".to_owned()));
        }
        Ok(())
    }

    fn base_config(&self) -> serde_json::Value {
        serde_json::json!({
            "responsive": self.responsive,
            "displayModeBar": self.display_mode_bar,
            "modeBarButtonsToRemove": self.mode_bar_buttons_to_remove,
            "displaylogo": self.displaylogo,
        })
    }

    fn explicit_size(&self) -> Option<PixelSize> {
        match (self.width, self.height) {
            (Some(width), Some(height)) => Some(PixelSize { width, height }),
            _ => None,
        }
    }
}

/// Owns one lazily launched engine instance, independent of the Mermaid
/// renderer's; each render call gets its own isolated page.
pub struct PlotlyRenderer {
    engine: EngineHandle,
    timeout: Duration,
}

impl PlotlyRenderer {
    pub fn new(factory: Box<dyn EngineFactory>) -> Self {
        Self { engine: EngineHandle::new(factory), timeout: PLOTLY_RENDER_TIMEOUT }
    }

    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.engine.close_if_open().await
    }

    pub async fn render(&self, request: &PlotlyRequest) -> Result<RenderOutput, RenderError> {
        request.validate()?;

        let engine = self.engine.get_or_create().await?;
        let mut page = engine.new_page().await?;
        let result = self.render_on_page(page.as_mut(), request).await;
        if let Err(err) = page.close().await {
            warn!(error = %err, "failed to close plotly render page");
        }
        result
    }

    async fn render_on_page(
        &self,
        page: &mut dyn EnginePage,
        request: &PlotlyRequest,
    ) -> Result<RenderOutput, RenderError> {
        let document = html::plotly_document(
            &request.source,
            &request.base_config(),
            request.background_color.as_deref(),
            request.explicit_size(),
        )?;
        page.set_content(&document).await?;

        match poll_for_render(page, html::PLOTLY_READY_SELECTOR, self.timeout).await? {
            PollOutcome::Ready(()) => {}
            PollOutcome::Errored(message) => {
                return Err(RenderError::Syntax(format!("Plotly render error: {message}")));
            }
            PollOutcome::TimedOut => return Err(RenderError::Timeout(self.timeout)),
        }
        debug!(format = request.format.as_str(), "plotly chart reached ready state");

        if request.format.is_vector() {
            let svg = page
                .element_outer_html(html::PLOTLY_SVG_SELECTOR)
                .await?
                .ok_or_else(|| {
                    RenderError::Syntax("rendered chart contains no SVG element".to_owned())
                })?;
            return Ok(RenderOutput { format: RenderFormat::Svg, payload: svg, size: None });
        }

        capture_snapshot(
            page,
            html::PLOTLY_CONTAINER_SELECTOR,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::{MockBehavior, MockFactory};
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use std::sync::atomic::Ordering;

    const CHART: &str = "Plotly.newPlot('plotly-chart', [{ y: [1, 2, 3] }], {});";

    fn renderer(
        behavior: MockBehavior,
    ) -> (PlotlyRenderer, std::sync::Arc<crate::engine::mock::MockStats>) {
        let factory = MockFactory::new(behavior);
        let stats = factory.stats();
        (PlotlyRenderer::new(Box::new(factory)), stats)
    }

    fn request(source: &str, format: RenderFormat) -> PlotlyRequest {
        PlotlyRequest { source: source.to_owned(), format, ..PlotlyRequest::default() }
    }

    #[tokio::test]
    async fn renders_svg_from_the_chart_dom() {
        let (renderer, _) = renderer(MockBehavior::succeed_with_svg("<svg class=\"main-svg\"/>"));
        let output = renderer.render(&request(CHART, RenderFormat::Svg)).await.expect("render");
        assert!(output.payload.starts_with("<svg"));
        assert!(output.size.is_none());
    }

    #[tokio::test]
    async fn renders_png_payload_that_decodes_non_empty() {
        let (renderer, _) = renderer(MockBehavior::succeed_with_svg("<svg/>"));
        let output = renderer.render(&request(CHART, RenderFormat::Png)).await.expect("render");
        let bytes = BASE64.decode(output.payload.as_bytes()).expect("base64");
        assert!(!bytes.is_empty());
    }

    #[tokio::test]
    async fn code_without_the_container_id_never_reaches_the_engine() {
        let (renderer, stats) = renderer(MockBehavior::succeed_with_svg("<svg/>"));
        let err = renderer
            .render(&request("Plotly.newPlot('elsewhere', [], {});", RenderFormat::Svg))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must contain id 'plotly-chart'"));
        assert_eq!(stats.pages_opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn chart_errors_surface_with_the_reported_message() {
        let (renderer, _) =
            renderer(MockBehavior::FailWith { message: "data must be an array".to_owned() });
        let err = renderer.render(&request(CHART, RenderFormat::Svg)).await.unwrap_err();
        assert!(err.to_string().contains("Plotly render error: data must be an array"));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_the_plot_never_appears() {
        let (renderer, _) = renderer(MockBehavior::NeverComplete);
        let err = renderer.render(&request(CHART, RenderFormat::Png)).await.unwrap_err();
        assert!(matches!(err, RenderError::Timeout(_)));
    }

    #[test]
    fn base_config_reflects_mode_bar_options() {
        let req = PlotlyRequest {
            source: CHART.to_owned(),
            display_mode_bar: true,
            mode_bar_buttons_to_remove: vec!["zoom2d".to_owned(), "pan2d".to_owned()],
            ..PlotlyRequest::default()
        };
        let config = req.base_config();
        assert_eq!(config["responsive"], true);
        assert_eq!(config["displayModeBar"], true);
        assert_eq!(config["displaylogo"], false);
        assert_eq!(config["modeBarButtonsToRemove"][1], "pan2d");
    }

    #[test]
    fn explicit_size_requires_both_dimensions() {
        let mut req = PlotlyRequest { source: CHART.to_owned(), ..PlotlyRequest::default() };
        req.width = Some(640);
        assert!(req.explicit_size().is_none());
        req.height = Some(480);
        assert_eq!(req.explicit_size(), Some(PixelSize { width: 640, height: 480 }));
    }
}
