//! Per-request HTML document synthesis.
//!
//! The document shell is a template; diagram source and library configuration
//! are serialized to JSON literals before interpolation, so untrusted source
//! text never reshapes the surrounding markup.

use askama::Template;

use super::{PixelSize, RenderError};

pub(crate) const MERMAID_LIBRARY_URL: &str =
    "https://cdn.jsdelivr.net/npm/mermaid@11/dist/mermaid.min.js";
pub(crate) const PLOTLY_LIBRARY_URL: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// Element the render script creates (with the library's error text) on failure.
pub(crate) const ERROR_SELECTOR: &str = "#render-error";

pub(crate) const MERMAID_CONTAINER_SELECTOR: &str = "#container";
pub(crate) const MERMAID_READY_SELECTOR: &str = "#container[data-render-complete=\"true\"]";
pub(crate) const MERMAID_SVG_SELECTOR: &str = "#container svg";

/// Container id Plotly chart code must target; provided by the template.
pub const PLOTLY_CONTAINER_ID: &str = "plotly-chart";
pub(crate) const PLOTLY_CONTAINER_SELECTOR: &str = "#plotly-chart";
pub(crate) const PLOTLY_READY_SELECTOR: &str = "#plotly-chart .plot-container";
pub(crate) const PLOTLY_SVG_SELECTOR: &str = "#plotly-chart svg";

pub(crate) const DEFAULT_BACKGROUND: &str = "white";

/// Serialize a value into a JS literal safe to embed in a `<script>` block.
/// serde_json leaves `<` alone, which would let `</script>` in diagram source
/// terminate the block, so it is escaped here.
fn js_literal(value: &serde_json::Value) -> String {
    value.to_string().replace('<', "\\u003c")
}

#[derive(Template)]
#[template(path = "mermaid.html")]
struct MermaidDocument<'a> {
    background_color: &'a str,
    library_url: &'a str,
    source_json: String,
    config_json: String,
}

#[derive(Template)]
#[template(path = "plotly.html")]
struct PlotlyDocument<'a> {
    background_color: &'a str,
    library_url: &'a str,
    config_json: String,
    chart_code: &'a str,
    explicit_size: Option<PixelSize>,
}

pub(crate) fn mermaid_document(
    source: &str,
    config: &serde_json::Value,
    background_color: Option<&str>,
) -> Result<String, RenderError> {
    let document = MermaidDocument {
        background_color: background_color.unwrap_or(DEFAULT_BACKGROUND),
        library_url: MERMAID_LIBRARY_URL,
        source_json: js_literal(&serde_json::Value::String(source.to_owned())),
        config_json: js_literal(config),
    };
    Ok(document.render()?)
}

pub(crate) fn plotly_document(
    chart_code: &str,
    config: &serde_json::Value,
    background_color: Option<&str>,
    explicit_size: Option<PixelSize>,
) -> Result<String, RenderError> {
    let document = PlotlyDocument {
        background_color: background_color.unwrap_or(DEFAULT_BACKGROUND),
        library_url: PLOTLY_LIBRARY_URL,
        config_json: js_literal(config),
        chart_code,
        explicit_size,
    };
    Ok(document.render()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mermaid_source_is_embedded_as_a_json_literal() {
        let source = "graph TD\n  A[\"</script><script>alert(1)</script>\"] --> B";
        let html = mermaid_document(source, &serde_json::json!({ "theme": "default" }), None)
            .expect("document");
        // The raw closing tag from the source must not appear verbatim.
        assert!(!html.contains("</script><script>alert(1)"));
        assert!(html.contains("u003c/script"));
        assert!(html.contains("mermaid.initialize"));
    }

    #[test]
    fn mermaid_background_is_escaped_into_the_stylesheet() {
        let html = mermaid_document(
            "graph TD\n A --> B",
            &serde_json::json!({}),
            Some("white\"><script>"),
        )
        .expect("document");
        assert!(!html.contains("white\"><script>"));
    }

    #[test]
    fn plotly_document_carries_config_and_size() {
        let html = plotly_document(
            "Plotly.newPlot('plotly-chart', [], {});",
            &serde_json::json!({ "responsive": true, "displaylogo": false }),
            Some("black"),
            Some(PixelSize { width: 640, height: 480 }),
        )
        .expect("document");
        assert!(html.contains("\"responsive\":true"));
        assert!(html.contains("width:640px;height:480px"));
        assert!(html.contains("background: black"));
        assert!(html.contains("Plotly.newPlot('plotly-chart', [], {});"));
    }
}
