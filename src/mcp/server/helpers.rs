/// Map schema-validated tool params onto renderer requests, applying the
/// documented defaults.
fn mermaid_request_from_params(
    params: RenderMermaidParams,
) -> crate::render::mermaid::MermaidRequest {
    crate::render::mermaid::MermaidRequest {
        source: params.mermaid_code,
        format: params.format,
        theme: params.theme,
        background_color: params.background_color,
        width: params.width,
        height: params.height,
        quality: params.quality.unwrap_or(DEFAULT_QUALITY),
        font_family: params.font_family,
        font_size: params.font_size,
        dark_mode: params.dark_mode,
        html_labels: params.html_labels,
        max_text_size: params.max_text_size,
        flowchart: params.flowchart,
        sequence: params.sequence,
    }
}

fn plotly_request_from_params(params: RenderPlotlyParams) -> crate::render::plotly::PlotlyRequest {
    crate::render::plotly::PlotlyRequest {
        source: params.plotly_code,
        format: params.format,
        background_color: params.background_color,
        width: params.width,
        height: params.height,
        quality: params.quality.unwrap_or(DEFAULT_QUALITY),
        responsive: params.responsive.unwrap_or(true),
        display_mode_bar: params.display_mode_bar.unwrap_or(false),
        mode_bar_buttons_to_remove: params.mode_bar_buttons_to_remove.unwrap_or_default(),
        displaylogo: params.displaylogo.unwrap_or(false),
    }
}

/// Status/info document served at `GET /`: configured tools and settings.
fn info_document(settings: &Settings) -> serde_json::Value {
    serde_json::json!({
        "name": "limner",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "mcp": "/mcp",
            "static": "/static",
        },
        "tools": [
            {
                "name": "render_mermaid",
                "description": "Render Mermaid diagram source to SVG/PNG/JPG/PDF",
                "defaults": { "format": "svg", "theme": "default", "quality": DEFAULT_QUALITY, "output": "link" },
            },
            {
                "name": "render_plotly",
                "description": "Render Plotly chart code to SVG/PNG/JPG/PDF",
                "defaults": { "format": "svg", "quality": DEFAULT_QUALITY, "output": "link", "responsive": true, "displayModeBar": false },
            },
        ],
        "settings": {
            "port": settings.port,
            "staticDir": settings.static_dir.display().to_string(),
            "allowedDirs": settings
                .allowed_dirs
                .iter()
                .map(|dir| dir.display().to_string())
                .collect::<Vec<_>>(),
        },
    })
}
