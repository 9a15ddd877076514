use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::get;
use axum::Router;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::{Json, Parameters};
use rmcp::model::{ServerCapabilities, ServerInfo};
use rmcp::transport::{
    streamable_http_server::session::local::LocalSessionManager, StreamableHttpServerConfig,
    StreamableHttpService,
};
use rmcp::{tool, tool_handler, tool_router, ErrorData, ServerHandler, ServiceExt};
use tower_http::services::ServeDir;
use tracing::{info, warn};

use crate::config::Settings;
use crate::output::{FileManager, OutputRouter};
use crate::render::mermaid::MermaidRenderer;
use crate::render::plotly::PlotlyRenderer;
use crate::render::{DeliveryMode, RenderOutput};

use super::types::*;

#[derive(Clone)]
pub struct RenderServer {
    mermaid: Arc<MermaidRenderer>,
    plotly: Arc<PlotlyRenderer>,
    output: Arc<OutputRouter>,
    settings: Arc<Settings>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl RenderServer {
    pub fn new(settings: Settings, mermaid: MermaidRenderer, plotly: PlotlyRenderer) -> Self {
        let files = FileManager::new(settings.static_dir.clone(), settings.allowed_dirs.clone());
        let output = OutputRouter::new(files, settings.public_base_url());
        Self {
            mermaid: Arc::new(mermaid),
            plotly: Arc::new(plotly),
            output: Arc::new(output),
            settings: Arc::new(settings),
            tool_router: Self::tool_router(),
        }
    }

    /// Best-effort sweep of the temp directory. Invoked once per process,
    /// before any render traffic; failures never prevent serving.
    pub fn purge_temp_dir(&self) -> usize {
        self.output.purge_temp_dir()
    }

    /// Render Mermaid diagram source to SVG, PNG, JPG, or PDF and deliver the
    /// result as a served link (default), a saved file path, or the raw
    /// payload (SVG text / base64 binary).
    #[tool(name = "render_mermaid")]
    async fn render_mermaid(
        &self,
        params: Parameters<RenderMermaidParams>,
    ) -> Result<Json<ToolOutcome>, ErrorData> {
        let params = params.0;
        let started = Instant::now();
        let format = params.format;
        let delivery = params.output;
        let file_path = params.file_path.clone();

        let request = mermaid_request_from_params(params);
        let outcome = match self.mermaid.render(&request).await {
            Ok(output) => self.deliver_outcome(output, delivery, file_path.as_deref()),
            Err(err) => ToolOutcome::failure(format, format!("Failed to render diagram: {err}")),
        };

        info!(
            tool = "render_mermaid",
            format = format.as_str(),
            output = delivery.as_str(),
            success = outcome.success,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tool call completed"
        );
        Ok(Json(outcome))
    }

    /// Render Plotly chart code to SVG, PNG, JPG, or PDF and deliver the
    /// result as a served link (default), a saved file path, or the raw
    /// payload. The code must plot into the container id `plotly-chart`.
    #[tool(name = "render_plotly")]
    async fn render_plotly(
        &self,
        params: Parameters<RenderPlotlyParams>,
    ) -> Result<Json<ToolOutcome>, ErrorData> {
        let params = params.0;
        let started = Instant::now();
        let format = params.format;
        let delivery = params.output;
        let file_path = params.file_path.clone();

        let request = plotly_request_from_params(params);
        let outcome = match self.plotly.render(&request).await {
            Ok(output) => self.deliver_outcome(output, delivery, file_path.as_deref()),
            Err(err) => ToolOutcome::failure(format, format!("Failed to render chart: {err}")),
        };

        info!(
            tool = "render_plotly",
            format = format.as_str(),
            output = delivery.as_str(),
            success = outcome.success,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tool call completed"
        );
        Ok(Json(outcome))
    }

    fn deliver_outcome(
        &self,
        output: RenderOutput,
        mode: DeliveryMode,
        file_path: Option<&str>,
    ) -> ToolOutcome {
        match self.output.deliver(&output, mode, file_path.map(Path::new)) {
            Ok(delivered) => {
                let output_type = delivered.output_type().to_owned();
                ToolOutcome {
                    success: true,
                    format: output.format.as_str().to_owned(),
                    size: output.size,
                    output_type: Some(output_type),
                    data: Some(delivered.into_data()),
                    error: None,
                }
            }
            Err(err) => ToolOutcome::failure(
                output.format,
                format!("Failed to deliver rendered output: {err}"),
            ),
        }
    }

    async fn close_renderers(&self) {
        if let Err(err) = self.mermaid.shutdown().await {
            warn!(error = %err, "failed to close mermaid rendering engine");
        }
        if let Err(err) = self.plotly.shutdown().await {
            warn!(error = %err, "failed to close plotly rendering engine");
        }
    }

    /// Serve MCP over stdio until the client disconnects or a termination
    /// signal arrives, then release the rendering engines.
    pub async fn serve_stdio(self) -> Result<(), rmcp::RmcpError> {
        self.purge_temp_dir();
        let shutdown = self.clone();
        let service = self.serve((tokio::io::stdin(), tokio::io::stdout())).await?;
        tokio::select! {
            result = service.waiting() => {
                result?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
            }
        }
        shutdown.close_renderers().await;
        Ok(())
    }

    /// The HTTP surface: MCP under `/mcp`, an info document at `/`, and the
    /// temp directory served under `/static`.
    pub fn http_router(&self) -> Router {
        let session_manager = Arc::new(LocalSessionManager::default());
        let config = StreamableHttpServerConfig {
            stateful_mode: true,
            ..StreamableHttpServerConfig::default()
        };
        let mcp = self.clone();
        let mcp_service =
            StreamableHttpService::new(move || Ok(mcp.clone()), session_manager, config);

        let info = info_document(&self.settings);
        Router::new()
            .route("/", get(move || {
                let info = info.clone();
                async move { axum::Json(info) }
            }))
            .nest_service("/mcp", mcp_service)
            .nest_service("/static", ServeDir::new(self.settings.static_dir.clone()))
    }

    /// Serve MCP over streamable HTTP until a termination signal arrives,
    /// then shut the listener down within the configured grace period and
    /// release the rendering engines.
    pub async fn serve_http(self) -> Result<(), Box<dyn std::error::Error>> {
        self.purge_temp_dir();

        let listener =
            tokio::net::TcpListener::bind(("127.0.0.1", self.settings.port)).await?;
        info!(
            port = self.settings.port,
            static_dir = %self.settings.static_dir.display(),
            "serving MCP over streamable HTTP"
        );

        let router = self.http_router();
        let grace = self.settings.shutdown_grace;
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        tokio::signal::ctrl_c().await?;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(());
        match tokio::time::timeout(grace, &mut server).await {
            Ok(joined) => joined??,
            Err(_) => {
                warn!(grace_secs = grace.as_secs(), "graceful shutdown timed out; aborting");
                server.abort();
            }
        }

        self.close_renderers().await;
        Ok(())
    }
}

#[tool_handler]
impl ServerHandler for RenderServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Limner diagram rendering server (tools: render_mermaid, render_plotly). \
                 Both tools accept source text plus format/theme/output options and return \
                 {success, data, format, size, output_type, error}."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// Extracted request-mapping and info-document helpers for the tool handlers.
include!("server/helpers.rs");
