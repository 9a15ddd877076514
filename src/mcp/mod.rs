//! Model Context Protocol (MCP) server surface.
//!
//! Registers the two render tools, dispatches tool calls to the renderers,
//! and normalizes every outcome into one structured result shape.

mod server;
mod types;

pub use server::RenderServer;
pub use types::{RenderMermaidParams, RenderPlotlyParams, ToolOutcome};
