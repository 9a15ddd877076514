//! Limner: Mermaid diagram and Plotly chart rendering exposed as MCP tools.
//!
//! A client sends diagram or chart source plus styling/output options over the
//! Model Context Protocol; the server renders it in a headless browser and
//! hands the artifact back inline, as a saved file path, or as a served URL.

pub mod config;
pub mod engine;
pub mod mcp;
pub mod output;
pub mod render;
