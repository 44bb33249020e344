//! MCP (Model Context Protocol) server for calmcp.
//!
//! This crate provides:
//! - JSON-RPC 2.0 / MCP protocol types (`types`)
//! - Transport-independent request dispatch over a tool registry (`server`)
//! - Streamable HTTP and legacy SSE transports on axum (`http`)
//! - Newline-delimited stdio transport (`stdio`)

pub mod error;
pub mod http;
pub mod server;
pub mod stdio;
pub mod types;

pub use {
    error::{Error, Result},
    server::McpServer,
    types::ServerInfo,
};
