//! Agent-callable tool abstraction and the registry tools are published through.
//!
//! Tool providers (e.g. the CalDAV tools) implement [`AgentTool`]; servers
//! (e.g. the MCP server) look tools up by name in a [`ToolRegistry`].

pub mod tool_registry;

pub use tool_registry::{AgentTool, ToolRegistry};
