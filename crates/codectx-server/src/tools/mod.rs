//! Tool registry and router for the MCP protocol

mod registry;
mod router;

pub use registry::{create_tool_list, ToolDefinitions};
pub use router::route_tool_call;
