//! MCP surface for codectx.
//!
//! A thin protocol layer over [`codectx_application::CodeContext`] built on
//! the rmcp SDK: argument structs with derived schemas, a tool registry and
//! router, per-tool handlers, response formatting and the `ServerHandler`
//! implementation served over stdio. Operational failures are reported in
//! tool result bodies; only startup failures terminate the process.

pub mod args;
pub mod formatter;
pub mod handlers;
pub mod mcp_server;
pub mod paths;
pub mod tools;

pub use handlers::ToolHandlers;
pub use mcp_server::McpServer;
