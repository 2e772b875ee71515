//! Tool Router Module
//!
//! Routes incoming tool call requests to the appropriate handlers.
//! Argument parsing failures and unknown tool names are protocol errors;
//! operational failures stay inside the tool result body.

use rmcp::model::{CallToolRequestParam, CallToolResult};
use rmcp::ErrorData as McpError;

use crate::args::{ClearIndexArgs, GetIndexingStatusArgs, IndexCodebaseArgs, SearchCodeArgs};
use crate::handlers::ToolHandlers;

/// Route a tool call request to the appropriate handler
pub async fn route_tool_call(
    request: CallToolRequestParam,
    handlers: &ToolHandlers,
) -> Result<CallToolResult, McpError> {
    match request.name.as_ref() {
        "index_codebase" => {
            let args = parse_args::<IndexCodebaseArgs>(&request)?;
            Ok(handlers.index_codebase(args).await)
        }
        "search_code" => {
            let args = parse_args::<SearchCodeArgs>(&request)?;
            Ok(handlers.search_code(args).await)
        }
        "clear_index" => {
            let args = parse_args::<ClearIndexArgs>(&request)?;
            Ok(handlers.clear_index(args).await)
        }
        "get_indexing_status" => {
            let args = parse_args::<GetIndexingStatusArgs>(&request)?;
            Ok(handlers.get_indexing_status(args).await)
        }
        _ => Err(McpError::invalid_params(
            format!("Unknown tool: {}", request.name),
            None,
        )),
    }
}

/// Parse request arguments into the expected type
fn parse_args<T: serde::de::DeserializeOwned>(
    request: &CallToolRequestParam,
) -> Result<T, McpError> {
    let args_value = serde_json::Value::Object(request.arguments.clone().unwrap_or_default());
    serde_json::from_value(args_value)
        .map_err(|e| McpError::invalid_params(format!("Invalid arguments: {}", e), None))
}
