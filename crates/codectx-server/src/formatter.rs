//! Tool response formatting
//!
//! Every tool answers with MCP text content. Operational failures are
//! error-flagged results, not protocol errors or process exits; the
//! collection-limit case is deliberately success-shaped with the backend's
//! canonical message.

use rmcp::model::{CallToolResult, Content};

/// Response formatter for MCP server tools
pub struct ResponseFormatter;

impl ResponseFormatter {
    /// A successful text response
    pub fn text(text: impl Into<String>) -> CallToolResult {
        CallToolResult::success(vec![Content::text(text.into())])
    }

    /// A successful response carrying structured JSON
    pub fn json_payload(value: &serde_json::Value) -> CallToolResult {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        Self::text(text)
    }

    /// An operational failure, reported in the result body
    pub fn error(message: impl Into<String>) -> CallToolResult {
        CallToolResult::error(vec![Content::text(message.into())])
    }
}
