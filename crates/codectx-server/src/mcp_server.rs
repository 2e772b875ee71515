//! MCP Server Implementation
//!
//! Core MCP protocol server over the rmcp SDK. Tool listing and dispatch
//! live in the registry and router; this type only implements the
//! `ServerHandler` surface and the stdio transport wiring. stdout carries
//! protocol frames, so all diagnostics go to stderr through tracing.

use std::sync::Arc;

use rmcp::model::{
    CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
    ServerCapabilities, ServerInfo,
};
use rmcp::transport::stdio;
use rmcp::ErrorData as McpError;
use rmcp::{ServerHandler, ServiceExt};

use codectx_application::CodeContext;

use crate::handlers::ToolHandlers;
use crate::tools::{create_tool_list, route_tool_call};

/// Core MCP server for semantic code search
#[derive(Clone)]
pub struct McpServer {
    handlers: Arc<ToolHandlers>,
}

impl McpServer {
    /// Server over the shared context façade
    pub fn new(context: Arc<CodeContext>) -> Self {
        Self {
            handlers: Arc::new(ToolHandlers::new(context)),
        }
    }

    /// Serve the MCP protocol over stdio until the peer disconnects
    pub async fn serve_stdio(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!("codectx ready; serving MCP on stdio");

        let service = self
            .serve(stdio())
            .await
            .map_err(|e| format!("Failed to start MCP service: {e:?}"))?;

        service
            .waiting()
            .await
            .map_err(|e| format!("MCP service error: {e:?}"))?;

        tracing::info!("MCP service finished; stdin closed");
        Ok(())
    }
}

impl ServerHandler for McpServer {
    /// Get server information and capabilities
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "codectx".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "codectx - Semantic Code Search\n\n\
                 Indexes source repositories into a vector database and serves\n\
                 natural-language code search.\n\n\
                 Tools:\n\
                 - index_codebase: Build a semantic index for a directory\n\
                 - search_code: Query indexed code using natural language\n\
                 - get_indexing_status: Inspect per-codebase indexing state\n\
                 - clear_index: Remove a codebase's index\n"
                    .to_string(),
            ),
        }
    }

    /// List available tools
    async fn list_tools(
        &self,
        _pagination: Option<PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let tools = create_tool_list()?;
        Ok(ListToolsResult {
            tools,
            meta: Default::default(),
            next_cursor: None,
        })
    }

    /// Call a tool
    async fn call_tool(
        &self,
        request: rmcp::model::CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        route_tool_call(request, &self.handlers).await
    }
}
