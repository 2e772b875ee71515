//! Tool Registry Module
//!
//! Manages tool definitions and schema generation for the MCP protocol.
//! Schemas are derived from the argument structs so listing and parsing can
//! never drift apart.

use rmcp::model::Tool;
use rmcp::ErrorData as McpError;
use std::borrow::Cow;
use std::sync::Arc;

use crate::args::{ClearIndexArgs, GetIndexingStatusArgs, IndexCodebaseArgs, SearchCodeArgs};

/// Tool definitions for MCP protocol
pub struct ToolDefinitions;

impl ToolDefinitions {
    /// Get the index_codebase tool definition
    pub fn index_codebase() -> Result<Tool, McpError> {
        Self::create_tool(
            "index_codebase",
            "Index a codebase directory for semantic search using vector embeddings",
            schemars::schema_for!(IndexCodebaseArgs),
        )
    }

    /// Get the search_code tool definition
    pub fn search_code() -> Result<Tool, McpError> {
        Self::create_tool(
            "search_code",
            "Search an indexed codebase using natural language queries",
            schemars::schema_for!(SearchCodeArgs),
        )
    }

    /// Get the clear_index tool definition
    pub fn clear_index() -> Result<Tool, McpError> {
        Self::create_tool(
            "clear_index",
            "Remove a codebase's collection, snapshot and registry entry",
            schemars::schema_for!(ClearIndexArgs),
        )
    }

    /// Get the get_indexing_status tool definition
    pub fn get_indexing_status() -> Result<Tool, McpError> {
        Self::create_tool(
            "get_indexing_status",
            "Get per-codebase state or an aggregate report over all codebases",
            schemars::schema_for!(GetIndexingStatusArgs),
        )
    }

    /// Create a tool from schema
    fn create_tool(
        name: &'static str,
        description: &'static str,
        schema: schemars::Schema,
    ) -> Result<Tool, McpError> {
        let schema_value = serde_json::to_value(schema)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        let input_schema = schema_value
            .as_object()
            .ok_or_else(|| {
                McpError::internal_error(format!("Schema for {} is not an object", name), None)
            })?
            .clone();

        Ok(Tool {
            name: Cow::Borrowed(name),
            title: None,
            description: Some(Cow::Borrowed(description)),
            input_schema: Arc::new(input_schema),
            output_schema: None,
            annotations: None,
            icons: None,
            meta: Default::default(),
        })
    }
}

/// Create the complete list of available tools
///
/// Returns all tool definitions for the MCP list_tools response.
pub fn create_tool_list() -> Result<Vec<Tool>, McpError> {
    Ok(vec![
        ToolDefinitions::index_codebase()?,
        ToolDefinitions::search_code()?,
        ToolDefinitions::clear_index()?,
        ToolDefinitions::get_indexing_status()?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_list_covers_every_tool_with_object_schemas() {
        let tools = create_tool_list().unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_ref()).collect();
        assert_eq!(
            names,
            vec![
                "index_codebase",
                "search_code",
                "clear_index",
                "get_indexing_status"
            ]
        );
        for tool in &tools {
            assert!(tool.description.is_some());
            assert_eq!(
                tool.input_schema.get("type").and_then(|t| t.as_str()),
                Some("object"),
                "{} schema must be an object",
                tool.name
            );
        }
    }

    #[test]
    fn index_codebase_schema_names_its_fields() {
        let tool = ToolDefinitions::index_codebase().unwrap();
        let schema = serde_json::Value::Object((*tool.input_schema).clone());
        let properties = schema["properties"].as_object().unwrap();
        for field in ["path", "force", "splitter", "custom_extensions", "ignore_patterns"] {
            assert!(properties.contains_key(field), "missing {field}");
        }
    }
}
