//! Tool argument types for the MCP server
//!
//! Schemas are derived with `schemars` and surfaced through the tool
//! registry, so the argument structs are the single source of truth for the
//! protocol surface.

use schemars::JsonSchema;
use serde::Deserialize;

/// Arguments for the index_codebase tool
#[derive(Debug, Deserialize, JsonSchema)]
#[schemars(description = "Parameters for indexing a codebase directory")]
pub struct IndexCodebaseArgs {
    /// Path of the codebase root
    #[schemars(description = "Absolute path of the codebase root directory")]
    pub path: String,
    /// Re-index even when already indexed
    #[serde(default)]
    #[schemars(description = "Re-index even when the path is already indexed")]
    pub force: bool,
    /// Splitter strategy
    #[schemars(description = "Chunking strategy: 'ast' (default) or 'window'")]
    pub splitter: Option<String>,
    /// Extra supported extensions for this codebase
    #[serde(default)]
    #[schemars(description = "Additional file extensions to index")]
    pub custom_extensions: Vec<String>,
    /// Extra ignore patterns for this codebase
    #[serde(default)]
    #[schemars(description = "Additional gitignore-style patterns to exclude")]
    pub ignore_patterns: Vec<String>,
}

/// Arguments for the search_code tool
#[derive(Debug, Deserialize, JsonSchema)]
#[schemars(description = "Parameters for semantic code search")]
pub struct SearchCodeArgs {
    /// Path to search under
    #[schemars(description = "Absolute path of an indexed root or any subtree of one")]
    pub path: String,
    /// Natural-language query
    #[schemars(description = "Natural-language description of the code to find")]
    pub query: String,
    /// Maximum number of hits
    #[schemars(description = "Maximum number of results (capped at 50)")]
    pub limit: Option<usize>,
    /// Restrict hits to these file extensions
    #[serde(default)]
    #[schemars(description = "Only include files with these extensions")]
    pub extension_filter: Vec<String>,
    /// Minimum score for a hit to be returned
    #[schemars(description = "Minimum similarity score threshold")]
    pub score_threshold: Option<f32>,
}

/// Arguments for the clear_index tool
#[derive(Debug, Deserialize, JsonSchema)]
#[schemars(description = "Parameters for clearing a codebase index")]
pub struct ClearIndexArgs {
    /// Path of the codebase root
    #[schemars(description = "Absolute path of the codebase root to clear")]
    pub path: String,
}

/// Arguments for the get_indexing_status tool
#[derive(Debug, Deserialize, JsonSchema, Default)]
#[schemars(description = "Parameters for the indexing status report")]
pub struct GetIndexingStatusArgs {
    /// Absolute path; omit for the aggregate report
    #[schemars(description = "Absolute path of a codebase; omit to report all codebases")]
    pub path: Option<String>,
}
