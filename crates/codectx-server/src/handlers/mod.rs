//! Tool handlers
//!
//! One handler per tool, dispatched by the tool router over the shared
//! context façade.

mod clear_index;
mod get_indexing_status;
mod index_codebase;
mod search_code;

use std::sync::Arc;

use codectx_application::CodeContext;
use rmcp::model::CallToolResult;

use crate::args::{ClearIndexArgs, GetIndexingStatusArgs, IndexCodebaseArgs, SearchCodeArgs};

/// Handlers for every tool this server exposes
pub struct ToolHandlers {
    context: Arc<CodeContext>,
}

impl ToolHandlers {
    /// Handlers over the shared context
    pub fn new(context: Arc<CodeContext>) -> Self {
        Self { context }
    }

    /// Handle an index_codebase call
    pub async fn index_codebase(&self, args: IndexCodebaseArgs) -> CallToolResult {
        index_codebase::handle(&self.context, args).await
    }

    /// Handle a search_code call
    pub async fn search_code(&self, args: SearchCodeArgs) -> CallToolResult {
        search_code::handle(&self.context, args).await
    }

    /// Handle a clear_index call
    pub async fn clear_index(&self, args: ClearIndexArgs) -> CallToolResult {
        clear_index::handle(&self.context, args).await
    }

    /// Handle a get_indexing_status call
    pub async fn get_indexing_status(&self, args: GetIndexingStatusArgs) -> CallToolResult {
        get_indexing_status::handle(&self.context, args).await
    }
}
