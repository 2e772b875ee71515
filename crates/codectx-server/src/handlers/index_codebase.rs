//! Handler for the index_codebase tool

use codectx_application::CodeContext;
use codectx_domain::error::Error;
use rmcp::model::CallToolResult;
use serde_json::json;

use crate::args::IndexCodebaseArgs;
use crate::formatter::ResponseFormatter;
use crate::paths;

/// Index the codebase at the requested path
pub async fn handle(context: &CodeContext, args: IndexCodebaseArgs) -> CallToolResult {
    let path = match paths::resolve(&args.path) {
        Ok(path) => path,
        Err(e) => return ResponseFormatter::error(e.to_string()),
    };

    tracing::info!("Starting codebase indexing for {}", path.display());
    let result = context
        .index_codebase(
            &path,
            args.force,
            &args.custom_extensions,
            &args.ignore_patterns,
            args.splitter.as_deref(),
            None,
        )
        .await;

    match result {
        Ok(outcome) => ResponseFormatter::json_payload(&json!({
            "indexed_files": outcome.indexed_files,
            "total_chunks": outcome.total_chunks,
            "status": outcome.status,
            "path": path.to_string_lossy(),
        })),
        // Terminal and success-shaped: the backend's canonical message as-is
        Err(Error::CollectionLimitReached { message }) => ResponseFormatter::text(message),
        Err(e @ Error::AlreadyIndexed { .. }) => ResponseFormatter::error(format!(
            "{e}. Pass force=true to re-index."
        )),
        Err(e @ Error::SubtreeCovered { .. }) => ResponseFormatter::error(format!(
            "{e}. Search through the ancestor instead."
        )),
        Err(e) => {
            tracing::warn!("Indexing of {} failed: {}", path.display(), e);
            ResponseFormatter::error(e.to_string())
        }
    }
}
