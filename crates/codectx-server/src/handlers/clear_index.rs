//! Handler for the clear_index tool

use codectx_application::CodeContext;
use rmcp::model::CallToolResult;
use serde_json::json;

use crate::args::ClearIndexArgs;
use crate::formatter::ResponseFormatter;
use crate::paths;

/// Remove a codebase's collection, snapshot and registry entry
pub async fn handle(context: &CodeContext, args: ClearIndexArgs) -> CallToolResult {
    // A root that vanished from disk must still be clearable
    let path = paths::resolve(&args.path)
        .unwrap_or_else(|_| std::path::PathBuf::from(args.path.trim()));

    match context.clear_index(&path).await {
        Ok(()) => ResponseFormatter::json_payload(&json!({
            "cleared": path.to_string_lossy(),
        })),
        Err(e) => ResponseFormatter::error(e.to_string()),
    }
}
