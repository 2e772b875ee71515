//! Handler for the get_indexing_status tool

use codectx_application::CodeContext;
use rmcp::model::CallToolResult;
use std::path::Path;

use crate::args::GetIndexingStatusArgs;
use crate::formatter::ResponseFormatter;
use crate::paths;

/// Per-codebase state or the aggregate report
pub async fn handle(context: &CodeContext, args: GetIndexingStatusArgs) -> CallToolResult {
    let resolved = match &args.path {
        None => None,
        Some(input) => match paths::resolve(input) {
            Ok(path) => Some(path),
            // status of a vanished root is still answerable by string
            Err(_) => Some(Path::new(input.trim()).to_path_buf()),
        },
    };

    match context.status(resolved.as_deref()).await {
        Ok(report) => ResponseFormatter::json_payload(&report.to_json()),
        Err(e) => ResponseFormatter::error(e.to_string()),
    }
}
