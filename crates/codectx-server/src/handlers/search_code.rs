//! Handler for the search_code tool

use codectx_application::CodeContext;
use codectx_domain::constants::{DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT};
use codectx_domain::error::Error;
use rmcp::model::CallToolResult;
use serde_json::json;

use crate::args::SearchCodeArgs;
use crate::formatter::ResponseFormatter;
use crate::paths;

/// Search an indexed codebase
pub async fn handle(context: &CodeContext, args: SearchCodeArgs) -> CallToolResult {
    let path = match paths::resolve(&args.path) {
        Ok(path) => path,
        Err(e) => return ResponseFormatter::error(e.to_string()),
    };
    let limit = args
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);

    match context
        .search(
            &path,
            &args.query,
            limit,
            args.score_threshold,
            &args.extension_filter,
        )
        .await
    {
        Ok(hits) => {
            let rows: Vec<serde_json::Value> = hits
                .iter()
                .map(|hit| {
                    json!({
                        "relative_path": hit.relative_path,
                        "start_line": hit.start_line,
                        "end_line": hit.end_line,
                        "language": hit.language,
                        "score": hit.score,
                        "content": hit.content,
                    })
                })
                .collect();
            ResponseFormatter::json_payload(&json!({ "results": rows }))
        }
        Err(e @ Error::NotIndexed { .. }) => ResponseFormatter::error(format!(
            "{e}. Run index_codebase on it (or a parent) first."
        )),
        Err(e @ Error::CollectionMissing { .. }) => {
            ResponseFormatter::error(format!("{e}."))
        }
        Err(e) => ResponseFormatter::error(e.to_string()),
    }
}
