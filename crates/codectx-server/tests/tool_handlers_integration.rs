//! End-to-end tool dispatch over an in-memory stack
//!
//! Drives the four tools through the tool router the way the rmcp server
//! does, with the null embedding provider and the in-memory vector store.

use std::sync::Arc;

use codectx_application::{CodeContext, SplitterSet};
use codectx_domain::constants::MEMORY_LIMIT_MB_DEFAULT;
use codectx_domain::types::{
    EmbeddingConfig, EmbeddingProviderKind, VectorStoreConfig, VectorStoreKind,
};
use codectx_infrastructure::config::{Config, PipelineSettings};
use codectx_providers::embedding::NullEmbeddingProvider;
use codectx_providers::splitter::{CodeSplitter, WindowSplitter};
use codectx_providers::vector_store::InMemoryVectorStore;
use codectx_server::tools::route_tool_call;
use codectx_server::ToolHandlers;
use rmcp::model::{CallToolRequestParam, CallToolResult};
use serde_json::json;
use tempfile::TempDir;

async fn handlers(data: &TempDir) -> ToolHandlers {
    let config = Config {
        hybrid_mode: true,
        embedding: EmbeddingConfig {
            provider: EmbeddingProviderKind::Null,
            model: None,
            api_key: None,
            base_url: None,
        },
        store: VectorStoreConfig {
            kind: VectorStoreKind::InMemory,
            address: String::new(),
            token: None,
            collection_limit: None,
        },
        pipeline: PipelineSettings {
            embedding_batch_size: Some(4),
            api_concurrency: Some(2),
            file_concurrency: Some(4),
            memory_limit_mb: MEMORY_LIMIT_MB_DEFAULT,
        },
        custom_extensions: Vec::new(),
        custom_ignore_patterns: Vec::new(),
        data_dir: data.path().to_path_buf(),
    };
    let context = CodeContext::new(
        config,
        Arc::new(NullEmbeddingProvider::new(4)),
        Arc::new(InMemoryVectorStore::new(None)),
        SplitterSet::new(
            Arc::new(CodeSplitter::new()),
            Arc::new(WindowSplitter::new()),
        ),
    )
    .await
    .unwrap();
    ToolHandlers::new(context)
}

fn request(name: &str, arguments: serde_json::Value) -> CallToolRequestParam {
    serde_json::from_value(json!({ "name": name, "arguments": arguments })).unwrap()
}

fn is_error(result: &CallToolResult) -> bool {
    serde_json::to_value(result).unwrap()["isError"]
        .as_bool()
        .unwrap_or(false)
}

fn body_text(result: &CallToolResult) -> String {
    serde_json::to_value(result).unwrap()["content"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

fn body_json(result: &CallToolResult) -> serde_json::Value {
    serde_json::from_str(&body_text(result)).unwrap()
}

#[tokio::test]
async fn index_status_search_clear_through_tool_dispatch() {
    let data = TempDir::new().unwrap();
    let tree = TempDir::new().unwrap();
    std::fs::write(
        tree.path().join("auth.py"),
        "def verify_token(token):\n    return token == 'ok'\n",
    )
    .unwrap();
    std::fs::create_dir_all(tree.path().join("pkg")).unwrap();
    std::fs::write(
        tree.path().join("pkg/db.py"),
        "def open_connection(dsn):\n    return dsn\n",
    )
    .unwrap();

    let handlers = handlers(&data).await;
    let root = tree.path().to_string_lossy().to_string();

    // index
    let result = route_tool_call(request("index_codebase", json!({ "path": root })), &handlers)
        .await
        .unwrap();
    assert!(!is_error(&result), "{result:?}");
    let payload = body_json(&result);
    assert_eq!(payload["indexed_files"], json!(2));
    assert_eq!(payload["total_chunks"], json!(2));
    assert_eq!(payload["status"], json!("completed"));

    // aggregate status
    let result = route_tool_call(request("get_indexing_status", json!({})), &handlers)
        .await
        .unwrap();
    let payload = body_json(&result);
    let codebases = payload["codebases"].as_array().unwrap();
    assert_eq!(codebases.len(), 1);
    assert_eq!(codebases[0]["status"], json!("indexed"));
    assert_eq!(codebases[0]["progress_percent"], json!(100));

    // search restricted to the subtree
    let result = route_tool_call(
        request(
            "search_code",
            json!({
                "path": tree.path().join("pkg").to_string_lossy(),
                "query": "open database connection",
                "limit": 5
            }),
        ),
        &handlers,
    )
    .await
    .unwrap();
    assert!(!is_error(&result), "{result:?}");
    let payload = body_json(&result);
    for hit in payload["results"].as_array().unwrap() {
        assert!(hit["relative_path"].as_str().unwrap().starts_with("pkg/"));
    }

    // double index without force is refused in the body, not the protocol
    let result = route_tool_call(request("index_codebase", json!({ "path": root })), &handlers)
        .await
        .unwrap();
    assert!(is_error(&result));
    assert!(body_text(&result).contains("force"));

    // clear and observe not_found
    let result = route_tool_call(request("clear_index", json!({ "path": root })), &handlers)
        .await
        .unwrap();
    assert!(!is_error(&result), "{result:?}");

    let result = route_tool_call(
        request("get_indexing_status", json!({ "path": root })),
        &handlers,
    )
    .await
    .unwrap();
    assert_eq!(body_json(&result)["status"], json!("not_found"));
}

#[tokio::test]
async fn search_before_index_hints_at_indexing() {
    let data = TempDir::new().unwrap();
    let tree = TempDir::new().unwrap();
    let handlers = handlers(&data).await;

    let result = route_tool_call(
        request(
            "search_code",
            json!({ "path": tree.path().to_string_lossy(), "query": "anything" }),
        ),
        &handlers,
    )
    .await
    .unwrap();
    assert!(is_error(&result));
    assert!(body_text(&result).contains("index_codebase"));
}

#[tokio::test]
async fn unknown_tool_and_bad_arguments_are_protocol_errors() {
    let data = TempDir::new().unwrap();
    let handlers = handlers(&data).await;

    let err = route_tool_call(request("no_such_tool", json!({})), &handlers).await;
    assert!(err.is_err());

    // missing required `path`
    let err = route_tool_call(request("index_codebase", json!({ "force": true })), &handlers).await;
    assert!(err.is_err());
}
