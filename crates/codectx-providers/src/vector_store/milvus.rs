//! Milvus vector store adapter over the RESTful v2 surface
//!
//! Collections carry the chunk document scalar fields plus a dense vector
//! field; hybrid collections add a sparse vector field whose values this
//! adapter computes with the deterministic BM25 encoder. Hybrid queries are
//! fused server-side with Milvus' RRF ranker.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;

use codectx_domain::error::{Error, Result, StoreErrorKind};
use codectx_domain::ports::{HybridQuery, QueryRow, ScoredDoc, SearchOptions, VectorStore};
use codectx_domain::types::{ChunkDocument, SearchHit, VectorStoreConfig};

use crate::constants::{
    MILVUS_CONTENT_MAX_LENGTH, MILVUS_INSERT_BATCH, MILVUS_PATH_MAX_LENGTH, STORE_TIMEOUT_SECS,
};
use crate::sparse::Bm25SparseEncoder;

/// Milvus REST adapter
pub struct MilvusVectorStore {
    base_url: String,
    token: Option<String>,
    collection_limit: Option<usize>,
    http_client: Client,
    encoder: Bm25SparseEncoder,
}

impl MilvusVectorStore {
    /// Adapter for the deployment described by `config`
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        let address = config.address.trim_end_matches('/');
        let base_url = if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{address}")
        };
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(STORE_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::internal(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            base_url,
            token: config.token.clone(),
            collection_limit: config.collection_limit,
            http_client,
            encoder: Bm25SparseEncoder::new(),
        })
    }

    /// POST one REST call and unwrap the `{code, message, data}` envelope
    async fn post(
        &self,
        endpoint: &str,
        payload: serde_json::Value,
        kind: StoreErrorKind,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/v2/vectordb/{}", self.base_url, endpoint);
        let mut request = self.http_client.post(&url).json(&payload);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::store_connect(format!("Milvus request to {endpoint} failed: {e}")))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::store(kind, format!("Milvus sent unparseable JSON: {e}")))?;

        let code = body["code"].as_i64().unwrap_or(0);
        if !status.is_success() || (code != 0 && code != 200) {
            let message = body["message"]
                .as_str()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("HTTP {status}"));
            if is_collection_limit_message(&message) {
                return Err(Error::CollectionLimitReached { message });
            }
            return Err(Error::store(
                kind,
                format!("Milvus {endpoint} failed (code {code}): {message}"),
            ));
        }
        Ok(body)
    }

    async fn create_with_schema(
        &self,
        name: &str,
        dimension: usize,
        description: &str,
        hybrid: bool,
    ) -> Result<()> {
        if self.has_collection(name).await? {
            return Err(Error::store_schema(format!(
                "Collection '{name}' already exists; drop it before re-creating"
            )));
        }

        let mut fields = vec![
            serde_json::json!({
                "fieldName": "id",
                "dataType": "VarChar",
                "isPrimary": true,
                "elementTypeParams": { "max_length": "64" }
            }),
            serde_json::json!({
                "fieldName": "vector",
                "dataType": "FloatVector",
                "elementTypeParams": { "dim": dimension.to_string() }
            }),
            serde_json::json!({
                "fieldName": "content",
                "dataType": "VarChar",
                "elementTypeParams": { "max_length": MILVUS_CONTENT_MAX_LENGTH.to_string() }
            }),
            serde_json::json!({
                "fieldName": "relative_path",
                "dataType": "VarChar",
                "elementTypeParams": { "max_length": MILVUS_PATH_MAX_LENGTH.to_string() }
            }),
            serde_json::json!({ "fieldName": "start_line", "dataType": "Int64" }),
            serde_json::json!({ "fieldName": "end_line", "dataType": "Int64" }),
            serde_json::json!({
                "fieldName": "file_extension",
                "dataType": "VarChar",
                "elementTypeParams": { "max_length": "32" }
            }),
            serde_json::json!({ "fieldName": "metadata", "dataType": "JSON" }),
        ];
        let mut index_params = vec![serde_json::json!({
            "fieldName": "vector",
            "indexName": "vector_index",
            "metricType": "COSINE"
        })];
        if hybrid {
            fields.push(serde_json::json!({
                "fieldName": "sparse_vector",
                "dataType": "SparseFloatVector"
            }));
            index_params.push(serde_json::json!({
                "fieldName": "sparse_vector",
                "indexName": "sparse_index",
                "metricType": "IP"
            }));
        }

        let payload = serde_json::json!({
            "collectionName": name,
            "description": description,
            "schema": {
                "autoId": false,
                "enableDynamicField": false,
                "fields": fields
            },
            "indexParams": index_params
        });
        self.post("collections/create", payload, StoreErrorKind::Schema)
            .await?;
        Ok(())
    }

    fn doc_row(&self, doc: &ChunkDocument, hybrid: bool) -> serde_json::Value {
        let mut row = serde_json::json!({
            "id": doc.id,
            "vector": doc.vector,
            "content": doc.content,
            "relative_path": doc.relative_path,
            "start_line": doc.start_line,
            "end_line": doc.end_line,
            "file_extension": doc.file_extension,
            "metadata": doc.metadata,
        });
        if hybrid {
            row["sparse_vector"] = sparse_json(&self.encoder.encode_document(&doc.content));
        }
        row
    }

    async fn insert_rows(&self, name: &str, docs: &[ChunkDocument], hybrid: bool) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }
        let rows: Vec<serde_json::Value> =
            docs.iter().map(|doc| self.doc_row(doc, hybrid)).collect();
        let payload = serde_json::json!({
            "collectionName": name,
            "data": rows
        });
        self.post("entities/insert", payload, StoreErrorKind::Insert)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for MilvusVectorStore {
    async fn has_collection(&self, name: &str) -> Result<bool> {
        let body = self
            .post(
                "collections/has",
                serde_json::json!({ "collectionName": name }),
                StoreErrorKind::Schema,
            )
            .await?;
        Ok(body["data"]["has"].as_bool().unwrap_or(false))
    }

    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        description: &str,
    ) -> Result<()> {
        self.create_with_schema(name, dimension, description, false)
            .await
    }

    async fn create_hybrid_collection(
        &self,
        name: &str,
        dimension: usize,
        description: &str,
    ) -> Result<()> {
        self.create_with_schema(name, dimension, description, true)
            .await
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        self.post(
            "collections/drop",
            serde_json::json!({ "collectionName": name }),
            StoreErrorKind::Schema,
        )
        .await?;
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let body = self
            .post(
                "collections/list",
                serde_json::json!({}),
                StoreErrorKind::Schema,
            )
            .await?;
        Ok(body["data"]
            .as_array()
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| n.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn check_collection_limit(&self) -> Result<bool> {
        match self.collection_limit {
            Some(limit) => Ok(self.list_collections().await?.len() < limit),
            None => Ok(true),
        }
    }

    async fn insert(&self, name: &str, docs: &[ChunkDocument]) -> Result<()> {
        self.insert_rows(name, docs, false).await
    }

    async fn insert_hybrid(&self, name: &str, docs: &[ChunkDocument]) -> Result<()> {
        self.insert_rows(name, docs, true).await
    }

    async fn insert_hybrid_batched(&self, name: &str, docs: &[ChunkDocument]) -> Result<()> {
        for slice in docs.chunks(MILVUS_INSERT_BATCH) {
            self.insert_rows(name, slice, true).await?;
        }
        Ok(())
    }

    async fn query(
        &self,
        name: &str,
        filter_expr: &str,
        output_fields: &[&str],
        limit: usize,
    ) -> Result<Vec<QueryRow>> {
        let body = self
            .post(
                "entities/query",
                serde_json::json!({
                    "collectionName": name,
                    "filter": filter_expr,
                    "outputFields": output_fields,
                    "limit": limit
                }),
                StoreErrorKind::Query,
            )
            .await?;
        let rows = body["data"].as_array().cloned().unwrap_or_default();
        Ok(rows
            .into_iter()
            .filter_map(|row| match row {
                serde_json::Value::Object(map) => Some(map.into_iter().collect()),
                _ => None,
            })
            .collect())
    }

    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<ScoredDoc>> {
        let mut payload = serde_json::json!({
            "collectionName": name,
            "data": [vector],
            "annsField": "vector",
            "limit": options.top_k,
            "outputFields": OUTPUT_FIELDS,
            "searchParams": { "metricType": "COSINE" }
        });
        if let Some(filter) = &options.filter_expr {
            payload["filter"] = serde_json::json!(filter);
        }

        let body = self
            .post("entities/search", payload, StoreErrorKind::Search)
            .await?;
        let mut hits = parse_hits(&body);
        if let Some(threshold) = options.threshold {
            hits.retain(|h| h.score >= threshold);
        }
        Ok(hits)
    }

    async fn hybrid_search(&self, name: &str, query: &HybridQuery) -> Result<Vec<ScoredDoc>> {
        let sparse = sparse_json(&self.encoder.encode_query(&query.text));
        let mut dense_leg = serde_json::json!({
            "data": [query.vector],
            "annsField": "vector",
            "limit": query.top_k,
            "searchParams": { "metricType": "COSINE" }
        });
        let mut sparse_leg = serde_json::json!({
            "data": [sparse],
            "annsField": "sparse_vector",
            "limit": query.top_k,
            "searchParams": { "metricType": "IP" }
        });
        if let Some(filter) = &query.filter_expr {
            dense_leg["filter"] = serde_json::json!(filter);
            sparse_leg["filter"] = serde_json::json!(filter);
        }

        let payload = serde_json::json!({
            "collectionName": name,
            "search": [dense_leg, sparse_leg],
            "rerank": {
                "strategy": "rrf",
                "params": { "k": query.rrf_k }
            },
            "limit": query.limit,
            "outputFields": OUTPUT_FIELDS
        });

        let body = self
            .post("entities/advanced_search", payload, StoreErrorKind::Search)
            .await?;
        Ok(parse_hits(&body))
    }

    async fn delete(&self, name: &str, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let quoted: Vec<String> = ids.iter().map(|id| format!("\"{id}\"")).collect();
        let filter = format!("id in [{}]", quoted.join(","));
        self.post(
            "entities/delete",
            serde_json::json!({ "collectionName": name, "filter": filter }),
            StoreErrorKind::Insert,
        )
        .await?;
        Ok(())
    }
}

/// Scalar fields requested back from every search
const OUTPUT_FIELDS: [&str; 6] = [
    "id",
    "content",
    "relative_path",
    "start_line",
    "end_line",
    "metadata",
];

/// The backend's account-ceiling message, matched loosely but mapped to the
/// canonical error verbatim
fn is_collection_limit_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("collection") && (lower.contains("limit") || lower.contains("quota"))
}

/// Sparse vector in the REST dict form: dimension index to weight
fn sparse_json(sparse: &std::collections::BTreeMap<u32, f32>) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = sparse
        .iter()
        .map(|(dim, weight)| (dim.to_string(), serde_json::json!(weight)))
        .collect();
    serde_json::Value::Object(map)
}

fn parse_hits(body: &serde_json::Value) -> Vec<SearchHit> {
    let rows = match body["data"].as_array() {
        Some(rows) => rows,
        None => return Vec::new(),
    };
    rows.iter()
        .map(|row| {
            let metadata: HashMap<String, serde_json::Value> = row["metadata"]
                .as_object()
                .map(|m| m.clone().into_iter().collect())
                .unwrap_or_default();
            SearchHit {
                id: row["id"].as_str().unwrap_or_default().to_string(),
                relative_path: row["relative_path"].as_str().unwrap_or_default().to_string(),
                start_line: row["start_line"].as_u64().unwrap_or(0) as u32,
                end_line: row["end_line"].as_u64().unwrap_or(0) as u32,
                language: metadata
                    .get("language")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string(),
                score: row["distance"].as_f64().unwrap_or(0.0) as f32,
                content: row["content"].as_str().unwrap_or_default().to_string(),
            }
        })
        .collect()
}
