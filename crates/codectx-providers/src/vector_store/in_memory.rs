//! In-memory vector store
//!
//! Reference implementation of the store port for tests and development.
//! Dense search is brute-force cosine; the hybrid path ranks a lexical BM25
//! leg next to the dense leg and fuses both with Reciprocal Rank Fusion,
//! mirroring what the production backend does server-side.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use codectx_domain::error::{Error, Result};
use codectx_domain::ports::{HybridQuery, QueryRow, ScoredDoc, SearchOptions, VectorStore};
use codectx_domain::types::{ChunkDocument, SearchHit};

use crate::sparse::Bm25SparseEncoder;

struct Collection {
    dimension: usize,
    hybrid: bool,
    docs: HashMap<String, ChunkDocument>,
}

/// Brute-force in-memory store
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
    collection_limit: Option<usize>,
    encoder: Bm25SparseEncoder,
}

impl InMemoryVectorStore {
    /// Store with an optional account-level collection ceiling
    pub fn new(collection_limit: Option<usize>) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            collection_limit,
            encoder: Bm25SparseEncoder::new(),
        }
    }

    async fn create(&self, name: &str, dimension: usize, hybrid: bool) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(Error::store_schema(format!(
                "Collection '{name}' already exists"
            )));
        }
        collections.insert(
            name.to_string(),
            Collection {
                dimension,
                hybrid,
                docs: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn insert_docs(&self, name: &str, docs: &[ChunkDocument]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| Error::store_insert(format!("Collection '{name}' does not exist")))?;
        for doc in docs {
            if doc.vector.len() != collection.dimension {
                return Err(Error::store_insert(format!(
                    "Document '{}' has dimension {} but collection '{}' expects {}",
                    doc.id,
                    doc.vector.len(),
                    name,
                    collection.dimension
                )));
            }
            collection.docs.insert(doc.id.clone(), doc.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn has_collection(&self, name: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        _description: &str,
    ) -> Result<()> {
        self.create(name, dimension, false).await
    }

    async fn create_hybrid_collection(
        &self,
        name: &str,
        dimension: usize,
        _description: &str,
    ) -> Result<()> {
        self.create(name, dimension, true).await
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        self.collections.write().await.remove(name);
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn check_collection_limit(&self) -> Result<bool> {
        match self.collection_limit {
            Some(limit) => Ok(self.collections.read().await.len() < limit),
            None => Ok(true),
        }
    }

    async fn insert(&self, name: &str, docs: &[ChunkDocument]) -> Result<()> {
        self.insert_docs(name, docs).await
    }

    async fn insert_hybrid(&self, name: &str, docs: &[ChunkDocument]) -> Result<()> {
        // Sparse representations are recomputed at query time here; the
        // document payload is identical either way.
        self.insert_docs(name, docs).await
    }

    async fn insert_hybrid_batched(&self, name: &str, docs: &[ChunkDocument]) -> Result<()> {
        self.insert_docs(name, docs).await
    }

    async fn query(
        &self,
        name: &str,
        filter_expr: &str,
        output_fields: &[&str],
        limit: usize,
    ) -> Result<Vec<QueryRow>> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| Error::store_query(format!("Collection '{name}' does not exist")))?;

        let filter = parse_equality_filter(filter_expr)
            .ok_or_else(|| Error::store_query(format!("Unsupported filter '{filter_expr}'")))?;

        let mut rows: Vec<QueryRow> = collection
            .docs
            .values()
            .filter(|doc| field_value(doc, &filter.0).as_deref() == Some(filter.1.as_str()))
            .take(limit)
            .map(|doc| {
                output_fields
                    .iter()
                    .filter_map(|field| {
                        field_json(doc, field).map(|value| (field.to_string(), value))
                    })
                    .collect()
            })
            .collect();
        rows.truncate(limit);
        Ok(rows)
    }

    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<ScoredDoc>> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| Error::store_search(format!("Collection '{name}' does not exist")))?;

        let filter = match options.filter_expr.as_deref() {
            Some(expr) => Some(
                parse_equality_filter(expr)
                    .ok_or_else(|| Error::store_search(format!("Unsupported filter '{expr}'")))?,
            ),
            None => None,
        };

        let mut scored: Vec<(f32, &ChunkDocument)> = collection
            .docs
            .values()
            .filter(|doc| match &filter {
                Some((field, value)) => field_value(doc, field).as_deref() == Some(value.as_str()),
                None => true,
            })
            .map(|doc| (cosine(vector, &doc.vector), doc))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(options.top_k);

        Ok(scored
            .into_iter()
            .filter(|(score, _)| options.threshold.map(|t| *score >= t).unwrap_or(true))
            .map(|(score, doc)| to_hit(doc, score))
            .collect())
    }

    async fn hybrid_search(&self, name: &str, query: &HybridQuery) -> Result<Vec<ScoredDoc>> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| Error::store_search(format!("Collection '{name}' does not exist")))?;
        if !collection.hybrid {
            return Err(Error::store_search(format!(
                "Collection '{name}' was not created for hybrid search"
            )));
        }

        let filter = match query.filter_expr.as_deref() {
            Some(expr) => Some(
                parse_equality_filter(expr)
                    .ok_or_else(|| Error::store_search(format!("Unsupported filter '{expr}'")))?,
            ),
            None => None,
        };
        let candidates: Vec<&ChunkDocument> = collection
            .docs
            .values()
            .filter(|doc| match &filter {
                Some((field, value)) => field_value(doc, field).as_deref() == Some(value.as_str()),
                None => true,
            })
            .collect();

        // Dense leg
        let mut dense: Vec<(f32, &ChunkDocument)> = candidates
            .iter()
            .map(|doc| (cosine(&query.vector, &doc.vector), *doc))
            .collect();
        dense.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        dense.truncate(query.top_k);

        // Sparse (lexical) leg
        let mut sparse: Vec<(f32, &ChunkDocument)> = candidates
            .iter()
            .map(|doc| (self.encoder.score(&query.text, &doc.content), *doc))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        sparse.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        sparse.truncate(query.top_k);

        // RRF fusion; ties broken by dense rank
        let k = query.rrf_k as f32;
        let mut fused: HashMap<&str, (f32, usize, &ChunkDocument)> = HashMap::new();
        for (rank, (_, doc)) in dense.iter().copied().enumerate() {
            let entry = fused
                .entry(doc.id.as_str())
                .or_insert((0.0, rank + 1, doc));
            entry.0 += 1.0 / (k + (rank + 1) as f32);
            entry.1 = rank + 1;
        }
        for (rank, (_, doc)) in sparse.iter().copied().enumerate() {
            let entry = fused
                .entry(doc.id.as_str())
                .or_insert((0.0, usize::MAX, doc));
            entry.0 += 1.0 / (k + (rank + 1) as f32);
        }

        let mut results: Vec<(f32, usize, &ChunkDocument)> = fused.into_values().collect();
        results.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        results.truncate(query.limit);

        Ok(results
            .into_iter()
            .map(|(score, _, doc)| to_hit(doc, score))
            .collect())
    }

    async fn delete(&self, name: &str, ids: &[String]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| Error::store_insert(format!("Collection '{name}' does not exist")))?;
        for id in ids {
            collection.docs.remove(id);
        }
        Ok(())
    }
}

fn to_hit(doc: &ChunkDocument, score: f32) -> SearchHit {
    SearchHit {
        id: doc.id.clone(),
        relative_path: doc.relative_path.clone(),
        start_line: doc.start_line,
        end_line: doc.end_line,
        language: doc.metadata.language.clone(),
        score,
        content: doc.content.clone(),
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// Parse `field == "value"`; the only filter dialect this store needs
fn parse_equality_filter(expr: &str) -> Option<(String, String)> {
    let (field, value) = expr.split_once("==")?;
    let value = value.trim();
    let value = value.strip_prefix('"')?.strip_suffix('"')?;
    Some((field.trim().to_string(), value.replace("\\\"", "\"")))
}

fn field_value(doc: &ChunkDocument, field: &str) -> Option<String> {
    match field {
        "id" => Some(doc.id.clone()),
        "relative_path" => Some(doc.relative_path.clone()),
        "file_extension" => Some(doc.file_extension.clone()),
        "content" => Some(doc.content.clone()),
        _ => None,
    }
}

fn field_json(doc: &ChunkDocument, field: &str) -> Option<serde_json::Value> {
    match field {
        "start_line" => Some(serde_json::json!(doc.start_line)),
        "end_line" => Some(serde_json::json!(doc.end_line)),
        _ => field_value(doc, field).map(serde_json::Value::String),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codectx_domain::types::{Chunk, Language};

    fn doc(path: &str, content: &str, vector: Vec<f32>) -> ChunkDocument {
        let chunk = Chunk {
            content: content.to_string(),
            file_path: path.to_string(),
            start_line: 1,
            end_line: 2,
            language: Language::Python,
        };
        ChunkDocument::from_chunk(&chunk, vector, "/repo", 0)
    }

    async fn store_with_docs(hybrid: bool) -> InMemoryVectorStore {
        let store = InMemoryVectorStore::new(None);
        if hybrid {
            store.create_hybrid_collection("c", 2, "test").await.unwrap();
        } else {
            store.create_collection("c", 2, "test").await.unwrap();
        }
        store
            .insert(
                "c",
                &[
                    doc("a.py", "def parse_config(path): pass", vec![1.0, 0.0]),
                    doc("b.py", "def render_html(tpl): pass", vec![0.0, 1.0]),
                    doc("sub/c.py", "def parse_args(argv): pass", vec![0.7, 0.7]),
                ],
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn create_twice_is_an_error() {
        let store = InMemoryVectorStore::new(None);
        store.create_collection("c", 2, "test").await.unwrap();
        assert!(store.create_collection("c", 2, "test").await.is_err());
        store.drop_collection("c").await.unwrap();
        store.create_collection("c", 2, "test").await.unwrap();
    }

    #[tokio::test]
    async fn collection_limit_is_reported_without_side_effects() {
        let store = InMemoryVectorStore::new(Some(1));
        assert!(store.check_collection_limit().await.unwrap());
        store.create_collection("c", 2, "test").await.unwrap();
        assert!(!store.check_collection_limit().await.unwrap());
        assert_eq!(store.list_collections().await.unwrap(), vec!["c"]);
    }

    #[tokio::test]
    async fn reinserting_identical_document_is_idempotent() {
        let store = store_with_docs(false).await;
        let d = doc("a.py", "def parse_config(path): pass", vec![1.0, 0.0]);
        store.insert("c", &[d.clone()]).await.unwrap();
        store.insert("c", &[d]).await.unwrap();

        let rows = store
            .query("c", "relative_path == \"a.py\"", &["id"], 100)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn dense_search_ranks_by_similarity_and_applies_threshold() {
        let store = store_with_docs(false).await;
        let hits = store
            .search(
                "c",
                &[1.0, 0.0],
                &SearchOptions {
                    top_k: 3,
                    threshold: Some(0.5),
                    filter_expr: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(hits[0].relative_path, "a.py");
        assert!(hits.iter().all(|h| h.score >= 0.5));
        assert!(!hits.iter().any(|h| h.relative_path == "b.py"));
    }

    #[tokio::test]
    async fn query_and_delete_by_relative_path() {
        let store = store_with_docs(false).await;
        let rows = store
            .query("c", "relative_path == \"sub/c.py\"", &["id"], 10)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        let id = rows[0]["id"].as_str().unwrap().to_string();

        store.delete("c", &[id]).await.unwrap();
        let rows = store
            .query("c", "relative_path == \"sub/c.py\"", &["id"], 10)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn hybrid_search_fuses_dense_and_lexical_legs() {
        let store = store_with_docs(true).await;
        // Dense leg favors b.py; the lexical leg only matches a.py ("path").
        let hits = store
            .hybrid_search(
                "c",
                &HybridQuery {
                    vector: vec![0.0, 1.0],
                    text: "config file path".to_string(),
                    top_k: 3,
                    rrf_k: 100,
                    limit: 3,
                    filter_expr: None,
                },
            )
            .await
            .unwrap();
        assert!(!hits.is_empty());
        // a.py matches both query terms lexically and must be present
        assert!(hits.iter().any(|h| h.relative_path == "a.py"));
    }

    #[tokio::test]
    async fn hybrid_search_requires_hybrid_collection() {
        let store = store_with_docs(false).await;
        let err = store
            .hybrid_search(
                "c",
                &HybridQuery {
                    vector: vec![1.0, 0.0],
                    text: "parse".to_string(),
                    top_k: 2,
                    rrf_k: 100,
                    limit: 2,
                    filter_expr: None,
                },
            )
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        let store = store_with_docs(false).await;
        let bad = doc("x.py", "pass", vec![1.0, 0.0, 0.0]);
        assert!(store.insert("c", &[bad]).await.is_err());
    }
}
