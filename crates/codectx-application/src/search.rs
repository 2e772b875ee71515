//! Query routing
//!
//! Resolves a query path to its owning indexed collection via registry
//! containment, runs a dense or hybrid search, and post-filters hits to the
//! queried subtree. A query under an indexed parent reuses the parent index.

use std::path::Path;
use std::sync::Arc;

use codectx_domain::constants::{DEFAULT_SCORE_THRESHOLD, MAX_SEARCH_LIMIT, RRF_K};
use codectx_domain::error::{Error, Result};
use codectx_domain::ports::{EmbeddingProvider, HybridQuery, SearchOptions, VectorStore};
use codectx_domain::types::SearchHit;
use codectx_infrastructure::fsutil;
use codectx_infrastructure::registry::CodebaseRegistry;

/// Router over the registry and the vector store
pub struct QueryRouter {
    registry: Arc<CodebaseRegistry>,
    store: Arc<dyn VectorStore>,
    embedding: Arc<dyn EmbeddingProvider>,
    hybrid: bool,
}

impl QueryRouter {
    /// Router searching hybrid or dense collections per configuration
    pub fn new(
        registry: Arc<CodebaseRegistry>,
        store: Arc<dyn VectorStore>,
        embedding: Arc<dyn EmbeddingProvider>,
        hybrid: bool,
    ) -> Self {
        Self {
            registry,
            store,
            embedding,
            hybrid,
        }
    }

    /// Search for `query` under `path`.
    ///
    /// `path` may be any directory under a registered root; hits are
    /// restricted to that subtree. The threshold applies to dense scores
    /// always (defaulting when absent) and to fused scores only when the
    /// caller supplied one.
    pub async fn semantic_search(
        &self,
        path: &Path,
        query: &str,
        top_k: usize,
        threshold: Option<f32>,
        extension_filter: &[String],
    ) -> Result<Vec<SearchHit>> {
        let canonical = fsutil::canonical_string(path)?;
        let record = self
            .registry
            .find_containing_index(&canonical)
            .await
            .ok_or_else(|| Error::NotIndexed {
                root: canonical.clone(),
            })?;

        if !self.store.has_collection(&record.collection_name).await? {
            return Err(Error::CollectionMissing {
                collection: record.collection_name,
            });
        }

        let top_k = top_k.clamp(1, MAX_SEARCH_LIMIT);
        let query_vector = self.embedding.embed(query).await?.vector;

        let mut hits = if self.hybrid {
            let mut hits = self
                .store
                .hybrid_search(
                    &record.collection_name,
                    &HybridQuery {
                        vector: query_vector,
                        text: query.to_string(),
                        top_k,
                        rrf_k: RRF_K,
                        limit: top_k,
                        filter_expr: None,
                    },
                )
                .await?;
            // Fused scores live on the RRF scale; only an explicit caller
            // threshold is comparable to them.
            if let Some(threshold) = threshold {
                hits.retain(|hit| hit.score >= threshold);
            }
            hits
        } else {
            self.store
                .search(
                    &record.collection_name,
                    &query_vector,
                    &SearchOptions {
                        top_k,
                        threshold: Some(threshold.unwrap_or(DEFAULT_SCORE_THRESHOLD)),
                        filter_expr: None,
                    },
                )
                .await?
        };

        // Subtree containment: only hits under the queried path survive
        if canonical != record.root_path {
            if let Some(prefix) = subtree_prefix(&record.root_path, &canonical) {
                hits.retain(|hit| {
                    hit.relative_path == prefix
                        || hit.relative_path.starts_with(&format!("{prefix}/"))
                });
            }
        }

        if !extension_filter.is_empty() {
            let wanted: Vec<String> = extension_filter
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect();
            hits.retain(|hit| {
                let ext = hit
                    .relative_path
                    .rsplit('/')
                    .next()
                    .and_then(|name| name.rsplit_once('.'))
                    .map(|(_, ext)| ext.to_lowercase())
                    .unwrap_or_default();
                wanted.contains(&ext)
            });
        }

        hits.truncate(top_k);
        Ok(hits)
    }
}

/// Relative (`/`-separated) prefix of `path` under `root`
fn subtree_prefix(root: &str, path: &str) -> Option<String> {
    let relative = Path::new(path).strip_prefix(root).ok()?;
    let prefix = fsutil::to_posix(relative);
    if prefix.is_empty() {
        None
    } else {
        Some(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codectx_domain::types::{Chunk, ChunkDocument, Language};
    use codectx_providers::embedding::NullEmbeddingProvider;
    use codectx_providers::vector_store::InMemoryVectorStore;
    use tempfile::TempDir;

    const DIM: usize = 4;

    struct Fixture {
        tree: TempDir,
        router: QueryRouter,
        root: String,
    }

    async fn doc(
        embedding: &NullEmbeddingProvider,
        rel: &str,
        content: &str,
        root: &str,
    ) -> ChunkDocument {
        let chunk = Chunk {
            content: content.to_string(),
            file_path: rel.to_string(),
            start_line: 1,
            end_line: 2,
            language: Language::Python,
        };
        let vector = embedding.embed(content).await.unwrap().vector;
        ChunkDocument::from_chunk(&chunk, vector, root, 0)
    }

    async fn fixture(hybrid: bool) -> Fixture {
        let tree = TempDir::new().unwrap();
        std::fs::create_dir_all(tree.path().join("pkg")).unwrap();
        let data = TempDir::new().unwrap();
        let root = tree.path().canonicalize().unwrap().to_string_lossy().to_string();

        let registry = Arc::new(CodebaseRegistry::open(data.path()).await.unwrap());
        let record = registry.register(&root, hybrid, false).await.unwrap();

        let store = Arc::new(InMemoryVectorStore::new(None));
        if hybrid {
            store
                .create_hybrid_collection(&record.collection_name, DIM, "test")
                .await
                .unwrap();
        } else {
            store
                .create_collection(&record.collection_name, DIM, "test")
                .await
                .unwrap();
        }

        let embedding = NullEmbeddingProvider::new(DIM);
        store
            .insert(
                &record.collection_name,
                &[
                    doc(&embedding, "top.py", "def top(): pass", &root).await,
                    doc(&embedding, "pkg/inner.py", "def inner(): pass", &root).await,
                    doc(&embedding, "pkg/other.md", "inner notes", &root).await,
                ],
            )
            .await
            .unwrap();

        let router = QueryRouter::new(registry, store, Arc::new(embedding), hybrid);
        Fixture { tree, router, root }
    }

    #[tokio::test]
    async fn unregistered_path_is_not_indexed() {
        let fx = fixture(false).await;
        drop(fx);
        let stray = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        let registry = Arc::new(CodebaseRegistry::open(data.path()).await.unwrap());
        let router = QueryRouter::new(
            registry,
            Arc::new(InMemoryVectorStore::new(None)),
            Arc::new(NullEmbeddingProvider::new(DIM)),
            false,
        );
        let result = router
            .semantic_search(stray.path(), "anything", 5, None, &[])
            .await;
        assert!(matches!(result, Err(Error::NotIndexed { .. })));
    }

    #[tokio::test]
    async fn query_at_root_returns_hits() {
        let fx = fixture(false).await;
        let hits = fx
            .router
            .semantic_search(fx.tree.path(), "def top(): pass", 10, Some(0.0), &[])
            .await
            .unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].relative_path, "top.py");
    }

    #[tokio::test]
    async fn subtree_query_reuses_parent_index_and_filters() {
        let fx = fixture(false).await;
        let hits = fx
            .router
            .semantic_search(&fx.tree.path().join("pkg"), "def inner(): pass", 10, Some(-1.0), &[])
            .await
            .unwrap();
        assert!(!hits.is_empty());
        for hit in &hits {
            assert!(hit.relative_path.starts_with("pkg/"));
        }
    }

    #[tokio::test]
    async fn extension_filter_restricts_results() {
        let fx = fixture(false).await;
        let hits = fx
            .router
            .semantic_search(
                &fx.tree.path().join("pkg"),
                "inner",
                10,
                Some(-1.0),
                &["md".to_string()],
            )
            .await
            .unwrap();
        assert!(hits.iter().all(|h| h.relative_path.ends_with(".md")));
    }

    #[tokio::test]
    async fn missing_collection_is_surfaced() {
        let fx = fixture(false).await;
        // simulate external deletion by clearing all collections
        let data = TempDir::new().unwrap();
        let registry = Arc::new(CodebaseRegistry::open(data.path()).await.unwrap());
        registry.register(&fx.root, false, false).await.unwrap();
        let router = QueryRouter::new(
            registry,
            Arc::new(InMemoryVectorStore::new(None)),
            Arc::new(NullEmbeddingProvider::new(DIM)),
            false,
        );
        let result = router
            .semantic_search(fx.tree.path(), "anything", 5, None, &[])
            .await;
        assert!(matches!(result, Err(Error::CollectionMissing { .. })));
    }

    #[tokio::test]
    async fn hybrid_mode_fuses_and_respects_limit() {
        let fx = fixture(true).await;
        let hits = fx
            .router
            .semantic_search(fx.tree.path(), "def inner(): pass", 2, None, &[])
            .await
            .unwrap();
        assert!(hits.len() <= 2);
        assert!(!hits.is_empty());
    }
}
