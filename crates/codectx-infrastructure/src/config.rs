//! Environment-driven configuration
//!
//! All knobs that shape core behavior are loaded here once at startup and
//! passed to services by value; nothing reads the environment afterwards.

use std::path::PathBuf;

use codectx_domain::constants::MEMORY_LIMIT_MB_DEFAULT;
use codectx_domain::error::{Error, Result};
use codectx_domain::types::{
    EmbeddingConfig, EmbeddingProviderKind, VectorStoreConfig, VectorStoreKind,
};

use crate::fsutil;

/// Pipeline tuning overrides; `None` means derive from the host
#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    /// Chunks per embedding batch
    pub embedding_batch_size: Option<usize>,
    /// Embedding batches in flight
    pub api_concurrency: Option<usize>,
    /// Concurrent file read+split tasks
    pub file_concurrency: Option<usize>,
    /// Memory budget in megabytes
    pub memory_limit_mb: u64,
}

/// Top-level configuration assembled from the environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Hybrid (dense + sparse) mode; switches collection prefix and query path
    pub hybrid_mode: bool,
    /// Embedding provider settings
    pub embedding: EmbeddingConfig,
    /// Vector store settings
    pub store: VectorStoreConfig,
    /// Pipeline tuning
    pub pipeline: PipelineSettings,
    /// Extra supported extensions, comma-separated in the environment
    pub custom_extensions: Vec<String>,
    /// Extra ignore patterns, comma-separated in the environment
    pub custom_ignore_patterns: Vec<String>,
    /// Per-user data directory holding registry, snapshots and locks
    pub data_dir: PathBuf,
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match env_var(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::config(format!("Invalid {key} value '{raw}'"))),
    }
}

fn env_list(key: &str) -> Vec<String> {
    env_var(key)
        .map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let provider = match env_var("EMBEDDING_PROVIDER") {
            Some(name) => EmbeddingProviderKind::from_string(&name).ok_or_else(|| {
                Error::config(format!(
                    "Unknown EMBEDDING_PROVIDER '{}'; supported: {}",
                    name,
                    EmbeddingProviderKind::supported_providers().join(", ")
                ))
            })?,
            None => EmbeddingProviderKind::default(),
        };

        let api_key = env_var("EMBEDDING_API_KEY").or_else(|| match provider {
            EmbeddingProviderKind::OpenAI => env_var("OPENAI_API_KEY"),
            EmbeddingProviderKind::VoyageAI => env_var("VOYAGEAI_API_KEY"),
            EmbeddingProviderKind::Gemini => env_var("GEMINI_API_KEY"),
            _ => None,
        });

        let store_kind = match env_var("VECTOR_STORE") {
            Some(name) => VectorStoreKind::from_string(&name)
                .ok_or_else(|| Error::config(format!("Unknown VECTOR_STORE '{name}'")))?,
            None => VectorStoreKind::default(),
        };

        let data_dir = match env_var("CODECTX_DATA_DIR") {
            Some(dir) => {
                let dir = PathBuf::from(dir);
                std::fs::create_dir_all(&dir).map_err(|e| {
                    Error::io_with_source(format!("Failed to create {}", dir.display()), e)
                })?;
                dir
            }
            None => fsutil::data_dir()?,
        };

        Ok(Self {
            hybrid_mode: env_parse::<bool>("HYBRID_MODE")?.unwrap_or(true),
            embedding: EmbeddingConfig {
                provider,
                model: env_var("EMBEDDING_MODEL"),
                api_key,
                base_url: env_var("EMBEDDING_BASE_URL"),
            },
            store: VectorStoreConfig {
                kind: store_kind,
                address: env_var("MILVUS_ADDRESS")
                    .unwrap_or_else(|| "http://localhost:19530".to_string()),
                token: env_var("MILVUS_TOKEN"),
                collection_limit: env_parse::<usize>("COLLECTION_LIMIT")?,
            },
            pipeline: PipelineSettings {
                embedding_batch_size: env_parse::<usize>("EMBEDDING_BATCH_SIZE")?,
                api_concurrency: env_parse::<usize>("API_CONCURRENCY")?,
                file_concurrency: env_parse::<usize>("FILE_CONCURRENCY")?,
                memory_limit_mb: env_parse::<u64>("MEMORY_LIMIT_MB")?
                    .unwrap_or(MEMORY_LIMIT_MB_DEFAULT)
                    .max(MEMORY_LIMIT_MB_DEFAULT),
            },
            custom_extensions: env_list("CUSTOM_EXTENSIONS"),
            custom_ignore_patterns: env_list("CUSTOM_IGNORE_PATTERNS"),
            data_dir,
        })
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.pipeline.api_concurrency {
            if n == 0 {
                return Err(Error::config("API_CONCURRENCY must be at least 1"));
            }
        }
        if let Some(n) = self.pipeline.file_concurrency {
            if n == 0 {
                return Err(Error::config("FILE_CONCURRENCY must be at least 1"));
            }
        }
        if let Some(n) = self.pipeline.embedding_batch_size {
            if n == 0 {
                return Err(Error::config("EMBEDDING_BATCH_SIZE must be at least 1"));
            }
        }
        let needs_key = matches!(
            self.embedding.provider,
            EmbeddingProviderKind::OpenAI
                | EmbeddingProviderKind::VoyageAI
                | EmbeddingProviderKind::Gemini
        );
        if needs_key && self.embedding.api_key.is_none() {
            return Err(Error::config(format!(
                "Embedding provider '{}' requires an API key",
                self.embedding.provider
            )));
        }
        Ok(())
    }

    /// Log a one-line summary of the effective configuration
    pub fn log_summary(&self) {
        tracing::info!(
            hybrid = self.hybrid_mode,
            embedding_provider = %self.embedding.provider,
            vector_store = %self.store.kind,
            data_dir = %self.data_dir.display(),
            memory_limit_mb = self.pipeline.memory_limit_mb,
            "configuration loaded"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_parsing_trims_and_drops_empty() {
        std::env::set_var("CUSTOM_EXTENSIONS_TEST", " zig , , v ");
        assert_eq!(env_list("CUSTOM_EXTENSIONS_TEST"), vec!["zig", "v"]);
        std::env::remove_var("CUSTOM_EXTENSIONS_TEST");
    }

    #[test]
    fn invalid_numeric_override_is_an_error() {
        std::env::set_var("EMBEDDING_BATCH_SIZE_TEST", "lots");
        assert!(env_parse::<usize>("EMBEDDING_BATCH_SIZE_TEST").is_err());
        std::env::remove_var("EMBEDDING_BATCH_SIZE_TEST");
    }
}
