//! Core value objects of the indexing domain
//!
//! Chunks, chunk documents, embeddings, search hits, codebase lifecycle
//! records and the progress/outcome types emitted by the pipeline.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::{CHUNK_ID_DIGEST_LEN, CHUNK_ID_PREFIX};

/// Supported programming languages
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    C,
    Cpp,
    CSharp,
    Php,
    Ruby,
    Swift,
    Kotlin,
    Scala,
    Shell,
    SQL,
    HTML,
    Markdown,
    Notebook,
    PlainText,
    Unknown,
}

impl Language {
    /// Map a file extension (without dot) to a language tag
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => Language::Rust,
            "py" => Language::Python,
            "js" | "jsx" | "mjs" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            "go" => Language::Go,
            "java" => Language::Java,
            "c" | "h" => Language::C,
            "cpp" | "cc" | "cxx" | "hpp" => Language::Cpp,
            "cs" => Language::CSharp,
            "php" => Language::Php,
            "rb" => Language::Ruby,
            "swift" => Language::Swift,
            "kt" | "kts" => Language::Kotlin,
            "scala" => Language::Scala,
            "sh" | "bash" | "zsh" => Language::Shell,
            "sql" => Language::SQL,
            "html" | "htm" => Language::HTML,
            "md" | "markdown" => Language::Markdown,
            "ipynb" => Language::Notebook,
            "txt" | "text" => Language::PlainText,
            _ => Language::Unknown,
        }
    }

    /// Stable lowercase identifier used in persisted metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Php => "php",
            Language::Ruby => "ruby",
            Language::Swift => "swift",
            Language::Kotlin => "kotlin",
            Language::Scala => "scala",
            Language::Shell => "shell",
            Language::SQL => "sql",
            Language::HTML => "html",
            Language::Markdown => "markdown",
            Language::Notebook => "notebook",
            Language::PlainText => "plaintext",
            Language::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A contiguous span of a source file, the atomic unit of embedding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// The span content as UTF-8
    pub content: String,
    /// File path relative to the codebase root, `/`-separated
    pub file_path: String,
    /// First logical line of the span (1-based)
    pub start_line: u32,
    /// Last logical line of the span (inclusive)
    pub end_line: u32,
    /// Language tag propagated from the file extension
    pub language: Language,
}

impl Chunk {
    /// Deterministic document id for this chunk: SHA-256 over the
    /// newline-joined `(file_path, start_line, end_line, content)` tuple.
    ///
    /// Identical components always yield the same id, which makes
    /// re-inserting an unchanged chunk a no-op on the final collection state.
    pub fn document_id(&self) -> String {
        let payload = format!(
            "{}\n{}\n{}\n{}",
            self.file_path, self.start_line, self.end_line, self.content
        );
        let mut hasher = Sha256::new();
        hasher.update(payload.as_bytes());
        let digest = hex::encode(hasher.finalize());
        format!("{}{}", CHUNK_ID_PREFIX, &digest[..CHUNK_ID_DIGEST_LEN])
    }
}

/// Dense embedding vector with its provenance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Embedding {
    /// The embedding vector values
    pub vector: Vec<f32>,
    /// Name of the model that generated this embedding
    pub model: String,
    /// Dimensionality of the embedding vector
    pub dimensions: usize,
}

/// Metadata carried by every persisted chunk document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    /// Canonical root of the owning codebase
    pub codebase_path: String,
    /// Language tag of the chunk
    pub language: String,
    /// Position of the chunk within its file
    pub chunk_index: usize,
}

/// The persisted form of a chunk: id, vectors and scalar fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkDocument {
    /// Deterministic id, see [`Chunk::document_id`]
    pub id: String,
    /// Dense embedding vector
    pub vector: Vec<f32>,
    /// Raw span content
    pub content: String,
    /// File path relative to the codebase root, `/`-separated
    pub relative_path: String,
    /// First logical line of the span
    pub start_line: u32,
    /// Last logical line of the span
    pub end_line: u32,
    /// File extension without the dot
    pub file_extension: String,
    /// Structured metadata
    pub metadata: ChunkMetadata,
}

impl ChunkDocument {
    /// Build a document from a chunk and its dense vector
    pub fn from_chunk(chunk: &Chunk, vector: Vec<f32>, codebase_path: &str, chunk_index: usize) -> Self {
        let file_extension = std::path::Path::new(&chunk.file_path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();
        Self {
            id: chunk.document_id(),
            vector,
            content: chunk.content.clone(),
            relative_path: chunk.file_path.clone(),
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            file_extension,
            metadata: ChunkMetadata {
                codebase_path: codebase_path.to_string(),
                language: chunk.language.as_str().to_string(),
                chunk_index,
            },
        }
    }
}

/// A ranked search result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    /// Document id of the hit
    pub id: String,
    /// File path relative to the owning codebase root
    pub relative_path: String,
    /// First line of the matched span
    pub start_line: u32,
    /// Last line of the matched span
    pub end_line: u32,
    /// Language tag
    pub language: String,
    /// Similarity (dense) or fused (hybrid) score
    pub score: f32,
    /// The matched span content
    pub content: String,
}

/// Lifecycle state of a registered codebase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CodebaseStatus {
    /// Pipeline run in progress
    Indexing,
    /// Last run completed successfully
    Indexed,
    /// Last run failed
    #[serde(rename = "indexfailed")]
    IndexFailed,
}

impl std::fmt::Display for CodebaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Indexing => write!(f, "indexing"),
            Self::Indexed => write!(f, "indexed"),
            Self::IndexFailed => write!(f, "indexfailed"),
        }
    }
}

/// Counters recorded on a successfully indexed codebase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct IndexStats {
    /// Files that produced at least one chunk
    pub files: usize,
    /// Chunks persisted
    pub chunks: usize,
}

/// One registered codebase and its lifecycle state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodebaseRecord {
    /// Canonical absolute root path
    pub root_path: String,
    /// Current lifecycle state
    pub status: CodebaseStatus,
    /// Progress percent, monotone non-decreasing within a run
    pub progress_percent: u8,
    /// Unix milliseconds of the last state change
    pub last_updated_ms: u64,
    /// Deterministic collection name in the vector store
    pub collection_name: String,
    /// Full hex digest of the canonical root (collision bookkeeping)
    pub path_digest: String,
    /// Stats recorded on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<IndexStats>,
    /// Error message recorded on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Percent observed when the failed run stopped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempted_percent: Option<u8>,
}

/// Added/removed/modified relative paths between two snapshots
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SnapshotChanges {
    /// Paths present now but absent from the persisted snapshot
    pub added: Vec<String>,
    /// Paths absent now but present in the persisted snapshot
    pub removed: Vec<String>,
    /// Paths present in both with differing content hashes
    pub modified: Vec<String>,
}

impl SnapshotChanges {
    /// Whether any set is non-empty
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty() || !self.modified.is_empty()
    }

    /// Total number of changed paths
    pub fn total_changes(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }
}

/// Progress event emitted by the pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    /// Human-readable phase description
    pub phase: String,
    /// Units completed in this phase
    pub current: usize,
    /// Total units in this phase
    pub total: usize,
    /// Overall percent, 0-100
    pub percent: u8,
}

/// Terminal status of a single pipeline run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IndexRunStatus {
    /// The whole tree was processed
    Completed,
    /// The per-run chunk ceiling was hit; persisted chunks remain
    LimitReached,
}

/// Result of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexOutcome {
    /// Files that produced at least one persisted chunk
    pub indexed_files: usize,
    /// Chunks persisted in this run
    pub total_chunks: usize,
    /// Whether the run completed or stopped at the chunk ceiling
    pub status: IndexRunStatus,
}

/// Type-safe embedding provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// OpenAI embedding API
    #[default]
    OpenAI,
    /// VoyageAI embedding API
    VoyageAI,
    /// Google Gemini embeddings
    Gemini,
    /// Ollama local embeddings
    Ollama,
    /// Deterministic local embeddings for tests
    Null,
}

impl EmbeddingProviderKind {
    /// Parse a provider string into the enum variant
    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Self::OpenAI),
            "voyageai" => Some(Self::VoyageAI),
            "gemini" => Some(Self::Gemini),
            "ollama" => Some(Self::Ollama),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    /// All supported provider names
    pub fn supported_providers() -> &'static [&'static str] {
        &["openai", "voyageai", "gemini", "ollama", "null"]
    }
}

impl std::fmt::Display for EmbeddingProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAI => write!(f, "openai"),
            Self::VoyageAI => write!(f, "voyageai"),
            Self::Gemini => write!(f, "gemini"),
            Self::Ollama => write!(f, "ollama"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// Type-safe vector store selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreKind {
    /// Milvus over its REST surface
    #[default]
    Milvus,
    /// In-memory store for tests and development
    InMemory,
}

impl VectorStoreKind {
    /// Parse a store string into the enum variant
    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "milvus" => Some(Self::Milvus),
            "in-memory" | "inmemory" => Some(Self::InMemory),
            _ => None,
        }
    }
}

impl std::fmt::Display for VectorStoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Milvus => write!(f, "milvus"),
            Self::InMemory => write!(f, "in-memory"),
        }
    }
}

/// Configuration for embedding providers
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmbeddingConfig {
    /// Which provider implementation to construct
    pub provider: EmbeddingProviderKind,
    /// Model name; provider default when absent
    pub model: Option<String>,
    /// API key for hosted providers
    pub api_key: Option<String>,
    /// Custom base URL (proxies, self-hosted endpoints)
    pub base_url: Option<String>,
}

/// Configuration for vector store adapters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    /// Which adapter to construct
    pub kind: VectorStoreKind,
    /// Backend address, e.g. `http://localhost:19530`
    pub address: String,
    /// Optional authentication token
    pub token: Option<String>,
    /// Account-level collection ceiling, when the deployment has one
    pub collection_limit: Option<usize>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            kind: VectorStoreKind::default(),
            address: "http://localhost:19530".to_string(),
            token: None,
            collection_limit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk() -> Chunk {
        Chunk {
            content: "fn main() {}".to_string(),
            file_path: "src/main.rs".to_string(),
            start_line: 1,
            end_line: 1,
            language: Language::Rust,
        }
    }

    #[test]
    fn document_id_is_deterministic() {
        let a = chunk();
        let b = chunk();
        assert_eq!(a.document_id(), b.document_id());
        assert!(a.document_id().starts_with("chunk_"));
        assert_eq!(a.document_id().len(), "chunk_".len() + 16);
    }

    #[test]
    fn document_id_depends_on_every_component() {
        let base = chunk();
        let mut moved = chunk();
        moved.start_line = 2;
        moved.end_line = 2;
        let mut edited = chunk();
        edited.content.push(' ');
        let mut renamed = chunk();
        renamed.file_path = "src/lib.rs".to_string();

        let ids = [
            base.document_id(),
            moved.document_id(),
            edited.document_id(),
            renamed.document_id(),
        ];
        for (i, a) in ids.iter().enumerate() {
            for b in ids.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn language_round_trips_common_extensions() {
        assert_eq!(Language::from_extension("rs"), Language::Rust);
        assert_eq!(Language::from_extension("PY"), Language::Python);
        assert_eq!(Language::from_extension("ipynb"), Language::Notebook);
        assert_eq!(Language::from_extension("weird"), Language::Unknown);
    }

    #[test]
    fn status_serializes_to_legacy_names() {
        let s = serde_json::to_string(&CodebaseStatus::IndexFailed).unwrap();
        assert_eq!(s, "\"indexfailed\"");
        let s = serde_json::to_string(&CodebaseStatus::Indexing).unwrap();
        assert_eq!(s, "\"indexing\"");
    }

    #[test]
    fn document_extension_extraction() {
        let doc = ChunkDocument::from_chunk(&chunk(), vec![0.0; 4], "/repo", 0);
        assert_eq!(doc.file_extension, "rs");
        assert_eq!(doc.metadata.language, "rust");

        let mut no_ext = chunk();
        no_ext.file_path = "Makefile".to_string();
        let doc = ChunkDocument::from_chunk(&no_ext, vec![0.0; 4], "/repo", 1);
        assert_eq!(doc.file_extension, "");
    }
}
