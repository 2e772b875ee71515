//! Ports (trait abstractions) consumed by the application layer
//!
//! Any implementation of these traits satisfies the pipeline; concrete
//! adapters live in `codectx-providers`.

mod embedding;
mod splitter;
mod vector_store;

pub use embedding::EmbeddingProvider;
pub use splitter::Splitter;
pub use vector_store::{HybridQuery, QueryRow, ScoredDoc, SearchOptions, VectorStore};
