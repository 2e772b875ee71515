//! Provider adapters for the codectx indexing engine.
//!
//! Concrete implementations of the domain ports: embedding providers
//! (OpenAI, VoyageAI, Gemini, Ollama and a deterministic null provider for
//! tests), vector store adapters (Milvus over REST, in-memory) and the
//! code splitter (tree-sitter with a character-window fallback).

pub mod constants;
pub mod embedding;
pub mod sparse;
pub mod splitter;
pub mod vector_store;

pub use embedding::create_embedding_provider;
pub use splitter::{CodeSplitter, WindowSplitter};
pub use vector_store::create_vector_store;
