//! Vector store adapters and their factory

mod in_memory;
mod milvus;

use std::sync::Arc;

use codectx_domain::error::Result;
use codectx_domain::ports::VectorStore;
use codectx_domain::types::{VectorStoreConfig, VectorStoreKind};

pub use in_memory::InMemoryVectorStore;
pub use milvus::MilvusVectorStore;

/// Construct the vector store selected by `config`
pub fn create_vector_store(config: &VectorStoreConfig) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match config.kind {
        VectorStoreKind::Milvus => Arc::new(MilvusVectorStore::new(config)?),
        VectorStoreKind::InMemory => Arc::new(InMemoryVectorStore::new(config.collection_limit)),
    };
    Ok(store)
}
