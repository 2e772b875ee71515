//! Application layer for the codectx indexing engine.
//!
//! Orchestrates the domain ports and infrastructure services: the two-stage
//! indexing pipeline with adaptive batching and backpressure, incremental
//! re-indexing from snapshot diffs, the background reconciler, the query
//! router and the context façade the server surface talks to.

pub mod batching;
pub mod context;
pub mod pipeline;
pub mod reconciler;
pub mod search;

pub use batching::BatchPlan;
pub use context::{CodeContext, SplitterSet, StatusReport};
pub use pipeline::{IndexingPipeline, ProgressCallback};
pub use reconciler::Reconciler;
pub use search::QueryRouter;
