//! Infrastructure layer for the codectx indexing engine.
//!
//! Filesystem traversal, ignore-pattern resolution, content snapshots, the
//! durable codebase registry, cross-process advisory coordination, process
//! memory probing, configuration and logging. Everything here is a concrete
//! per-process service; the application layer receives these via constructor
//! injection rather than module-level state.

pub mod config;
pub mod fsutil;
pub mod ignore_rules;
pub mod locks;
pub mod logging;
pub mod memory;
pub mod registry;
pub mod snapshot;
pub mod walker;

pub use config::Config;
pub use ignore_rules::IgnoreRules;
pub use locks::{LockOptions, LockService, SlotSemaphore};
pub use registry::CodebaseRegistry;
pub use snapshot::Synchronizer;
pub use walker::FileWalker;
