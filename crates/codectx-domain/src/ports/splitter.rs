//! Splitter port

use crate::error::Result;
use crate::types::{Chunk, Language};

/// Contract for turning file contents into chunks.
///
/// Implementations carry no persistent state. Every returned chunk has
/// `start_line >= 1`, `end_line >= start_line` and non-empty content; empty
/// files yield zero chunks.
pub trait Splitter: Send + Sync {
    /// Split `content` into chunks, preferring a syntax-aware strategy when a
    /// grammar for `language` is available
    fn split(&self, content: &str, language: Language, file_path: &str) -> Result<Vec<Chunk>>;
}
