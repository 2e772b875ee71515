//! Code splitting: syntax-aware with a character-window fallback

mod syntax;
mod window;

use codectx_domain::error::Result;
use codectx_domain::ports::Splitter;
use codectx_domain::types::{Chunk, Language};

/// A contiguous span produced by either strategy, 1-based inclusive lines
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Span {
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
}

/// Splitter preferring top-level declaration boundaries when a grammar is
/// available, with bounded-size character windows otherwise
#[derive(Default)]
pub struct CodeSplitter;

impl CodeSplitter {
    /// Create a new splitter
    pub fn new() -> Self {
        Self
    }
}

impl Splitter for CodeSplitter {
    fn split(&self, content: &str, language: Language, file_path: &str) -> Result<Vec<Chunk>> {
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let spans = match syntax::grammar_for(language)
            .and_then(|grammar| syntax::split_syntax(content, grammar))
        {
            Some(spans) if !spans.is_empty() => spans,
            _ => window::split_window(content),
        };

        Ok(spans_to_chunks(spans, language, file_path))
    }
}

/// Splitter using only the character-window strategy, selected when a caller
/// passes the `window` splitter hint
#[derive(Default)]
pub struct WindowSplitter;

impl WindowSplitter {
    /// Create a new window-only splitter
    pub fn new() -> Self {
        Self
    }
}

impl Splitter for WindowSplitter {
    fn split(&self, content: &str, language: Language, file_path: &str) -> Result<Vec<Chunk>> {
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(spans_to_chunks(
            window::split_window(content),
            language,
            file_path,
        ))
    }
}

fn spans_to_chunks(spans: Vec<Span>, language: Language, file_path: &str) -> Vec<Chunk> {
    spans
        .into_iter()
        .filter(|span| !span.content.trim().is_empty())
        .map(|span| Chunk {
            content: span.content,
            file_path: file_path.to_string(),
            start_line: span.start_line,
            end_line: span.end_line,
            language,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use codectx_domain::constants::CHUNK_WINDOW_SIZE;

    fn split(content: &str, language: Language) -> Vec<Chunk> {
        CodeSplitter::new().split(content, language, "test.src").unwrap()
    }

    #[test]
    fn empty_file_yields_no_chunks() {
        assert!(split("", Language::Rust).is_empty());
        assert!(split("  \n\n  ", Language::Python).is_empty());
    }

    #[test]
    fn chunk_invariants_hold_for_all_strategies() {
        let rust = "fn a() { 1 }\n\nfn b() { 2 }\n";
        let plain = "line one\nline two\nline three\n";
        for (content, language) in [(rust, Language::Rust), (plain, Language::PlainText)] {
            let chunks = split(content, language);
            assert!(!chunks.is_empty());
            for chunk in &chunks {
                assert!(chunk.start_line >= 1);
                assert!(chunk.end_line >= chunk.start_line);
                assert!(!chunk.content.is_empty());
                assert_eq!(chunk.file_path, "test.src");
            }
        }
    }

    #[test]
    fn rust_functions_split_on_declaration_boundaries() {
        let body = "x + 1\n".repeat(400);
        let content = format!("fn first() {{\n{body}}}\n\nfn second() {{\n{body}}}\n");
        let chunks = split(&content, Language::Rust);
        assert!(chunks.len() >= 2);
        assert!(chunks[0].content.starts_with("fn first"));
        assert!(chunks.iter().any(|c| c.content.contains("fn second")));
    }

    #[test]
    fn small_declarations_are_concatenated() {
        let content = "fn a() {}\nfn b() {}\nfn c() {}\n";
        let chunks = split(content, Language::Rust);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.contains("fn a"));
        assert!(chunks[0].content.contains("fn c"));
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 3);
    }

    #[test]
    fn unknown_language_falls_back_to_windows() {
        let line = format!("{}\n", "x".repeat(100));
        let content = line.repeat(100);
        let chunks = split(&content, Language::Unknown);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.content.len() <= CHUNK_WINDOW_SIZE + 101);
        }
    }

    #[test]
    fn mixed_line_endings_count_as_logical_lines() {
        let content = "alpha\r\nbeta\ngamma\r\n";
        let chunks = split(content, Language::PlainText);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 3);
    }

    #[test]
    fn window_splitter_ignores_grammar_availability() {
        let content = "fn a() {}\nfn b() {}\n";
        let chunks = WindowSplitter::new()
            .split(content, Language::Rust, "lib.rs")
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, content);
    }
}
