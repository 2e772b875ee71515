//! Syntax-aware splitting along top-level declaration boundaries
//!
//! Parses with tree-sitter and walks the root's named children. Consecutive
//! small declarations are concatenated to approach the size target without
//! exceeding it; a single oversized declaration is window-split in place with
//! its line numbers preserved.

use codectx_domain::constants::CHUNK_WINDOW_SIZE;
use codectx_domain::types::Language;
use tree_sitter::Parser;

use super::{window, Span};

/// The grammar for `language`, when one is compiled in
pub(crate) fn grammar_for(language: Language) -> Option<tree_sitter::Language> {
    match language {
        Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
        Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
        Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
        Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
        Language::Java => Some(tree_sitter_java::LANGUAGE.into()),
        Language::C => Some(tree_sitter_c::LANGUAGE.into()),
        Language::Cpp => Some(tree_sitter_cpp::LANGUAGE.into()),
        Language::CSharp => Some(tree_sitter_c_sharp::LANGUAGE.into()),
        _ => None,
    }
}

/// One top-level region awaiting grouping
struct Region {
    start_byte: usize,
    end_byte: usize,
    start_line: u32,
    end_line: u32,
}

/// Split along top-level declarations; `None` when parsing yields nothing
/// useful and the caller should fall back to windows
pub(crate) fn split_syntax(content: &str, grammar: tree_sitter::Language) -> Option<Vec<Span>> {
    let mut parser = Parser::new();
    parser.set_language(&grammar).ok()?;
    let tree = parser.parse(content, None)?;
    let root = tree.root_node();

    let mut cursor = root.walk();
    let regions: Vec<Region> = root
        .named_children(&mut cursor)
        .map(|node| Region {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: node.start_position().row as u32 + 1,
            end_line: node.end_position().row as u32 + 1,
        })
        .collect();
    if regions.is_empty() {
        return None;
    }

    let mut spans = Vec::new();
    let mut group: Option<Region> = None;
    for region in regions {
        match group.take() {
            None => group = Some(region),
            Some(current) => {
                if region.end_byte - current.start_byte <= CHUNK_WINDOW_SIZE {
                    group = Some(Region {
                        start_byte: current.start_byte,
                        end_byte: region.end_byte,
                        start_line: current.start_line,
                        end_line: region.end_line,
                    });
                } else {
                    push_region(content, current, &mut spans);
                    group = Some(region);
                }
            }
        }
    }
    if let Some(current) = group {
        push_region(content, current, &mut spans);
    }

    Some(spans)
}

fn push_region(content: &str, region: Region, spans: &mut Vec<Span>) {
    let Some(text) = content.get(region.start_byte..region.end_byte) else {
        return;
    };
    if text.len() <= CHUNK_WINDOW_SIZE {
        spans.push(Span {
            start_line: region.start_line,
            end_line: region.end_line,
            content: text.to_string(),
        });
        return;
    }
    // Oversized declaration: window-split its body, offsetting line numbers
    for mut span in window::split_window(text) {
        span.start_line += region.start_line - 1;
        span.end_line += region.start_line - 1;
        spans.push(span);
    }
}
