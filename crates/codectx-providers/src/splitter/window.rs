//! Character-window fallback splitter
//!
//! Emits chunks of at most ~2500 bytes with ~300 bytes of trailing overlap
//! carried into the next chunk. Chunks break at line boundaries only, so a
//! single line longer than the window becomes its own chunk.

use codectx_domain::constants::{CHUNK_WINDOW_OVERLAP, CHUNK_WINDOW_SIZE};

use super::Span;

/// Split `content` into bounded windows of whole lines
pub(crate) fn split_window(content: &str) -> Vec<Span> {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let mut spans = Vec::new();
    let mut start = 0usize;

    while start < lines.len() {
        let mut size = 0usize;
        let mut end = start;
        while end < lines.len() {
            let line_len = lines[end].len();
            if size > 0 && size + line_len > CHUNK_WINDOW_SIZE {
                break;
            }
            size += line_len;
            end += 1;
        }

        let text: String = lines[start..end].concat();
        if !text.trim().is_empty() {
            spans.push(Span {
                start_line: (start + 1) as u32,
                end_line: end as u32,
                content: text,
            });
        }

        if end >= lines.len() {
            break;
        }

        // Step back whole lines worth at most the overlap budget, keeping
        // forward progress
        let mut overlap = 0usize;
        let mut next = end;
        while next > start + 1 {
            let line_len = lines[next - 1].len();
            if overlap + line_len > CHUNK_WINDOW_OVERLAP {
                break;
            }
            overlap += line_len;
            next -= 1;
        }
        start = next;
    }

    spans
}
