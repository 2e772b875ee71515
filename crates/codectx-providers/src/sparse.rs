//! Deterministic BM25-style sparse encoding
//!
//! Turns chunk content into a sparse vector for the lexical leg of hybrid
//! search. Terms hash into a fixed dimensionality with seahash, so the same
//! content always produces the same representation regardless of host or
//! insertion order.

use std::collections::{BTreeMap, HashMap};

use crate::constants::{
    BM25_AVG_DOC_LEN, BM25_B, BM25_K1, BM25_SPARSE_DIM, BM25_TOKEN_MIN_LENGTH,
};

/// BM25-style sparse encoder with a deterministic tokenizer
#[derive(Debug, Clone)]
pub struct Bm25SparseEncoder {
    k1: f32,
    b: f32,
}

impl Default for Bm25SparseEncoder {
    fn default() -> Self {
        Self {
            k1: BM25_K1,
            b: BM25_B,
        }
    }
}

impl Bm25SparseEncoder {
    /// Encoder with standard BM25 parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokenize text into terms: lowercase, alphanumeric plus underscore,
    /// short tokens dropped
    pub fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|token| token.len() > BM25_TOKEN_MIN_LENGTH)
            .map(|token| token.to_string())
            .collect()
    }

    /// Stable sparse dimension index of a term
    pub fn term_index(term: &str) -> u32 {
        (seahash::hash(term.as_bytes()) % u64::from(BM25_SPARSE_DIM)) as u32
    }

    /// Encode document content into `(dimension, weight)` pairs.
    ///
    /// Weights are length-normalized saturated term frequencies; corpus
    /// statistics are left to the backend's inverted index.
    pub fn encode_document(&self, content: &str) -> BTreeMap<u32, f32> {
        let tokens = Self::tokenize(content);
        let doc_len = tokens.len() as f32;
        if tokens.is_empty() {
            return BTreeMap::new();
        }

        let mut term_freq: HashMap<String, f32> = HashMap::new();
        for token in tokens {
            *term_freq.entry(token).or_insert(0.0) += 1.0;
        }

        let norm = 1.0 - self.b + self.b * doc_len / BM25_AVG_DOC_LEN;
        let mut sparse = BTreeMap::new();
        for (term, tf) in term_freq {
            let weight = (tf * (self.k1 + 1.0)) / (tf + self.k1 * norm);
            sparse.insert(Self::term_index(&term), weight);
        }
        sparse
    }

    /// Encode a query: one unit weight per distinct term
    pub fn encode_query(&self, query: &str) -> BTreeMap<u32, f32> {
        let mut sparse = BTreeMap::new();
        for token in Self::tokenize(query) {
            sparse.insert(Self::term_index(&token), 1.0);
        }
        sparse
    }

    /// Lexical relevance of `content` for `query`: dot product of the two
    /// encodings. Used by the in-memory store's sparse leg.
    pub fn score(&self, query: &str, content: &str) -> f32 {
        let q = self.encode_query(query);
        if q.is_empty() {
            return 0.0;
        }
        let d = self.encode_document(content);
        q.iter()
            .filter_map(|(dim, qw)| d.get(dim).map(|dw| qw * dw))
            .sum()
    }
}
