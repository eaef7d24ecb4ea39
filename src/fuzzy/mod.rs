// File: src/fuzzy/mod.rs
//! Lexicon variants proposed by character similarity and word co-occurrence.

pub mod multi;
pub mod ngram;
pub mod pmi;

pub use multi::{multi_token_fuzzy, FuzzyParams};
pub use ngram::single_token_fuzzy;
pub use pmi::PmiTable;

/// A candidate string and the lexicon string it most resembles.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    pub candidate: String,
    pub target: String,
    /// Cosine similarity in `[0, 1]`.
    pub similarity: f64,
}
