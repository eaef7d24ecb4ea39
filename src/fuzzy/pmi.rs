// File: src/fuzzy/pmi.rs
use crate::core::types::Record;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Right-hand neighbour of every sentence-final word.
pub const END_OF_SENTENCE: &str = "<end>";

/// Pointwise mutual information of adjacent word pairs:
/// `left -> right -> ln(P(left, right) / (P(left) * P(right)))`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PmiTable {
    scores: HashMap<String, HashMap<String, f64>>,
}

impl PmiTable {
    /// Counts bigrams over every non-empty line of every record.
    ///
    /// Words seen only once in the corpus are dropped before pairing, so they
    /// neither get a score nor count towards the totals. The last remaining
    /// word of a line pairs with [`END_OF_SENTENCE`].
    pub fn compute(records: &[Record]) -> Self {
        let sentences: Vec<&Vec<String>> = records
            .iter()
            .flat_map(|r| r.lines.iter())
            .filter(|line| !line.is_empty())
            .collect();

        let mut freq: HashMap<&str, u64> = HashMap::new();
        for word in sentences.iter().flat_map(|s| s.iter()) {
            *freq.entry(word.as_str()).or_insert(0) += 1;
        }

        let mut pairs: HashMap<&str, HashMap<&str, u64>> = HashMap::new();
        let mut total = 0u64;
        for sentence in &sentences {
            let kept: Vec<&str> = sentence
                .iter()
                .map(String::as_str)
                .filter(|w| freq.get(w).copied().unwrap_or(0) > 1)
                .collect();
            total += kept.len() as u64;
            for (i, &left) in kept.iter().enumerate() {
                let right = kept.get(i + 1).copied().unwrap_or(END_OF_SENTENCE);
                *pairs.entry(left).or_default().entry(right).or_insert(0) += 1;
            }
        }

        let row_total = |w: &str| -> u64 {
            if w == END_OF_SENTENCE {
                sentences.len() as u64
            } else {
                pairs.get(w).map(|row| row.values().sum()).unwrap_or(0)
            }
        };

        let mut scores: HashMap<String, HashMap<String, f64>> = HashMap::new();
        let n = total as f64;
        for (&left, row) in &pairs {
            let p_left = row_total(left) as f64 / n;
            for (&right, &count) in row {
                let p_right = row_total(right) as f64 / n;
                if p_right == 0.0 {
                    continue;
                }
                let p_pair = count as f64 / n;
                scores
                    .entry(left.to_string())
                    .or_default()
                    .insert(right.to_string(), (p_pair / (p_left * p_right)).ln());
            }
        }

        debug!(
            "pmi over {} sentences, {} kept tokens, {} left words",
            sentences.len(),
            total,
            scores.len()
        );
        Self { scores }
    }

    pub fn get(&self, left: &str, right: &str) -> Option<f64> {
        self.scores.get(left)?.get(right).copied()
    }

    pub fn row(&self, left: &str) -> Option<&HashMap<String, f64>> {
        self.scores.get(left)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}
