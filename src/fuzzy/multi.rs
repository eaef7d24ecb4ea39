// File: src/fuzzy/multi.rs
use crate::core::lexicon::Lexicon;
use crate::core::types::Record;
use crate::fuzzy::ngram::single_token_fuzzy;
use crate::fuzzy::pmi::PmiTable;
use crate::fuzzy::FuzzyMatch;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyParams {
    /// Characters per n-gram.
    pub ngram: usize,
    /// Minimum cosine similarity for a fuzzy match.
    pub lower_bound: f64,
    /// A word pair must exceed this PMI to form a multi-token candidate.
    pub pmi_bound: f64,
}

impl Default for FuzzyParams {
    fn default() -> Self {
        Self {
            ngram: 2,
            lower_bound: 0.85,
            pmi_bound: 7.0,
        }
    }
}

/// Strongly bonded word pairs and the triples formed by chaining them.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BondedSpans {
    pub pairs: BTreeSet<String>,
    pub triples: BTreeSet<String>,
}

/// Collects every adjacent pair whose PMI exceeds `bound`, and every triple
/// made of two such pairs overlapping on their shared middle token.
pub fn bonded_spans(records: &[Record], pmi: &PmiTable, bound: f64) -> BondedSpans {
    let mut spans = BondedSpans::default();
    for record in records {
        for line in &record.lines {
            let bonded: Vec<bool> = line
                .windows(2)
                .map(|w| pmi.get(&w[0], &w[1]).is_some_and(|score| score > bound))
                .collect();
            for (i, &strong) in bonded.iter().enumerate() {
                if !strong {
                    continue;
                }
                spans.pairs.insert(format!("{} {}", line[i], line[i + 1]));
                if bonded.get(i + 1).copied().unwrap_or(false) {
                    spans
                        .triples
                        .insert(format!("{} {} {}", line[i], line[i + 1], line[i + 2]));
                }
            }
        }
    }
    spans
}

/// Fuzzy-matches bonded pairs and triples against the multi-token lexicon entries.
///
/// A triple is dropped when a matched pair is a substring of it with at least
/// the triple's similarity; on equal similarity the pair is kept.
pub fn multi_token_fuzzy(
    records: &[Record],
    lexicon: &Lexicon,
    pmi: &PmiTable,
    params: &FuzzyParams,
) -> Vec<FuzzyMatch> {
    let targets = lexicon.joined_keys(true);
    if targets.is_empty() {
        return Vec::new();
    }
    let spans = bonded_spans(records, pmi, params.pmi_bound);
    let pairs: Vec<String> = spans.pairs.into_iter().collect();
    let triples: Vec<String> = spans.triples.into_iter().collect();

    let mut matches = single_token_fuzzy(&pairs, &targets, params.ngram, params.lower_bound);
    let pair_matches = matches.len();
    let triple_matches = single_token_fuzzy(&triples, &targets, params.ngram, params.lower_bound);
    let covered = |triple: &FuzzyMatch| {
        matches[..pair_matches].iter().any(|pair| {
            triple.candidate.contains(pair.candidate.as_str()) && pair.similarity >= triple.similarity
        })
    };
    let kept: Vec<FuzzyMatch> = triple_matches.into_iter().filter(|t| !covered(t)).collect();
    matches.extend(kept);

    info!(
        "multi-token fuzzy: {} pairs, {} triples bonded; {} matches",
        pairs.len(),
        triples.len(),
        matches.len()
    );
    matches
}
