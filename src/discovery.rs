// File: src/discovery.rs
use crate::core::context::{spans_from, Context, ContextModel, MIN_TOKEN_CHARS};
use crate::core::lexicon::{Lexicon, TermKey};
use crate::core::types::Record;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::info;

/// An unlisted span found in an accepted context.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub span: TermKey,
    /// Occurrences across the corpus.
    pub count: u64,
    /// Context of the first occurrence seen.
    pub example: Context,
}

/// Ranks every span that is not a lexicon key but sits in a context the model
/// accepts. Most frequent first; equal counts are ordered by span.
pub fn discover(
    records: &[Record],
    lexicon: &Lexicon,
    model: &ContextModel,
    window: usize,
) -> Vec<Candidate> {
    let found = records
        .par_iter()
        .map(|r| scan_record(r, lexicon, model, window))
        .reduce(HashMap::new, merge);

    let mut ranked: Vec<Candidate> = found
        .into_iter()
        .map(|(span, (count, example))| Candidate { span, count, example })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.span.cmp(&b.span)));

    info!("discovered {} distinct candidates", ranked.len());
    ranked
}

type Found = HashMap<TermKey, (u64, Context)>;

fn scan_record(record: &Record, lexicon: &Lexicon, model: &ContextModel, window: usize) -> Found {
    let mut found = Found::new();
    let lines = &record.lines;
    for (ln, line) in lines.iter().enumerate() {
        for (i, token) in line.iter().enumerate() {
            if token.chars().count() < MIN_TOKEN_CHARS || lexicon.is_known_token(token) {
                continue;
            }
            for span in spans_from(line, i) {
                let context = Context::around(lines, ln, i, i + span.len() - 1, window, lexicon);
                if !model.accepts(&context) || lexicon.contains(span) {
                    continue;
                }
                // spans_from only yields 1..=3 non-empty tokens
                let Ok(key) = TermKey::new(span.iter().cloned()) else {
                    continue;
                };
                found.entry(key).or_insert((0, context)).0 += 1;
            }
        }
    }
    found
}

fn merge(mut a: Found, b: Found) -> Found {
    for (span, (count, example)) in b {
        a.entry(span).or_insert((0, example)).0 += count;
    }
    a
}
