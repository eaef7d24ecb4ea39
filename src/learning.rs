// File: src/learning.rs
use crate::core::lexicon::{Lexicon, LexiconEntry, TermKey};
use crate::fuzzy::FuzzyMatch;
use crate::review::ReviewOutcome;
use std::collections::HashSet;
use tracing::{info, warn};

/// Adds every fuzzy match whose span is not yet a lexicon key as a
/// [`Fuzzy`](crate::core::types::TagClass::Fuzzy) entry pointing at the
/// entry it resembles. Returns the number of new entries.
pub fn extend_fuzzy(lexicon: &mut Lexicon, matches: &[FuzzyMatch]) -> usize {
    let mut added = 0;
    for m in matches {
        let (key, parent) = match (TermKey::parse(&m.candidate), TermKey::parse(&m.target)) {
            (Ok(key), Ok(parent)) => (key, parent),
            (Err(e), _) | (_, Err(e)) => {
                warn!("skipping fuzzy match '{}' -> '{}': {}", m.candidate, m.target, e);
                continue;
            }
        };
        if lexicon.contains(key.tokens()) {
            continue;
        }
        lexicon.insert(LexiconEntry::fuzzy(key, parent));
        added += 1;
    }
    info!("added {} fuzzy entries ({} proposed)", added, matches.len());
    added
}

/// Folds a review session into the lexicon and the rejected set.
/// Accepted spans overwrite any existing entry with the chosen class.
pub fn apply_review(
    lexicon: &mut Lexicon,
    rejected: &mut HashSet<TermKey>,
    outcome: ReviewOutcome,
) -> usize {
    let accepted = outcome.accepted.len();
    for (key, class) in outcome.accepted {
        lexicon.insert(LexiconEntry::new(key, class));
    }
    *rejected = outcome.rejected;
    info!(
        "review accepted {} of {} shown; {} rejected overall",
        accepted,
        outcome.shown.len(),
        rejected.len()
    );
    accepted
}
