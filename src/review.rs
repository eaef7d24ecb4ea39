// File: src/review.rs
use crate::core::lexicon::TermKey;
use crate::core::types::TagClass;
use crate::discovery::Candidate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Someone (or something) that triages discovered candidates.
pub trait Reviewer {
    /// Decides on one batch. Returns the spans to accept with their class,
    /// or `None` to end the session before this batch counts as shown.
    fn review_batch(&mut self, batch: &[Candidate]) -> Option<Vec<(TermKey, TagClass)>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewParams {
    /// Candidates shown at once.
    pub batch_size: usize,
    /// Candidates considered per session.
    pub limit: usize,
}

impl Default for ReviewParams {
    fn default() -> Self {
        Self {
            batch_size: 20,
            limit: 250,
        }
    }
}

/// What a session decided.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewOutcome {
    /// Accepted spans, each `Regular` or `Ambiguous`.
    pub accepted: Vec<(TermKey, TagClass)>,
    /// The previous rejected set plus every shown candidate not accepted.
    pub rejected: HashSet<TermKey>,
    /// Spans the reviewer actually saw.
    pub shown: Vec<TermKey>,
}

pub struct ReviewSession {
    params: ReviewParams,
}

impl ReviewSession {
    pub fn new(params: ReviewParams) -> Self {
        Self { params }
    }

    /// Shows the top not-yet-rejected candidates in batches.
    pub fn run(
        &self,
        candidates: &[Candidate],
        rejected: &HashSet<TermKey>,
        reviewer: &mut dyn Reviewer,
    ) -> ReviewOutcome {
        let queue: Vec<Candidate> = candidates
            .iter()
            .filter(|c| !rejected.contains(&c.span))
            .take(self.params.limit)
            .cloned()
            .collect();

        let mut outcome = ReviewOutcome {
            rejected: rejected.clone(),
            ..ReviewOutcome::default()
        };
        for batch in queue.chunks(self.params.batch_size.max(1)) {
            let Some(decisions) = reviewer.review_batch(batch) else {
                debug!("review stopped after {} candidates", outcome.shown.len());
                break;
            };
            let mut accepted_here: HashSet<TermKey> = HashSet::new();
            for (span, class) in decisions {
                if !batch.iter().any(|c| c.span == span) {
                    warn!("ignoring decision for '{}', not in the current batch", span);
                    continue;
                }
                let class = match class {
                    TagClass::Fuzzy => {
                        warn!("'{}' accepted as fuzzy, storing as regular", span);
                        TagClass::Regular
                    }
                    other => other,
                };
                if accepted_here.insert(span.clone()) {
                    outcome.accepted.push((span, class));
                }
            }
            for c in batch {
                if !accepted_here.contains(&c.span) {
                    outcome.rejected.insert(c.span.clone());
                }
                outcome.shown.push(c.span.clone());
            }
        }
        outcome
    }
}
