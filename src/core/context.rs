// File: src/core/context.rs
//! Positional context statistics learned from known lexicon matches.
//!
//! Every token span of 1..=3 tokens is characterised by its neighbours at
//! offsets `-window..=-1` and `1..=window`. Contexts that often surround a
//! known match, but not only known matches, are accepted as evidence that an
//! unlisted span in the same surroundings is a lexicon-like term. Per-slot
//! marginals of global and accepted contexts give the partial-match score,
//! which generalises to contexts never seen next to a match.

use crate::core::lexicon::{Lexicon, MAX_TERM_TOKENS};
use crate::core::types::Record;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Tokens shorter than this (in chars) end a span and never start one.
pub const MIN_TOKEN_CHARS: usize = 2;

/// One neighbour of an anchor span.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Slot {
    Token(String),
    /// The neighbour is itself a lexicon term.
    Known,
    /// The offset falls outside the record or past an adjacent line.
    Empty,
}

/// Neighbourhood of a span, ordered from offset `-window` to `+window`, skipping 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Context(Vec<Slot>);

impl Context {
    /// Context of the span `lines[line][start..=end]`.
    ///
    /// Offsets that leave the current line continue into the adjacent line only;
    /// anything further away, or outside the record, is [`Slot::Empty`].
    pub fn around(
        lines: &[Vec<String>],
        line: usize,
        start: usize,
        end: usize,
        window: usize,
        lexicon: &Lexicon,
    ) -> Self {
        let w = window as isize;
        let slots = (-w..=w)
            .filter(|&k| k != 0)
            .map(|k| {
                let anchor = if k < 0 { start } else { end };
                neighbor(lines, line, anchor, k, lexicon)
            })
            .collect();
        Self(slots)
    }

    pub fn from_slots(slots: Vec<Slot>) -> Self {
        Self(slots)
    }

    pub fn slots(&self) -> &[Slot] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn neighbor(
    lines: &[Vec<String>],
    line: usize,
    anchor: usize,
    offset: isize,
    lexicon: &Lexicon,
) -> Slot {
    let here = &lines[line];
    let p = anchor as isize + offset;
    let token = if p < 0 {
        let back = p.unsigned_abs();
        line.checked_sub(1)
            .map(|prev| &lines[prev])
            .filter(|prev| back <= prev.len())
            .map(|prev| &prev[prev.len() - back])
    } else if p as usize >= here.len() {
        let ahead = p as usize - here.len();
        lines.get(line + 1).and_then(|next| next.get(ahead))
    } else {
        here.get(p as usize)
    };

    match token {
        None => Slot::Empty,
        Some(t) if t.is_empty() => Slot::Empty,
        Some(t) if lexicon.is_known_token(t) => Slot::Known,
        Some(t) => Slot::Token(t.clone()),
    }
}

/// Candidate spans starting at `start`: up to [`MAX_TERM_TOKENS`] tokens,
/// cut at the end of the line or at the first token shorter than [`MIN_TOKEN_CHARS`].
pub(crate) fn spans_from(line: &[String], start: usize) -> impl Iterator<Item = &[String]> {
    let tail = line.get(start..).unwrap_or(&[]);
    let usable = tail
        .iter()
        .take(MAX_TERM_TOKENS)
        .take_while(|t| t.chars().count() >= MIN_TOKEN_CHARS)
        .count();
    (1..=usable).map(move |n| &tail[..n])
}

/// Per-slot occurrence counts keyed by `(offset index, slot value)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionCounters {
    counts: HashMap<(usize, Slot), u64>,
}

impl PositionCounters {
    pub fn increment(&mut self, index: usize, slot: Slot) {
        *self.counts.entry((index, slot)).or_insert(0) += 1;
    }

    /// Counts every slot of `context` once.
    pub fn add_context(&mut self, context: &Context) {
        for (i, slot) in context.slots().iter().enumerate() {
            self.increment(i, slot.clone());
        }
    }

    pub fn get(&self, index: usize, slot: &Slot) -> u64 {
        // (usize, &Slot) does not borrow as (usize, Slot)
        self.counts.get(&(index, slot.clone())).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// The global and matched position counters. Only valid for the lexicon they
/// were trained against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionStats {
    pub global: PositionCounters,
    pub matched: PositionCounters,
}

impl PositionStats {
    /// Mean over slots of `matched / global` for the slot's value.
    /// Slots never observed globally contribute 0.
    pub fn score(&self, context: &Context) -> f64 {
        if context.is_empty() {
            return 0.0;
        }
        let total: f64 = context
            .slots()
            .iter()
            .enumerate()
            .map(|(i, slot)| match self.global.get(i, slot) {
                0 => 0.0,
                global => self.matched.get(i, slot) as f64 / global as f64,
            })
            .sum();
        total / context.len() as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainParams {
    pub window: usize,
    /// Minimum `matched / global` ratio for a context to be accepted outright.
    pub threshold: f64,
    /// Minimum partial-match score for a never-matched context.
    pub partial_threshold: f64,
    /// A context must be matched more than this many times.
    pub min_count: u64,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            window: 3,
            threshold: 0.25,
            partial_threshold: 0.25,
            min_count: 1,
        }
    }
}

/// Raw context occurrence counts for one shard of records.
#[derive(Default)]
struct ContextCounts {
    global: HashMap<Context, u64>,
    matched: HashMap<Context, u64>,
}

impl ContextCounts {
    fn scan(record: &Record, lexicon: &Lexicon, window: usize) -> Self {
        let mut counts = Self::default();
        let lines = &record.lines;
        for (ln, line) in lines.iter().enumerate() {
            for i in 0..line.len() {
                for span in spans_from(line, i) {
                    let context = Context::around(lines, ln, i, i + span.len() - 1, window, lexicon);
                    if lexicon.contains(span) {
                        *counts.matched.entry(context.clone()).or_insert(0) += 1;
                    }
                    *counts.global.entry(context).or_insert(0) += 1;
                }
            }
        }
        counts
    }

    fn merge(mut self, other: Self) -> Self {
        for (c, n) in other.global {
            *self.global.entry(c).or_insert(0) += n;
        }
        for (c, n) in other.matched {
            *self.matched.entry(c).or_insert(0) += n;
        }
        self
    }
}

/// Accepted contexts plus the position statistics they were derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextModel {
    window: usize,
    accepted: HashSet<Context>,
    stats: PositionStats,
}

impl ContextModel {
    /// Learns which contexts signal a lexicon term.
    ///
    /// Records are scanned in parallel; shard counts are summed before any
    /// threshold is applied.
    pub fn train(records: &[Record], lexicon: &Lexicon, params: &TrainParams) -> Self {
        let counts = records
            .par_iter()
            .map(|r| ContextCounts::scan(r, lexicon, params.window))
            .reduce(ContextCounts::default, ContextCounts::merge);

        let mut accepted: HashSet<Context> = counts
            .matched
            .iter()
            .filter(|&(c, &m)| {
                let g = counts.global.get(c).copied().unwrap_or(0);
                g > 0 && m as f64 / g as f64 > params.threshold && m != g && m > params.min_count
            })
            .map(|(c, _)| c.clone())
            .collect();
        let exact = accepted.len();

        let mut stats = PositionStats::default();
        for c in counts.global.keys() {
            stats.global.add_context(c);
        }
        for c in &accepted {
            stats.matched.add_context(c);
        }

        let partial: Vec<Context> = counts
            .global
            .keys()
            .filter(|c| !counts.matched.contains_key(*c))
            .filter(|c| stats.score(c) > params.partial_threshold)
            .cloned()
            .collect();
        accepted.extend(partial);

        info!(
            "trained context model: {} contexts observed, {} matched, {} accepted ({} by partial score)",
            counts.global.len(),
            counts.matched.len(),
            accepted.len(),
            accepted.len() - exact
        );
        debug!(
            "position counters: {} global, {} matched",
            stats.global.len(),
            stats.matched.len()
        );

        Self {
            window: params.window,
            accepted,
            stats,
        }
    }

    pub fn accepts(&self, context: &Context) -> bool {
        self.accepted.contains(context)
    }

    pub fn accepted(&self) -> &HashSet<Context> {
        &self.accepted
    }

    pub fn stats(&self) -> &PositionStats {
        &self.stats
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn into_parts(self) -> (HashSet<Context>, PositionStats) {
        (self.accepted, self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lexicon::{LexiconEntry, TermKey};

    fn lines(text: &str) -> Vec<Vec<String>> {
        text.split('\n')
            .map(|l| l.split_whitespace().map(str::to_string).collect())
            .collect()
    }

    fn tok(s: &str) -> Slot {
        Slot::Token(s.to_string())
    }

    fn lexicon(keys: &[&str]) -> Lexicon {
        keys.iter()
            .map(|k| LexiconEntry::regular(TermKey::parse(k).unwrap()))
            .collect()
    }

    #[test]
    fn context_crosses_into_adjacent_lines_only() {
        let l = lines("a b\nc d e\nf");
        let c = Context::around(&l, 1, 1, 1, 3, &Lexicon::new());
        assert_eq!(
            c.slots(),
            &[tok("a"), tok("b"), tok("c"), tok("e"), tok("f"), Slot::Empty]
        );
    }

    #[test]
    fn context_is_empty_past_the_record_edges() {
        let l = lines("x y z");
        let c = Context::around(&l, 0, 0, 1, 3, &Lexicon::new());
        assert_eq!(
            c.slots(),
            &[Slot::Empty, Slot::Empty, Slot::Empty, tok("z"), Slot::Empty, Slot::Empty]
        );
        assert_eq!(c.len(), 6);
    }

    #[test]
    fn short_neighbours_keep_their_value() {
        let l = lines("given aspirin , daily");
        let c = Context::around(&l, 0, 1, 1, 1, &Lexicon::new());
        assert_eq!(c.slots(), &[tok("given"), tok(",")]);
    }

    #[test]
    fn known_terms_collapse_to_a_single_slot_value() {
        let l = lines("took aspirin with water");
        let c = Context::around(&l, 0, 2, 2, 3, &lexicon(&["aspirin"]));
        assert_eq!(c.slots()[1], tok("took"));
        assert_eq!(c.slots()[2], Slot::Known);
    }

    #[test]
    fn spans_stop_at_short_tokens_and_line_end() {
        let line: Vec<String> = ["mono", "cedocard", ",", "daily"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let spans: Vec<usize> = spans_from(&line, 0).map(<[String]>::len).collect();
        assert_eq!(spans, vec![1, 2]);
        assert_eq!(spans_from(&line, 2).count(), 0);
        assert_eq!(spans_from(&line, 3).count(), 1);
        assert_eq!(spans_from(&line, 9).count(), 0);
    }

    #[test]
    fn score_averages_slot_ratios() {
        let mut stats = PositionStats::default();
        let c = Context::from_slots(vec![tok("a"), tok("b")]);
        stats.global.add_context(&c);
        stats.global.increment(0, tok("a"));
        stats.matched.increment(0, tok("a"));
        // slot 0: 1/2, slot 1: 0/1
        assert!((stats.score(&c) - 0.25).abs() < 1e-12);

        stats.matched.increment(1, tok("b"));
        assert!((stats.score(&c) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn score_of_unseen_context_is_zero() {
        let stats = PositionStats::default();
        let c = Context::from_slots(vec![tok("q"); 6]);
        assert_eq!(stats.score(&c), 0.0);
    }

    fn corpus() -> Vec<Record> {
        let texts = [
            "patient given aspirin daily .",
            "patient given ibuprofen daily .",
            "patient given aspirin daily .",
            "patient given aspirin daily .",
            "patient given paracetamol daily .",
            "nurse saw patient in ward .",
        ];
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Record::from_lines(format!("r{}", i), lines(t)))
            .collect()
    }

    #[test]
    fn accepts_contexts_shared_by_matches_and_unknown_spans() {
        let lex = lexicon(&["aspirin"]);
        let model = ContextModel::train(&corpus(), &lex, &TrainParams::default());
        let around_drug = Context::from_slots(vec![
            Slot::Empty,
            tok("patient"),
            tok("given"),
            tok("daily"),
            tok("."),
            Slot::Empty,
        ]);
        // matched 3 of 5 times
        assert!(model.accepts(&around_drug));
        assert!(model.stats().score(&around_drug) > 0.0);
    }

    #[test]
    fn rejects_contexts_that_only_wrap_known_terms() {
        let records: Vec<Record> = (0..3)
            .map(|i| Record::from_lines(format!("r{}", i), lines("patient given aspirin daily")))
            .collect();
        let lex = lexicon(&["aspirin"]);
        let model = ContextModel::train(&records, &lex, &TrainParams::default());
        let exclusive = Context::from_slots(vec![
            Slot::Empty,
            tok("patient"),
            tok("given"),
            tok("daily"),
            Slot::Empty,
            Slot::Empty,
        ]);
        assert!(!model.accepts(&exclusive));
    }

    #[test]
    fn min_count_is_strict() {
        let lex = lexicon(&["aspirin"]);
        let params = TrainParams {
            min_count: 3,
            partial_threshold: 1.0,
            ..TrainParams::default()
        };
        let model = ContextModel::train(&corpus(), &lex, &params);
        assert!(model.accepted().is_empty());
    }

    #[test]
    fn unmatched_context_accepted_by_partial_score() {
        let mut texts = Vec::new();
        for when in ["now", "today", "tonight"] {
            texts.push(format!("take aspirin {}", when));
            texts.push(format!("take aspirin {}", when));
            texts.push(format!("take other {}", when));
        }
        texts.push("take qq later".to_string());
        let records: Vec<Record> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Record::from_lines(format!("r{}", i), lines(t)))
            .collect();
        let lex = lexicon(&["aspirin"]);
        let params = TrainParams {
            window: 1,
            ..TrainParams::default()
        };
        let model = ContextModel::train(&records, &lex, &params);

        let later = Context::from_slots(vec![tok("take"), tok("later")]);
        // 'take' on the left: 3 of 5 distinct contexts accepted; 'later' never
        assert!((model.stats().score(&later) - 0.3).abs() < 1e-12);
        assert!(model.accepts(&later));
        assert!(model.accepts(&Context::from_slots(vec![tok("take"), tok("now")])));

        let strict = ContextModel::train(
            &records,
            &lex,
            &TrainParams {
                partial_threshold: 0.35,
                ..params
            },
        );
        assert!(!strict.accepts(&later));
        assert_eq!(strict.accepted().len(), 3);
    }

    #[test]
    fn training_is_deterministic() {
        let lex = lexicon(&["aspirin", "ibuprofen"]);
        let a = ContextModel::train(&corpus(), &lex, &TrainParams::default());
        let b = ContextModel::train(&corpus(), &lex, &TrainParams::default());
        assert_eq!(a, b);
    }

    #[test]
    fn trained_scores_stay_within_unit_interval() {
        let lex = lexicon(&["aspirin"]);
        let records = corpus();
        let model = ContextModel::train(&records, &lex, &TrainParams::default());
        for r in &records {
            for (ln, line) in r.lines.iter().enumerate() {
                for i in 0..line.len() {
                    let c = Context::around(&r.lines, ln, i, i, 3, &lex);
                    let s = model.stats().score(&c);
                    assert!((0.0..=1.0).contains(&s), "score {} out of range", s);
                }
            }
        }
    }
}
