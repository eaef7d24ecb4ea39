// File: src/extraction.rs
use crate::core::context::{Context, PositionStats};
use crate::core::lexicon::{Lexicon, MAX_TERM_TOKENS};
use crate::core::types::{Record, TagClass};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractParams {
    pub window: usize,
    /// Ambiguous entries are tagged only where the partial-match score is below this.
    pub ambiguous_cutoff: f64,
}

impl Default for ExtractParams {
    fn default() -> Self {
        Self {
            window: 3,
            ambiguous_cutoff: 0.01,
        }
    }
}

/// Re-tags every record from scratch. Returns the number of tags assigned.
///
/// Without `stats`, ambiguous entries are never accepted. Stats trained
/// against another lexicon are not detected and give meaningless scores.
pub fn extract(
    records: &mut [Record],
    lexicon: &Lexicon,
    stats: Option<&PositionStats>,
    params: &ExtractParams,
) -> usize {
    let tagged: usize = records
        .par_iter_mut()
        .map(|r| extract_record(r, lexicon, stats, params))
        .sum();
    info!("tagged {} positions in {} records", tagged, records.len());
    tagged
}

/// Clears the record's tags, then tags every lexicon match left to right.
/// At each position the longest acceptable entry wins and consumes its span.
pub fn extract_record(
    record: &mut Record,
    lexicon: &Lexicon,
    stats: Option<&PositionStats>,
    params: &ExtractParams,
) -> usize {
    record.clear_tags();
    let mut hits: Vec<(usize, usize, usize, TagClass)> = Vec::new();

    for (ln, line) in record.lines.iter().enumerate() {
        let mut i = 0;
        while i < line.len() {
            let longest = (1..=MAX_TERM_TOKENS.min(line.len() - i))
                .rev()
                .find_map(|n| {
                    let entry = lexicon.get(&line[i..i + n])?;
                    if entry.class == TagClass::Ambiguous {
                        let stats = stats?;
                        let context =
                            Context::around(&record.lines, ln, i, i + n - 1, params.window, lexicon);
                        let score = stats.score(&context);
                        if score >= params.ambiguous_cutoff {
                            debug!(
                                "record {}: ambiguous '{}' skipped at ({}, {}), score {:.3}",
                                record.id, entry.raw, ln, i, score
                            );
                            return None;
                        }
                    }
                    Some((n, entry.class))
                });
            match longest {
                Some((n, class)) => {
                    hits.push((ln, i, n, class));
                    i += n;
                }
                None => i += 1,
            }
        }
    }

    let mut tagged = 0;
    for (ln, start, n, class) in hits {
        for pos in start..start + n {
            if record.set_tag((ln, pos), class) {
                tagged += 1;
            }
        }
    }
    tagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::Slot;
    use crate::core::lexicon::{LexiconEntry, TermKey};

    fn record(text: &str) -> Record {
        Record::from_lines(
            "r",
            text.split('\n')
                .map(|l| l.split_whitespace().map(str::to_string).collect())
                .collect(),
        )
    }

    fn entry(key: &str, class: TagClass) -> LexiconEntry {
        LexiconEntry::new(TermKey::parse(key).unwrap(), class)
    }

    fn tagged(r: &Record) -> Vec<(usize, usize, TagClass)> {
        r.tags.values().map(|t| (t.line, t.pos, t.class)).collect()
    }

    #[test]
    fn longest_match_wins() {
        let lexicon: Lexicon = [
            entry("mono", TagClass::Fuzzy),
            entry("mono cedocard", TagClass::Regular),
        ]
        .into_iter()
        .collect();
        let mut r = record("mono cedocard mono");
        extract_record(&mut r, &lexicon, None, &ExtractParams::default());
        assert_eq!(
            tagged(&r),
            vec![
                (0, 0, TagClass::Regular),
                (0, 1, TagClass::Regular),
                (0, 2, TagClass::Fuzzy)
            ]
        );
    }

    #[test]
    fn ambiguous_needs_position_stats() {
        let lexicon: Lexicon = [entry("retard", TagClass::Ambiguous)].into_iter().collect();
        let mut r = record("mono cedocard retard");
        assert_eq!(extract_record(&mut r, &lexicon, None, &ExtractParams::default()), 0);

        let stats = PositionStats::default();
        assert_eq!(
            extract_record(&mut r, &lexicon, Some(&stats), &ExtractParams::default()),
            1
        );
        assert_eq!(tagged(&r), vec![(0, 2, TagClass::Ambiguous)]);
    }

    #[test]
    fn ambiguous_rejected_in_match_like_context() {
        let lexicon: Lexicon = [entry("retard", TagClass::Ambiguous)].into_iter().collect();
        let mut r = record("mono cedocard retard");
        let context = Context::around(&r.lines, 0, 2, 2, 3, &lexicon);
        assert_eq!(context.slots()[2], Slot::Token("cedocard".into()));
        let mut stats = PositionStats::default();
        stats.global.add_context(&context);
        stats.matched.add_context(&context);
        assert_eq!(
            extract_record(&mut r, &lexicon, Some(&stats), &ExtractParams::default()),
            0
        );
    }

    #[test]
    fn rejected_ambiguous_falls_back_to_shorter_entry() {
        let lexicon: Lexicon = [
            entry("mono cedocard", TagClass::Ambiguous),
            entry("mono", TagClass::Regular),
        ]
        .into_iter()
        .collect();
        let mut r = record("mono cedocard");
        extract_record(&mut r, &lexicon, None, &ExtractParams::default());
        assert_eq!(tagged(&r), vec![(0, 0, TagClass::Regular)]);
    }

    #[test]
    fn re_extraction_replaces_stale_tags() {
        let lexicon: Lexicon = [entry("aspirin", TagClass::Regular)].into_iter().collect();
        let mut r = record("aspirin daily\nnone");
        r.set_tag((1, 0), TagClass::Fuzzy);
        let mut records = vec![r];
        extract(&mut records, &lexicon, None, &ExtractParams::default());
        let once = tagged(&records[0]);
        extract(&mut records, &lexicon, None, &ExtractParams::default());
        assert_eq!(once, vec![(0, 0, TagClass::Regular)]);
        assert_eq!(tagged(&records[0]), once);
    }

    #[test]
    fn matches_do_not_span_lines() {
        let lexicon: Lexicon = [entry("mono cedocard", TagClass::Regular)].into_iter().collect();
        let mut r = record("mono\ncedocard");
        assert_eq!(extract_record(&mut r, &lexicon, None, &ExtractParams::default()), 0);
    }
}
