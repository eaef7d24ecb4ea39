// File: src/audit.rs
//! False-positive audit of extraction against hand-annotated records.

use crate::core::context::PositionStats;
use crate::core::lexicon::{Lexicon, LexiconEntry, TermKey};
use crate::core::types::{Position, Record, RecordId};
use crate::errors::LexError;
use crate::extraction::{extract, ExtractParams};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use tracing::info;

/// Positions annotated as true matches, per record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    records: HashMap<RecordId, BTreeSet<Position>>,
}

impl GroundTruth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an annotation from the tags a record currently carries.
    pub fn annotate_from_tags(&mut self, record: &Record) {
        let positions = self.records.entry(record.id.clone()).or_default();
        positions.extend(record.tags.keys().copied());
    }

    pub fn add(&mut self, record: &str, position: Position) {
        self.records
            .entry(record.to_string())
            .or_default()
            .insert(position);
    }

    /// Removes one annotation. The record stays annotated even when empty.
    pub fn remove(&mut self, record: &str, position: Position) -> bool {
        self.records
            .get_mut(record)
            .is_some_and(|positions| positions.remove(&position))
    }

    pub fn is_annotated(&self, record: &str) -> bool {
        self.records.contains_key(record)
    }

    pub fn is_true(&self, record: &str, position: Position) -> bool {
        self.records
            .get(record)
            .is_some_and(|positions| positions.contains(&position))
    }

    pub fn record_ids(&self) -> impl Iterator<Item = &RecordId> {
        self.records.keys()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuditMode {
    /// Every tagged position missing from the ground truth is reported.
    Hard,
    /// A tagged position directly after a true position is not reported.
    #[default]
    Soft,
}

impl FromStr for AuditMode {
    type Err = LexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "soft" => Ok(Self::Soft),
            "hard" => Ok(Self::Hard),
            other => Err(LexError::InvalidConfig(format!(
                "unknown audit mode '{}', expected 'soft' or 'hard'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FalsePositive {
    pub token: String,
    pub record: RecordId,
    pub position: Position,
    /// Up to three tokens either side of the position, itself included.
    pub window: Vec<String>,
}

/// Re-extracts the annotated records with `lexicon` (plus `extra` entries,
/// added as regular) and reports tagged positions the annotation does not mark.
///
/// Extraction runs on copies; `records` keep their tags.
pub fn false_positives(
    records: &[Record],
    lexicon: &Lexicon,
    stats: Option<&PositionStats>,
    truth: &GroundTruth,
    extra: &[TermKey],
    mode: AuditMode,
    params: &ExtractParams,
) -> Vec<FalsePositive> {
    let mut lexicon = lexicon.clone();
    for key in extra {
        lexicon.insert(LexiconEntry::regular(key.clone()));
    }

    let mut annotated: Vec<Record> = records
        .iter()
        .filter(|r| truth.is_annotated(&r.id))
        .cloned()
        .collect();
    extract(&mut annotated, &lexicon, stats, params);

    let mut found = Vec::new();
    for record in &annotated {
        for &(line, pos) in record.tags.keys() {
            let Some(token) = record.token((line, pos)).filter(|t| !t.is_empty()) else {
                continue;
            };
            if truth.is_true(&record.id, (line, pos)) {
                continue;
            }
            if mode == AuditMode::Soft && pos > 0 && truth.is_true(&record.id, (line, pos - 1)) {
                continue;
            }
            let tokens = &record.lines[line];
            let window = tokens[pos.saturating_sub(3)..(pos + 4).min(tokens.len())].to_vec();
            found.push(FalsePositive {
                token: token.to_string(),
                record: record.id.clone(),
                position: (line, pos),
                window,
            });
        }
    }
    info!(
        "audit ({:?}): {} false positives in {} annotated records",
        mode,
        found.len(),
        annotated.len()
    );
    found
}
