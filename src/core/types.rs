// src/core/types.rs
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Identifier of a record inside a corpus.
pub type RecordId = String;

/// A `(line, position)` pair addressing one token of a record.
pub type Position = (usize, usize);

/// How a lexicon entry, and every tag produced from it, was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TagClass {
    /// Confirmed by a reviewer, matched unconditionally.
    Regular,
    /// Confirmed, but only matched in contexts unlike known matches.
    Ambiguous,
    /// Proposed by character or co-occurrence similarity.
    Fuzzy,
}

impl fmt::Display for TagClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TagClass::Regular => "regular",
            TagClass::Ambiguous => "ambiguous",
            TagClass::Fuzzy => "fuzzy",
        };
        f.write_str(name)
    }
}

/// A match assigned to a single token position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub line: usize,
    pub pos: usize,
    pub token: String,
    pub class: TagClass,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{}): {} - {}", self.line, self.pos, self.token, self.class)
    }
}

/// A tokenized free-text record.
///
/// Tokens are fixed once the record is built; only `tags` changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub lines: Vec<Vec<String>>,
    /// Digit groups masked out of the token at each position.
    pub numbers: HashMap<Position, Vec<String>>,
    pub tags: BTreeMap<Position, Tag>,
}

impl Record {
    pub fn from_lines(id: impl Into<RecordId>, lines: Vec<Vec<String>>) -> Self {
        Self {
            id: id.into(),
            lines,
            numbers: HashMap::new(),
            tags: BTreeMap::new(),
        }
    }

    pub fn token(&self, (line, pos): Position) -> Option<&str> {
        self.lines.get(line)?.get(pos).map(String::as_str)
    }

    pub fn tag(&self, position: Position) -> Option<&Tag> {
        self.tags.get(&position)
    }

    /// Tags `position` if it addresses a real token. Returns whether a tag was set.
    pub fn set_tag(&mut self, position: Position, class: TagClass) -> bool {
        let Some(token) = self.token(position).map(str::to_owned) else {
            return false;
        };
        let (line, pos) = position;
        self.tags.insert(position, Tag { line, pos, token, class });
        true
    }

    pub fn clear_tags(&mut self) {
        self.tags.clear();
    }

    /// Token text with its masked digit groups restored, if any were recorded.
    pub fn restored_token(&self, position: Position) -> Option<String> {
        let token = self.token(position)?;
        let Some(groups) = self.numbers.get(&position) else {
            return Some(token.to_string());
        };
        Some(crate::core::tokenizer::unmask_digits(token, groups))
    }

    pub fn token_count(&self) -> usize {
        self.lines.iter().map(Vec::len).sum()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record({})", self.id)
    }
}
