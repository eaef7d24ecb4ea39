// File: src/core/lexicon.rs
use crate::core::tokenizer::{TextMasker, Tokenizer};
use crate::core::types::TagClass;
use crate::errors::{LexError, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// Longest span, in tokens, a lexicon entry may cover.
pub const MAX_TERM_TOKENS: usize = 3;

/// The token span a lexicon entry matches: 1..=3 non-empty tokens.
///
/// Construction is the only validation point; every key reachable from a
/// [`Lexicon`] is well formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TermKey(Vec<String>);

impl TermKey {
    pub fn new<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        if tokens.is_empty()
            || tokens.len() > MAX_TERM_TOKENS
            || tokens.iter().any(|t| t.is_empty())
        {
            return Err(LexError::InvalidKey {
                got: tokens,
                max: MAX_TERM_TOKENS,
            });
        }
        Ok(Self(tokens))
    }

    /// Splits an already-tokenized, space-joined span.
    pub fn parse(joined: &str) -> Result<Self> {
        Self::new(joined.split_whitespace())
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn joined(&self) -> String {
        self.0.join(" ")
    }
}

impl Borrow<[String]> for TermKey {
    fn borrow(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for TermKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexiconEntry {
    pub key: TermKey,
    /// Human-readable form, digits included.
    pub raw: String,
    /// Digit groups masked out of `raw`.
    pub numbers: Vec<String>,
    pub class: TagClass,
    /// Key of the entry a fuzzy entry was generated from. Provenance only.
    pub parent: Option<TermKey>,
}

impl LexiconEntry {
    pub fn new(key: TermKey, class: TagClass) -> Self {
        let raw = key.joined();
        Self {
            key,
            raw,
            numbers: Vec::new(),
            class,
            parent: None,
        }
    }

    pub fn regular(key: TermKey) -> Self {
        Self::new(key, TagClass::Regular)
    }

    pub fn fuzzy(key: TermKey, parent: TermKey) -> Self {
        Self {
            parent: Some(parent),
            ..Self::new(key, TagClass::Fuzzy)
        }
    }
}

impl fmt::Display for LexiconEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// The controlled vocabulary, keyed by token span. Re-inserting a key overwrites.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lexicon {
    entries: HashMap<TermKey, LexiconEntry>,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads one entry per line. Digit runs are masked the same way records are.
    /// Lines that do not form a 1..=3 token key are skipped.
    pub fn from_text<T: Tokenizer>(text: &str, masker: &TextMasker<T>) -> Self {
        let mut lexicon = Self::new();
        for line in text.lines() {
            let raw = line.trim();
            if raw.is_empty() {
                continue;
            }
            let (tokens, groups) = masker.mask_line(raw);
            let key = match TermKey::new(tokens) {
                Ok(key) => key,
                Err(e) => {
                    warn!("skipping lexicon line '{}': {}", raw, e);
                    continue;
                }
            };
            let mut entry = LexiconEntry::regular(key);
            entry.raw = raw.to_string();
            entry.numbers = groups.into_iter().flat_map(|(_, g)| g).collect();
            lexicon.insert(entry);
        }
        debug!("built lexicon with {} entries", lexicon.len());
        lexicon
    }

    /// Inserts `entry`, returning the entry it replaced.
    pub fn insert(&mut self, entry: LexiconEntry) -> Option<LexiconEntry> {
        self.entries.insert(entry.key.clone(), entry)
    }

    pub fn get(&self, span: &[String]) -> Option<&LexiconEntry> {
        self.entries.get(span)
    }

    pub fn contains(&self, span: &[String]) -> bool {
        self.entries.contains_key(span)
    }

    /// True when `token` on its own is a lexicon key.
    pub fn is_known_token(&self, token: &String) -> bool {
        self.contains(std::slice::from_ref(token))
    }

    pub fn remove(&mut self, span: &[String]) -> Option<LexiconEntry> {
        self.entries.remove(span)
    }

    /// The entry a fuzzy entry was generated from, if it is still present.
    pub fn parent_of(&self, span: &[String]) -> Option<&LexiconEntry> {
        let parent = self.get(span)?.parent.as_ref()?;
        self.get(parent.tokens())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LexiconEntry> {
        self.entries.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &TermKey> {
        self.entries.keys()
    }

    /// Space-joined keys, sorted, optionally restricted to multi-token entries.
    pub fn joined_keys(&self, multi_token_only: bool) -> Vec<String> {
        let mut keys: Vec<String> = self
            .keys()
            .filter(|k| !multi_token_only || k.len() > 1)
            .map(TermKey::joined)
            .collect();
        keys.sort();
        keys
    }
}

impl FromIterator<LexiconEntry> for Lexicon {
    fn from_iter<I: IntoIterator<Item = LexiconEntry>>(iter: I) -> Self {
        let mut lexicon = Self::new();
        for entry in iter {
            lexicon.insert(entry);
        }
        lexicon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> TermKey {
        TermKey::parse(s).unwrap()
    }

    #[test]
    fn rejects_malformed_keys_at_the_boundary() {
        assert!(matches!(
            TermKey::parse(""),
            Err(LexError::InvalidKey { .. })
        ));
        assert!(TermKey::parse("a b c d").is_err());
        assert!(TermKey::new(vec!["a", ""]).is_err());
        assert_eq!(key("mono cedocard retard").len(), 3);
    }

    #[test]
    fn lookup_by_token_slice() {
        let lexicon: Lexicon = [LexiconEntry::regular(key("mono cedocard"))]
            .into_iter()
            .collect();
        let tokens: Vec<String> = vec!["mono".into(), "cedocard".into()];
        assert!(lexicon.contains(&tokens));
        assert!(!lexicon.contains(&tokens[..1]));
        assert!(!lexicon.is_known_token(&tokens[0]));
    }

    #[test]
    fn reinserting_a_key_overwrites() {
        let mut lexicon = Lexicon::new();
        lexicon.insert(LexiconEntry::regular(key("aspirin")));
        let old = lexicon.insert(LexiconEntry::new(key("aspirin"), TagClass::Ambiguous));
        assert_eq!(old.map(|e| e.class), Some(TagClass::Regular));
        assert_eq!(lexicon.len(), 1);
        assert_eq!(
            lexicon.get(key("aspirin").tokens()).map(|e| e.class),
            Some(TagClass::Ambiguous)
        );
    }

    #[test]
    fn parent_is_resolved_by_key_and_may_dangle() {
        let mut lexicon = Lexicon::new();
        lexicon.insert(LexiconEntry::regular(key("aspirin")));
        lexicon.insert(LexiconEntry::fuzzy(key("aspirn"), key("aspirin")));
        assert_eq!(
            lexicon.parent_of(key("aspirn").tokens()).map(|e| e.raw.as_str()),
            Some("aspirin")
        );
        lexicon.remove(key("aspirin").tokens());
        assert!(lexicon.parent_of(key("aspirn").tokens()).is_none());
        assert!(lexicon.get(key("aspirn").tokens()).is_some());
    }

    #[test]
    fn builds_from_text_with_masked_numbers() {
        let text = "Mono Cedocard 20\n\nAspirin\none two three four\n";
        let lexicon = Lexicon::from_text(text, &TextMasker::new());
        assert_eq!(lexicon.len(), 2);
        let entry = lexicon.get(key("mono cedocard D").tokens()).unwrap();
        assert_eq!(entry.raw, "Mono Cedocard 20");
        assert_eq!(entry.numbers, vec!["20".to_string()]);
        assert_eq!(entry.class, TagClass::Regular);
    }
}
