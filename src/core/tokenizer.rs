// File: src/core/tokenizer.rs
use crate::core::types::{Position, Record, RecordId};
use regex::Regex;
use std::collections::HashMap;
use unicode_segmentation::UnicodeSegmentation;

/// Replaces every run of digits inside a token.
pub const DIGIT_PLACEHOLDER: char = 'D';

/// Splits a single lowercased line into tokens.
pub trait Tokenizer {
    fn split_line(&self, line: &str) -> Vec<String>;
}

/// Splits on Unicode word boundaries, keeping punctuation as separate
/// single-character tokens and dropping whitespace.
#[derive(Debug, Default, Clone, Copy)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn split_line(&self, line: &str) -> Vec<String> {
        line.split_word_bounds()
            .filter(|segment| !segment.trim().is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Output of [`TextMasker::mask_text`]: the masked lines plus the digit groups they hid.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Tokenized {
    pub numbers: HashMap<Position, Vec<String>>,
    pub lines: Vec<Vec<String>>,
}

/// Lowercases, tokenizes and digit-masks raw text.
pub struct TextMasker<T = WordTokenizer> {
    tokenizer: T,
    digits: Regex,
}

impl TextMasker<WordTokenizer> {
    pub fn new() -> Self {
        Self::with_tokenizer(WordTokenizer)
    }
}

impl Default for TextMasker<WordTokenizer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Tokenizer> TextMasker<T> {
    pub fn with_tokenizer(tokenizer: T) -> Self {
        Self {
            tokenizer,
            digits: Regex::new(r"\d+").expect("static digit pattern is valid"),
        }
    }

    /// Tokenizes one line and masks its digit runs.
    /// Returns the masked tokens and, per token index, the digit groups removed.
    pub fn mask_line(&self, line: &str) -> (Vec<String>, Vec<(usize, Vec<String>)>) {
        let mut groups = Vec::new();
        let tokens = self
            .tokenizer
            .split_line(&line.to_lowercase())
            .into_iter()
            .enumerate()
            .map(|(i, token)| {
                let found: Vec<String> = self
                    .digits
                    .find_iter(&token)
                    .map(|m| m.as_str().to_string())
                    .collect();
                if found.is_empty() {
                    return token;
                }
                groups.push((i, found));
                self.digits
                    .replace_all(&token, DIGIT_PLACEHOLDER.to_string().as_str())
                    .into_owned()
            })
            .collect();
        (tokens, groups)
    }

    /// Splits `text` on newlines and tokenizes every line.
    pub fn mask_text(&self, text: &str) -> Tokenized {
        let mut out = Tokenized::default();
        for (ln, line) in text.split('\n').enumerate() {
            let (tokens, groups) = self.mask_line(line);
            for (pos, found) in groups {
                out.numbers.insert((ln, pos), found);
            }
            out.lines.push(tokens);
        }
        out
    }

    /// Builds a record from raw text.
    pub fn record(&self, id: impl Into<RecordId>, text: &str) -> Record {
        let Tokenized { numbers, lines } = self.mask_text(text);
        let mut record = Record::from_lines(id, lines);
        record.numbers = numbers;
        record
    }
}

/// Puts digit groups back in place of successive placeholders.
pub fn unmask_digits(token: &str, groups: &[String]) -> String {
    let mut groups = groups.iter().peekable();
    let mut out = String::with_capacity(token.len());
    for c in token.chars() {
        match groups.next_if(|_| c == DIGIT_PLACEHOLDER) {
            Some(g) => out.push_str(g),
            None => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_digits_and_keeps_punctuation_as_tokens() {
        let t = TextMasker::new().mask_text("Given 40mg Aspirin.\nDaily");
        assert_eq!(t.lines[0], vec!["given", "Dmg", "aspirin", "."]);
        assert_eq!(t.lines[1], vec!["daily"]);
        assert_eq!(t.numbers.get(&(0, 1)), Some(&vec!["40".to_string()]));
        assert_eq!(t.numbers.len(), 1);
    }

    #[test]
    fn unmask_restores_groups_in_order() {
        let groups = vec!["3".to_string(), "5".to_string()];
        assert_eq!(unmask_digits("D.Dmg", &groups), "3.5mg");
        assert_eq!(unmask_digits("mg", &groups), "mg");
    }

    #[test]
    fn record_keeps_the_number_map() {
        let r = TextMasker::new().record("r1", "Mono Cedocard 20");
        assert_eq!(r.lines, vec![vec!["mono", "cedocard", "D"]]);
        assert_eq!(r.restored_token((0, 2)).as_deref(), Some("20"));
    }

    #[test]
    fn empty_lines_are_kept() {
        let t = TextMasker::new().mask_text("a\n\nb");
        assert_eq!(t.lines.len(), 3);
        assert!(t.lines[1].is_empty());
    }
}
