// File: src/fuzzy/ngram.rs
use crate::fuzzy::FuzzyMatch;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::debug;

/// Character n-grams of every whitespace-separated word, each word padded
/// with one space on both sides. A padded word shorter than `n` is its own gram.
pub fn char_ngrams(text: &str, n: usize) -> Vec<String> {
    let mut grams = Vec::new();
    for word in text.split_whitespace() {
        let padded: Vec<char> = std::iter::once(' ')
            .chain(word.chars())
            .chain(std::iter::once(' '))
            .collect();
        if padded.len() <= n {
            grams.push(padded.iter().collect());
        } else {
            grams.extend(padded.windows(n).map(|w| w.iter().collect::<String>()));
        }
    }
    grams
}

/// L2-normalised raw term-frequency vector, sorted by gram id.
type SparseVec = Vec<(usize, f64)>;

/// Gram vocabulary shared by candidates and targets.
#[derive(Debug, Default)]
struct GramSpace {
    n: usize,
    ids: HashMap<String, usize>,
}

impl GramSpace {
    fn new(n: usize) -> Self {
        Self {
            n,
            ids: HashMap::new(),
        }
    }

    fn vectorize(&mut self, text: &str) -> SparseVec {
        let mut tf: HashMap<usize, f64> = HashMap::new();
        for gram in char_ngrams(text, self.n) {
            let next = self.ids.len();
            let id = *self.ids.entry(gram).or_insert(next);
            *tf.entry(id).or_insert(0.0) += 1.0;
        }
        let norm = tf.values().map(|v| v * v).sum::<f64>().sqrt();
        let mut v: SparseVec = tf.into_iter().map(|(id, c)| (id, c / norm)).collect();
        v.sort_unstable_by_key(|&(id, _)| id);
        v
    }
}

/// Best lexicon target for every word whose cosine similarity over
/// character n-grams reaches `lower_bound`.
///
/// Ties between targets go to the one listed first. The result follows the
/// order of `words`.
pub fn single_token_fuzzy(
    words: &[String],
    targets: &[String],
    n: usize,
    lower_bound: f64,
) -> Vec<FuzzyMatch> {
    if words.is_empty() || targets.is_empty() {
        return Vec::new();
    }

    let mut space = GramSpace::new(n.max(1));
    // gram id -> (target index, weight)
    let mut postings: HashMap<usize, Vec<(usize, f64)>> = HashMap::new();
    for (t, target) in targets.iter().enumerate() {
        for (id, w) in space.vectorize(target) {
            postings.entry(id).or_default().push((t, w));
        }
    }
    let queries: Vec<SparseVec> = words.iter().map(|w| space.vectorize(w)).collect();

    let matches: Vec<FuzzyMatch> = queries
        .par_iter()
        .zip(words.par_iter())
        .filter_map(|(query, word)| {
            let mut dots = vec![0.0f64; targets.len()];
            for (id, w) in query {
                for &(t, tw) in postings.get(id).into_iter().flatten() {
                    dots[t] += w * tw;
                }
            }
            let (best, similarity) = dots
                .iter()
                .copied()
                .enumerate()
                .fold((0, f64::MIN), |acc, (t, s)| if s > acc.1 { (t, s) } else { acc });
            (similarity > 0.0 && similarity >= lower_bound).then(|| FuzzyMatch {
                candidate: word.clone(),
                target: targets[best].clone(),
                similarity: similarity.min(1.0),
            })
        })
        .collect();

    debug!(
        "fuzzy matched {} of {} strings against {} targets",
        matches.len(),
        words.len(),
        targets.len()
    );
    matches
}
