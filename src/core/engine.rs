// File: src/core/engine.rs
use crate::config::EngineConfig;
use crate::core::context::{ContextModel, PositionStats, MIN_TOKEN_CHARS};
use crate::core::lexicon::{Lexicon, TermKey};
use crate::core::types::Record;
use crate::discovery::{discover, Candidate};
use crate::errors::Result;
use crate::extraction::extract;
use crate::fuzzy::{multi_token_fuzzy, single_token_fuzzy, FuzzyMatch, PmiTable};
use crate::learning::{apply_review, extend_fuzzy};
use crate::persistence::Store;
use crate::review::{ReviewSession, Reviewer};
use std::collections::{BTreeSet, HashSet};
use tracing::{info, warn};

/// The corpus, the lexicon being grown, and what has been learned about both.
pub struct MiningEngine {
    pub records: Vec<Record>,
    pub lexicon: Lexicon,
    pub rejected: HashSet<TermKey>,
    model: Option<ContextModel>,
    candidates: Vec<Candidate>,
    config: EngineConfig,
    /// Set when the lexicon changed after the model was trained.
    stale_model: bool,
}

impl MiningEngine {
    pub fn new(records: Vec<Record>, lexicon: Lexicon, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            records,
            lexicon,
            rejected: HashSet::new(),
            model: None,
            candidates: Vec::new(),
            config,
            stale_model: false,
        })
    }

    /// Loads records, lexicon and rejected set, plus a trained model if one was saved.
    pub fn load_all(store: &Store, config: EngineConfig) -> Result<Self> {
        let mut engine = Self::new(store.load_records()?, store.load_lexicon()?, config)?;
        engine.rejected = store.load_rejected_or_empty()?;
        if store.paths().context_model().exists() {
            engine.model = Some(store.load_context_model()?);
        }
        Ok(engine)
    }

    /// Persists everything. A model made stale by lexicon changes is retrained
    /// first, so the stored model always matches the stored lexicon.
    pub fn save_all(&mut self, store: &Store) -> Result<()> {
        if self.stale_model && self.model.is_some() {
            info!("retraining before save: lexicon changed since the model was trained");
            self.train();
        }
        store.save_records(&self.records)?;
        store.save_lexicon(&self.lexicon)?;
        store.save_rejected(&self.rejected)?;
        if let Some(model) = &self.model {
            store.save_context_model(model)?;
            store.save_position_stats(model.stats())?;
        }
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn model(&self) -> Option<&ContextModel> {
        self.model.as_ref()
    }

    pub fn stats(&self) -> Option<&PositionStats> {
        self.model.as_ref().map(ContextModel::stats)
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn train(&mut self) -> &ContextModel {
        let model = ContextModel::train(&self.records, &self.lexicon, &self.config.train);
        self.stale_model = false;
        self.model.insert(model)
    }

    /// Ranks unlisted candidates, training first if needed. Rejected spans are left out.
    pub fn discover(&mut self) -> &[Candidate] {
        if self.model.is_none() || self.stale_model {
            self.train();
        }
        let Some(model) = self.model.as_ref() else {
            return &[];
        };
        let mut found = discover(&self.records, &self.lexicon, model, model.window());
        found.retain(|c| !self.rejected.contains(&c.span));
        self.candidates = found;
        &self.candidates
    }

    /// Proposes fuzzy variants of lexicon entries and adds the new ones.
    pub fn extend_fuzzy(&mut self) -> Vec<FuzzyMatch> {
        let params = self.config.fuzzy;
        let words: Vec<String> = self
            .records
            .iter()
            .flat_map(|r| r.lines.iter().flatten())
            .filter(|w| w.chars().count() >= MIN_TOKEN_CHARS)
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let targets = self.lexicon.joined_keys(false);

        let mut matches = single_token_fuzzy(&words, &targets, params.ngram, params.lower_bound);
        let pmi = PmiTable::compute(&self.records);
        matches.extend(multi_token_fuzzy(&self.records, &self.lexicon, &pmi, &params));

        if extend_fuzzy(&mut self.lexicon, &matches) > 0 {
            self.stale_model = true;
        }
        matches
    }

    /// Runs a review session over the current candidates and folds in the result.
    /// Reviewed candidates leave the queue.
    pub fn review(&mut self, reviewer: &mut dyn Reviewer) -> usize {
        let session = ReviewSession::new(self.config.review);
        let outcome = session.run(&self.candidates, &self.rejected, reviewer);
        let shown: HashSet<TermKey> = outcome.shown.iter().cloned().collect();
        self.candidates.retain(|c| !shown.contains(&c.span));
        let accepted = apply_review(&mut self.lexicon, &mut self.rejected, outcome);
        if accepted > 0 {
            self.stale_model = true;
        }
        accepted
    }

    /// Re-tags every record with the current lexicon.
    pub fn extract(&mut self) -> usize {
        if self.stale_model {
            warn!("lexicon changed since training; ambiguous entries are scored with stale statistics");
        }
        let stats = self.model.as_ref().map(ContextModel::stats);
        let tagged = extract(&mut self.records, &self.lexicon, stats, &self.config.extract);
        info!("extraction done: {} tags", tagged);
        tagged
    }
}
