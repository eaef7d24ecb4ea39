// File: src/config.rs
use crate::core::context::TrainParams;
use crate::errors::{LexError, Result};
use crate::extraction::ExtractParams;
use crate::fuzzy::FuzzyParams;
use crate::review::ReviewParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Every tunable threshold of the engine. Missing JSON fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub train: TrainParams,
    pub extract: ExtractParams,
    pub fuzzy: FuzzyParams,
    pub review: ReviewParams,
}

impl EngineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| LexError::io(path, e))?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(LexError::InvalidConfig(format!("{} must be within [0, 1], got {}", name, v)))
            }
        };
        if self.train.window == 0 {
            return Err(LexError::InvalidConfig("train.window must be at least 1".into()));
        }
        if self.extract.window != self.train.window {
            return Err(LexError::InvalidConfig(format!(
                "extract.window ({}) must equal train.window ({}) for scores to be meaningful",
                self.extract.window, self.train.window
            )));
        }
        unit("train.threshold", self.train.threshold)?;
        unit("train.partial_threshold", self.train.partial_threshold)?;
        unit("extract.ambiguous_cutoff", self.extract.ambiguous_cutoff)?;
        unit("fuzzy.lower_bound", self.fuzzy.lower_bound)?;
        if self.fuzzy.ngram == 0 {
            return Err(LexError::InvalidConfig("fuzzy.ngram must be at least 1".into()));
        }
        if self.review.batch_size == 0 {
            return Err(LexError::InvalidConfig("review.batch_size must be at least 1".into()));
        }
        Ok(())
    }
}

/// File locations of every persisted blob, all under one explicit directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn records(&self) -> PathBuf {
        self.root.join("records.bin")
    }

    pub fn lexicon(&self) -> PathBuf {
        self.root.join("lexicon.bin")
    }

    pub fn rejected(&self) -> PathBuf {
        self.root.join("rejected.bin")
    }

    /// The global/matched position-counter pair.
    pub fn position_stats(&self) -> PathBuf {
        self.root.join("pos_stats.bin")
    }

    pub fn context_model(&self) -> PathBuf {
        self.root.join("context_model.bin")
    }

    pub fn ground_truth(&self) -> PathBuf {
        self.root.join("annotated.bin")
    }
}
