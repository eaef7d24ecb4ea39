// File: src/persistence.rs
use crate::audit::GroundTruth;
use crate::config::DataPaths;
use crate::core::context::{ContextModel, PositionStats};
use crate::core::lexicon::{Lexicon, TermKey};
use crate::core::types::Record;
use crate::errors::{LexError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Writes `value` as a bincode blob, atomically replacing `path`.
pub fn save_to_disk<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let parent_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent_dir).map_err(|e| LexError::io(parent_dir, e))?;

    let temp_file = NamedTempFile::new_in(parent_dir).map_err(|e| LexError::io(parent_dir, e))?;
    {
        let mut writer = BufWriter::new(&temp_file);
        bincode::serialize_into(&mut writer, value)?;
        writer.flush().map_err(|e| LexError::io(path, e))?;
    }

    temp_file
        .persist(path)
        .map_err(|e| LexError::io(path, e.error))?;
    debug!("saved {}", path.display());
    Ok(())
}

/// Reads a blob written by [`save_to_disk`]. Missing or corrupt files are errors.
pub fn load_from_disk<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| LexError::io(path, e))?;
    let reader = BufReader::new(file);
    let value = bincode::deserialize_from(reader)?;
    debug!("loaded {}", path.display());
    Ok(value)
}

/// Typed access to every persisted blob under one data directory.
///
/// Nothing ties stored position stats to the lexicon they were trained with;
/// save and load them together.
#[derive(Debug, Clone)]
pub struct Store {
    paths: DataPaths,
}

impl Store {
    pub fn new(paths: DataPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    pub fn save_records(&self, records: &[Record]) -> Result<()> {
        save_to_disk(&records, &self.paths.records())
    }

    pub fn load_records(&self) -> Result<Vec<Record>> {
        load_from_disk(&self.paths.records())
    }

    pub fn save_lexicon(&self, lexicon: &Lexicon) -> Result<()> {
        save_to_disk(lexicon, &self.paths.lexicon())
    }

    pub fn load_lexicon(&self) -> Result<Lexicon> {
        load_from_disk(&self.paths.lexicon())
    }

    pub fn save_rejected(&self, rejected: &HashSet<TermKey>) -> Result<()> {
        save_to_disk(rejected, &self.paths.rejected())
    }

    pub fn load_rejected(&self) -> Result<HashSet<TermKey>> {
        load_from_disk(&self.paths.rejected())
    }

    /// Like [`Store::load_rejected`], but an absent file is an empty set.
    pub fn load_rejected_or_empty(&self) -> Result<HashSet<TermKey>> {
        if self.paths.rejected().exists() {
            self.load_rejected()
        } else {
            Ok(HashSet::new())
        }
    }

    pub fn save_position_stats(&self, stats: &PositionStats) -> Result<()> {
        save_to_disk(stats, &self.paths.position_stats())
    }

    pub fn load_position_stats(&self) -> Result<PositionStats> {
        load_from_disk(&self.paths.position_stats())
    }

    pub fn save_context_model(&self, model: &ContextModel) -> Result<()> {
        save_to_disk(model, &self.paths.context_model())
    }

    pub fn load_context_model(&self) -> Result<ContextModel> {
        load_from_disk(&self.paths.context_model())
    }

    pub fn save_ground_truth(&self, truth: &GroundTruth) -> Result<()> {
        save_to_disk(truth, &self.paths.ground_truth())
    }

    pub fn load_ground_truth(&self) -> Result<GroundTruth> {
        load_from_disk(&self.paths.ground_truth())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lexicon::LexiconEntry;
    use crate::core::types::TagClass;

    fn store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(DataPaths::new(dir.path().join("data")));
        (dir, store)
    }

    #[test]
    fn lexicon_survives_a_round_trip() {
        let (_dir, store) = store();
        let mut lexicon = Lexicon::new();
        let key = TermKey::parse("mono cedocard").unwrap();
        lexicon.insert(LexiconEntry::new(key.clone(), TagClass::Ambiguous));
        lexicon.insert(LexiconEntry::fuzzy(
            TermKey::parse("mono cedokard").unwrap(),
            key.clone(),
        ));
        store.save_lexicon(&lexicon).unwrap();

        let loaded = store.load_lexicon().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(key.tokens()), lexicon.get(key.tokens()));
        assert_eq!(
            loaded.parent_of(TermKey::parse("mono cedokard").unwrap().tokens()).map(|e| &e.key),
            Some(&key)
        );
    }

    #[test]
    fn saving_twice_replaces_the_blob() {
        let (_dir, store) = store();
        let mut rejected = HashSet::from([TermKey::parse("daily").unwrap()]);
        store.save_rejected(&rejected).unwrap();
        rejected.insert(TermKey::parse("ward").unwrap());
        store.save_rejected(&rejected).unwrap();
        assert_eq!(store.load_rejected().unwrap(), rejected);
    }

    #[test]
    fn missing_blob_is_an_io_error() {
        let (_dir, store) = store();
        assert!(matches!(store.load_lexicon(), Err(LexError::Io { .. })));
        assert!(store.load_rejected_or_empty().unwrap().is_empty());
    }

    #[test]
    fn corrupt_blob_is_an_error() {
        let (_dir, store) = store();
        fs::create_dir_all(store.paths().root()).unwrap();
        fs::write(store.paths().position_stats(), b"\xff\xff\xff\xff\xff\xff\xff\xff\xff").unwrap();
        assert!(store.load_position_stats().is_err());
    }
}
