// src/lib.rs
//! Finds lexicon terms in tokenized free-text records and grows the lexicon
//! from the contexts its known terms appear in.

pub mod audit;
pub mod config;
pub mod core;
pub mod discovery;
pub mod errors;
pub mod extraction;
pub mod fuzzy;
pub mod learning;
pub mod persistence;
pub mod review;

pub use crate::core::engine::MiningEngine;
pub use crate::core::lexicon::{Lexicon, LexiconEntry, TermKey};
pub use crate::core::types::{Record, Tag, TagClass};
pub use crate::errors::{LexError, Result};
