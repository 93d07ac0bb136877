//! Text to lemma-frequency extraction
//!
//! Text is split on Unicode word boundaries, each token is looked up in a
//! [`Morphology`], tokens with a functional reading (articles, prepositions,
//! conjunctions, particles, interjections) or no reading at all are dropped,
//! and the rest are counted under their dictionary base form.
//!
//! A [`Lemmatizer`] holds no mutable state; one instance is built at start-up
//! and shared by the indexer and the search path.

mod morphology;

pub use morphology::*;

use crate::config::LemmatizerConfig;
use crate::error::Result;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use unicode_segmentation::UnicodeSegmentation;

/// Stateless lemma extractor over a shared read-only dictionary
#[derive(Clone)]
pub struct Lemmatizer {
    morphology: Arc<dyn Morphology>,
}

impl std::fmt::Debug for Lemmatizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lemmatizer").finish_non_exhaustive()
    }
}

impl Lemmatizer {
    pub fn new(morphology: Arc<dyn Morphology>) -> Self {
        Self { morphology }
    }

    /// Lemmatizer over the built-in English morphology
    pub fn english() -> Self {
        Self::new(Arc::new(EnglishMorphology::new()))
    }

    /// Build the lemmatizer described by the configuration
    pub fn from_config(config: &LemmatizerConfig) -> Result<Self> {
        match &config.dictionary_path {
            Some(path) => Ok(Self::new(Arc::new(DictionaryMorphology::load(path)?))),
            None => Ok(Self::english()),
        }
    }

    /// Count lemma occurrences in `text`
    pub fn extract_lemmas(&self, text: &str) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for word in text.unicode_words() {
            if let Some(lemma) = self.lemma_of(word) {
                *counts.entry(lemma).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Distinct lemmas of `text`, sorted
    pub fn lemma_set(&self, text: &str) -> BTreeSet<String> {
        text.unicode_words()
            .filter_map(|word| self.lemma_of(word))
            .collect()
    }

    /// Base form of a single word, or `None` for functional and unknown words
    pub fn lemma_of(&self, word: &str) -> Option<String> {
        let readings = self.morphology.analyze(&word.to_lowercase());
        if readings
            .iter()
            .any(|reading| reading.part_of_speech.is_functional())
        {
            return None;
        }
        readings.into_iter().next().map(|reading| reading.lemma)
    }
}

impl Default for Lemmatizer {
    fn default() -> Self {
        Self::english()
    }
}
