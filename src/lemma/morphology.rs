//! Morphological dictionaries behind the lemmatizer

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Part of speech of a word reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Pronoun,
    Numeral,
    Article,
    Preposition,
    Conjunction,
    Particle,
    Interjection,
    Other,
}

impl PartOfSpeech {
    /// Purely grammatical words that carry no searchable meaning
    pub fn is_functional(self) -> bool {
        matches!(
            self,
            PartOfSpeech::Article
                | PartOfSpeech::Preposition
                | PartOfSpeech::Conjunction
                | PartOfSpeech::Particle
                | PartOfSpeech::Interjection
        )
    }
}

impl FromStr for PartOfSpeech {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "NOUN" | "N" => Ok(PartOfSpeech::Noun),
            "VERB" | "V" => Ok(PartOfSpeech::Verb),
            "ADJ" | "ADJECTIVE" => Ok(PartOfSpeech::Adjective),
            "ADV" | "ADVERB" => Ok(PartOfSpeech::Adverb),
            "PRON" | "PRONOUN" => Ok(PartOfSpeech::Pronoun),
            "NUM" | "NUMERAL" => Ok(PartOfSpeech::Numeral),
            "ART" | "DET" | "ARTICLE" => Ok(PartOfSpeech::Article),
            "PREP" | "ADP" | "PREPOSITION" => Ok(PartOfSpeech::Preposition),
            "CONJ" | "CCONJ" | "SCONJ" | "CONJUNCTION" => Ok(PartOfSpeech::Conjunction),
            "PART" | "PARTICLE" => Ok(PartOfSpeech::Particle),
            "INTJ" | "INTERJECTION" => Ok(PartOfSpeech::Interjection),
            "X" | "OTHER" => Ok(PartOfSpeech::Other),
            _ => Err(Error::Lemmatizer(format!("Unknown part of speech: {}", s))),
        }
    }
}

/// One dictionary reading of a word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordForm {
    /// Dictionary base form
    pub lemma: String,
    pub part_of_speech: PartOfSpeech,
}

impl WordForm {
    pub fn new(lemma: impl Into<String>, part_of_speech: PartOfSpeech) -> Self {
        Self {
            lemma: lemma.into(),
            part_of_speech,
        }
    }
}

/// A read-only morphological dictionary.
///
/// `analyze` receives a lower-case token and returns every reading the
/// dictionary knows, or an empty list for unknown tokens.
pub trait Morphology: Send + Sync {
    fn analyze(&self, word: &str) -> Vec<WordForm>;
}

const ARTICLES: &[&str] = &["a", "an", "the"];

const PREPOSITIONS: &[&str] = &[
    "about", "above", "across", "after", "against", "along", "among", "around", "at", "before",
    "behind", "below", "beneath", "beside", "between", "beyond", "by", "despite", "down",
    "during", "except", "for", "from", "in", "inside", "into", "near", "of", "off", "on", "onto",
    "out", "outside", "over", "past", "since", "through", "throughout", "till", "to", "toward",
    "towards", "under", "underneath", "until", "up", "upon", "via", "with", "within", "without",
];

const CONJUNCTIONS: &[&str] = &[
    "and", "although", "because", "but", "either", "if", "lest", "neither", "nor", "or", "than",
    "that", "though", "unless", "whereas", "whether", "while", "yet",
];

const PARTICLES: &[&str] = &["not", "no", "just", "only", "even"];

const INTERJECTIONS: &[&str] = &[
    "ah", "aha", "alas", "hey", "hi", "hmm", "oh", "oops", "ouch", "uh", "um", "wow", "yay",
];

const IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("children", "child"),
    ("feet", "foot"),
    ("geese", "goose"),
    ("men", "man"),
    ("mice", "mouse"),
    ("people", "person"),
    ("teeth", "tooth"),
    ("women", "woman"),
];

/// Built-in English morphology: a function-word table plus plural folding.
///
/// Tokens that are not purely alphabetic (numbers, codes, mixed tokens) are
/// unknown.
#[derive(Debug, Clone)]
pub struct EnglishMorphology {
    function_words: HashMap<&'static str, PartOfSpeech>,
    irregular: HashMap<&'static str, &'static str>,
}

impl EnglishMorphology {
    pub fn new() -> Self {
        let mut function_words = HashMap::new();
        let groups = [
            (ARTICLES, PartOfSpeech::Article),
            (PREPOSITIONS, PartOfSpeech::Preposition),
            (CONJUNCTIONS, PartOfSpeech::Conjunction),
            (PARTICLES, PartOfSpeech::Particle),
            (INTERJECTIONS, PartOfSpeech::Interjection),
        ];
        for (words, pos) in groups {
            for word in words {
                function_words.insert(*word, pos);
            }
        }

        Self {
            function_words,
            irregular: IRREGULAR_PLURALS.iter().copied().collect(),
        }
    }

    fn base_form(&self, word: &str) -> String {
        if let Some(singular) = self.irregular.get(word) {
            return (*singular).to_string();
        }
        if word.chars().count() <= 3 {
            return word.to_string();
        }
        if let Some(stem) = word.strip_suffix("ies") {
            if stem.chars().count() > 1 {
                return format!("{}y", stem);
            }
        }
        for suffix in ["sses", "xes", "ches", "shes", "zzes"] {
            if word.ends_with(suffix) {
                return word[..word.len() - 2].to_string();
            }
        }
        if word.ends_with('s')
            && !word.ends_with("ss")
            && !word.ends_with("us")
            && !word.ends_with("is")
        {
            return word[..word.len() - 1].to_string();
        }
        word.to_string()
    }
}

impl Default for EnglishMorphology {
    fn default() -> Self {
        Self::new()
    }
}

impl Morphology for EnglishMorphology {
    fn analyze(&self, word: &str) -> Vec<WordForm> {
        let word = word.strip_suffix("'s").unwrap_or(word);
        if word.is_empty() || !word.chars().all(char::is_alphabetic) {
            return Vec::new();
        }

        if let Some(pos) = self.function_words.get(word) {
            return vec![WordForm::new(word, *pos)];
        }

        vec![WordForm::new(self.base_form(word), PartOfSpeech::Other)]
    }
}

/// Dictionary loaded from a `form<TAB>lemma<TAB>POS` file.
///
/// A form may appear on several lines, one per reading. Lines starting with
/// `#` and blank lines are ignored.
#[derive(Debug, Clone, Default)]
pub struct DictionaryMorphology {
    entries: HashMap<String, Vec<WordForm>>,
}

impl DictionaryMorphology {
    /// Load a dictionary file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let dictionary = Self::parse(&content)?;
        info!(
            "Loaded morphological dictionary with {} forms from {:?}",
            dictionary.len(),
            path
        );
        Ok(dictionary)
    }

    /// Parse dictionary text
    pub fn parse(content: &str) -> Result<Self> {
        let mut entries: HashMap<String, Vec<WordForm>> = HashMap::new();

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split('\t');
            let (Some(form), Some(lemma), Some(pos)) = (fields.next(), fields.next(), fields.next())
            else {
                return Err(Error::Lemmatizer(format!(
                    "Line {}: expected form<TAB>lemma<TAB>POS",
                    line_no + 1
                )));
            };
            let pos: PartOfSpeech = pos
                .parse()
                .map_err(|e| Error::Lemmatizer(format!("Line {}: {}", line_no + 1, e)))?;

            entries
                .entry(form.trim().to_lowercase())
                .or_default()
                .push(WordForm::new(lemma.trim().to_lowercase(), pos));
        }

        Ok(Self { entries })
    }

    /// Number of distinct word forms
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Morphology for DictionaryMorphology {
    fn analyze(&self, word: &str) -> Vec<WordForm> {
        self.entries.get(word).cloned().unwrap_or_default()
    }
}
