//! Turning stored memento content into the artifacts scoring functions compare.

use std::borrow::Cow;

use unicode_segmentation::UnicodeSegmentation;

use crate::store::ContentStore;
use crate::Result;

/// Input handed to a [`super::ScoreFn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// Content as stored (or with boilerplate removed).
    Bytes(Vec<u8>),
    /// Lower-cased word tokens with stopwords removed.
    Tokens(Vec<String>),
}

impl Artifact {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Bytes(bytes) => bytes.is_empty(),
            Self::Tokens(tokens) => tokens.is_empty(),
        }
    }

    /// Bytes for byte content, tokens for tokenized content.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Bytes(bytes) => bytes.len(),
            Self::Tokens(tokens) => tokens.len(),
        }
    }

    /// Text view: bytes decoded lossily, tokens concatenated.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            Self::Bytes(bytes) => String::from_utf8_lossy(bytes),
            Self::Tokens(tokens) => Cow::Owned(tokens.concat()),
        }
    }

    /// Comparison units: tokens, or characters of the decoded bytes.
    #[must_use]
    pub fn units(&self) -> Vec<String> {
        match self {
            Self::Bytes(bytes) => String::from_utf8_lossy(bytes)
                .chars()
                .map(String::from)
                .collect(),
            Self::Tokens(tokens) => tokens.clone(),
        }
    }
}

/// Preprocessing a metric applies to both the baseline and each member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Preparation {
    pub tokenize: bool,
    pub stem: bool,
    pub remove_boilerplate: bool,
}

impl Preparation {
    pub const RAW: Self = Self {
        tokenize: false,
        stem: false,
        remove_boilerplate: false,
    };

    pub const TOKENS: Self = Self {
        tokenize: true,
        stem: true,
        remove_boilerplate: true,
    };

    /// Loads `uri` from `store` and applies this preparation.
    ///
    /// Store errors pass through unchanged so callers can tell access
    /// errors from boilerplate failures.
    pub fn prepare(&self, store: &ContentStore, uri: &str) -> Result<Artifact> {
        let content = if self.remove_boilerplate {
            store.memento_content_without_boilerplate(uri)?
        } else {
            store.memento_content(uri)?
        };
        if !self.tokenize {
            return Ok(Artifact::Bytes(content));
        }
        Ok(Artifact::Tokens(tokenize(&String::from_utf8_lossy(&content), self.stem)))
    }
}

/// Splits `text` into lower-cased words, dropping English stopwords.
#[must_use]
pub fn tokenize(text: &str, stem: bool) -> Vec<String> {
    text.unicode_words()
        .map(str::to_lowercase)
        .filter(|word| !is_stopword(word))
        .map(|word| if stem { stem_word(&word) } else { word })
        .collect()
}

fn is_stopword(word: &str) -> bool {
    STOPWORDS.binary_search(&word).is_ok()
}

fn has_vowel(stem: &str) -> bool {
    stem.chars().any(|c| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y'))
}

/// Light suffix stripper covering plural and inflectional endings.
#[must_use]
pub fn stem_word(word: &str) -> String {
    if word.chars().count() <= 3 || !word.is_ascii() {
        return word.to_string();
    }
    let mut stem = word.to_string();

    if let Some(base) = stem.strip_suffix("sses") {
        stem = format!("{base}ss");
    } else if let Some(base) = stem.strip_suffix("ies") {
        stem = format!("{base}i");
    } else if !stem.ends_with("ss") && !stem.ends_with("us") && stem.ends_with('s') {
        stem.pop();
    }

    if let Some(base) = stem.strip_suffix("eed") {
        if has_vowel(base) {
            stem = format!("{base}ee");
        }
    } else {
        for suffix in ["ing", "ed"] {
            if let Some(base) = stem.strip_suffix(suffix) {
                if has_vowel(base) && base.len() >= 2 {
                    stem = base.to_string();
                }
                break;
            }
        }
    }

    if let Some(base) = stem.strip_suffix("ly") {
        if has_vowel(base) && base.len() >= 3 {
            stem = base.to_string();
        }
    }
    stem
}

/// English stopwords, sorted for binary search.
const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "ain", "all", "am", "an", "and", "any",
    "are", "aren", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "couldn", "d", "did", "didn", "do", "does", "doesn", "doing",
    "don", "down", "during", "each", "few", "for", "from", "further", "had", "hadn", "has",
    "hasn", "have", "haven", "having", "he", "her", "here", "hers", "herself", "him", "himself",
    "his", "how", "i", "if", "in", "into", "is", "isn", "it", "its", "itself", "just", "ll", "m",
    "ma", "me", "mightn", "more", "most", "mustn", "my", "myself", "needn", "no", "nor", "not",
    "now", "o", "of", "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves",
    "out", "over", "own", "re", "s", "same", "shan", "she", "should", "shouldn", "so", "some",
    "such", "t", "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there",
    "these", "they", "this", "those", "through", "to", "too", "under", "until", "up", "ve",
    "very", "was", "wasn", "we", "were", "weren", "what", "when", "where", "which", "while",
    "who", "whom", "why", "will", "with", "won", "wouldn", "y", "you", "your", "yours",
    "yourself", "yourselves",
];
