//! Boilerplate removal for stored memento markup.
//!
//! The store only knows the [`BoilerplateRemover`] contract; [`ParagraphExtractor`]
//! is the built-in implementation. It classifies block-level paragraphs by word
//! count and link density and keeps the ones that read like body text.

use once_cell::sync::OnceCell;
use regex::{Captures, Regex};
use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

use crate::constants::{BOILERPLATE_MAX_LINK_DENSITY, BOILERPLATE_MIN_WORDS};

/// Raised when a remover cannot make sense of the markup it was handed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct BoilerplateError {
    pub reason: String,
}

impl BoilerplateError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Strips navigation, banners and other template text from captured markup.
pub trait BoilerplateRemover: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Returns the body text of `markup`.
    fn remove(&self, markup: &[u8]) -> Result<Vec<u8>, BoilerplateError>;
}

const DROPPED_ELEMENTS: &str = r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<noscript\b.*?</noscript\s*>|<head\b.*?</head\s*>|<!--.*?-->";
const BLOCK_TAGS: &str = r"(?i)</?(?:p|div|br|li|ul|ol|dl|dt|dd|h[1-6]|td|th|tr|table|section|article|header|footer|nav|aside|blockquote|pre|form|main|hr|title)\b[^>]*>";
const ANCHOR: &str = r"(?is)<a\b[^>]*>(.*?)</a\s*>";
const ANY_TAG: &str = r"(?s)<[^>]*>";
const ENTITY: &str = r"&(?:#([0-9]{1,7})|#[xX]([0-9a-fA-F]{1,6})|([a-zA-Z]{2,8}));";

struct Patterns {
    dropped: Regex,
    blocks: Regex,
    anchor: Regex,
    tag: Regex,
    entity: Regex,
}

impl Patterns {
    fn compile() -> std::result::Result<Self, String> {
        let build = |pattern: &str| Regex::new(pattern).map_err(|err| err.to_string());
        Ok(Self {
            dropped: build(DROPPED_ELEMENTS)?,
            blocks: build(BLOCK_TAGS)?,
            anchor: build(ANCHOR)?,
            tag: build(ANY_TAG)?,
            entity: build(ENTITY)?,
        })
    }

    /// Compiled once per process and shared by every extractor.
    fn shared() -> Result<&'static Self, BoilerplateError> {
        static PATTERNS: OnceCell<std::result::Result<Patterns, String>> = OnceCell::new();
        PATTERNS
            .get_or_init(Self::compile)
            .as_ref()
            .map_err(|msg| BoilerplateError::new(format!("pattern failed to compile: {msg}")))
    }

    fn plain_text(&self, fragment: &str) -> String {
        let stripped = self.tag.replace_all(fragment, " ");
        let decoded = self.decode_entities(&stripped);
        decoded.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Decodes numeric references and common named entities in one pass.
    /// Unknown names and invalid code points are left as written.
    fn decode_entities(&self, text: &str) -> String {
        self.entity
            .replace_all(text, |caps: &Captures<'_>| {
                let decoded = if let Some(decimal) = caps.get(1) {
                    decimal.as_str().parse::<u32>().ok().and_then(char::from_u32)
                } else if let Some(hex) = caps.get(2) {
                    u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
                } else {
                    caps.get(3).and_then(|name| named_entity(name.as_str()))
                };
                decoded.map_or_else(|| caps[0].to_string(), String::from)
            })
            .into_owned()
    }
}

fn named_entity(name: &str) -> Option<char> {
    let decoded = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201C}',
        "rdquo" => '\u{201D}',
        "hellip" => '\u{2026}',
        "copy" => '\u{00A9}',
        _ => return None,
    };
    Some(decoded)
}

/// Paragraph classifier in the style of jusText.
///
/// A paragraph is kept when it has at least `min_words` words and at most
/// `max_link_density` of its characters sit inside anchors.
#[derive(Debug, Clone, Copy)]
pub struct ParagraphExtractor {
    pub min_words: usize,
    pub max_link_density: f64,
}

impl Default for ParagraphExtractor {
    fn default() -> Self {
        Self {
            min_words: BOILERPLATE_MIN_WORDS,
            max_link_density: BOILERPLATE_MAX_LINK_DENSITY,
        }
    }
}

impl ParagraphExtractor {
    #[must_use]
    pub fn with_min_words(mut self, min_words: usize) -> Self {
        self.min_words = min_words;
        self
    }

    #[allow(clippy::cast_precision_loss)]
    fn keeps(&self, text: &str, link_chars: usize) -> bool {
        let words = text.unicode_words().count();
        if words < self.min_words {
            return false;
        }
        let chars = text.chars().count().max(1);
        (link_chars as f64 / chars as f64) <= self.max_link_density
    }
}

impl BoilerplateRemover for ParagraphExtractor {
    fn name(&self) -> &'static str {
        "paragraph-extractor"
    }

    fn remove(&self, markup: &[u8]) -> Result<Vec<u8>, BoilerplateError> {
        let document = String::from_utf8_lossy(markup);
        if document.trim().is_empty() {
            return Err(BoilerplateError::new("document is empty"));
        }
        let patterns = Patterns::shared()?;
        let body = patterns.dropped.replace_all(&document, " ");

        let mut kept = Vec::new();
        for block in patterns.blocks.split(&body) {
            let link_chars: usize = patterns
                .anchor
                .captures_iter(block)
                .filter_map(|caps| caps.get(1))
                .map(|inner| patterns.plain_text(inner.as_str()).chars().count())
                .sum();
            let text = patterns.plain_text(block);
            if !text.is_empty() && self.keeps(&text, link_chars) {
                kept.push(text);
            }
        }
        tracing::debug!(
            remover = self.name(),
            paragraphs = kept.len(),
            "boilerplate removed"
        );
        Ok(kept.join("\n").into_bytes())
    }
}
