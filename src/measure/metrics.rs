//! Reference pairwise scoring functions and the metric registry.
//!
//! Every function compares a TimeMap's baseline artifact with one member's
//! artifact. Corpus-level models are not part of this registry; callers
//! can add their own [`MetricSpec`] with any [`ScoreFn`].

use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

use super::prepare::{Artifact, Preparation};
use crate::constants::{FAMILY_TIMEMAP_MEASURES, RAW_SIMHASH_SHINGLE, TF_INTERSECTION_TOP_TERMS};
use crate::ledger::Comparator;
use crate::{OffTopicError, Result};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScoreError {
    #[error("baseline is empty, cannot compute a relative score")]
    EmptyBaseline,

    #[error("{reason}")]
    Failed { reason: String },
}

/// `(baseline, member) -> score`.
pub type ScoreFn = fn(&Artifact, &Artifact) -> std::result::Result<f64, ScoreError>;

/// One scoring function with its preparation and default verdict rule.
#[derive(Debug, Clone, Copy)]
pub struct MetricSpec {
    pub family: &'static str,
    pub name: &'static str,
    pub preparation: Preparation,
    pub score: ScoreFn,
    pub threshold: f64,
    pub comparator: Comparator,
}

impl MetricSpec {
    const fn timemap(
        name: &'static str,
        preparation: Preparation,
        score: ScoreFn,
        threshold: f64,
        comparator: Comparator,
    ) -> Self {
        Self {
            family: FAMILY_TIMEMAP_MEASURES,
            name,
            preparation,
            score,
            threshold,
            comparator,
        }
    }
}

/// Built-in metrics in their default configuration.
#[must_use]
pub fn supported_metrics() -> Vec<MetricSpec> {
    vec![
        MetricSpec::timemap("bytecount", Preparation::RAW, bytecount, -0.43, Comparator::Lt),
        MetricSpec::timemap("wordcount", Preparation::TOKENS, wordcount, -0.70, Comparator::Lt),
        MetricSpec::timemap("tfintersection", Preparation::TOKENS, tf_intersection, 0.0, Comparator::Gt),
        MetricSpec::timemap("jaccard", Preparation::TOKENS, jaccard, 0.96, Comparator::Gt),
        MetricSpec::timemap("sorensen", Preparation::TOKENS, sorensen, 0.93, Comparator::Gt),
        MetricSpec::timemap("levenshtein", Preparation::TOKENS, levenshtein, 0.05, Comparator::Gt),
        MetricSpec::timemap("nlevenshtein", Preparation::TOKENS, normalized_levenshtein, 0.05, Comparator::Gt),
        MetricSpec::timemap("raw_simhash", Preparation::RAW, simhash_distance, 38.0, Comparator::Gt),
        MetricSpec::timemap("tf_simhash", Preparation::TOKENS, simhash_distance, 34.0, Comparator::Gt),
    ]
}

/// Looks up a built-in metric by name.
pub fn metric(name: &str) -> Result<MetricSpec> {
    supported_metrics()
        .into_iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| OffTopicError::UnknownMetric {
            name: name.to_string(),
        })
}

fn relative_change(baseline: usize, member: usize) -> std::result::Result<f64, ScoreError> {
    match (baseline, member) {
        (0, 0) => Ok(0.0),
        (0, _) => Err(ScoreError::EmptyBaseline),
        (b, m) => Ok(m as f64 / b as f64 - 1.0),
    }
}

fn byte_length(artifact: &Artifact) -> usize {
    match artifact {
        Artifact::Bytes(bytes) => bytes.len(),
        Artifact::Tokens(tokens) => tokens.iter().map(String::len).sum(),
    }
}

/// Relative change in size: `member / baseline - 1`.
pub fn bytecount(baseline: &Artifact, member: &Artifact) -> std::result::Result<f64, ScoreError> {
    relative_change(byte_length(baseline), byte_length(member))
}

/// Relative change in word count.
pub fn wordcount(baseline: &Artifact, member: &Artifact) -> std::result::Result<f64, ScoreError> {
    relative_change(baseline.len(), member.len())
}

fn set_distance(baseline: &Artifact, member: &Artifact, dice: bool) -> f64 {
    let left: HashSet<String> = baseline.units().into_iter().collect();
    let right: HashSet<String> = member.units().into_iter().collect();
    if left.is_empty() && right.is_empty() {
        return 0.0;
    }
    let shared = left.intersection(&right).count() as f64;
    if dice {
        1.0 - (2.0 * shared) / (left.len() + right.len()) as f64
    } else {
        1.0 - shared / left.union(&right).count() as f64
    }
}

/// Jaccard distance between the sets of units.
pub fn jaccard(baseline: &Artifact, member: &Artifact) -> std::result::Result<f64, ScoreError> {
    Ok(set_distance(baseline, member, false))
}

/// Sørensen-Dice distance between the sets of units.
pub fn sorensen(baseline: &Artifact, member: &Artifact) -> std::result::Result<f64, ScoreError> {
    Ok(set_distance(baseline, member, true))
}

/// Edit distance between unit sequences.
pub fn levenshtein(baseline: &Artifact, member: &Artifact) -> std::result::Result<f64, ScoreError> {
    Ok(strsim::generic_levenshtein(&baseline.units(), &member.units()) as f64)
}

/// Edit distance divided by the longer sequence length.
pub fn normalized_levenshtein(
    baseline: &Artifact,
    member: &Artifact,
) -> std::result::Result<f64, ScoreError> {
    let left = baseline.units();
    let right = member.units();
    let longest = left.len().max(right.len());
    if longest == 0 {
        return Ok(0.0);
    }
    Ok(strsim::generic_levenshtein(&left, &right) as f64 / longest as f64)
}

fn top_terms(units: Vec<String>) -> Vec<String> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for unit in units {
        *counts.entry(unit).or_default() += 1;
    }
    let mut ranked: Vec<(usize, String)> = counts.into_iter().map(|(term, n)| (n, term)).collect();
    ranked.sort_unstable_by(|a, b| b.cmp(a));
    ranked
        .into_iter()
        .take(TF_INTERSECTION_TOP_TERMS)
        .map(|(_, term)| term)
        .collect()
}

/// Number of the baseline's most frequent terms also among the member's.
pub fn tf_intersection(
    baseline: &Artifact,
    member: &Artifact,
) -> std::result::Result<f64, ScoreError> {
    let member_terms: HashSet<String> = top_terms(member.units()).into_iter().collect();
    let shared = top_terms(baseline.units())
        .iter()
        .filter(|term| member_terms.contains(*term))
        .count();
    Ok(shared as f64)
}

fn feature_hash(feature: &str) -> u64 {
    let digest = blake3::hash(feature.as_bytes());
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(word)
}

/// 64-bit simhash of `features`, each weighted by its number of occurrences.
#[must_use]
pub fn simhash<I, S>(features: I) -> u64
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut weights = [0i64; 64];
    for feature in features {
        let hash = feature_hash(feature.as_ref());
        for (bit, weight) in weights.iter_mut().enumerate() {
            if (hash >> bit) & 1 == 1 {
                *weight += 1;
            } else {
                *weight -= 1;
            }
        }
    }
    weights
        .iter()
        .enumerate()
        .filter(|(_, weight)| **weight > 0)
        .fold(0u64, |acc, (bit, _)| acc | (1u64 << bit))
}

/// Character shingles over the alphanumeric, lower-cased text.
#[must_use]
pub fn raw_features(text: &str) -> Vec<String> {
    let cleaned: Vec<char> = text
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .flat_map(char::to_lowercase)
        .collect();
    if cleaned.len() <= RAW_SIMHASH_SHINGLE {
        return vec![cleaned.into_iter().collect()];
    }
    cleaned
        .windows(RAW_SIMHASH_SHINGLE)
        .map(|window| window.iter().collect())
        .collect()
}

/// Simhash of an artifact: shingles for bytes, the tokens themselves for tokens.
#[must_use]
pub fn artifact_simhash(artifact: &Artifact) -> u64 {
    match artifact {
        Artifact::Bytes(_) => simhash(raw_features(&artifact.text())),
        Artifact::Tokens(tokens) => simhash(tokens),
    }
}

/// Hamming distance between the two artifacts' simhashes.
pub fn simhash_distance(
    baseline: &Artifact,
    member: &Artifact,
) -> std::result::Result<f64, ScoreError> {
    let distance = (artifact_simhash(baseline) ^ artifact_simhash(member)).count_ones();
    Ok(f64::from(distance))
}
