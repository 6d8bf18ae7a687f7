//! Baseline-vs-member scoring over every TimeMap in a store.
//!
//! Each [`MetricSpec`] is evaluated per TimeMap against the TimeMap's first
//! memento. Failures stay isolated: a broken member only poisons its own
//! cell, a broken baseline poisons every cell of that TimeMap for that metric.

mod metrics;
mod prepare;

use std::str::FromStr;

pub use metrics::{
    MetricSpec, ScoreError, ScoreFn, artifact_simhash, bytecount, jaccard, levenshtein, metric,
    normalized_levenshtein, raw_features, simhash, simhash_distance, sorensen,
    supported_metrics, tf_intersection, wordcount,
};
pub use prepare::{Artifact, Preparation, stem_word, tokenize};

use crate::constants::CONTENT_LANGUAGE_HEADER;
use crate::ledger::{CellKey, MeasurementLedger};
use crate::store::ContentStore;
use crate::types::header_value;
use crate::{OffTopicError, Result};

// Boilerplate and empty-baseline wording matches what existing result
// files from earlier tooling carry.
const BASELINE_BOILERPLATE_FAILED: &str =
    "Boilerplate removal error with first memento in TimeMap, cannot effectively compare memento content";
const BASELINE_EMPTY: &str = "After processing content, the first memento in TimeMap is now empty, cannot effectively compare memento content";
const BASELINE_NOT_ACQUIRED: &str =
    "First memento in TimeMap could not be acquired, cannot effectively compare memento content";
const BASELINE_MISSING: &str =
    "First memento in TimeMap is not in the store, cannot effectively compare memento content";

/// Broadcast message for a baseline that failed to prepare, or `None` when
/// the failure is not about the baseline memento itself.
fn baseline_failure(err: &OffTopicError) -> Option<&'static str> {
    match err {
        OffTopicError::BoilerplateRemovalFailed { .. } => Some(BASELINE_BOILERPLATE_FAILED),
        OffTopicError::MementoError { .. } => Some(BASELINE_NOT_ACQUIRED),
        OffTopicError::NoSuchMemento { .. } => Some(BASELINE_MISSING),
        _ => None,
    }
}

/// Caller-supplied threshold for one metric, written `name=value`.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdOverride {
    pub name: String,
    pub threshold: f64,
}

impl FromStr for ThresholdOverride {
    type Err = OffTopicError;

    fn from_str(value: &str) -> Result<Self> {
        let invalid = |reason: &str| OffTopicError::InvalidMetricSelection {
            value: value.to_string(),
            reason: reason.to_string(),
        };
        let (name, threshold) = value.split_once('=').ok_or_else(|| invalid("expected name=threshold"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid("metric name is empty"));
        }
        let threshold: f64 = threshold
            .trim()
            .parse()
            .map_err(|_| invalid("threshold is not a number"))?;
        if !threshold.is_finite() {
            return Err(invalid("threshold must be finite"));
        }
        Ok(Self {
            name: name.to_string(),
            threshold,
        })
    }
}

/// Parses a comma-separated selection such as `jaccard=0.10,bytecount`.
///
/// Each entry names a built-in metric, optionally with a threshold that
/// replaces its default.
pub fn parse_metric_selection(selection: &str) -> Result<Vec<MetricSpec>> {
    let mut selected: Vec<MetricSpec> = Vec::new();
    for entry in selection.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let spec = if entry.contains('=') {
            let requested: ThresholdOverride = entry.parse()?;
            MetricSpec {
                threshold: requested.threshold,
                ..metric(&requested.name)?
            }
        } else {
            metric(entry)?
        };
        selected.retain(|existing| existing.name != spec.name);
        selected.push(spec);
    }
    if selected.is_empty() {
        return Err(OffTopicError::InvalidMetricSelection {
            value: selection.to_string(),
            reason: "no metrics selected".into(),
        });
    }
    Ok(selected)
}

fn record_flags(ledger: &mut MeasurementLedger, key: &CellKey, preparation: Preparation) {
    ledger.set_tokenized(key, preparation.tokenize);
    ledger.set_stemmed(key, preparation.stem);
    ledger.set_removed_boilerplate(key, preparation.remove_boilerplate);
}

fn record_access_error(
    store: &ContentStore,
    ledger: &mut MeasurementLedger,
    urit: &str,
    urim: &str,
) -> Result<()> {
    let information = store.memento_error_information(urim)?.unwrap_or_default();
    ledger.set_memento_access_error(urit, urim, String::from_utf8_lossy(&information));
    Ok(())
}

/// Scores every memento of every stored TimeMap with `spec`.
///
/// Returns the number of cells that received a score. Store failures that
/// are not about a single memento abort the run.
pub fn compute_score_across_timemaps(
    store: &ContentStore,
    ledger: &mut MeasurementLedger,
    spec: &MetricSpec,
) -> Result<usize> {
    let urits = store.timemap_uris();
    tracing::info!(metric = spec.name, timemaps = urits.len(), "computing score across TimeMaps");
    let mut scored = 0usize;

    for urit in &urits {
        let timemap = store.timemap(urit)?;
        let Some(baseline) = timemap.baseline() else {
            tracing::debug!(urit = %urit, "TimeMap lists no mementos, skipping");
            continue;
        };

        let mut members = Vec::new();
        for urim in timemap.memento_uris() {
            ledger.register_memento(urit, urim);
            if !members.contains(&urim) {
                members.push(urim);
            }
        }

        let baseline_artifact = match spec.preparation.prepare(store, &baseline.uri) {
            Ok(artifact) if artifact.is_empty() => Err(BASELINE_EMPTY),
            Ok(artifact) => Ok(artifact),
            Err(err) => match baseline_failure(&err) {
                Some(message) => {
                    tracing::debug!(urim = %baseline.uri, error = %err, "baseline unavailable");
                    Err(message)
                }
                None => return Err(err),
            },
        };
        let baseline_artifact = match baseline_artifact {
            Ok(artifact) => artifact,
            Err(message) => {
                tracing::warn!(urit = %urit, metric = spec.name, members = members.len(), "{message}");
                for urim in members {
                    let key = CellKey::new(urit.as_str(), urim, spec.family, spec.name);
                    record_flags(ledger, &key, spec.preparation);
                    ledger.set_memento_measurement_error(&key, message);
                }
                continue;
            }
        };

        for urim in members {
            if store.has_memento_error(urim) {
                record_access_error(store, ledger, urit, urim)?;
                continue;
            }
            let key = CellKey::new(urit.as_str(), urim, spec.family, spec.name);
            record_flags(ledger, &key, spec.preparation);
            match spec.preparation.prepare(store, urim) {
                Ok(artifact) => match (spec.score)(&baseline_artifact, &artifact) {
                    Ok(score) => {
                        ledger.set_score(&key, score);
                        scored += 1;
                    }
                    Err(err) => {
                        tracing::warn!(urim = %urim, metric = spec.name, error = %err, "score failed");
                        ledger.set_memento_measurement_error(&key, err.to_string());
                    }
                },
                Err(OffTopicError::MementoError { .. }) => {
                    record_access_error(store, ledger, urit, urim)?;
                }
                Err(err) if err.is_memento_scoped() => {
                    tracing::warn!(urim = %urim, metric = spec.name, error = %err, "memento could not be prepared");
                    ledger.set_memento_measurement_error(&key, err.to_string());
                }
                Err(err) => return Err(err),
            }
        }
    }

    tracing::info!(metric = spec.name, scored, "score computation finished");
    Ok(scored)
}

/// Records descriptive annotations for every memento listed in the store's TimeMaps.
///
/// Mementos stored as errors get their error information as an access
/// error instead.
pub fn record_annotations(store: &ContentStore, ledger: &mut MeasurementLedger) -> Result<()> {
    for urit in store.timemap_uris() {
        let timemap = store.timemap(&urit)?;
        for memento in &timemap.mementos.list {
            let urim = memento.uri.as_str();
            ledger.set_memento_datetime(&urit, urim, memento.datetime);
            if store.has_memento_error(urim) {
                record_access_error(store, ledger, &urit, urim)?;
                continue;
            }
            let content = match store.memento_content(urim) {
                Ok(content) => content,
                Err(OffTopicError::NoSuchMemento { .. }) => {
                    tracing::debug!(urim = %urim, "memento not acquired, no annotations");
                    continue;
                }
                Err(err) => return Err(err),
            };
            ledger.set_content_length(&urit, urim, content.len());
            ledger.set_raw_simhash(&urit, urim, simhash(raw_features(&String::from_utf8_lossy(&content))));
            let headers = store.memento_headers(urim)?;
            if let Some(language) = header_value(&headers, CONTENT_LANGUAGE_HEADER) {
                ledger.set_language(&urit, urim, language);
            }
        }
    }
    Ok(())
}

/// Runs every metric in `metrics`, assigns per-metric verdicts, then the
/// overall rollup.
///
/// Overrides must name a metric in `metrics`.
pub fn evaluate(
    store: &ContentStore,
    ledger: &mut MeasurementLedger,
    metrics: &[MetricSpec],
    overrides: &[ThresholdOverride],
) -> Result<()> {
    if let Some(unknown) = overrides
        .iter()
        .find(|o| !metrics.iter().any(|spec| spec.name == o.name))
    {
        return Err(OffTopicError::UnknownMetric {
            name: unknown.name.clone(),
        });
    }

    record_annotations(store, ledger)?;
    for spec in metrics {
        let threshold = overrides
            .iter()
            .rev()
            .find(|o| o.name == spec.name)
            .map_or(spec.threshold, |o| o.threshold);
        compute_score_across_timemaps(store, ledger, spec)?;
        let classified =
            ledger.calculate_off_topic_by_metric(spec.family, spec.name, threshold, spec.comparator);
        tracing::info!(metric = spec.name, threshold, classified, "metric evaluated");
    }
    ledger.calculate_overall_status();
    Ok(())
}
