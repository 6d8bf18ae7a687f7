//! In-memory scoreboard of per-memento, per-metric measurement outcomes.
//!
//! Cells are addressed by an explicit [`CellKey`]; every failed lookup
//! reports which segment of the key was missing. Access errors and
//! measurement errors exclude each other: recording one clears the other
//! for the same memento, and any memento-level record clears the TimeMap's
//! access error.

mod cell;
mod render;

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use thiserror::Error;

pub use cell::{CellOutcome, Comparator, MetricCell, ProcessingFlags, TopicStatus};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("no measurements recorded for TimeMap {urit}")]
    NoSuchTimeMap { urit: String },

    #[error("no measurements recorded for memento {urim}")]
    NoSuchMemento { urim: String },

    #[error("no metric family {family} recorded")]
    NoSuchFamily { family: String },

    #[error("no metric {name} recorded")]
    NoSuchMetric { name: String },

    #[error("unsupported comparison operator {comparator}")]
    UnsupportedComparator { comparator: String },
}

/// Composite address of one measurement cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub urit: String,
    pub urim: String,
    pub family: String,
    pub name: String,
}

impl CellKey {
    pub fn new(
        urit: impl Into<String>,
        urim: impl Into<String>,
        family: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            urit: urit.into(),
            urim: urim.into(),
            family: family.into(),
            name: name.into(),
        }
    }
}

/// Descriptive values recorded for a memento alongside its scores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MementoAnnotations {
    pub content_length: Option<usize>,
    pub memento_datetime: Option<NaiveDateTime>,
    pub raw_simhash: Option<u64>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MementoEntry {
    pub(crate) access_error: Option<String>,
    pub(crate) annotations: MementoAnnotations,
    pub(crate) families: BTreeMap<String, BTreeMap<String, MetricCell>>,
    pub(crate) overall: Option<TopicStatus>,
}

impl MementoEntry {
    fn cells_mut(&mut self) -> impl Iterator<Item = &mut MetricCell> {
        self.families.values_mut().flat_map(BTreeMap::values_mut)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct TimeMapEntry {
    pub(crate) access_error: Option<String>,
    pub(crate) mementos: BTreeMap<String, MementoEntry>,
}

/// Measurement results for one analysis run.
#[derive(Debug, Clone, Default)]
pub struct MeasurementLedger {
    pub(crate) timemaps: BTreeMap<String, TimeMapEntry>,
    /// `(family, name)` pairs in the order they were first recorded.
    pub(crate) metrics: Vec<(String, String)>,
}

impl MeasurementLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `urim` visible under `urit` without recording anything for it.
    pub fn register_memento(&mut self, urit: &str, urim: &str) {
        self.memento_entry_mut(urit, urim);
    }

    fn memento_entry_mut(&mut self, urit: &str, urim: &str) -> &mut MementoEntry {
        let timemap = self.timemaps.entry(urit.to_string()).or_default();
        timemap.access_error = None;
        timemap.mementos.entry(urim.to_string()).or_default()
    }

    fn note_metric(&mut self, family: &str, name: &str) {
        if !self.metrics.iter().any(|(f, n)| f == family && n == name) {
            self.metrics.push((family.to_string(), name.to_string()));
        }
    }

    fn cell_mut(&mut self, key: &CellKey) -> &mut MetricCell {
        self.note_metric(&key.family, &key.name);
        self.memento_entry_mut(&key.urit, &key.urim)
            .families
            .entry(key.family.clone())
            .or_default()
            .entry(key.name.clone())
            .or_default()
    }

    pub fn set_score(&mut self, key: &CellKey, score: f64) {
        self.cell_mut(key).outcome = CellOutcome::Score(score);
    }

    pub fn set_stemmed(&mut self, key: &CellKey, stemmed: bool) {
        self.cell_mut(key).flags.stemmed = Some(stemmed);
    }

    pub fn set_tokenized(&mut self, key: &CellKey, tokenized: bool) {
        self.cell_mut(key).flags.tokenized = Some(tokenized);
    }

    pub fn set_removed_boilerplate(&mut self, key: &CellKey, removed: bool) {
        self.cell_mut(key).flags.removed_boilerplate = Some(removed);
    }

    pub fn set_timemap_access_error(&mut self, urit: &str, message: impl Into<String>) {
        self.timemaps.entry(urit.to_string()).or_default().access_error = Some(message.into());
    }

    /// Records that `urim` could not be acquired, clearing its measurement errors.
    pub fn set_memento_access_error(&mut self, urit: &str, urim: &str, message: impl Into<String>) {
        let memento = self.memento_entry_mut(urit, urim);
        memento.access_error = Some(message.into());
        memento.overall = None;
        for cell in memento.cells_mut() {
            cell.clear_measurement_error();
        }
    }

    /// Records that one metric could not be computed for a memento.
    pub fn set_memento_measurement_error(&mut self, key: &CellKey, message: impl Into<String>) {
        let cell = self.cell_mut(key);
        cell.outcome = CellOutcome::MeasurementError(message.into());
        cell.status = None;
        if let Some(memento) = self
            .timemaps
            .get_mut(&key.urit)
            .and_then(|timemap| timemap.mementos.get_mut(&key.urim))
        {
            memento.access_error = None;
        }
    }

    pub fn set_content_length(&mut self, urit: &str, urim: &str, length: usize) {
        self.memento_entry_mut(urit, urim).annotations.content_length = Some(length);
    }

    pub fn set_memento_datetime(&mut self, urit: &str, urim: &str, datetime: NaiveDateTime) {
        self.memento_entry_mut(urit, urim).annotations.memento_datetime = Some(datetime);
    }

    pub fn set_raw_simhash(&mut self, urit: &str, urim: &str, simhash: u64) {
        self.memento_entry_mut(urit, urim).annotations.raw_simhash = Some(simhash);
    }

    pub fn set_language(&mut self, urit: &str, urim: &str, language: impl Into<String>) {
        self.memento_entry_mut(urit, urim).annotations.language = Some(language.into());
    }

    fn timemap_entry(&self, urit: &str) -> Result<&TimeMapEntry, LedgerError> {
        self.timemaps.get(urit).ok_or_else(|| LedgerError::NoSuchTimeMap {
            urit: urit.to_string(),
        })
    }

    fn memento_entry(&self, urit: &str, urim: &str) -> Result<&MementoEntry, LedgerError> {
        self.timemap_entry(urit)?
            .mementos
            .get(urim)
            .ok_or_else(|| LedgerError::NoSuchMemento {
                urim: urim.to_string(),
            })
    }

    /// Resolves `key` segment by segment.
    pub fn cell(&self, key: &CellKey) -> Result<&MetricCell, LedgerError> {
        self.memento_entry(&key.urit, &key.urim)?
            .families
            .get(&key.family)
            .ok_or_else(|| LedgerError::NoSuchFamily {
                family: key.family.clone(),
            })?
            .get(&key.name)
            .ok_or_else(|| LedgerError::NoSuchMetric {
                name: key.name.clone(),
            })
    }

    pub fn score(&self, key: &CellKey) -> Result<Option<f64>, LedgerError> {
        Ok(self.cell(key)?.outcome.score())
    }

    pub fn measurement_error(&self, key: &CellKey) -> Result<Option<&str>, LedgerError> {
        Ok(self.cell(key)?.outcome.measurement_error())
    }

    pub fn stemmed(&self, key: &CellKey) -> Result<Option<bool>, LedgerError> {
        Ok(self.cell(key)?.flags.stemmed)
    }

    pub fn tokenized(&self, key: &CellKey) -> Result<Option<bool>, LedgerError> {
        Ok(self.cell(key)?.flags.tokenized)
    }

    pub fn removed_boilerplate(&self, key: &CellKey) -> Result<Option<bool>, LedgerError> {
        Ok(self.cell(key)?.flags.removed_boilerplate)
    }

    pub fn topic_status(&self, key: &CellKey) -> Result<Option<TopicStatus>, LedgerError> {
        Ok(self.cell(key)?.status)
    }

    pub fn timemap_access_error(&self, urit: &str) -> Result<Option<&str>, LedgerError> {
        Ok(self.timemap_entry(urit)?.access_error.as_deref())
    }

    pub fn memento_access_error(&self, urit: &str, urim: &str) -> Result<Option<&str>, LedgerError> {
        Ok(self.memento_entry(urit, urim)?.access_error.as_deref())
    }

    pub fn annotations(&self, urit: &str, urim: &str) -> Result<&MementoAnnotations, LedgerError> {
        Ok(&self.memento_entry(urit, urim)?.annotations)
    }

    pub fn overall_status(&self, urit: &str, urim: &str) -> Result<Option<TopicStatus>, LedgerError> {
        Ok(self.memento_entry(urit, urim)?.overall)
    }

    #[must_use]
    pub fn timemap_uris(&self) -> Vec<String> {
        self.timemaps.keys().cloned().collect()
    }

    pub fn memento_uris_in_timemap(&self, urit: &str) -> Result<Vec<String>, LedgerError> {
        Ok(self.timemap_entry(urit)?.mementos.keys().cloned().collect())
    }

    /// `(family, name)` pairs in first-recorded order.
    #[must_use]
    pub fn metrics(&self) -> Vec<(String, String)> {
        self.metrics.clone()
    }

    /// Assigns a per-metric verdict to every memento with a score for it.
    ///
    /// TimeMaps and mementos carrying an access error, and cells carrying a
    /// measurement error or no score, are left without a status. Returns the
    /// number of mementos classified.
    pub fn calculate_off_topic_by_metric(
        &mut self,
        family: &str,
        name: &str,
        threshold: f64,
        comparator: Comparator,
    ) -> usize {
        let mut classified = 0usize;
        for timemap in self.timemaps.values_mut() {
            if timemap.access_error.is_some() {
                for memento in timemap.mementos.values_mut() {
                    memento.overall = None;
                }
                continue;
            }
            for memento in timemap.mementos.values_mut() {
                if memento.access_error.is_some() {
                    continue;
                }
                let Some(cell) = memento
                    .families
                    .get_mut(family)
                    .and_then(|cells| cells.get_mut(name))
                else {
                    continue;
                };
                let Some(score) = cell.outcome.score() else {
                    continue;
                };
                cell.status = Some(if comparator.holds(score, threshold) {
                    TopicStatus::OffTopic
                } else {
                    TopicStatus::OnTopic
                });
                classified += 1;
            }
        }
        tracing::debug!(
            metric.family = %family,
            metric.name = %name,
            threshold,
            comparator = %comparator,
            classified,
            "per-metric topic status computed"
        );
        classified
    }

    /// Rolls per-metric verdicts into one overall verdict per memento.
    ///
    /// Off-topic under any metric wins; otherwise on-topic when at least one
    /// metric produced a verdict; otherwise unset. The result does not depend
    /// on the order metrics were recorded in.
    pub fn calculate_overall_status(&mut self) {
        for timemap in self.timemaps.values_mut() {
            if timemap.access_error.is_some() {
                for memento in timemap.mementos.values_mut() {
                    memento.overall = None;
                }
                continue;
            }
            for memento in timemap.mementos.values_mut() {
                if memento.access_error.is_some() {
                    memento.overall = None;
                    continue;
                }
                let mut overall = None;
                for status in memento
                    .families
                    .values()
                    .flat_map(BTreeMap::values)
                    .filter(|cell| cell.outcome.measurement_error().is_none())
                    .filter_map(|cell| cell.status)
                {
                    if status == TopicStatus::OffTopic {
                        overall = Some(TopicStatus::OffTopic);
                        break;
                    }
                    overall = Some(TopicStatus::OnTopic);
                }
                memento.overall = overall;
            }
        }
    }
}
