//! Per-metric cells and the verdict vocabulary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::LedgerError;

/// Preprocessing applied to both artifacts before a metric ran.
///
/// `None` means the driver never reported the step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingFlags {
    pub tokenized: Option<bool>,
    pub stemmed: Option<bool>,
    pub removed_boilerplate: Option<bool>,
}

/// Result slot of one cell; a score and a measurement error exclude each other.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellOutcome {
    #[default]
    Pending,
    Score(f64),
    MeasurementError(String),
}

impl CellOutcome {
    #[must_use]
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Score(score) => Some(*score),
            _ => None,
        }
    }

    #[must_use]
    pub fn measurement_error(&self) -> Option<&str> {
        match self {
            Self::MeasurementError(message) => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopicStatus {
    OnTopic,
    OffTopic,
}

impl TopicStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnTopic => "on-topic",
            Self::OffTopic => "off-topic",
        }
    }
}

impl fmt::Display for TopicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a score is compared against a metric threshold.
///
/// A memento whose score satisfies `score <op> threshold` is off-topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl Comparator {
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn holds(self, score: f64, threshold: f64) -> bool {
        match self {
            Self::Lt => score < threshold,
            Self::Gt => score > threshold,
            Self::Eq => score == threshold,
            Self::Ne => score != threshold,
        }
    }

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }
}

impl FromStr for Comparator {
    type Err = LedgerError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "<" => Ok(Self::Lt),
            ">" => Ok(Self::Gt),
            "==" => Ok(Self::Eq),
            "!=" => Ok(Self::Ne),
            other => Err(LedgerError::UnsupportedComparator {
                comparator: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Everything recorded for one `(URI-T, URI-M, family, name)` key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricCell {
    pub flags: ProcessingFlags,
    pub outcome: CellOutcome,
    pub status: Option<TopicStatus>,
}

impl MetricCell {
    /// Drops a measurement error, leaving the cell pending.
    pub(crate) fn clear_measurement_error(&mut self) {
        if matches!(self.outcome, CellOutcome::MeasurementError(_)) {
            self.outcome = CellOutcome::Pending;
        }
    }
}
