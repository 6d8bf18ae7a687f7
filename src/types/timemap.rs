//! TimeMap tree shared by the store, the link-format parser and the scoring drivers.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::io::link_format::parse_link_timemap;
use crate::{OffTopicError, Result};

/// One capture listed in a TimeMap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MementoRef {
    #[serde(with = "tree_datetime")]
    pub datetime: NaiveDateTime,
    pub uri: String,
}

impl MementoRef {
    #[must_use]
    pub fn new(uri: impl Into<String>, datetime: NaiveDateTime) -> Self {
        Self {
            datetime,
            uri: uri.into(),
        }
    }
}

/// Self URIs a TimeMap advertises for its serializations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeMapSelf {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_format: Option<String>,
}

impl TimeMapSelf {
    fn is_empty(&self) -> bool {
        self.link_format.is_none() && self.json_format.is_none()
    }
}

/// Designated first/last captures plus the member list in manifest order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MementoSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<MementoRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<MementoRef>,
    #[serde(default)]
    pub list: Vec<MementoRef>,
}

/// Parsed capture manifest for one original resource.
///
/// Serializes to the Memento TimeMap JSON layout, so a tree written by the
/// store and a JSON TimeMap fetched from an archive deserialize the same way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timegate_uri: Option<String>,
    #[serde(default, skip_serializing_if = "TimeMapSelf::is_empty")]
    pub timemap_uri: TimeMapSelf,
    #[serde(default)]
    pub mementos: MementoSet,
}

impl TimeMap {
    /// Builds a TimeMap from an unordered capture list, designating the
    /// earliest and latest captures as `first` and `last`.
    #[must_use]
    pub fn from_entries(original_uri: impl Into<String>, entries: Vec<MementoRef>) -> Self {
        let mut timemap = Self {
            original_uri: Some(original_uri.into()),
            mementos: MementoSet {
                list: entries,
                ..MementoSet::default()
            },
            ..Self::default()
        };
        timemap.designate_bounds();
        timemap
    }

    /// Fills `first`/`last` from the member list when the manifest did not name them.
    pub fn designate_bounds(&mut self) {
        if self.mementos.first.is_none() {
            self.mementos.first = self
                .mementos
                .list
                .iter()
                .min_by(|a, b| a.datetime.cmp(&b.datetime).then_with(|| a.uri.cmp(&b.uri)))
                .cloned();
        }
        if self.mementos.last.is_none() {
            self.mementos.last = self
                .mementos
                .list
                .iter()
                .max_by(|a, b| a.datetime.cmp(&b.datetime).then_with(|| a.uri.cmp(&b.uri)))
                .cloned();
        }
    }

    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.mementos.list.is_empty()
    }

    /// The capture every other member is compared against.
    #[must_use]
    pub fn baseline(&self) -> Option<&MementoRef> {
        self.mementos.first.as_ref()
    }

    pub fn memento_uris(&self) -> impl Iterator<Item = &str> {
        self.mementos.list.iter().map(|memento| memento.uri.as_str())
    }

    /// Checks `first.datetime <= member.datetime <= last.datetime` for every member.
    #[must_use]
    pub fn bounds_hold(&self) -> bool {
        match (&self.mementos.first, &self.mementos.last) {
            (Some(first), Some(last)) => self
                .mementos
                .list
                .iter()
                .all(|m| first.datetime <= m.datetime && m.datetime <= last.datetime),
            (None, None) => self.mementos.list.is_empty(),
            _ => false,
        }
    }
}

/// TimeMap representations accepted by the store.
#[derive(Debug, Clone)]
pub enum TimeMapInput {
    /// An already-built tree.
    Structured(TimeMap),
    /// Manifest text, either the JSON layout or link-format.
    Text(String),
}

impl TimeMapInput {
    /// Resolves the input into a tree plus the raw text persisted as the original artifact.
    pub(crate) fn resolve(self, strict: bool) -> Result<(TimeMap, String)> {
        match self {
            Self::Structured(timemap) => {
                let text = serde_json::to_string_pretty(&timemap)?;
                Ok((timemap, text))
            }
            Self::Text(text) => {
                let timemap = parse_timemap_text(&text, strict)?;
                Ok((timemap, text))
            }
        }
    }
}

impl From<TimeMap> for TimeMapInput {
    fn from(timemap: TimeMap) -> Self {
        Self::Structured(timemap)
    }
}

impl From<String> for TimeMapInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for TimeMapInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Parses manifest text, trying the JSON layout before link-format.
pub fn parse_timemap_text(text: &str, strict: bool) -> Result<TimeMap> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') {
        match serde_json::from_str::<TimeMap>(trimmed) {
            Ok(mut timemap) => {
                timemap.designate_bounds();
                return Ok(timemap);
            }
            Err(err) if strict => return Err(err.into()),
            Err(err) => {
                tracing::warn!(error = %err, "TimeMap text looked like JSON but did not parse");
            }
        }
    }
    if trimmed.is_empty() && strict {
        return Err(OffTopicError::MalformedManifest {
            position: 0,
            reason: "empty TimeMap".into(),
        });
    }
    parse_link_timemap(text, strict)
}

pub(crate) mod tree_datetime {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    use crate::constants::TREE_DATETIME_FORMAT;

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(TREE_DATETIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TREE_DATETIME_FORMAT).map_err(D::Error::custom)
    }
}
