//! Link-format (RFC 7089 `application/link-format`) TimeMap parser.
//!
//! The scanner walks the text one character at a time. In strict mode any
//! character that does not fit the grammar aborts with
//! [`OffTopicError::MalformedManifest`]; in lenient mode the character is
//! ignored and scanning continues, which keeps every well-formed entry.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::constants::LINK_DATETIME_FORMAT;
use crate::types::{MementoRef, TimeMap};
use crate::{OffTopicError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    SeekUri,
    InUri,
    SeekParams,
    InKey,
    SeekValue,
    InValue,
}

#[derive(Debug, Default)]
struct LinkEntry {
    uri: String,
    attributes: BTreeMap<String, String>,
}

struct Scanner {
    strict: bool,
    timemap: TimeMap,
}

impl Scanner {
    fn reject(&self, position: usize, reason: &str) -> Result<()> {
        if self.strict {
            return Err(OffTopicError::MalformedManifest {
                position,
                reason: reason.to_string(),
            });
        }
        tracing::debug!(position, reason, "skipping malformed link-format character");
        Ok(())
    }

    fn finish_entry(&mut self, entry: LinkEntry, position: usize) -> Result<()> {
        if entry.uri.is_empty() && entry.attributes.is_empty() {
            return Ok(());
        }
        let Some(relation) = entry.attributes.get("rel") else {
            return self.reject(position, "link entry has no rel attribute");
        };
        let relations: Vec<&str> = relation.split_whitespace().collect();

        if relations.contains(&"original") {
            self.timemap.original_uri = Some(entry.uri.clone());
        }
        if relations.contains(&"timegate") {
            self.timemap.timegate_uri = Some(entry.uri.clone());
        }
        if relations.contains(&"self") {
            let is_json = entry
                .attributes
                .get("type")
                .is_some_and(|kind| kind.contains("json"));
            if is_json {
                self.timemap.timemap_uri.json_format = Some(entry.uri.clone());
            } else {
                self.timemap.timemap_uri.link_format = Some(entry.uri.clone());
            }
        }
        if relations.contains(&"memento") {
            let Some(raw) = entry.attributes.get("datetime") else {
                return self.reject(position, "memento entry has no datetime attribute");
            };
            let datetime = match NaiveDateTime::parse_from_str(raw, LINK_DATETIME_FORMAT) {
                Ok(datetime) => datetime,
                Err(err) => {
                    tracing::warn!(uri = %entry.uri, datetime = %raw, error = %err, "unparsable memento datetime");
                    return self.reject(position, "memento datetime is not an HTTP date");
                }
            };
            let memento = MementoRef::new(entry.uri, datetime);
            if relations.contains(&"first") {
                self.timemap.mementos.first = Some(memento.clone());
            }
            if relations.contains(&"last") {
                self.timemap.mementos.last = Some(memento.clone());
            }
            self.timemap.mementos.list.push(memento);
        }
        Ok(())
    }
}

/// Converts link-format TimeMap text into a [`TimeMap`].
///
/// `first`/`last` come from the `first memento`/`last memento` relations; when
/// the manifest omits them they are derived from the member datetimes.
pub fn parse_link_timemap(text: &str, strict: bool) -> Result<TimeMap> {
    let mut scanner = Scanner {
        strict,
        timemap: TimeMap::default(),
    };
    let mut state = ScanState::SeekUri;
    let mut entry = LinkEntry::default();
    let mut key = String::new();
    let mut value = String::new();
    let mut position = 0usize;

    for character in text.chars() {
        position += 1;
        match state {
            ScanState::SeekUri => {
                if character == '<' {
                    entry = LinkEntry::default();
                    state = ScanState::InUri;
                } else if !character.is_whitespace() {
                    scanner.reject(position, "expected '<' while looking for the next URI")?;
                }
            }
            ScanState::InUri => {
                if character == '>' {
                    entry.uri = entry.uri.trim().to_string();
                    state = ScanState::SeekParams;
                } else {
                    entry.uri.push(character);
                }
            }
            ScanState::SeekParams => {
                if character == ';' {
                    state = ScanState::InKey;
                } else if character == ',' {
                    // a bare <uri> entry carries no relation
                    scanner.reject(position, "link entry ended before any relation")?;
                    entry = LinkEntry::default();
                    state = ScanState::SeekUri;
                } else if !character.is_whitespace() {
                    scanner.reject(position, "expected ';' while looking for a relation")?;
                }
            }
            ScanState::InKey => {
                if character == '=' {
                    state = ScanState::SeekValue;
                } else {
                    key.push(character);
                }
            }
            ScanState::SeekValue => {
                if character == ';' {
                    key.clear();
                    state = ScanState::InKey;
                } else if character == ',' {
                    key.clear();
                    scanner.finish_entry(std::mem::take(&mut entry), position)?;
                    state = ScanState::SeekUri;
                } else if character == '"' {
                    state = ScanState::InValue;
                } else if !character.is_whitespace() {
                    scanner.reject(position, "expected a quoted attribute value")?;
                }
            }
            ScanState::InValue => {
                if character == '"' {
                    entry
                        .attributes
                        .insert(key.trim().to_string(), value.trim().to_string());
                    key.clear();
                    value.clear();
                    state = ScanState::SeekValue;
                } else {
                    value.push(character);
                }
            }
        }
    }

    match state {
        ScanState::SeekUri | ScanState::SeekValue => {}
        _ => scanner.reject(position, "TimeMap text ended inside a link entry")?,
    }
    scanner.finish_entry(entry, position)?;

    let mut timemap = scanner.timemap;
    timemap.designate_bounds();
    Ok(timemap)
}
