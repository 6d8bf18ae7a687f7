//! Public types exposed by the `offtopic-core` crate.

pub mod options;
pub mod timemap;

use std::collections::BTreeMap;

pub use options::{PipelineOptions, PipelineOptionsBuilder, StoreOptions};
pub use timemap::{MementoRef, MementoSet, TimeMap, TimeMapInput, TimeMapSelf, parse_timemap_text};

/// Response headers as persisted next to every stored artifact.
///
/// Keys are lower-cased by the transports; the pipeline adds `http-status`.
pub type Headers = BTreeMap<String, String>;

/// Case-insensitive header lookup.
#[must_use]
pub fn header_value<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
