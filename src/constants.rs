//! Shared constants for the on-disk store layout and measurement identities.

/// Subdirectory holding TimeMap artifacts.
pub const TIMEMAPS_DIR: &str = "timemaps";
/// Subdirectory holding successfully fetched memento artifacts.
pub const MEMENTOS_DIR: &str = "mementos";
/// Subdirectory holding memento fetch-error artifacts.
pub const MEMENTO_ERRORS_DIR: &str = "memento_errors";

/// Append-only `(uri, digest)` index present in every store subdirectory.
pub const INDEX_LOG_FILE: &str = "metadata.jsonl";

pub const HEADERS_SUFFIX: &str = "_headers.json";
pub const TREE_SUFFIX: &str = ".json";
pub const ORIGINAL_SUFFIX: &str = ".orig";
pub const NO_BOILERPLATE_SUFFIX: &str = ".orig.noboilerplate";
pub const ERROR_INFO_SUFFIX: &str = "_error_info.txt";

/// Datetime layout used when persisting TimeMap trees.
pub const TREE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
/// Datetime layout of `datetime="..."` attributes in link-format TimeMaps.
pub const LINK_DATETIME_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";
/// Datetime layout of the `date` column in gold-standard data files.
pub const DATAFILE_DATETIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Datetime layout of the `WARC-Date` record field.
pub const WARC_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
/// Datetime layout embedded in URI-Ms minted for WARC captures.
pub const WARC_URIM_DATETIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Response header that marks a replayed capture as a valid memento.
pub const MEMENTO_DATETIME_HEADER: &str = "memento-datetime";
/// Synthetic header carrying the HTTP status code of a stored response.
pub const HTTP_STATUS_HEADER: &str = "http-status";
/// Response header whose value is recorded as a memento's language.
pub const CONTENT_LANGUAGE_HEADER: &str = "content-language";

/// Metric family for baseline-vs-member comparisons inside one TimeMap.
pub const FAMILY_TIMEMAP_MEASURES: &str = "timemap measures";

/// Number of most frequent terms compared by the TF-intersection metric.
pub const TF_INTERSECTION_TOP_TERMS: usize = 20;
/// Character shingle width for simhash over raw content.
pub const RAW_SIMHASH_SHINGLE: usize = 4;

/// Paragraphs shorter than this many words are treated as boilerplate.
pub const BOILERPLATE_MIN_WORDS: usize = 10;
/// Paragraphs whose link text exceeds this share of their text are boilerplate.
pub const BOILERPLATE_MAX_LINK_DENSITY: f64 = 0.2;

pub const DEFAULT_USER_AGENT: &str = concat!("offtopic-core/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_MAX_REDIRECTS: usize = 10;
