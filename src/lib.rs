#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![cfg_attr(
    test,
    allow(
        clippy::useless_vec,
        clippy::uninlined_format_args,
        clippy::cast_possible_truncation,
        clippy::float_cmp,
        clippy::cast_precision_loss
    )
)]
#![allow(clippy::module_name_repetitions)]
//
// Strategic lint exceptions - these are allowed project-wide for pragmatic reasons:
//
// Documentation lints: accessor-style functions are self-describing.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Cast safety: scores are ratios of lengths and counts well inside f64's exact range.
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
//
// Style/complexity
#![allow(clippy::too_many_lines)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::similar_names)]
// e.g., urit and urim are intentionally similar
//
// Pattern matching
#![allow(clippy::manual_let_else)]
#![allow(clippy::match_same_arms)]
//
// Ergonomics
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::struct_excessive_bools)] // preparation flags
#![allow(clippy::implicit_hasher)]
#![allow(clippy::unnecessary_wraps)]

/// The offtopic-core crate version (matches `Cargo.toml`).
pub const OFFTOPIC_CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod acquire;
pub mod constants;
pub mod error;
pub mod io;
pub mod ledger;
pub mod measure;
pub mod pipeline;
pub mod store;
pub mod types;

pub use acquire::{
    AcquisitionReport, from_datafile, from_directory, from_timemaps, from_warc, parse_datafile,
};
pub use error::{OffTopicError, Result};
pub use io::index_log::{IndexLog, IndexLogStats, IndexRecord};
pub use io::link_format::parse_link_timemap;
pub use io::warc::{WarcCapture, WarcReader, WarcRecord};
pub use ledger::{
    CellKey, CellOutcome, Comparator, LedgerError, MeasurementLedger, MementoAnnotations,
    MetricCell, ProcessingFlags, TopicStatus,
};
pub use measure::{
    Artifact, MetricSpec, Preparation, ScoreError, ScoreFn, ThresholdOverride,
    compute_score_across_timemaps, evaluate, metric, parse_metric_selection, record_annotations,
    supported_metrics,
};
pub use pipeline::{
    AliasMap, ArchiveRewriteRules, FetchError, FetchPipeline, FetchResponse, PipelineReport,
    ProbeResponse, RewriteRule, Transport,
};
#[cfg(feature = "http")]
pub use pipeline::{ReqwestTransport, ReqwestTransportOptions};
pub use store::{BoilerplateError, BoilerplateRemover, ContentStore, ParagraphExtractor, uri_digest};
pub use types::{
    Headers, MementoRef, MementoSet, PipelineOptions, PipelineOptionsBuilder, StoreOptions,
    TimeMap, TimeMapInput, TimeMapSelf, header_value, parse_timemap_text,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_manifest() {
        assert_eq!(OFFTOPIC_CORE_VERSION, env!("CARGO_PKG_VERSION"));
        assert!(constants::DEFAULT_USER_AGENT.ends_with(OFFTOPIC_CORE_VERSION));
    }

    #[test]
    fn default_registry_covers_reference_metrics() {
        let names: Vec<&str> = supported_metrics().iter().map(|spec| spec.name).collect();
        for expected in ["bytecount", "wordcount", "jaccard", "raw_simhash", "tf_simhash"] {
            assert!(names.contains(&expected), "missing {expected}");
        }
    }
}
