//! On-disk formats: the store's append-only index log, link-format TimeMaps
//! and WARC capture files.

pub mod index_log;
pub mod link_format;
pub mod warc;
