//! Durable, content-addressed store of TimeMaps, mementos and memento errors.
//!
//! Every record kind lives in its own subdirectory with an append-only
//! [`IndexLog`] mapping URIs to the SHA-256 digest that names their artifacts.
//! Reopening a directory replays those logs, so an interrupted acquisition
//! resumes where it stopped.

mod boilerplate;
mod lifecycle;
mod mutation;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

pub use boilerplate::{BoilerplateError, BoilerplateRemover, ParagraphExtractor};

use crate::constants::{
    ERROR_INFO_SUFFIX, HEADERS_SUFFIX, INDEX_LOG_FILE, NO_BOILERPLATE_SUFFIX, ORIGINAL_SUFFIX,
};
use crate::io::index_log::{IndexLog, IndexRecord};
use crate::types::{Headers, StoreOptions, TimeMap};
use crate::{OffTopicError, Result};

/// Hex SHA-256 of a URI; names every artifact stored for it.
#[must_use]
pub fn uri_digest(uri: &str) -> String {
    hex::encode(Sha256::digest(uri.as_bytes()))
}

/// URI-to-digest index for one record kind, in insertion order.
#[derive(Debug)]
pub(crate) struct UriIndex {
    pub(crate) dir: PathBuf,
    log: IndexLog,
    order: Vec<String>,
    digests: HashMap<String, String>,
}

impl UriIndex {
    pub(crate) fn open(dir: PathBuf) -> Result<Self> {
        fs_err::create_dir_all(&dir)?;
        let (log, records) = IndexLog::open(&dir.join(INDEX_LOG_FILE))?;
        let mut index = Self {
            dir,
            log,
            order: Vec::new(),
            digests: HashMap::new(),
        };
        for record in records {
            index.apply(record);
        }
        Ok(index)
    }

    fn apply(&mut self, record: IndexRecord) {
        if record.superseded {
            self.forget(&record.uri);
        } else if self.digests.insert(record.uri.clone(), record.digest).is_none() {
            self.order.push(record.uri);
        }
    }

    pub(crate) fn forget(&mut self, uri: &str) {
        if self.digests.remove(uri).is_some() {
            self.order.retain(|existing| existing != uri);
        }
    }

    pub(crate) fn digest(&self, uri: &str) -> Option<&str> {
        self.digests.get(uri).map(String::as_str)
    }

    pub(crate) fn contains(&self, uri: &str) -> bool {
        self.digests.contains_key(uri)
    }

    pub(crate) fn uris(&self) -> Vec<String> {
        self.order.clone()
    }

    pub(crate) fn artifact(&self, digest: &str, suffix: &str) -> PathBuf {
        self.dir.join(format!("{digest}{suffix}"))
    }

    pub(crate) fn record(&mut self, uri: &str, digest: &str) -> Result<()> {
        self.log.append(uri, digest)?;
        self.apply(IndexRecord {
            sequence: 0,
            uri: uri.to_string(),
            digest: digest.to_string(),
            superseded: false,
        });
        Ok(())
    }

    /// Writes a tombstone when `uri` is present; a no-op otherwise.
    pub(crate) fn supersede(&mut self, uri: &str) -> Result<()> {
        if let Some(digest) = self.digests.get(uri).cloned() {
            self.log.append_tombstone(uri, &digest)?;
            self.forget(uri);
        }
        Ok(())
    }
}

/// Durable record of an acquisition run.
///
/// Owns the on-disk artifacts and hands callers owned copies of everything it
/// returns. Only one handle may mutate a directory at a time.
pub struct ContentStore {
    pub(crate) root: PathBuf,
    pub(crate) options: StoreOptions,
    pub(crate) timemaps: UriIndex,
    pub(crate) mementos: UriIndex,
    pub(crate) memento_errors: UriIndex,
    pub(crate) timemap_trees: HashMap<String, TimeMap>,
    pub(crate) remover: Box<dyn BoilerplateRemover>,
}

impl std::fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStore")
            .field("root", &self.root)
            .field("timemaps", &self.timemaps.order.len())
            .field("mementos", &self.mementos.order.len())
            .field("memento_errors", &self.memento_errors.order.len())
            .field("remover", &self.remover.name())
            .finish_non_exhaustive()
    }
}

impl ContentStore {
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deep copy of the stored TimeMap tree.
    pub fn timemap(&self, uri: &str) -> Result<TimeMap> {
        self.timemap_trees
            .get(uri)
            .cloned()
            .ok_or_else(|| OffTopicError::NoSuchTimeMap { uri: uri.to_string() })
    }

    pub fn memento_content(&self, uri: &str) -> Result<Vec<u8>> {
        let digest = self.memento_digest(uri)?;
        Ok(fs_err::read(self.mementos.artifact(digest, ORIGINAL_SUFFIX))?)
    }

    /// Memento content with boilerplate removed.
    ///
    /// The first call runs the configured [`BoilerplateRemover`] and persists
    /// its output; later calls only read that artifact.
    pub fn memento_content_without_boilerplate(&self, uri: &str) -> Result<Vec<u8>> {
        let digest = self.memento_digest(uri)?;
        let derived = self.mementos.artifact(digest, NO_BOILERPLATE_SUFFIX);
        if derived.exists() {
            return Ok(fs_err::read(derived)?);
        }

        tracing::debug!(uri = %uri, remover = self.remover.name(), "deriving boilerplate-free content");
        let markup = fs_err::read(self.mementos.artifact(digest, ORIGINAL_SUFFIX))?;
        let stripped = self.remover.remove(&markup).map_err(|err| {
            tracing::warn!(uri = %uri, error = %err, "boilerplate removal failed");
            OffTopicError::BoilerplateRemovalFailed {
                uri: uri.to_string(),
                reason: err.reason,
            }
        })?;
        mutation::write_artifact(&derived, &stripped)?;
        Ok(stripped)
    }

    /// Diagnostic recorded by [`Self::add_memento_error`].
    ///
    /// `None` means the URI-M has content rather than an error.
    pub fn memento_error_information(&self, uri: &str) -> Result<Option<Vec<u8>>> {
        if let Some(digest) = self.memento_errors.digest(uri) {
            let info = fs_err::read(self.memento_errors.artifact(digest, ERROR_INFO_SUFFIX))?;
            return Ok(Some(info));
        }
        if self.mementos.contains(uri) {
            return Ok(None);
        }
        Err(OffTopicError::NoSuchMemento { uri: uri.to_string() })
    }

    pub fn memento_headers(&self, uri: &str) -> Result<Headers> {
        let digest = self.memento_digest(uri)?;
        read_headers(&self.mementos.artifact(digest, HEADERS_SUFFIX))
    }

    pub fn timemap_headers(&self, uri: &str) -> Result<Headers> {
        let digest = self
            .timemaps
            .digest(uri)
            .ok_or_else(|| OffTopicError::NoSuchTimeMap { uri: uri.to_string() })?;
        read_headers(&self.timemaps.artifact(digest, HEADERS_SUFFIX))
    }

    /// URI-Ts in the order they were first stored.
    #[must_use]
    pub fn timemap_uris(&self) -> Vec<String> {
        self.timemaps.uris()
    }

    /// URI-Ms with stored content, in the order they were first stored.
    #[must_use]
    pub fn memento_uris(&self) -> Vec<String> {
        self.mementos.uris()
    }

    /// URI-Ms whose latest record is an access error.
    #[must_use]
    pub fn memento_error_uris(&self) -> Vec<String> {
        self.memento_errors.uris()
    }

    #[must_use]
    pub fn has_memento_error(&self, uri: &str) -> bool {
        self.memento_errors.contains(uri)
    }

    fn memento_digest(&self, uri: &str) -> Result<&str> {
        if self.memento_errors.contains(uri) {
            return Err(OffTopicError::MementoError { uri: uri.to_string() });
        }
        self.mementos
            .digest(uri)
            .ok_or_else(|| OffTopicError::NoSuchMemento { uri: uri.to_string() })
    }
}

fn read_headers(path: &Path) -> Result<Headers> {
    let raw = fs_err::read(path)?;
    Ok(serde_json::from_slice(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct CountingRemover {
        calls: Arc<AtomicUsize>,
    }

    impl BoilerplateRemover for CountingRemover {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn remove(&self, markup: &[u8]) -> std::result::Result<Vec<u8>, BoilerplateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(markup.to_ascii_uppercase())
        }
    }

    struct RejectingRemover;

    impl BoilerplateRemover for RejectingRemover {
        fn name(&self) -> &'static str {
            "rejecting"
        }

        fn remove(&self, _markup: &[u8]) -> std::result::Result<Vec<u8>, BoilerplateError> {
            Err(BoilerplateError::new("Document is empty"))
        }
    }

    #[test]
    fn digest_is_stable_hex_sha256() {
        let digest = uri_digest("http://example.com");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, uri_digest("http://example.com"));
        assert_ne!(digest, uri_digest("http://example.org"));
    }

    #[test]
    fn boilerplate_derivation_runs_once() {
        let dir = tempdir().expect("tempdir");
        let calls = Arc::new(AtomicUsize::new(0));
        let mut store = ContentStore::open(dir.path())
            .expect("open")
            .with_remover(CountingRemover {
                calls: Arc::clone(&calls),
            });
        store
            .add_memento("urim", b"<p>body</p>", &Headers::new())
            .expect("add");

        let first = store.memento_content_without_boilerplate("urim").expect("first");
        let second = store.memento_content_without_boilerplate("urim").expect("second");

        assert_eq!(first, second);
        assert_eq!(first, b"<P>BODY</P>");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn boilerplate_failure_is_distinct_from_lookup_errors() {
        let dir = tempdir().expect("tempdir");
        let mut store = ContentStore::open(dir.path())
            .expect("open")
            .with_remover(RejectingRemover);
        store.add_memento("urim", b"", &Headers::new()).expect("add");

        let err = store
            .memento_content_without_boilerplate("urim")
            .expect_err("remover rejects");
        assert!(matches!(err, OffTopicError::BoilerplateRemovalFailed { .. }));

        let missing = store
            .memento_content_without_boilerplate("other")
            .expect_err("missing");
        assert!(matches!(missing, OffTopicError::NoSuchMemento { .. }));
    }

    #[test]
    fn error_information_distinguishes_content_and_absence() {
        let dir = tempdir().expect("tempdir");
        let mut store = ContentStore::open(dir.path()).expect("open");
        store.add_memento("ok", b"hello", &Headers::new()).expect("add");
        store
            .add_memento_error("bad", b"", &Headers::new(), b"connection-error")
            .expect("add error");

        assert_eq!(store.memento_error_information("ok").expect("ok"), None);
        assert_eq!(
            store.memento_error_information("bad").expect("bad"),
            Some(b"connection-error".to_vec())
        );
        assert!(matches!(
            store.memento_error_information("absent"),
            Err(OffTopicError::NoSuchMemento { .. })
        ));
        assert!(matches!(
            store.memento_headers("bad"),
            Err(OffTopicError::MementoError { .. })
        ));
    }
}
