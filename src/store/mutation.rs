//! Store writes: TimeMaps, mementos and memento access errors.
//!
//! Artifacts are written first (atomically), then the index row is appended,
//! so a crash never leaves a URI indexed without its files. When a URI-M
//! switches kind, the old kind is tombstoned before the new row lands.

use std::io::Write;
use std::path::Path;

use atomic_write_file::AtomicWriteFile;

use super::{ContentStore, uri_digest};
use crate::constants::{
    ERROR_INFO_SUFFIX, HEADERS_SUFFIX, NO_BOILERPLATE_SUFFIX, ORIGINAL_SUFFIX, TREE_SUFFIX,
};
use crate::types::{Headers, TimeMapInput};
use crate::Result;

pub(crate) fn write_artifact(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = AtomicWriteFile::open(path)?;
    file.write_all(bytes)?;
    file.commit()?;
    Ok(())
}

impl ContentStore {
    /// Stores a TimeMap under `uri`, replacing any previous record for it.
    pub fn add_timemap(
        &mut self,
        uri: &str,
        input: impl Into<TimeMapInput>,
        headers: &Headers,
    ) -> Result<()> {
        let (timemap, original) = input.into().resolve(self.options.strict_manifests)?;
        let digest = uri_digest(uri);

        write_artifact(
            &self.timemaps.artifact(&digest, HEADERS_SUFFIX),
            &serde_json::to_vec_pretty(headers)?,
        )?;
        write_artifact(
            &self.timemaps.artifact(&digest, TREE_SUFFIX),
            &serde_json::to_vec_pretty(&timemap)?,
        )?;
        write_artifact(
            &self.timemaps.artifact(&digest, ORIGINAL_SUFFIX),
            original.as_bytes(),
        )?;
        self.timemaps.record(uri, &digest)?;

        tracing::debug!(
            uri = %uri,
            digest = %digest,
            mementos = timemap.mementos.list.len(),
            "stored TimeMap"
        );
        self.timemap_trees.insert(uri.to_string(), timemap);
        Ok(())
    }

    /// Stores the content of a successfully fetched memento.
    ///
    /// Supersedes any access error previously recorded for `uri`.
    pub fn add_memento(&mut self, uri: &str, content: &[u8], headers: &Headers) -> Result<()> {
        let digest = uri_digest(uri);

        write_artifact(
            &self.mementos.artifact(&digest, HEADERS_SUFFIX),
            &serde_json::to_vec_pretty(headers)?,
        )?;
        write_artifact(&self.mementos.artifact(&digest, ORIGINAL_SUFFIX), content)?;
        // derived text belongs to the content it was computed from
        let derived = self.mementos.artifact(&digest, NO_BOILERPLATE_SUFFIX);
        if derived.exists() {
            fs_err::remove_file(&derived)?;
        }

        self.memento_errors.supersede(uri)?;
        self.mementos.record(uri, &digest)?;
        tracing::debug!(uri = %uri, digest = %digest, bytes = content.len(), "stored memento");
        Ok(())
    }

    /// Records that `uri` could not be acquired.
    ///
    /// `content` and `headers` may be empty; `error_information` is the
    /// diagnostic returned later by [`Self::memento_error_information`].
    /// Supersedes any content previously stored for `uri`.
    pub fn add_memento_error(
        &mut self,
        uri: &str,
        content: &[u8],
        headers: &Headers,
        error_information: &[u8],
    ) -> Result<()> {
        let digest = uri_digest(uri);

        write_artifact(
            &self.memento_errors.artifact(&digest, HEADERS_SUFFIX),
            &serde_json::to_vec_pretty(headers)?,
        )?;
        write_artifact(&self.memento_errors.artifact(&digest, ORIGINAL_SUFFIX), content)?;
        write_artifact(
            &self.memento_errors.artifact(&digest, ERROR_INFO_SUFFIX),
            error_information,
        )?;

        self.mementos.supersede(uri)?;
        self.memento_errors.record(uri, &digest)?;
        tracing::warn!(
            uri = %uri,
            digest = %digest,
            error = %String::from_utf8_lossy(error_information),
            "stored memento access error"
        );
        Ok(())
    }
}
