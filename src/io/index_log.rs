use std::io::Write;
use std::path::{Path, PathBuf};

use fs_err::{File, OpenOptions};
use serde::{Deserialize, Serialize};

use crate::Result;

/// One row of a store index: `uri` is stored under artifacts named `digest`.
///
/// `superseded` rows are tombstones: a later record of another kind replaced
/// this URI, so replay must forget it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub sequence: u64,
    pub uri: String,
    pub digest: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub superseded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexLogStats {
    pub sequence: u64,
    pub appends: u64,
    pub skipped_on_replay: u64,
}

/// Append-only JSON-lines index for one store subdirectory.
///
/// Rows are never rewritten. A torn or otherwise unreadable row is skipped on
/// replay so a crash mid-append loses at most that row.
#[derive(Debug)]
pub struct IndexLog {
    file: File,
    path: PathBuf,
    sequence: u64,
    appends: u64,
    skipped_on_replay: u64,
}

impl IndexLog {
    /// Opens (creating if needed) the log at `path` and returns every readable row.
    pub fn open(path: &Path) -> Result<(Self, Vec<IndexRecord>)> {
        let (records, skipped) = if path.exists() {
            Self::scan_records(path)?
        } else {
            (Vec::new(), 0)
        };
        let sequence = records.iter().map(|record| record.sequence).max().unwrap_or(0);

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let log = Self {
            file,
            path: path.to_path_buf(),
            sequence,
            appends: 0,
            skipped_on_replay: skipped,
        };
        Ok((log, records))
    }

    pub fn append(&mut self, uri: &str, digest: &str) -> Result<u64> {
        self.append_record(uri, digest, false)
    }

    pub fn append_tombstone(&mut self, uri: &str, digest: &str) -> Result<u64> {
        self.append_record(uri, digest, true)
    }

    fn append_record(&mut self, uri: &str, digest: &str, superseded: bool) -> Result<u64> {
        let record = IndexRecord {
            sequence: self.sequence + 1,
            uri: uri.to_string(),
            digest: digest.to_string(),
            superseded,
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        tracing::debug!(
            index.path = %self.path.display(),
            index.sequence = record.sequence,
            index.superseded = superseded,
            uri = %uri,
            "index append"
        );
        // single write per row keeps a crash from interleaving two rows
        self.file.write_all(&line)?;
        self.file.flush()?;
        self.file.sync_data()?;

        self.sequence = record.sequence;
        self.appends = self.appends.saturating_add(1);
        Ok(self.sequence)
    }

    #[must_use]
    pub fn stats(&self) -> IndexLogStats {
        IndexLogStats {
            sequence: self.sequence,
            appends: self.appends,
            skipped_on_replay: self.skipped_on_replay,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn scan_records(path: &Path) -> Result<(Vec<IndexRecord>, u64)> {
        let text = fs_err::read(path)?;
        let mut records = Vec::new();
        let mut skipped = 0u64;
        for (line_no, line) in text.split(|byte| *byte == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<IndexRecord>(line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    skipped += 1;
                    tracing::warn!(
                        index.path = %path.display(),
                        index.line = line_no + 1,
                        error = %err,
                        "skipping unreadable index row"
                    );
                }
            }
        }
        Ok((records, skipped))
    }
}
