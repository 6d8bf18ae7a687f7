//! Opening stores and recovering their state from disk.

use std::collections::HashMap;
use std::path::Path;

use super::{BoilerplateRemover, ContentStore, ParagraphExtractor, UriIndex};
use crate::constants::{MEMENTO_ERRORS_DIR, MEMENTOS_DIR, TIMEMAPS_DIR, TREE_SUFFIX};
use crate::types::{StoreOptions, TimeMap};
use crate::Result;

impl ContentStore {
    /// Opens the store rooted at `root`, creating the layout when absent.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        Self::open_with_options(root, StoreOptions::default())
    }

    pub fn open_with_options<P: AsRef<Path>>(root: P, options: StoreOptions) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs_err::create_dir_all(&root)?;

        let timemaps = UriIndex::open(root.join(TIMEMAPS_DIR))?;
        let mementos = UriIndex::open(root.join(MEMENTOS_DIR))?;
        let memento_errors = UriIndex::open(root.join(MEMENTO_ERRORS_DIR))?;

        let mut store = Self {
            root,
            options,
            timemaps,
            mementos,
            memento_errors,
            timemap_trees: HashMap::new(),
            remover: Box::new(ParagraphExtractor::default()),
        };
        store.recover()?;

        tracing::info!(
            store.root = %store.root.display(),
            timemaps = store.timemaps.uris().len(),
            mementos = store.mementos.uris().len(),
            memento_errors = store.memento_errors.uris().len(),
            "content store opened"
        );
        Ok(store)
    }

    /// Replaces the boilerplate remover used for derived artifacts.
    #[must_use]
    pub fn with_remover<R>(mut self, remover: R) -> Self
    where
        R: BoilerplateRemover + 'static,
    {
        self.remover = Box::new(remover);
        self
    }

    #[must_use]
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Re-hydrates TimeMap trees named by the replayed index.
    ///
    /// A tree that is missing or unreadable drops its URI-T from the in-memory
    /// index; the log itself is left untouched so a later add repairs it.
    fn recover(&mut self) -> Result<()> {
        let mut unreadable = Vec::new();
        for uri in self.timemaps.uris() {
            let Some(digest) = self.timemaps.digest(&uri) else {
                continue;
            };
            let path = self.timemaps.artifact(digest, TREE_SUFFIX);
            let parsed = fs_err::read(&path)
                .map_err(crate::OffTopicError::from)
                .and_then(|raw| serde_json::from_slice::<TimeMap>(&raw).map_err(Into::into));
            match parsed {
                Ok(mut timemap) => {
                    timemap.designate_bounds();
                    self.timemap_trees.insert(uri, timemap);
                }
                Err(err) => {
                    tracing::warn!(
                        uri = %uri,
                        path = %path.display(),
                        error = %err,
                        "skipping unreadable TimeMap record during recovery"
                    );
                    unreadable.push(uri);
                }
            }
        }
        for uri in unreadable {
            self.timemaps.forget(&uri);
        }

        // an interrupted supersede can leave a URI-M in both indexes
        for uri in self.memento_errors.uris() {
            if self.mementos.contains(&uri) {
                tracing::warn!(uri = %uri, "URI-M indexed as both content and error; keeping the error");
                self.mementos.forget(&uri);
            }
        }
        Ok(())
    }
}
