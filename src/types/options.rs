//! Builder-style options for opening stores and running the fetch pipeline.

use serde::{Deserialize, Serialize};

use crate::pipeline::ArchiveRewriteRules;

/// Options applied when opening a [`crate::ContentStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreOptions {
    /// Reject link-format TimeMaps that cannot be parsed cleanly instead of
    /// keeping whatever entries were recognised.
    #[serde(default)]
    pub strict_manifests: bool,
}

impl StoreOptions {
    #[must_use]
    pub fn strict() -> Self {
        Self {
            strict_manifests: true,
        }
    }

    #[must_use]
    pub fn strict_manifests(mut self, strict: bool) -> Self {
        self.strict_manifests = strict;
        self
    }
}

/// Tunables for [`crate::FetchPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Upper bound on concurrent probes or fetches.
    pub workers: usize,
    /// Archive-specific rewrites from replay URIs to raw-content URIs.
    pub rewrite_rules: ArchiveRewriteRules,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(1),
            rewrite_rules: ArchiveRewriteRules::default(),
        }
    }
}

impl PipelineOptions {
    #[must_use]
    pub fn builder() -> PipelineOptionsBuilder {
        PipelineOptionsBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptionsBuilder {
    inner: PipelineOptions,
}

impl PipelineOptionsBuilder {
    /// Zero is clamped to a single worker.
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.inner.workers = workers.max(1);
        self
    }

    #[must_use]
    pub fn rewrite_rules(mut self, rules: ArchiveRewriteRules) -> Self {
        self.inner.rewrite_rules = rules;
        self
    }

    pub fn rewrite<S: Into<String>>(mut self, domain: S, search: S, replacement: S) -> Self {
        self.inner.rewrite_rules.push(domain, search, replacement);
        self
    }

    #[must_use]
    pub fn build(self) -> PipelineOptions {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_clamps_workers() {
        let opts = PipelineOptions::builder().workers(0).build();
        assert_eq!(opts.workers, 1);
    }

    #[test]
    fn default_store_options_are_lenient() {
        assert!(!StoreOptions::default().strict_manifests);
        assert!(StoreOptions::strict().strict_manifests);
    }
}
