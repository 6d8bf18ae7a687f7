//! Raw-memento resolution and fetch pipeline.
//!
//! A run has two strictly sequential phases over the same bounded pool:
//! discovery probes every distinct input URI-M and maps it to a raw URI,
//! then each distinct raw URI is fetched once and its response is fanned out
//! to every URI-M that resolved to it. Per-URI failures are collected and
//! written to the store as memento access errors after the fetch phase.

mod archive;
mod pool;
mod transport;

use std::collections::{BTreeMap, HashMap, HashSet};

pub use archive::{ArchiveRewriteRules, RewriteRule};
pub use transport::{FetchError, FetchResponse, ProbeResponse, Transport};
#[cfg(feature = "http")]
pub use transport::{ReqwestTransport, ReqwestTransportOptions};

pub(crate) use pool::run_pool;

use crate::constants::{HTTP_STATUS_HEADER, MEMENTO_DATETIME_HEADER};
use crate::store::ContentStore;
use crate::types::{Headers, PipelineOptions, header_value};
use crate::Result;

/// Many-to-one relation from input URI-Ms to raw URIs, alive for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasMap {
    raw_by_uri: HashMap<String, String>,
    aliases: HashMap<String, Vec<String>>,
    raw_order: Vec<String>,
}

impl AliasMap {
    pub fn insert(&mut self, uri: impl Into<String>, raw: impl Into<String>) {
        let uri = uri.into();
        let raw = raw.into();
        if let Some(previous) = self.raw_by_uri.insert(uri.clone(), raw.clone()) {
            if let Some(members) = self.aliases.get_mut(&previous) {
                members.retain(|member| member != &uri);
            }
        }
        let members = self.aliases.entry(raw.clone()).or_default();
        if members.is_empty() && !self.raw_order.contains(&raw) {
            self.raw_order.push(raw);
        }
        members.push(uri);
    }

    #[must_use]
    pub fn raw_uri(&self, uri: &str) -> Option<&str> {
        self.raw_by_uri.get(uri).map(String::as_str)
    }

    /// Input URI-Ms that resolved to `raw`.
    #[must_use]
    pub fn aliases(&self, raw: &str) -> &[String] {
        self.aliases.get(raw).map_or(&[], Vec::as_slice)
    }

    /// Distinct raw URIs with at least one alias, in first-seen order.
    #[must_use]
    pub fn raw_uris(&self) -> Vec<String> {
        self.raw_order
            .iter()
            .filter(|raw| !self.aliases(raw).is_empty())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.raw_by_uri.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw_by_uri.is_empty()
    }
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    /// Distinct input URI-Ms.
    pub requested: usize,
    /// Raw URIs fetched (one request each).
    pub raw_fetches: usize,
    /// URI-Ms stored with content, sorted.
    pub stored: Vec<String>,
    /// URI-Ms stored as access errors.
    pub failed: BTreeMap<String, FetchError>,
}

/// Resolves, deduplicates and fetches raw mementos into a [`ContentStore`].
#[derive(Debug)]
pub struct FetchPipeline<T: Transport> {
    transport: T,
    options: PipelineOptions,
}

impl<T: Transport> FetchPipeline<T> {
    pub fn new(transport: T) -> Self {
        Self::with_options(transport, PipelineOptions::default())
    }

    pub fn with_options(transport: T, options: PipelineOptions) -> Self {
        Self { transport, options }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Probes every URI-M and maps the valid ones to raw URIs.
    ///
    /// A probe is valid only when its response carries `Memento-Datetime`.
    /// The raw URI is derived from the final URI when redirects were
    /// followed and from the input URI otherwise.
    pub fn discover<I, S>(&self, uris: I) -> Result<(AliasMap, BTreeMap<String, FetchError>)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let jobs: Vec<String> = uris
            .into_iter()
            .map(|uri| uri.as_ref().to_string())
            .filter(|uri| seen.insert(uri.clone()))
            .collect();

        let mut aliases = AliasMap::default();
        let mut failures = BTreeMap::new();
        let rules = &self.options.rewrite_rules;

        run_pool(
            "offtopic-probe",
            jobs,
            self.options.workers,
            |uri: String| {
                let probe = self.transport.probe(&uri);
                (uri, probe)
            },
            |(uri, probe)| {
                match probe {
                    Ok(probe) if header_value(&probe.headers, MEMENTO_DATETIME_HEADER).is_some() => {
                        let resolved = if probe.redirected { &probe.final_uri } else { &uri };
                        let raw = rules.raw_uri(resolved);
                        tracing::debug!(uri = %uri, raw = %raw, "resolved raw URI-M");
                        aliases.insert(uri, raw);
                    }
                    Ok(_) => {
                        let err = FetchError::MissingTimestampHeader { uri: uri.clone() };
                        tracing::warn!(uri = %uri, error = %err, "probe response is not a memento");
                        failures.insert(uri, err);
                    }
                    Err(err) => {
                        tracing::warn!(uri = %uri, error = %err, "probe failed, recording");
                        failures.insert(uri, err);
                    }
                }
                Ok(())
            },
        )?;
        Ok((aliases, failures))
    }

    /// Acquires every URI-M in `uris` into `store`.
    ///
    /// Per-URI failures become memento access errors; store I/O failures
    /// abort the run.
    pub fn run<I, S>(&self, store: &mut ContentStore, uris: I) -> Result<PipelineReport>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (aliases, mut failures) = self.discover(uris)?;
        let requested = aliases.len() + failures.len();
        let raw_uris = aliases.raw_uris();
        tracing::info!(
            requested,
            resolved = aliases.len(),
            raw = raw_uris.len(),
            failed = failures.len(),
            "raw memento discovery finished"
        );

        let mut stored = Vec::new();
        let raw_fetches = run_pool(
            "offtopic-fetch",
            raw_uris,
            self.options.workers,
            |raw: String| {
                let response = self.transport.fetch(&raw);
                (raw, response)
            },
            |(raw, response)| {
                let members = aliases.aliases(&raw);
                match response {
                    Ok(response) => {
                        let mut headers = response.headers;
                        headers.insert(HTTP_STATUS_HEADER.to_string(), response.status.to_string());
                        tracing::debug!(raw = %raw, aliases = members.len(), status = response.status, "fetched raw memento");
                        for uri in members {
                            store.add_memento(uri, &response.body, &headers)?;
                            stored.push(uri.clone());
                        }
                    }
                    Err(err) => {
                        tracing::warn!(raw = %raw, aliases = members.len(), error = %err, "raw memento fetch failed, recording");
                        for uri in members {
                            failures.insert(uri.clone(), err.clone());
                        }
                    }
                }
                Ok(())
            },
        )?;

        for (uri, err) in &failures {
            store.add_memento_error(uri, b"", &Headers::new(), err.diagnostic().as_bytes())?;
        }
        stored.sort();
        tracing::info!(
            stored = stored.len(),
            failed = failures.len(),
            raw_fetches,
            "memento acquisition finished"
        );
        Ok(PipelineReport {
            requested,
            raw_fetches,
            stored,
            failed: failures,
        })
    }
}
