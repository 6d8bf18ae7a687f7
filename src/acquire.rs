//! Collection acquisition: filling a [`ContentStore`] from TimeMaps, a
//! gold-standard data file, WARC files or an existing store directory.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::constants::{DATAFILE_DATETIME_FORMAT, HTTP_STATUS_HEADER, WARC_URIM_DATETIME_FORMAT};
use crate::io::warc::WarcReader;
use crate::ledger::MeasurementLedger;
use crate::pipeline::{FetchPipeline, PipelineReport, Transport};
use crate::store::ContentStore;
use crate::types::{Headers, MementoRef, TimeMap};
use crate::{OffTopicError, Result};

/// What an acquisition run stored and what it could not reach.
#[derive(Debug, Clone, Default)]
pub struct AcquisitionReport {
    /// URI-Ts stored, in input order.
    pub timemaps: Vec<String>,
    /// URI-Ts that could not be acquired, with the reason.
    pub timemap_errors: BTreeMap<String, String>,
    pub mementos: PipelineReport,
}

impl AcquisitionReport {
    /// Copies TimeMap failures into `ledger` as TimeMap access errors.
    pub fn record_into(&self, ledger: &mut MeasurementLedger) {
        for (urit, reason) in &self.timemap_errors {
            ledger.set_timemap_access_error(urit, reason.clone());
        }
    }
}

fn member_uris(store: &ContentStore, urits: &[String]) -> Result<Vec<String>> {
    let mut uris = Vec::new();
    for urit in urits {
        uris.extend(store.timemap(urit)?.memento_uris().map(str::to_string));
    }
    Ok(uris)
}

/// Fetches each URI-T, stores it, then acquires every memento it lists.
///
/// A TimeMap that cannot be fetched, answers with a non-200 status or does
/// not parse is reported and skipped; the others proceed.
pub fn from_timemaps<T, I, S>(
    store: &mut ContentStore,
    pipeline: &FetchPipeline<T>,
    urits: I,
) -> Result<AcquisitionReport>
where
    T: Transport,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut report = AcquisitionReport::default();

    for urit in urits {
        let urit = urit.as_ref();
        if report.timemaps.iter().any(|seen| seen == urit) {
            continue;
        }
        tracing::info!(urit = %urit, "acquiring TimeMap");
        let response = match pipeline.transport().fetch(urit) {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(urit = %urit, error = %err, "TimeMap fetch failed");
                report.timemap_errors.insert(urit.to_string(), err.diagnostic());
                continue;
            }
        };
        if response.status != 200 {
            tracing::warn!(urit = %urit, status = response.status, "TimeMap not acquired");
            report.timemap_errors.insert(
                urit.to_string(),
                format!("No TimeMap was acquired from URI-T {urit}: HTTP status {}", response.status),
            );
            continue;
        }

        let mut headers = response.headers;
        headers.insert(HTTP_STATUS_HEADER.to_string(), response.status.to_string());
        let text = String::from_utf8_lossy(&response.body).into_owned();
        match store.add_timemap(urit, text, &headers) {
            Ok(()) => report.timemaps.push(urit.to_string()),
            Err(err @ (OffTopicError::MalformedManifest { .. } | OffTopicError::UnsupportedTimeMap { .. })) => {
                tracing::warn!(urit = %urit, error = %err, "TimeMap rejected");
                report.timemap_errors.insert(urit.to_string(), err.to_string());
            }
            Err(err) => return Err(err),
        }
    }

    let uris = member_uris(store, &report.timemaps)?;
    report.mementos = pipeline.run(store, uris)?;
    Ok(report)
}

/// Parses a tab-separated gold-standard file into synthetic TimeMaps keyed by URI-T.
///
/// The header row must name `id`, `date` and `URI` columns; other columns
/// such as `label` are ignored. Rows sharing an `id` form one TimeMap for
/// the original resource `datafile-<id>`.
pub fn parse_datafile(text: &str) -> Result<BTreeMap<String, TimeMap>> {
    let invalid = |reason: String| OffTopicError::InvalidDataFile { reason };
    let mut lines = text.lines().enumerate().filter(|(_, line)| !line.trim().is_empty());

    let (_, header) = lines
        .next()
        .ok_or_else(|| invalid("data file is empty".into()))?;
    let columns: Vec<&str> = header.split('\t').map(str::trim).collect();
    let column = |name: &str| {
        columns
            .iter()
            .position(|c| *c == name)
            .ok_or_else(|| invalid(format!("missing column {name}")))
    };
    let (id_col, date_col, uri_col) = (column("id")?, column("date")?, column("URI")?);

    let mut grouped: BTreeMap<String, Vec<MementoRef>> = BTreeMap::new();
    for (index, line) in lines {
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        let field = |col: usize, name: &str| {
            fields
                .get(col)
                .copied()
                .filter(|value| !value.is_empty())
                .ok_or_else(|| invalid(format!("line {}: missing {name}", index + 1)))
        };
        let id = field(id_col, "id")?;
        let date = field(date_col, "date")?;
        let uri = field(uri_col, "URI")?;
        let datetime = NaiveDateTime::parse_from_str(date, DATAFILE_DATETIME_FORMAT)
            .map_err(|err| invalid(format!("line {}: bad date {date:?}: {err}", index + 1)))?;
        grouped
            .entry(id.to_string())
            .or_default()
            .push(MementoRef::new(uri, datetime));
    }

    Ok(grouped
        .into_iter()
        .map(|(id, entries)| {
            let original = format!("datafile-{id}");
            let urit = format!("from-datafile::timemap::{original}");
            (urit, TimeMap::from_entries(original, entries))
        })
        .collect())
}

/// Builds TimeMaps from a gold-standard data file and acquires their mementos.
pub fn from_datafile<T, P>(
    store: &mut ContentStore,
    pipeline: &FetchPipeline<T>,
    path: P,
) -> Result<AcquisitionReport>
where
    T: Transport,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    tracing::info!(path = %path.display(), "building collection from data file");
    let text = fs_err::read_to_string(path)?;
    let timemaps = parse_datafile(&text)?;

    let mut report = AcquisitionReport::default();
    for (urit, timemap) in timemaps {
        store.add_timemap(&urit, timemap, &Headers::new())?;
        report.timemaps.push(urit);
    }
    let uris = member_uris(store, &report.timemaps)?;
    report.mementos = pipeline.run(store, uris)?;
    Ok(report)
}

/// Stores every HTML response found in `paths` and groups them into one
/// TimeMap per target URI.
///
/// Each capture gets the URI-M `from-warc::<yyyymmddhhmmss>::<target>` and
/// its TimeMap the URI-T `from-warc::timemap::<target>`. Other records are
/// skipped.
pub fn from_warc<I, P>(store: &mut ContentStore, paths: I) -> Result<AcquisitionReport>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut captures: BTreeMap<String, Vec<MementoRef>> = BTreeMap::new();
    let mut report = AcquisitionReport::default();

    for path in paths {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "reading HTML captures from WARC file");
        let mut reader = WarcReader::open(path)?;
        let mut stored = 0usize;
        while let Some(record) = reader.next_record()? {
            let Some(capture) = record.html_capture()? else {
                continue;
            };
            let urim = format!(
                "from-warc::{}::{}",
                capture.datetime.format(WARC_URIM_DATETIME_FORMAT),
                capture.target_uri
            );
            store.add_memento(&urim, &capture.body, &capture.headers)?;
            let entries = captures.entry(capture.target_uri).or_default();
            if !entries.iter().any(|entry| entry.uri == urim) {
                entries.push(MementoRef::new(urim.clone(), capture.datetime));
            }
            report.mementos.stored.push(urim);
            stored += 1;
        }
        tracing::info!(path = %path.display(), records = reader.records(), stored, "WARC file read");
    }

    for (original, entries) in captures {
        let urit = format!("from-warc::timemap::{original}");
        let mut timemap = TimeMap::from_entries(original.as_str(), entries);
        timemap.timegate_uri = Some(format!("from-warc::timegate::{original}"));
        timemap.timemap_uri.json_format = Some(urit.clone());
        store.add_timemap(&urit, timemap, &Headers::new())?;
        report.timemaps.push(urit);
    }

    report.mementos.stored.sort();
    report.mementos.stored.dedup();
    report.mementos.requested = report.mementos.stored.len();
    Ok(report)
}

/// Reopens a store previously filled by one of the other entry points.
pub fn from_directory<P: AsRef<Path>>(path: P) -> Result<ContentStore> {
    let path = path.as_ref();
    if !path.is_dir() {
        return Err(OffTopicError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("store directory {} does not exist", path.display()),
        )));
    }
    ContentStore::open(path)
}
