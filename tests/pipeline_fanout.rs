//! Integration tests for raw-memento resolution and fetch fan-out.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tempfile::TempDir;

use offtopic_core::{
    ArchiveRewriteRules, ContentStore, FetchError, FetchPipeline, FetchResponse, Headers,
    OffTopicError, PipelineOptions, ProbeResponse, Transport,
};

/// In-memory archive with randomized response delays.
#[derive(Default)]
struct MockArchive {
    /// Probe target -> (final URI, redirected).
    redirects: HashMap<String, String>,
    /// URIs whose probe lacks `Memento-Datetime`.
    not_mementos: Vec<String>,
    /// URIs whose probe fails at the connection level.
    unreachable: Vec<String>,
    /// Raw URIs whose GET fails.
    broken_raw: Vec<String>,
    fetches: AtomicUsize,
    fetched: Mutex<Vec<String>>,
}

impl MockArchive {
    fn jitter() {
        std::thread::sleep(Duration::from_millis(fastrand::u64(0..5)));
    }
}

impl Transport for MockArchive {
    fn probe(&self, uri: &str) -> Result<ProbeResponse, FetchError> {
        Self::jitter();
        if self.unreachable.iter().any(|u| u == uri) {
            return Err(FetchError::Connection {
                reason: format!("connection refused by {uri}"),
            });
        }
        let mut headers = Headers::new();
        if !self.not_mementos.iter().any(|u| u == uri) {
            headers.insert("memento-datetime".into(), "Tue, 20 Jun 2000 18:02:59 GMT".into());
        }
        let (final_uri, redirected) = match self.redirects.get(uri) {
            Some(target) => (target.clone(), true),
            None => (uri.to_string(), false),
        };
        Ok(ProbeResponse {
            final_uri,
            redirected,
            headers,
        })
    }

    fn fetch(&self, uri: &str) -> Result<FetchResponse, FetchError> {
        Self::jitter();
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.fetched.lock().unwrap().push(uri.to_string());
        if self.broken_raw.iter().any(|u| u == uri) {
            return Err(FetchError::TooManyRedirects {
                reason: format!("redirect loop at {uri}"),
            });
        }
        let mut headers = Headers::new();
        headers.insert("content-type".into(), "text/html".into());
        Ok(FetchResponse {
            status: 200,
            headers,
            body: format!("<html><body>{uri}</body></html>").into_bytes(),
        })
    }
}

fn options(workers: usize) -> PipelineOptions {
    PipelineOptions::builder().workers(workers).build()
}

#[test]
fn aliases_share_one_fetch_and_identical_content() {
    let dir = TempDir::new().unwrap();
    let mut store = ContentStore::open(dir.path()).unwrap();

    let mut archive = MockArchive::default();
    archive.redirects.insert(
        "http://web.archive.org/web/2000/http://a.example/".into(),
        "http://web.archive.org/web/20000620180259/http://a.example/".into(),
    );
    let pipeline = FetchPipeline::with_options(archive, options(4));

    let inputs = [
        "http://web.archive.org/web/2000/http://a.example/",
        "http://web.archive.org/web/20000620180259/http://a.example/",
    ];
    let report = pipeline.run(&mut store, inputs).unwrap();

    assert_eq!(report.requested, 2);
    assert_eq!(report.raw_fetches, 1);
    assert_eq!(pipeline.transport().fetches.load(Ordering::SeqCst), 1);
    assert_eq!(
        pipeline.transport().fetched.lock().unwrap().as_slice(),
        ["http://web.archive.org/web/20000620180259id_/http://a.example/".to_string()]
    );

    let first = store.memento_content(inputs[0]).unwrap();
    let second = store.memento_content(inputs[1]).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        store.memento_headers(inputs[0]).unwrap(),
        store.memento_headers(inputs[1]).unwrap()
    );
    assert_eq!(
        store.memento_headers(inputs[0]).unwrap().get("http-status").map(String::as_str),
        Some("200")
    );
}

#[test]
fn failures_stay_with_their_own_uris() {
    let dir = TempDir::new().unwrap();
    let mut store = ContentStore::open(dir.path()).unwrap();

    let archive = MockArchive {
        not_mementos: vec!["http://archive.example/live/http://b.example/".into()],
        unreachable: vec!["http://archive.example/2001/http://c.example/".into()],
        broken_raw: vec!["http://archive.example/2002/http://d.example/".into()],
        ..MockArchive::default()
    };
    let pipeline = FetchPipeline::with_options(archive, options(3));

    let report = pipeline
        .run(
            &mut store,
            [
                "http://archive.example/2000/http://a.example/",
                "http://archive.example/live/http://b.example/",
                "http://archive.example/2001/http://c.example/",
                "http://archive.example/2002/http://d.example/",
                "http://archive.example/2000/http://a.example/",
            ],
        )
        .unwrap();

    assert_eq!(report.requested, 4);
    assert_eq!(report.stored, vec!["http://archive.example/2000/http://a.example/".to_string()]);
    assert_eq!(report.failed.len(), 3);

    assert!(store.memento_content("http://archive.example/2000/http://a.example/").is_ok());
    for (uri, kind) in [
        ("http://archive.example/live/http://b.example/", "no-timestamp-header"),
        ("http://archive.example/2001/http://c.example/", "connection-error"),
        ("http://archive.example/2002/http://d.example/", "too-many-redirects"),
    ] {
        assert!(matches!(
            store.memento_content(uri),
            Err(OffTopicError::MementoError { .. })
        ));
        let info = store.memento_error_information(uri).unwrap().unwrap();
        assert!(String::from_utf8_lossy(&info).starts_with(kind), "{uri}: {info:?}");
    }
}

#[test]
fn custom_rewrite_rules_apply_to_resolved_uris() {
    let dir = TempDir::new().unwrap();
    let mut store = ContentStore::open(dir.path()).unwrap();

    let mut rules = ArchiveRewriteRules::empty();
    rules.push("archive.example", "/replay/", "/raw/");
    let options = PipelineOptions::builder().workers(2).rewrite_rules(rules).build();
    let pipeline = FetchPipeline::with_options(MockArchive::default(), options);

    pipeline
        .run(&mut store, ["http://archive.example/replay/http://a.example/"])
        .unwrap();

    assert_eq!(
        pipeline.transport().fetched.lock().unwrap().as_slice(),
        ["http://archive.example/raw/http://a.example/".to_string()]
    );
    assert!(store
        .memento_content("http://archive.example/replay/http://a.example/")
        .is_ok());
}

#[test]
fn many_inputs_complete_under_contention() {
    let dir = TempDir::new().unwrap();
    let mut store = ContentStore::open(dir.path()).unwrap();
    let pipeline = FetchPipeline::with_options(MockArchive::default(), options(8));

    let inputs: Vec<String> = (0..60)
        .map(|i| format!("http://archive.example/{}/http://site{}.example/", 2000 + i % 3, i % 20))
        .collect();
    let report = pipeline.run(&mut store, &inputs).unwrap();

    assert_eq!(report.requested, 60);
    assert_eq!(report.raw_fetches, 60);
    assert_eq!(store.memento_uris().len(), 60);
    assert!(report.failed.is_empty());
}
