//! Integration tests for content store durability.
//! A store must come back from disk with the same TimeMaps, mementos and
//! error records it was closed with.

use chrono::NaiveDate;
use tempfile::TempDir;

use offtopic_core::{
    ContentStore, Headers, MementoRef, OffTopicError, StoreOptions, TimeMap, constants, uri_digest,
};

const LINK_TIMEMAP: &str = r#"<http://a.example.org/>;rel="original",
<http://arxiv.example.net/timemap/link/http://a.example.org/>; rel="self"; type="application/link-format",
<http://arxiv.example.net/timegate/http://a.example.org/>; rel="timegate",
<http://arxiv.example.net/20000620180259/http://a.example.org/>; rel="first memento"; datetime="Tue, 20 Jun 2000 18:02:59 GMT",
<http://arxiv.example.net/20030611163000/http://a.example.org/>; rel="memento"; datetime="Wed, 11 Jun 2003 16:30:00 GMT",
<http://arxiv.example.net/20051227012240/http://a.example.org/>; rel="last memento"; datetime="Tue, 27 Dec 2005 01:22:40 GMT""#;

const URIT: &str = "http://arxiv.example.net/timemap/link/http://a.example.org/";
const URIM: &str = "http://arxiv.example.net/20030611163000/http://a.example.org/";

fn headers(pairs: &[(&str, &str)]) -> Headers {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn capture(uri: &str, y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> MementoRef {
    let datetime = NaiveDate::from_ymd_opt(y, mo, d)
        .and_then(|day| day.and_hms_opt(h, mi, s))
        .unwrap();
    MementoRef::new(uri, datetime)
}

#[test]
fn error_and_content_flip_and_survive_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let mut store = ContentStore::open(dir.path()).unwrap();
        store
            .add_memento_error(URIM, b"", &Headers::new(), b"connection-error: refused")
            .unwrap();
        assert!(matches!(
            store.memento_content(URIM),
            Err(OffTopicError::MementoError { .. })
        ));

        store
            .add_memento(URIM, b"<p>restored</p>", &headers(&[("http-status", "200")]))
            .unwrap();
        assert_eq!(store.memento_content(URIM).unwrap(), b"<p>restored</p>");
        assert!(!store.has_memento_error(URIM));

        store
            .add_memento_error(URIM, b"", &Headers::new(), b"too-many-redirects: loop")
            .unwrap();
    }

    let store = ContentStore::open(dir.path()).unwrap();
    assert!(matches!(
        store.memento_content(URIM),
        Err(OffTopicError::MementoError { .. })
    ));
    assert_eq!(
        store.memento_error_information(URIM).unwrap().as_deref(),
        Some(&b"too-many-redirects: loop"[..])
    );
    assert!(store.memento_uris().is_empty());
    assert_eq!(store.memento_error_uris(), vec![URIM.to_string()]);
}

#[test]
fn content_after_error_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = ContentStore::open(dir.path()).unwrap();
        store
            .add_memento_error(URIM, b"", &Headers::new(), b"connection-error: refused")
            .unwrap();
        store.add_memento(URIM, b"second try", &Headers::new()).unwrap();
    }

    let store = ContentStore::open(dir.path()).unwrap();
    assert_eq!(store.memento_content(URIM).unwrap(), b"second try");
    assert_eq!(store.memento_error_information(URIM).unwrap(), None);
    assert!(store.memento_error_uris().is_empty());
}

#[test]
fn link_format_and_structured_timemaps_agree() {
    let dir = TempDir::new().unwrap();
    let mut store = ContentStore::open(dir.path()).unwrap();

    let mut structured = TimeMap::from_entries(
        "http://a.example.org/",
        vec![
            capture("http://arxiv.example.net/20000620180259/http://a.example.org/", 2000, 6, 20, 18, 2, 59),
            capture(URIM, 2003, 6, 11, 16, 30, 0),
            capture("http://arxiv.example.net/20051227012240/http://a.example.org/", 2005, 12, 27, 1, 22, 40),
        ],
    );
    structured.timegate_uri = Some("http://arxiv.example.net/timegate/http://a.example.org/".into());
    structured.timemap_uri.link_format = Some(URIT.into());

    store.add_timemap(URIT, LINK_TIMEMAP, &Headers::new()).unwrap();
    store.add_timemap("structured", structured.clone(), &Headers::new()).unwrap();

    let parsed = store.timemap(URIT).unwrap();
    assert_eq!(parsed, structured);
    assert_eq!(store.timemap("structured").unwrap(), structured);
    assert!(parsed.bounds_hold());
    assert_eq!(
        parsed.baseline().map(|m| m.uri.as_str()),
        Some("http://arxiv.example.net/20000620180259/http://a.example.org/")
    );
}

#[test]
fn repeated_adds_reuse_one_digest() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = ContentStore::open(dir.path()).unwrap();
        store.add_memento(URIM, b"one", &Headers::new()).unwrap();
        store.add_memento(URIM, b"two", &Headers::new()).unwrap();
        assert_eq!(store.memento_uris(), vec![URIM.to_string()]);
    }

    let store = ContentStore::open(dir.path()).unwrap();
    assert_eq!(store.memento_uris(), vec![URIM.to_string()]);
    assert_eq!(store.memento_content(URIM).unwrap(), b"two");

    let digest = uri_digest(URIM);
    let original = dir
        .path()
        .join(constants::MEMENTOS_DIR)
        .join(format!("{digest}{}", constants::ORIGINAL_SUFFIX));
    assert_eq!(std::fs::read(original).unwrap(), b"two");
}

#[test]
fn timemaps_and_headers_survive_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = ContentStore::open(dir.path()).unwrap();
        store
            .add_timemap(URIT, LINK_TIMEMAP, &headers(&[("http-status", "200")]))
            .unwrap();
        store
            .add_memento(URIM, b"page", &headers(&[("content-language", "en")]))
            .unwrap();
    }

    let store = ContentStore::open(dir.path()).unwrap();
    assert_eq!(store.timemap_uris(), vec![URIT.to_string()]);
    assert_eq!(store.timemap(URIT).unwrap().mementos.list.len(), 3);
    assert_eq!(
        store.timemap_headers(URIT).unwrap().get("http-status").map(String::as_str),
        Some("200")
    );
    assert_eq!(
        store.memento_headers(URIM).unwrap().get("content-language").map(String::as_str),
        Some("en")
    );
    assert!(matches!(
        store.timemap("http://missing.example/"),
        Err(OffTopicError::NoSuchTimeMap { .. })
    ));
}

#[test]
fn strict_store_rejects_malformed_manifest() {
    let dir = TempDir::new().unwrap();
    let mut store = ContentStore::open_with_options(dir.path(), StoreOptions::strict()).unwrap();

    let err = store
        .add_timemap(URIT, "http://a.example.org/; rel=original", &Headers::new())
        .unwrap_err();
    assert!(matches!(err, OffTopicError::MalformedManifest { .. }));
    assert!(store.timemap_uris().is_empty());
}
