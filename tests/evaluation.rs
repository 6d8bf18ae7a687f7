//! End-to-end scoring over a stored collection.

use chrono::NaiveDate;
use tempfile::TempDir;

use offtopic_core::{
    BoilerplateError, BoilerplateRemover, CellKey, ContentStore, Headers, MeasurementLedger,
    MementoRef, ThresholdOverride, TimeMap, TopicStatus, compute_score_across_timemaps, constants,
    evaluate, metric,
};

const FAMILY: &str = constants::FAMILY_TIMEMAP_MEASURES;

const RIVER: &str = "The river restoration plan protects wetlands and strengthens town flood \
    defences before the spring rains arrive.";
const RIVER_UPDATE: &str = "The river restoration plan protects wetlands and strengthens town flood \
    defences before the spring rains arrive. Volunteers planted willows along the river banks.";
const PARKED: &str = "This domain is for sale.";

/// Keeps markup as-is so scores depend only on the test content.
struct KeepEverything;

impl BoilerplateRemover for KeepEverything {
    fn name(&self) -> &'static str {
        "keep-everything"
    }

    fn remove(&self, markup: &[u8]) -> Result<Vec<u8>, BoilerplateError> {
        Ok(markup.to_vec())
    }
}

fn timemap(original: &str, uris: &[&str]) -> TimeMap {
    let entries = uris
        .iter()
        .enumerate()
        .map(|(i, uri)| {
            let datetime = NaiveDate::from_ymd_opt(2012, 1, 1 + i as u32)
                .and_then(|day| day.and_hms_opt(0, 0, 0))
                .unwrap();
            MementoRef::new(*uri, datetime)
        })
        .collect();
    TimeMap::from_entries(original, entries)
}

fn store_with(dir: &TempDir, collections: &[(&str, &[(&str, &str)])]) -> ContentStore {
    let mut store = ContentStore::open(dir.path())
        .unwrap()
        .with_remover(KeepEverything);
    for (urit, members) in collections {
        let uris: Vec<&str> = members.iter().map(|(uri, _)| *uri).collect();
        store
            .add_timemap(urit, timemap(&format!("http://{urit}.example/"), &uris), &Headers::new())
            .unwrap();
        for (uri, content) in *members {
            store.add_memento(uri, content.as_bytes(), &Headers::new()).unwrap();
        }
    }
    store
}

#[test]
fn empty_baseline_poisons_only_its_timemap() {
    let dir = TempDir::new().unwrap();
    let store = store_with(
        &dir,
        &[
            ("blank", &[("blank-1", ""), ("blank-2", RIVER), ("blank-3", PARKED)]),
            ("river", &[("river-1", RIVER), ("river-2", PARKED)]),
        ],
    );

    let mut ledger = MeasurementLedger::new();
    compute_score_across_timemaps(&store, &mut ledger, &metric("bytecount").unwrap()).unwrap();

    let expected = "After processing content, the first memento in TimeMap is now empty, \
        cannot effectively compare memento content";
    for urim in ["blank-1", "blank-2", "blank-3"] {
        let key = CellKey::new("blank", urim, FAMILY, "bytecount");
        assert_eq!(ledger.measurement_error(&key).unwrap(), Some(expected));
        assert_eq!(ledger.score(&key).unwrap(), None);
    }

    let sibling = CellKey::new("river", "river-2", FAMILY, "bytecount");
    assert!(ledger.score(&sibling).unwrap().is_some());
    assert_eq!(ledger.measurement_error(&sibling).unwrap(), None);
}

#[test]
fn evaluation_flags_the_parked_page() {
    let dir = TempDir::new().unwrap();
    let store = store_with(
        &dir,
        &[(
            "river",
            &[("river-1", RIVER), ("river-2", RIVER_UPDATE), ("river-3", PARKED)],
        )],
    );
    let metrics = [metric("bytecount").unwrap(), metric("jaccard").unwrap()];

    let mut ledger = MeasurementLedger::new();
    evaluate(&store, &mut ledger, &metrics, &[]).unwrap();

    assert_eq!(ledger.overall_status("river", "river-1").unwrap(), Some(TopicStatus::OnTopic));
    assert_eq!(ledger.overall_status("river", "river-2").unwrap(), Some(TopicStatus::OnTopic));
    assert_eq!(ledger.overall_status("river", "river-3").unwrap(), Some(TopicStatus::OffTopic));

    let jaccard = CellKey::new("river", "river-3", FAMILY, "jaccard");
    assert_eq!(ledger.tokenized(&jaccard).unwrap(), Some(true));
    assert_eq!(ledger.removed_boilerplate(&jaccard).unwrap(), Some(true));
    assert_eq!(ledger.topic_status(&jaccard).unwrap(), Some(TopicStatus::OffTopic));

    let tree = ledger.render_tree();
    assert_eq!(tree["river"]["river-3"]["overall topic status"], "off-topic");
    assert_eq!(tree["river"]["river-1"]["content length"], RIVER.len());
    assert_eq!(tree["river"]["river-1"]["memento-datetime"], "2012/01/01 00:00:00 GMT");
}

#[test]
fn overrides_move_the_verdict() {
    let dir = TempDir::new().unwrap();
    let store = store_with(
        &dir,
        &[("river", &[("river-1", RIVER), ("river-2", RIVER_UPDATE)])],
    );
    let metrics = [metric("bytecount").unwrap()];
    // relative growth below 2.0 now counts as off-topic
    let overrides = [ThresholdOverride {
        name: "bytecount".into(),
        threshold: 2.0,
    }];

    let mut ledger = MeasurementLedger::new();
    evaluate(&store, &mut ledger, &metrics, &overrides).unwrap();

    let key = CellKey::new("river", "river-2", FAMILY, "bytecount");
    assert_eq!(ledger.topic_status(&key).unwrap(), Some(TopicStatus::OffTopic));
}

#[test]
fn acquisition_errors_surface_as_access_errors() {
    let dir = TempDir::new().unwrap();
    let mut store = store_with(
        &dir,
        &[("river", &[("river-1", RIVER), ("river-2", RIVER_UPDATE)])],
    );
    store
        .add_memento_error("river-2", b"", &Headers::new(), b"connection-error: reset")
        .unwrap();

    let mut ledger = MeasurementLedger::new();
    evaluate(&store, &mut ledger, &[metric("wordcount").unwrap()], &[]).unwrap();

    assert_eq!(
        ledger.memento_access_error("river", "river-2").unwrap(),
        Some("connection-error: reset")
    );
    assert_eq!(ledger.overall_status("river", "river-2").unwrap(), None);
    assert_eq!(ledger.render_tree()["river"]["river-2"]["access error"], "connection-error: reset");
}
