//! TimeMap parsing and raw-content simhash benchmarks.
//!
//! # Benchmarks
//!
//! - `link_format`: lenient and strict parsing of generated link-format TimeMaps
//! - `json_tree`: parsing the equivalent JSON tree
//! - `raw_simhash`: simhash over a page-sized document
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench timemap_parse
//! ```

use std::hint::black_box;

use chrono::{Duration, NaiveDate};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use offtopic_core::measure::{raw_features, simhash};
use offtopic_core::{parse_link_timemap, parse_timemap_text};

const LINK_DATETIME: &str = "%a, %d %b %Y %H:%M:%S GMT";

fn link_timemap(mementos: usize) -> String {
    let start = NaiveDate::from_ymd_opt(2005, 1, 1)
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .unwrap();
    let mut text = String::from(
        "<http://example.org/>; rel=\"original\",\n\
         <http://archive.example/timemap/link/http://example.org/>; rel=\"self\"; type=\"application/link-format\",\n\
         <http://archive.example/timegate/http://example.org/>; rel=\"timegate\"",
    );
    for i in 0..mementos {
        let datetime = start + Duration::days(i as i64);
        let rel = match i {
            0 => "first memento",
            _ if i + 1 == mementos => "last memento",
            _ => "memento",
        };
        text.push_str(&format!(
            ",\n<http://archive.example/{}/http://example.org/>; rel=\"{rel}\"; datetime=\"{}\"",
            datetime.format("%Y%m%d%H%M%S"),
            datetime.format(LINK_DATETIME)
        ));
    }
    text
}

fn bench_link_format(c: &mut Criterion) {
    let mut group = c.benchmark_group("link_format");
    for size in [10usize, 1_000, 10_000] {
        let text = link_timemap(size);
        group.bench_with_input(BenchmarkId::new("lenient", size), &text, |b, text| {
            b.iter(|| parse_link_timemap(black_box(text), false).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("strict", size), &text, |b, text| {
            b.iter(|| parse_link_timemap(black_box(text), true).unwrap());
        });
    }
    group.finish();
}

fn bench_json_tree(c: &mut Criterion) {
    let timemap = parse_link_timemap(&link_timemap(1_000), true).unwrap();
    let json = serde_json::to_string(&timemap).unwrap();
    c.bench_function("json_tree_1000", |b| {
        b.iter(|| parse_timemap_text(black_box(&json), true).unwrap());
    });
}

fn bench_raw_simhash(c: &mut Criterion) {
    let page = "<p>The river restoration plan protects wetlands and town flood defences.</p>\n"
        .repeat(400);
    c.bench_function("raw_simhash_page", |b| {
        b.iter(|| simhash(raw_features(black_box(&page))));
    });
}

criterion_group!(benches, bench_link_format, bench_json_tree, bench_raw_simhash);
criterion_main!(benches);
