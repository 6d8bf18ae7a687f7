//! Nested JSON view of a ledger for output writers.

use serde_json::{Map, Value, json};

use super::{MeasurementLedger, MementoEntry, MetricCell};

const MEMENTO_DATETIME_OUTPUT_FORMAT: &str = "%Y/%m/%d %H:%M:%S GMT";

impl MeasurementLedger {
    /// Renders `{urit: {urim: {family: {name: cell}}}}`.
    ///
    /// A TimeMap or memento with an access error renders only
    /// `{"access error": message}`. A cell with a measurement error renders
    /// only `{"measurement error": message}`.
    #[must_use]
    pub fn render_tree(&self) -> Value {
        let mut root = Map::new();
        for (urit, timemap) in &self.timemaps {
            let mut timemap_node = Map::new();
            if let Some(message) = &timemap.access_error {
                timemap_node.insert("access error".into(), Value::String(message.clone()));
            } else {
                for (urim, memento) in &timemap.mementos {
                    timemap_node.insert(urim.clone(), self.render_memento(memento));
                }
            }
            root.insert(urit.clone(), Value::Object(timemap_node));
        }
        Value::Object(root)
    }

    fn render_memento(&self, memento: &MementoEntry) -> Value {
        if let Some(message) = &memento.access_error {
            return json!({ "access error": message });
        }
        let mut node = Map::new();
        let annotations = &memento.annotations;
        if let Some(simhash) = annotations.raw_simhash {
            node.insert("raw memento simhash value".into(), json!(simhash));
        }
        if let Some(length) = annotations.content_length {
            node.insert("content length".into(), json!(length));
        }
        if let Some(language) = &annotations.language {
            node.insert("language".into(), json!(language));
        }
        if let Some(datetime) = annotations.memento_datetime {
            node.insert(
                "memento-datetime".into(),
                json!(datetime.format(MEMENTO_DATETIME_OUTPUT_FORMAT).to_string()),
            );
        }

        for (family, name) in &self.metrics {
            let Some(cell) = memento.families.get(family).and_then(|cells| cells.get(name)) else {
                continue;
            };
            let family_node = node
                .entry(family.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(family_map) = family_node {
                family_map.insert(name.clone(), render_cell(cell));
            }
        }
        node.insert(
            "overall topic status".into(),
            memento.overall.map_or(Value::Null, |status| json!(status.as_str())),
        );
        Value::Object(node)
    }
}

fn render_cell(cell: &MetricCell) -> Value {
    if let Some(message) = cell.outcome.measurement_error() {
        return json!({ "measurement error": message });
    }
    json!({
        "stemmed": cell.flags.stemmed,
        "tokenized": cell.flags.tokenized,
        "removed boilerplate": cell.flags.removed_boilerplate,
        "comparison score": cell.outcome.score(),
        "topic status": cell.status.map(|status| status.as_str()),
    })
}
