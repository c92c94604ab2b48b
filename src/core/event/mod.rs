// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event payload types shared by the counting pipeline.
//!
//! Inbound records are flat JSON objects; the host transport hands them to
//! `DataCountRuntime::process` in timestamped batches. `serde_json` is built
//! with `preserve_order`, so a [`Record`] keeps its field insertion order -
//! emitted summary records rely on this for a stable wire layout.

use serde_json::Value;

/// A single event record: field name → JSON value.
pub type Record = serde_json::Map<String, Value>;

/// One timestamped record inside a batch (unix seconds, record).
pub type TimedRecord = (i64, Record);

/// An ordered batch of timestamped records as delivered by the host.
pub type EventBatch = Vec<TimedRecord>;

/// Build a [`Record`] from string key/value pairs. Test and demo helper.
pub fn record_from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Record {
    let mut record = Record::new();
    for (k, v) in pairs {
        record.insert(k.to_string(), Value::String(v.to_string()));
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_preserves_insertion_order() {
        let record = record_from_pairs([("b", "1"), ("a", "2"), ("c", "3")]);
        let keys: Vec<&String> = record.keys().collect();
        assert_eq!(keys, ["b", "a", "c"]);
    }
}
