// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure batch classification.
//!
//! Maps one inbound batch to an increment vector without touching any shared
//! state, so it runs fully concurrently with counting and flushing.

use std::borrow::Cow;

use serde_json::Value;

use crate::core::event::TimedRecord;
use crate::core::pattern::PatternSet;

/// Classify a batch into an increment vector of length `patterns.len()`.
///
/// Per record: the value under `count_key` is coerced to raw bytes and
/// tested against the patterns in ascending index order; the first match
/// wins. A record without the key (or with a JSON null) is skipped entirely
/// and contributes to no bucket, the unmatched one included. Values matching
/// no pattern fall into slot 0.
pub fn classify(batch: &[TimedRecord], count_key: &str, patterns: &PatternSet) -> Vec<u64> {
    let mut increments = vec![0u64; patterns.len()];
    for (_time, record) in batch {
        let Some(value) = record.get(count_key) else {
            continue;
        };
        let Some(bytes) = value_bytes(value) else {
            continue;
        };
        let mut matched = false;
        for pattern in patterns.iter() {
            let Some(regex) = &pattern.regex else {
                continue;
            };
            if regex.is_match(&bytes) {
                increments[pattern.index] += 1;
                matched = true;
                break;
            }
        }
        if !matched {
            increments[0] += 1;
        }
    }
    increments
}

// Opaque byte view of a value: strings as their raw bytes, everything else
// through its JSON text. No text-encoding-aware transformation happens, so
// regex matching stays encoding-agnostic.
fn value_bytes(value: &Value) -> Option<Cow<'_, [u8]>> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(Cow::Borrowed(s.as_bytes())),
        other => Some(Cow::Owned(other.to_string().into_bytes())),
    }
}
