// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Summary Record Generation
//!
//! Derives the named count/rate/percentage fields from a counter snapshot.
//! Two shapes share one primitive:
//!
//! - **merged** - one record per flush; per-tag field groups prefixed with
//!   the stripped tag plus `"_"` (empty prefix in global-aggregate mode)
//! - **per-tag** - one full record per captured tag with unprefixed fields,
//!   destined for a derived per-tag output tag
//!
//! Rates truncate toward zero at two decimals and are always present;
//! percentages are emitted only when the interval total is nonzero, so the
//! field set varies across flushes and consumers must tolerate that.

pub mod sink;

use std::sync::Arc;

use serde_json::Value;

use crate::core::config::{Aggregate, AGGREGATE_ALL_KEY};
use crate::core::counter::Snapshot;
use crate::core::event::Record;
use crate::core::pattern::PatternSet;

/// Derives emission records from counter snapshots.
#[derive(Debug, Clone)]
pub struct OutputGenerator {
    patterns: Arc<PatternSet>,
    outcast_unmatched: bool,
    output_messages: bool,
    input_tag_remove_prefix: Option<String>,
}

impl OutputGenerator {
    pub fn new(
        patterns: Arc<PatternSet>,
        outcast_unmatched: bool,
        output_messages: bool,
        input_tag_remove_prefix: Option<String>,
    ) -> Self {
        Self {
            patterns,
            outcast_unmatched,
            output_messages,
            input_tag_remove_prefix,
        }
    }

    /// Remove the configured prefix plus `"."` exactly once from the start
    /// of a tag. A tag equal to the bare prefix strips to empty; anything
    /// else comes back unchanged.
    pub fn strip_tag<'a>(&self, tag: &'a str) -> &'a str {
        let Some(prefix) = &self.input_tag_remove_prefix else {
            return tag;
        };
        match tag.strip_prefix(prefix.as_str()) {
            Some("") => "",
            Some(rest) => match rest.strip_prefix('.') {
                Some(stripped) if !stripped.is_empty() => stripped,
                _ => tag,
            },
            None => tag,
        }
    }

    /// Append `{prefix}{name}_count/_rate/_percentage` fields for one
    /// counter vector (running-sum slot included) measured over `step`
    /// seconds, plus `{prefix}messages` when configured.
    pub fn append_fields(&self, out: &mut Record, prefix: &str, counts: &[u64], step: f64) {
        let sum_slot = counts.len() - 1;
        debug_assert_eq!(self.patterns.len(), sum_slot);
        debug_assert_eq!(counts[sum_slot], counts[..sum_slot].iter().sum::<u64>());

        let total = if self.outcast_unmatched {
            counts[sum_slot] - counts[0]
        } else {
            counts[sum_slot]
        };

        for pattern in self.patterns.iter() {
            let count = counts[pattern.index];
            let name = &pattern.name;
            out.insert(format!("{prefix}{name}_count"), Value::from(count));
            let rate = if step > 0.0 {
                ((count as f64 * 100.0) / step).floor() / 100.0
            } else {
                0.0
            };
            out.insert(format!("{prefix}{name}_rate"), Value::from(rate));
            if total > 0 && !(pattern.index == 0 && self.outcast_unmatched) {
                out.insert(
                    format!("{prefix}{name}_percentage"),
                    Value::from(count as f64 * 100.0 / total as f64),
                );
            }
        }

        if self.output_messages {
            out.insert(format!("{prefix}messages"), Value::from(total));
        }
    }

    /// Merged shape: one record covering every captured tag. Empty when the
    /// snapshot is empty - callers skip emission then.
    pub fn merged_record(&self, snapshot: &Snapshot, aggregate: Aggregate) -> Record {
        let mut out = Record::new();
        match aggregate {
            Aggregate::All => {
                if let Some(counts) = snapshot.counts.get(AGGREGATE_ALL_KEY) {
                    self.append_fields(&mut out, "", counts, snapshot.elapsed_secs);
                }
            }
            Aggregate::Tag => {
                let mut tags: Vec<&String> = snapshot.counts.keys().collect();
                tags.sort();
                for tag in tags {
                    let prefix = format!("{}_", self.strip_tag(tag));
                    self.append_fields(
                        &mut out,
                        &prefix,
                        &snapshot.counts[tag],
                        snapshot.elapsed_secs,
                    );
                }
            }
        }
        out
    }

    /// Per-tag shape: `(stripped tag, record)` per captured key, all-zero
    /// vectors included.
    pub fn per_tag_records(&self, snapshot: &Snapshot) -> Vec<(String, Record)> {
        let mut tags: Vec<&String> = snapshot.counts.keys().collect();
        tags.sort();
        tags.into_iter()
            .map(|tag| {
                let mut out = Record::new();
                self.append_fields(&mut out, "", &snapshot.counts[tag], snapshot.elapsed_secs);
                (self.strip_tag(tag).to_string(), out)
            })
            .collect()
    }
}
