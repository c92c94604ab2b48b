// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Counter Configuration
//!
//! Typed configuration for a counting stage, parsed once at startup from a
//! flat string property map (the shape the host's configuration layer hands
//! over). All validation happens here; after construction the configuration
//! is immutable.
//!
//! ## Recognized properties
//!
//! - `count_interval` - flush interval in seconds; overrides `unit`
//! - `unit` - `minute` (60s, default) / `hour` (3600s) / `day` (86400s)
//! - `aggregate` - `tag` (default) or `all`
//! - `tag` - output tag for merged-mode emission (default `datacount`)
//! - `output_per_tag` - emit one record per input tag (requires `tag_prefix`)
//! - `tag_prefix` - prefix for per-tag output tags
//! - `input_tag_remove_prefix` - prefix stripped from inbound tags
//! - `count_key` - record field to classify (required)
//! - `outcast_unmatched` - exclude the unmatched bucket from totals
//! - `output_messages` - add a `messages` total field to the output
//! - `store_counts` - persist the counter table across restarts
//!
//! `pattern1..pattern20` are parsed separately by
//! [`PatternSet::from_properties`](crate::core::pattern::PatternSet).

use std::collections::HashMap;

use crate::core::error::{DataCountError, DataCountResult};

/// Aggregation mode: keep one counter vector per tag, or one global vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Tag,
    All,
}

impl Aggregate {
    pub fn from_str(s: &str) -> DataCountResult<Self> {
        match s {
            "tag" => Ok(Aggregate::Tag),
            "all" => Ok(Aggregate::All),
            _ => Err(DataCountError::configuration_with_key(
                format!("aggregate allows tag/all, got '{s}'"),
                "aggregate",
            )),
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Aggregate::Tag => "tag",
            Aggregate::All => "all",
        }
    }
}

/// Key under which global-aggregate counts are kept.
pub const AGGREGATE_ALL_KEY: &str = "all";

/// Validated counting-stage configuration.
#[derive(Debug, Clone)]
pub struct DataCountConfig {
    /// Flush interval in seconds.
    pub tick: u64,
    pub aggregate: Aggregate,
    /// Output tag for merged-mode emission.
    pub tag: String,
    pub output_per_tag: bool,
    /// Present iff `output_per_tag` is set.
    pub tag_prefix: Option<String>,
    pub input_tag_remove_prefix: Option<String>,
    /// Record field whose value is classified.
    pub count_key: String,
    pub outcast_unmatched: bool,
    pub output_messages: bool,
    /// Persist the counter table across restarts.
    pub store_counts: bool,
}

impl DataCountConfig {
    /// Parse and validate configuration from flat properties.
    pub fn from_properties(properties: &HashMap<String, String>) -> DataCountResult<Self> {
        let tick = match properties.get("count_interval") {
            Some(v) => {
                let secs = v.parse::<u64>().map_err(|e| {
                    DataCountError::configuration_with_key(
                        format!("invalid count_interval value: {e}"),
                        "count_interval",
                    )
                })?;
                if secs == 0 {
                    return Err(DataCountError::configuration_with_key(
                        "count_interval must be positive",
                        "count_interval",
                    ));
                }
                secs
            }
            None => match properties.get("unit").map(String::as_str).unwrap_or("minute") {
                "minute" => 60,
                "hour" => 3600,
                "day" => 86400,
                other => {
                    return Err(DataCountError::configuration_with_key(
                        format!("unit must be one of minute/hour/day, got '{other}'"),
                        "unit",
                    ))
                }
            },
        };

        let aggregate = match properties.get("aggregate") {
            Some(v) => Aggregate::from_str(v)?,
            None => Aggregate::Tag,
        };

        let count_key = properties
            .get("count_key")
            .cloned()
            .ok_or_else(|| DataCountError::configuration("count_key is required"))?;

        let output_per_tag = parse_bool(properties, "output_per_tag")?.unwrap_or(false);
        let tag_prefix = properties.get("tag_prefix").cloned();
        if output_per_tag && tag_prefix.is_none() {
            return Err(DataCountError::configuration_with_key(
                "tag_prefix is required with output_per_tag",
                "tag_prefix",
            ));
        }

        Ok(Self {
            tick,
            aggregate,
            tag: properties
                .get("tag")
                .cloned()
                .unwrap_or_else(|| "datacount".to_string()),
            output_per_tag,
            tag_prefix,
            input_tag_remove_prefix: properties.get("input_tag_remove_prefix").cloned(),
            count_key,
            outcast_unmatched: parse_bool(properties, "outcast_unmatched")?.unwrap_or(false),
            output_messages: parse_bool(properties, "output_messages")?.unwrap_or(false),
            store_counts: parse_bool(properties, "store_counts")?.unwrap_or(false),
        })
    }
}

fn parse_bool(properties: &HashMap<String, String>, key: &str) -> DataCountResult<Option<bool>> {
    match properties.get(key).map(String::as_str) {
        None => Ok(None),
        Some("true") | Some("yes") | Some("1") => Ok(Some(true)),
        Some("false") | Some("no") | Some("0") => Ok(Some(false)),
        Some(other) => Err(DataCountError::configuration_with_key(
            format!("invalid boolean value '{other}'"),
            key,
        )),
    }
}
