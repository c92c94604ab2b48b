// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered classification rules.
//!
//! A [`PatternSet`] is the compiled form of the `pattern1..pattern20`
//! configuration keys. Index 0 is always the reserved "unmatched" bucket and
//! carries no regex; explicit patterns occupy indices 1..=N in configuration
//! order, which is also the match-check order.
//!
//! Matching uses `regex::bytes` so classification stays encoding-agnostic:
//! record values are compared as raw byte sequences, never re-encoded.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::core::error::{DataCountError, DataCountResult};

/// Highest pattern index accepted from configuration.
pub const PATTERN_MAX_NUM: usize = 20;

/// Name of the reserved index-0 bucket.
pub const UNMATCHED_NAME: &str = "unmatched";

// Matches any config key shaped like a pattern entry, in or out of range.
static PATTERN_KEY: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"^pattern(\d+)$").expect("pattern key regex"));

/// One classification rule.
///
/// `regex` is `None` only for the reserved index-0 bucket. `source` keeps the
/// uncompiled regex text for the persistence compatibility check.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub index: usize,
    pub name: String,
    pub regex: Option<regex::bytes::Regex>,
    pub source: Option<String>,
}

/// Structural identity of a pattern list: (index, name, regex source).
///
/// Two configurations count the same things iff their descriptors are equal.
pub type PatternDescriptor = Vec<(usize, String, Option<String>)>;

/// Immutable, validated, ordered pattern list.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    /// Build a pattern set from flat configuration properties.
    ///
    /// Each `pattern<i>` value is `"NAME REGEXP"`, split on the first
    /// whitespace.
    /// Fails with a configuration error when no explicit pattern is supplied,
    /// when indices are non-contiguous from 1, when names collide (including
    /// with "unmatched"), or when a regex does not compile. Keys shaped like
    /// `pattern<N>` with N outside 1..=20 are warned about and ignored.
    pub fn from_properties(properties: &HashMap<String, String>) -> DataCountResult<Self> {
        let out_of_range: Vec<&str> = properties
            .keys()
            .filter_map(|k| {
                let caps = PATTERN_KEY.captures(k)?;
                let n: usize = caps[1].parse().ok()?;
                if (1..=PATTERN_MAX_NUM).contains(&n) {
                    None
                } else {
                    Some(k.as_str())
                }
            })
            .collect();
        if !out_of_range.is_empty() {
            log::warn!(
                "invalid number patterns (valid pattern number:1-{}): {}",
                PATTERN_MAX_NUM,
                out_of_range.join(",")
            );
        }

        let mut patterns = vec![Pattern {
            index: 0,
            name: UNMATCHED_NAME.to_string(),
            regex: None,
            source: None,
        }];

        let supplied: Vec<usize> = (1..=PATTERN_MAX_NUM)
            .filter(|i| properties.contains_key(&format!("pattern{i}")))
            .collect();

        if supplied.is_empty() {
            return Err(DataCountError::configuration(
                "patterns must be defined more than one",
            ));
        }
        if *supplied.last().expect("non-empty") != supplied.len() {
            return Err(DataCountError::configuration(
                "jump of pattern index found",
            ));
        }

        for &i in &supplied {
            let key = format!("pattern{i}");
            let spec = &properties[&key];
            let (name, source) = spec.split_once(char::is_whitespace).ok_or_else(|| {
                DataCountError::configuration_with_key(
                    format!("pattern must be 'NAME REGEXP', got '{spec}'"),
                    key.clone(),
                )
            })?;
            let regex = regex::bytes::Regex::new(source).map_err(|e| {
                DataCountError::configuration_with_key(format!("invalid regexp: {e}"), key.clone())
            })?;
            patterns.push(Pattern {
                index: i,
                name: name.to_string(),
                regex: Some(regex),
                source: Some(source.to_string()),
            });
        }

        let mut names: Vec<&str> = patterns.iter().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != patterns.len() {
            return Err(DataCountError::configuration("duplicated pattern names"));
        }

        Ok(Self { patterns })
    }

    /// Number of buckets, the reserved "unmatched" bucket included.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        // Never true: index 0 is always present.
        self.patterns.is_empty()
    }

    /// Ordered patterns, index 0 first.
    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    /// Bucket name by index.
    pub fn name(&self, index: usize) -> Option<&str> {
        self.patterns.get(index).map(|p| p.name.as_str())
    }

    /// Structural identity used by the persistence compatibility check.
    pub fn descriptor(&self) -> PatternDescriptor {
        self.patterns
            .iter()
            .map(|p| (p.index, p.name.clone(), p.source.clone()))
            .collect()
    }
}
