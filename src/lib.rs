// SPDX-License-Identifier: MIT OR Apache-2.0

//! # DataCount
//!
//! A streaming event counter/aggregator for log/event pipelines: batches of
//! records flow in, each record is classified by matching one field against
//! an ordered list of named regex patterns, counts accumulate per tag (or
//! globally), and a watcher thread emits a summary record of counts, rates,
//! and percentages once per configured wall-clock interval. Counter state
//! can optionally survive restarts through an opaque key-value store.
//!
//! ## Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use datacount_rust::core::output::sink::CollectingSink;
//! use datacount_rust::core::runtime::DataCountRuntime;
//!
//! let properties: HashMap<String, String> = [
//!     ("count_key", "status"),
//!     ("pattern1", r"ok ^2\d\d$"),
//!     ("pattern2", r"error ^5\d\d$"),
//! ]
//! .into_iter()
//! .map(|(k, v)| (k.to_string(), v.to_string()))
//! .collect();
//!
//! let sink = CollectingSink::new();
//! let mut runtime = DataCountRuntime::from_properties(&properties, Box::new(sink)).unwrap();
//! runtime.start().unwrap();
//! // host delivers batches via runtime.process(tag, &batch) ...
//! runtime.shutdown();
//! ```

pub mod core;

pub use crate::core::config::{Aggregate, DataCountConfig};
pub use crate::core::error::{DataCountError, DataCountResult};
pub use crate::core::output::sink::{CollectingSink, LogSink, Sink};
pub use crate::core::pattern::PatternSet;
pub use crate::core::persistence::{
    FileStateStore, InMemoryStateStore, PersistedState, PersistenceAdapter, SqliteStateStore,
    StateStore,
};
pub use crate::core::runtime::DataCountRuntime;
