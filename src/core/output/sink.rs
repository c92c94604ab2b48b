// SPDX-License-Identifier: MIT OR Apache-2.0

//! Emission boundary.
//!
//! The host's record transport sits behind [`Sink`]; the runtime never
//! knows where summary records go. [`LogSink`] is the debugging default,
//! [`CollectingSink`] captures emissions for tests.

use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use crate::core::error::DataCountResult;
use crate::core::event::Record;

/// One captured emission: (tag, timestamp, record).
pub type Emission = (String, i64, Record);

pub trait Sink: Debug + Send + Sync {
    /// Deliver one summary record. Called once per flush (merged shape) or
    /// once per active tag (per-tag shape). Failures are logged by the
    /// caller and never stop the flush cycle.
    fn emit(&self, tag: &str, timestamp: i64, record: &Record) -> DataCountResult<()>;
}

/// Sink that logs records as JSON. Development and debugging.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

impl Sink for LogSink {
    fn emit(&self, tag: &str, timestamp: i64, record: &Record) -> DataCountResult<()> {
        log::info!(
            "{} {} {}",
            tag,
            timestamp,
            serde_json::Value::Object(record.clone())
        );
        Ok(())
    }
}

/// Sink that accumulates every emission in memory for inspection.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    pub emitted: Arc<Mutex<Vec<Emission>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything emitted so far.
    pub fn emissions(&self) -> Vec<Emission> {
        self.emitted.lock().unwrap().clone()
    }
}

impl Sink for CollectingSink {
    fn emit(&self, tag: &str, timestamp: i64, record: &Record) -> DataCountResult<()> {
        self.emitted
            .lock()
            .unwrap()
            .push((tag.to_string(), timestamp, record.clone()));
        Ok(())
    }
}
