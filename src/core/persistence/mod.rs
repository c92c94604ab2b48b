// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Durable Counter State
//!
//! Serializes counter snapshots through the opaque [`StateStore`] so a
//! counting stage survives process restarts without double-counting or
//! losing interval accounting.
//!
//! A stored snapshot is only ever applied when the persisting configuration
//! was structurally identical (aggregate mode, count key, full pattern list
//! with regex sources) AND the snapshot is fresh (`now <= saved_at + tick`).
//! Anything else - mismatch, staleness, decode failure, store error - is a
//! logged warning and counting starts from an empty table. Saving likewise
//! never fails the caller; in-memory state is untouched either way.

pub mod state_store;

pub use state_store::{FileStateStore, InMemoryStateStore, SqliteStateStore, StateStore};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::core::config::{Aggregate, DataCountConfig};
use crate::core::error::{DataCountError, DataCountResult};
use crate::core::pattern::{PatternDescriptor, PatternSet};

/// Storage key for the snapshot; the store handle is already instance-scoped.
pub const STATE_KEY: &str = "counter_state";

/// The persisted snapshot format. Owned by this core, opaque to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Counter table, running-sum slots included.
    pub counts: HashMap<String, Vec<u64>>,
    /// Unix seconds at save time.
    pub saved_at: i64,
    /// Seconds between the last flush and the save.
    pub saved_duration: f64,
    /// Aggregate mode as its configuration string.
    pub aggregate: String,
    pub count_key: String,
    /// Pattern list as (index, name, regex source).
    pub patterns: Vec<(usize, String, Option<String>)>,
}

/// Persist/restore protocol over a [`StateStore`].
pub struct PersistenceAdapter {
    store: Arc<dyn StateStore>,
    aggregate: Aggregate,
    count_key: String,
    descriptor: PatternDescriptor,
    /// Expected vector width (buckets + running-sum slot).
    slots: usize,
}

impl PersistenceAdapter {
    pub fn new(
        store: Arc<dyn StateStore>,
        config: &DataCountConfig,
        patterns: &PatternSet,
    ) -> Self {
        Self {
            store,
            aggregate: config.aggregate,
            count_key: config.count_key.clone(),
            descriptor: patterns.descriptor(),
            slots: patterns.len() + 1,
        }
    }

    /// Persist the given table with `saved_at` = now.
    pub fn save(&self, counts: HashMap<String, Vec<u64>>, saved_duration: f64) -> DataCountResult<()> {
        self.save_state(&PersistedState {
            counts,
            saved_at: Utc::now().timestamp(),
            saved_duration,
            aggregate: self.aggregate.as_str().to_string(),
            count_key: self.count_key.clone(),
            patterns: self.descriptor.clone(),
        })
    }

    /// Persist a fully specified snapshot.
    pub fn save_state(&self, state: &PersistedState) -> DataCountResult<()> {
        let bytes = bincode::serialize(state)
            .map_err(|e| DataCountError::persistence_with_source("encode failed", e))?;
        self.store
            .put(STATE_KEY, &bytes)
            .map_err(|e| DataCountError::persistence_with_source("store put failed", e))
    }

    /// Read a prior snapshot and return `(counts, saved_duration)` when it is
    /// structurally compatible with the current configuration and no older
    /// than one tick. Every rejection path logs a warning and yields `None`.
    pub fn load(&self, tick: u64) -> Option<(HashMap<String, Vec<u64>>, f64)> {
        let bytes = match self.store.get(STATE_KEY) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                log::debug!("no stored counter state, starting empty");
                return None;
            }
            Err(e) => {
                log::warn!("failed to read stored counter state, starting empty: {e}");
                return None;
            }
        };

        let state: PersistedState = match bincode::deserialize(&bytes) {
            Ok(state) => state,
            Err(e) => {
                log::warn!("stored counter state is unreadable, starting empty: {e}");
                return None;
            }
        };

        if state.aggregate != self.aggregate.as_str()
            || state.count_key != self.count_key
            || state.patterns != self.descriptor
        {
            log::warn!("stored counter state does not match current configuration, starting empty");
            return None;
        }
        if state.counts.values().any(|v| v.len() != self.slots) {
            log::warn!("stored counter state has malformed vectors, starting empty");
            return None;
        }

        let now = Utc::now().timestamp();
        if now > state.saved_at + tick as i64 {
            log::warn!(
                "stored counter state is stale (saved_at={}, tick={}s), starting empty",
                state.saved_at,
                tick
            );
            return None;
        }

        Some((state.counts, state.saved_duration))
    }
}
