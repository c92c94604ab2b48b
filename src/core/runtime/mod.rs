// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Counting Stage Runtime
//!
//! [`DataCountRuntime`] is the explicit instance a pipeline stage owns: the
//! validated configuration, the compiled [`PatternSet`], the
//! [`CounterState`], the emission [`Sink`], and (optionally) the durable
//! state adapter, with explicit `start`/`shutdown` lifecycle entry points.
//!
//! The flush watcher is a plain background thread with a stop flag: it wakes
//! every 500 ms, and once the measured elapsed time reaches one tick it runs
//! a flush-and-emit cycle. The measured elapsed seconds - not the nominal
//! tick - feed the rate math, so scheduling drift propagates correctly.
//! Emission failures are logged and never stop the watcher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;

use crate::core::config::DataCountConfig;
use crate::core::counter::classifier::classify;
use crate::core::counter::CounterState;
use crate::core::error::{DataCountError, DataCountResult};
use crate::core::event::TimedRecord;
use crate::core::output::sink::Sink;
use crate::core::output::OutputGenerator;
use crate::core::pattern::PatternSet;
use crate::core::persistence::{PersistenceAdapter, StateStore};

const WATCH_PERIOD: Duration = Duration::from_millis(500);

struct RuntimeInner {
    config: DataCountConfig,
    patterns: Arc<PatternSet>,
    state: CounterState,
    output: OutputGenerator,
    sink: Box<dyn Sink>,
    persistence: Option<PersistenceAdapter>,
}

impl RuntimeInner {
    /// One flush-and-emit cycle: atomic table swap, field derivation, then
    /// emission through the sink. No lock is held during emission.
    fn flush_emit(&self) {
        let snapshot = self.state.flush();
        let now = Utc::now().timestamp();
        if self.config.output_per_tag {
            let prefix = self.config.tag_prefix.as_deref().unwrap_or("");
            for (stripped, record) in self.output.per_tag_records(&snapshot) {
                let tag = format!("{prefix}.{stripped}");
                if let Err(e) = self.sink.emit(&tag, now, &record) {
                    log::warn!("emit failed for {tag}: {e}");
                }
            }
        } else {
            let record = self.output.merged_record(&snapshot, self.config.aggregate);
            if record.is_empty() {
                return;
            }
            if let Err(e) = self.sink.emit(&self.config.tag, now, &record) {
                log::warn!("emit failed for {}: {e}", self.config.tag);
            }
        }
    }
}

/// A configured counting stage with explicit lifecycle.
pub struct DataCountRuntime {
    inner: Arc<RuntimeInner>,
    running: Arc<AtomicBool>,
    watcher: Option<JoinHandle<()>>,
}

impl DataCountRuntime {
    /// Build a runtime from flat configuration properties and a sink.
    ///
    /// All validation happens here; the returned runtime is inert until
    /// [`start`](Self::start) is called.
    pub fn from_properties(
        properties: &HashMap<String, String>,
        sink: Box<dyn Sink>,
    ) -> DataCountResult<Self> {
        let config = DataCountConfig::from_properties(properties)?;
        let patterns = Arc::new(PatternSet::from_properties(properties)?);
        let state = CounterState::new(patterns.len(), config.aggregate);
        let output = OutputGenerator::new(
            Arc::clone(&patterns),
            config.outcast_unmatched,
            config.output_messages,
            config.input_tag_remove_prefix.clone(),
        );
        Ok(Self {
            inner: Arc::new(RuntimeInner {
                config,
                patterns,
                state,
                output,
                sink,
                persistence: None,
            }),
            running: Arc::new(AtomicBool::new(false)),
            watcher: None,
        })
    }

    /// Attach the storage collaborator for durable state. Only effective
    /// when `store_counts` is configured; must be called before `start`.
    pub fn with_state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        let inner = Arc::get_mut(&mut self.inner)
            .expect("with_state_store must be called before start");
        if inner.config.store_counts {
            inner.persistence = Some(PersistenceAdapter::new(
                store,
                &inner.config,
                &inner.patterns,
            ));
        } else {
            log::debug!("state store attached but store_counts is disabled");
        }
        self
    }

    /// Restore persisted state (when enabled) and spawn the flush watcher.
    pub fn start(&mut self) -> DataCountResult<()> {
        if self.watcher.is_some() {
            return Err(DataCountError::Other("runtime already started".to_string()));
        }
        if self.inner.config.store_counts && self.inner.persistence.is_none() {
            log::warn!("store_counts is enabled but no state store was provided");
        }
        if let Some(adapter) = &self.inner.persistence {
            if let Some((counts, saved_duration)) = adapter.load(self.inner.config.tick) {
                log::info!(
                    "restored counter state for {} key(s), {saved_duration:.1}s into the interval",
                    counts.len()
                );
                self.inner.state.restore(counts, saved_duration);
            }
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let inner = Arc::clone(&self.inner);
        let tick = self.inner.config.tick as f64;
        self.watcher = Some(thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                thread::sleep(WATCH_PERIOD);
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                if inner.state.elapsed_secs() >= tick {
                    inner.flush_emit();
                }
            }
        }));
        Ok(())
    }

    /// Classify one inbound batch and accumulate its counts under `tag`.
    ///
    /// Never fails on malformed content: a record without the count key is
    /// silently skipped.
    pub fn process(&self, tag: &str, batch: &[TimedRecord]) {
        let increments = classify(batch, &self.inner.config.count_key, &self.inner.patterns);
        self.inner.state.countups(tag, &increments);
    }

    /// Run one flush-and-emit cycle immediately.
    pub fn flush_emit(&self) {
        self.inner.flush_emit();
    }

    /// Cancel the watcher, run one final flush-and-emit, then persist.
    ///
    /// Synchronous: when this returns, no pending flush can fire after the
    /// persisted snapshot was written. Subsequent calls are no-ops.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let Some(handle) = self.watcher.take() else {
            return;
        };
        if handle.join().is_err() {
            log::error!("flush watcher thread panicked");
        }
        self.inner.flush_emit();
        if let Some(adapter) = &self.inner.persistence {
            let (counts, saved_duration) = self.inner.state.export();
            if let Err(e) = adapter.save(counts, saved_duration) {
                log::warn!("failed to persist counter state: {e}");
            }
        }
    }

    /// The live counter table. Public for hosts and tests that drive flush
    /// timing themselves.
    pub fn counter(&self) -> &CounterState {
        &self.inner.state
    }

    pub fn config(&self) -> &DataCountConfig {
        &self.inner.config
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.inner.patterns
    }
}

impl Drop for DataCountRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}
