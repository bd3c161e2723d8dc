//! Pattern registry with hot reload (spec.md §4.1).
//!
//! Holds compiled regex patterns bucketed by [`crate::types::PatternKind`],
//! sorted by priority descending within each bucket. A background loop
//! polls the catalogue for changed rows and atomically swaps the live
//! tables; readers never block on a reload.

mod guard;
mod tables;

pub use guard::{validate_pattern, PatternGuardError};
pub use tables::{MatchOutcome, PatternTables};

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tracing::warn;

use crate::constants::{defaults, logging};
use crate::storage::StorageBackend;
use crate::types::CompiledPatternRecord;
use crate::Result;

/// Hit counter increments are fired-and-forgotten onto this channel so
/// `hit()` never blocks a matcher on storage latency.
type HitSender = tokio::sync::mpsc::UnboundedSender<i64>;

/// Pattern registry: an `ArcSwap` over the compiled tables, with a
/// background hot-reload loop and a fire-and-forget hit-counting channel.
pub struct PatternRegistry {
    tables: ArcSwap<PatternTables>,
    last_loaded_at: std::sync::Mutex<Option<chrono::DateTime<chrono::Utc>>>,
    hit_tx: HitSender,
    hit_rx: std::sync::Mutex<Option<tokio::sync::mpsc::UnboundedReceiver<i64>>>,
}

impl PatternRegistry {
    /// Construct an empty registry. Call [`PatternRegistry::load`] before
    /// first use.
    #[must_use]
    pub fn new() -> Self {
        let (hit_tx, hit_rx) = tokio::sync::mpsc::unbounded_channel();
        Self {
            tables: ArcSwap::from_pointee(PatternTables::default()),
            last_loaded_at: std::sync::Mutex::new(None),
            hit_tx,
            hit_rx: std::sync::Mutex::new(Some(hit_rx)),
        }
    }

    /// Reload from storage: compile every enabled row, bucket by kind and
    /// subtype, sort by priority descending, and atomically swap the live
    /// tables. Invalid regexes are dropped with a warning; this either
    /// succeeds in full (with the surviving subset) or leaves the previous
    /// tables untouched on a storage error.
    pub async fn load(&self, store: &dyn StorageBackend) -> Result<()> {
        let rows = store.list_patterns().await?;
        let mut built = PatternTables::default();
        let mut newest_update = None;

        for row in rows {
            if !row.enabled {
                continue;
            }
            match guard::validate_pattern(&row.regex) {
                Ok(()) => {}
                Err(e) => {
                    warn!(
                        "{} pattern {} rejected by ReDoS guard: {e}",
                        logging::LOG_PREFIX_REGISTRY, row.id
                    );
                    continue;
                }
            }
            match regex::Regex::new(&row.regex) {
                Ok(re) => {
                    newest_update = Some(match newest_update {
                        Some(prev) if prev >= row.updated_at => prev,
                        _ => row.updated_at,
                    });
                    built.insert(re, row);
                }
                Err(e) => {
                    warn!(
                        "{} pattern {} failed to compile: {e}",
                        logging::LOG_PREFIX_REGISTRY, row.id
                    );
                }
            }
        }

        built.sort_by_priority();
        self.tables.store(Arc::new(built));
        *self.last_loaded_at.lock().unwrap() = newest_update.or(Some(chrono::Utc::now()));
        Ok(())
    }

    /// Spawn the background hot-reload loop. Polls every
    /// `pattern_reload_interval` (default 60s) and reloads only when a
    /// newer `updated_at` is observed in storage.
    pub fn spawn_reload_loop(
        self: &Arc<Self>,
        store: Arc<dyn StorageBackend>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let needs_reload = match store.list_patterns().await {
                    Ok(rows) => {
                        let last = *this.last_loaded_at.lock().unwrap();
                        match last {
                            None => true,
                            Some(last) => rows.iter().any(|r| r.updated_at > last),
                        }
                    }
                    Err(e) => {
                        warn!("{} failed polling patterns: {e}", logging::LOG_PREFIX_REGISTRY);
                        false
                    }
                };
                if needs_reload {
                    if let Err(e) = this.load(store.as_ref()).await {
                        warn!("{} reload failed: {e}", logging::LOG_PREFIX_REGISTRY);
                    }
                }
            }
        })
    }

    /// Default reload interval, per spec defaults.
    #[must_use]
    pub fn default_reload_interval() -> Duration {
        defaults::PATTERN_RELOAD_INTERVAL
    }

    /// First matching performance pattern, in priority order.
    #[must_use]
    pub fn match_performance(&self, line: &str) -> Option<MatchOutcome> {
        self.tables.load().match_performance(line)
    }

    /// Short-circuit blacklist check.
    #[must_use]
    pub fn is_blacklisted(&self, line: &str) -> bool {
        self.tables.load().is_blacklisted(line)
    }

    /// First matching training-event pattern across all subtypes.
    #[must_use]
    pub fn match_training_event(&self, line: &str) -> Option<(String, MatchOutcome)> {
        self.tables.load().match_training_event(line)
    }

    /// First matching checkpoint-event pattern across all subtypes.
    #[must_use]
    pub fn match_checkpoint_event(&self, line: &str) -> Option<(String, MatchOutcome)> {
        self.tables.load().match_checkpoint_event(line)
    }

    /// First matching identify pattern, highest confidence wins on tie.
    #[must_use]
    pub fn match_identify(&self, line: &str) -> Option<MatchOutcome> {
        self.tables.load().match_identify(line)
    }

    /// Fire-and-forget increment of a pattern's hit counter. Never blocks;
    /// drops silently if the channel's receiver has been taken and shut
    /// down.
    pub fn hit(&self, pattern_id: i64) {
        let _ = self.hit_tx.send(pattern_id);
    }

    /// Take ownership of the hit-count receiver, for a caller that wants
    /// to drain it into storage periodically. Returns `None` if already
    /// taken.
    pub fn take_hit_receiver(&self) -> Option<tokio::sync::mpsc::UnboundedReceiver<i64>> {
        self.hit_rx.lock().unwrap().take()
    }
}

impl Default for PatternRegistry {
    fn default() -> Self {
        Self::new()
    }
}
