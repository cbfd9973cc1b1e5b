//! Cache statistics and per-unit-of-work telemetry.
//!
//! Two layers of counters exist. [`UowStats`] belongs to a single unit of
//! work and folds into the parent when the unit commits, so a committed
//! subtree reports its aggregate effort at the root. [`SessionStats`] is
//! the session-wide atomic ledger, recorded at the moment each event
//! happens and never folded, so it can be read while work is in flight.

use crate::types::UowId;
use crate::uow::UowState;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters for one unit of work.
///
/// Hits, misses and lookup time are recorded by `lookup` itself; store
/// reads and store time are recorded by the caller around its backing
/// store round trips. `elapsed` is the wall-clock span from begin to the
/// terminal transition.
#[derive(Debug, Clone, Default)]
pub struct UowStats {
    /// Cache lookups that found a live entry or a tombstone.
    pub cache_hits: u64,
    /// Cache lookups that found nothing.
    pub cache_misses: u64,
    /// Backing store round trips recorded against this unit.
    pub store_reads: u64,
    /// Cumulative time spent probing cache tables.
    pub cache_lookup_time: Duration,
    /// Time spent in the backing store, keyed by operation name.
    pub store_time: HashMap<String, Duration>,
    /// Wall-clock time from begin until commit or abort.
    pub elapsed: Duration,
}

impl UowStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one cache probe and the time it took.
    pub(crate) fn record_lookup(&mut self, hit: bool, elapsed: Duration) {
        if hit {
            self.cache_hits += 1;
        } else {
            self.cache_misses += 1;
        }
        self.cache_lookup_time += elapsed;
    }

    /// Records one backing store round trip.
    pub(crate) fn record_store_read(&mut self) {
        self.store_reads += 1;
    }

    /// Records time spent in the backing store under `name`.
    pub(crate) fn record_store_time(&mut self, name: &str, elapsed: Duration) {
        *self
            .store_time
            .entry(name.to_owned())
            .or_insert(Duration::ZERO) += elapsed;
    }

    /// Folds a committed child's counters into this unit.
    ///
    /// `elapsed` is not folded: the parent's own wall clock already spans
    /// its children.
    pub(crate) fn absorb(&mut self, other: &UowStats) {
        self.cache_hits += other.cache_hits;
        self.cache_misses += other.cache_misses;
        self.store_reads += other.store_reads;
        self.cache_lookup_time += other.cache_lookup_time;
        for (name, elapsed) in &other.store_time {
            *self
                .store_time
                .entry(name.clone())
                .or_insert(Duration::ZERO) += *elapsed;
        }
    }
}

/// Session-wide statistics.
///
/// All counters are atomic and can be read while operations are in
/// progress. Values are monotonically increasing.
#[derive(Debug, Default)]
pub struct SessionStats {
    /// Units of work begun.
    uows_begun: AtomicU64,
    /// Units of work that reached the committed state.
    uows_committed: AtomicU64,
    /// Units of work that reached the aborted state.
    uows_aborted: AtomicU64,
    /// Cache probes that found an entry in some unit of work.
    cache_hits: AtomicU64,
    /// Cache probes that found nothing.
    cache_misses: AtomicU64,
    /// Backing store round trips recorded by callers.
    store_reads: AtomicU64,
    /// Probes of the process-wide cache that found an entry.
    session_cache_hits: AtomicU64,
    /// Probes of the process-wide cache that found nothing.
    session_cache_misses: AtomicU64,
}

impl SessionStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    // === Increment methods (internal use) ===

    /// Records a unit of work beginning.
    pub(crate) fn record_begin(&self) {
        self.uows_begun.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a unit of work reaching the committed state.
    pub(crate) fn record_commit(&self) {
        self.uows_committed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a unit of work reaching the aborted state.
    pub(crate) fn record_abort(&self) {
        self.uows_aborted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a cache probe against a unit of work.
    pub(crate) fn record_lookup(&self, hit: bool) {
        if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a backing store round trip.
    pub(crate) fn record_store_read(&self) {
        self.store_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a probe of the process-wide cache.
    pub(crate) fn record_session_lookup(&self, hit: bool) {
        if hit {
            self.session_cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.session_cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    // === Getter methods (public API) ===

    /// Returns the number of units of work begun.
    pub fn uows_begun(&self) -> u64 {
        self.uows_begun.load(Ordering::Relaxed)
    }

    /// Returns the number of units of work committed.
    pub fn uows_committed(&self) -> u64 {
        self.uows_committed.load(Ordering::Relaxed)
    }

    /// Returns the number of units of work aborted.
    pub fn uows_aborted(&self) -> u64 {
        self.uows_aborted.load(Ordering::Relaxed)
    }

    /// Returns the number of unit-of-work cache hits.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Returns the number of unit-of-work cache misses.
    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    /// Returns the number of backing store round trips.
    pub fn store_reads(&self) -> u64 {
        self.store_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of process-wide cache hits.
    pub fn session_cache_hits(&self) -> u64 {
        self.session_cache_hits.load(Ordering::Relaxed)
    }

    /// Returns the number of process-wide cache misses.
    pub fn session_cache_misses(&self) -> u64 {
        self.session_cache_misses.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            uows_begun: self.uows_begun(),
            uows_committed: self.uows_committed(),
            uows_aborted: self.uows_aborted(),
            cache_hits: self.cache_hits(),
            cache_misses: self.cache_misses(),
            store_reads: self.store_reads(),
            session_cache_hits: self.session_cache_hits(),
            session_cache_misses: self.session_cache_misses(),
        }
    }
}

/// A point-in-time snapshot of session statistics.
///
/// Unlike `SessionStats`, this is a simple struct that can be compared or
/// passed across threads without atomics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionStatsSnapshot {
    /// Units of work begun.
    pub uows_begun: u64,
    /// Units of work committed.
    pub uows_committed: u64,
    /// Units of work aborted.
    pub uows_aborted: u64,
    /// Unit-of-work cache hits.
    pub cache_hits: u64,
    /// Unit-of-work cache misses.
    pub cache_misses: u64,
    /// Backing store round trips.
    pub store_reads: u64,
    /// Process-wide cache hits.
    pub session_cache_hits: u64,
    /// Process-wide cache misses.
    pub session_cache_misses: u64,
}

/// The terminal report for one unit of work.
///
/// Built once when the unit reaches a terminal state and, when
/// [`Config::log_summaries`](crate::config::Config::log_summaries) is set,
/// emitted as a single `tracing` info event.
#[derive(Debug, Clone)]
pub struct UowSummary {
    /// The unit this summary describes.
    pub uow: UowId,
    /// The terminal state reached.
    pub outcome: UowState,
    /// Wall-clock time from begin to the terminal transition.
    pub elapsed: Duration,
    /// Cache hits, children included.
    pub cache_hits: u64,
    /// Cache misses, children included.
    pub cache_misses: u64,
    /// Backing store round trips, children included.
    pub store_reads: u64,
    /// Cumulative cache probe time, children included.
    pub cache_lookup_time: Duration,
    /// Backing store time per operation name, sorted by name.
    pub store_time: Vec<(String, Duration)>,
    /// The purpose the caller attached, if any.
    pub purpose: Option<String>,
    /// Purposes of committed descendants, in commit order, deduplicated.
    pub nested_purposes: Vec<String>,
    /// Direct children this unit had.
    pub children: usize,
}

impl UowSummary {
    pub(crate) fn new(uow: UowId, outcome: UowState, stats: &UowStats) -> Self {
        let mut store_time: Vec<(String, Duration)> = stats
            .store_time
            .iter()
            .map(|(name, elapsed)| (name.clone(), *elapsed))
            .collect();
        store_time.sort_by(|a, b| a.0.cmp(&b.0));
        Self {
            uow,
            outcome,
            elapsed: stats.elapsed,
            cache_hits: stats.cache_hits,
            cache_misses: stats.cache_misses,
            store_reads: stats.store_reads,
            cache_lookup_time: stats.cache_lookup_time,
            store_time,
            purpose: None,
            nested_purposes: Vec::new(),
            children: 0,
        }
    }
}

impl fmt::Display for UowSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} in {:.3?}", self.uow, self.outcome, self.elapsed)?;
        let probes = self.cache_hits + self.cache_misses;
        if probes > 0 {
            let rate = (self.cache_hits as f64 / probes as f64) * 100.0;
            write!(
                f,
                "; cache {}/{} hits ({rate:.0}%) in {:.3?}",
                self.cache_hits, probes, self.cache_lookup_time
            )?;
        }
        if self.store_reads > 0 || !self.store_time.is_empty() {
            write!(f, "; store {} reads", self.store_reads)?;
            let mut sep = " (";
            for (name, elapsed) in &self.store_time {
                write!(f, "{sep}{name} {elapsed:.3?}")?;
                sep = ", ";
            }
            if !self.store_time.is_empty() {
                write!(f, ")")?;
            }
        }
        if let Some(purpose) = &self.purpose {
            write!(f, "; purpose \"{purpose}\"")?;
        }
        if !self.nested_purposes.is_empty() {
            write!(f, "; nested [{}]", self.nested_purposes.join(", "))?;
        }
        if self.children > 0 {
            write!(f, "; children {}", self.children)?;
        }
        Ok(())
    }
}
