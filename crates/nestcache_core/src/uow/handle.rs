//! The caller-facing handle to one unit of work.

use crate::cache::Lookup;
use crate::error::CoreResult;
use crate::facet::Facet;
use crate::hooks::PostCommit;
use crate::stats::UowStats;
use crate::types::{ObjectToken, UowId};
use crate::uow::arena::UowArena;
use crate::uow::node::UowShared;
use crate::uow::state::UowState;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// A unit of work: a private cache over the session, committed or aborted
/// as a whole.
///
/// The handle stays valid after the unit finishes. Terminal state, commit
/// time and final statistics remain queryable; data operations answer
/// with [`CoreError::AlreadyTerminal`](crate::error::CoreError) instead.
/// Dropping an unfinished handle aborts its subtree.
pub struct UnitOfWork<V> {
    id: UowId,
    shared: Arc<UowShared>,
    arena: Arc<UowArena<V>>,
}

impl<V> UnitOfWork<V> {
    pub(crate) fn new(id: UowId, shared: Arc<UowShared>, arena: Arc<UowArena<V>>) -> Self {
        Self { id, shared, arena }
    }

    /// The unit's identifier, unique within its session.
    #[must_use]
    pub fn id(&self) -> UowId {
        self.id
    }

    /// The unit's current state.
    #[must_use]
    pub fn state(&self) -> UowState {
        self.shared.state.get()
    }

    /// Whether the unit is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == UowState::Open
    }

    /// Whether the unit committed.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.state() == UowState::Committed
    }

    /// Whether the unit aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.state() == UowState::Aborted
    }

    /// When the unit committed, if it did.
    #[must_use]
    pub fn committed_at(&self) -> Option<SystemTime> {
        self.shared.committed_at.get().copied()
    }

    /// Opens a child unit under this one.
    ///
    /// # Errors
    ///
    /// Fails with `AlreadyTerminal` when this unit has already finished.
    pub fn begin_nested(&self) -> CoreResult<UnitOfWork<V>> {
        let (id, shared) = self.arena.begin(Some((self.id, &self.shared)))?;
        Ok(Self::new(id, shared, Arc::clone(&self.arena)))
    }

    /// Probes this unit's cache, then its ancestors', nearest entry first.
    ///
    /// `Ok(None)` means nobody along the chain knows these facets; that is
    /// the caller's cue to hit the backing store. A tombstone comes back
    /// as [`Lookup::Deleted`], an authoritative negative.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidFacets` when the facets name no collection, and
    /// with `AlreadyTerminal` once the unit's tree is gone.
    pub fn lookup(&self, facets: &[Facet]) -> CoreResult<Option<Lookup<V>>> {
        self.arena.lookup(self.id, &self.shared, facets)
    }

    /// Caches `value` under every non-fixed facet, locally to this unit.
    ///
    /// Accepts either an owned value or an `Arc` already shared with the
    /// caller. Returns the identity token all the written aliases carry.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidFacets` or `AlreadyTerminal`.
    pub fn update(&self, value: impl Into<Arc<V>>, facets: &[Facet]) -> CoreResult<ObjectToken> {
        self.arena.update(self.id, &self.shared, value.into(), facets)
    }

    /// Records a deletion locally to this unit and returns the full facet
    /// closure it invalidated, aliases included.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidFacets` or `AlreadyTerminal`.
    pub fn evict(&self, facets: &[Facet]) -> CoreResult<Vec<Facet>> {
        self.arena.evict(self.id, &self.shared, facets)
    }

    /// Commits this unit and its (already committed) subtree.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::CommitConflict`](crate::error::CoreError)
    /// while descendants are open or aborted; the unit stays open and the
    /// same handle can retry once they are resolved. Fails with
    /// `AlreadyTerminal` on a finished unit and, under
    /// [`MergePolicy::Reject`](crate::cache::MergePolicy), with
    /// `MergeAmbiguity` when the merge would mix a live entry with a
    /// tombstone.
    pub fn commit(&self) -> CoreResult<PostCommit<V>> {
        self.arena.commit(self.id, &self.shared)?;
        Ok(PostCommit::new(
            self.id,
            Arc::clone(&self.shared),
            Arc::clone(&self.arena),
        ))
    }

    /// Aborts this unit and everything under it, committed or not.
    ///
    /// # Errors
    ///
    /// Fails with `AlreadyTerminal` on a finished unit.
    pub fn abort(&self) -> CoreResult<()> {
        self.arena.abort(self.id, &self.shared)
    }

    /// Aborts the unit if it is still open; a finished unit is left alone.
    ///
    /// This is the forgiving shutdown path the drop guard uses.
    ///
    /// # Errors
    ///
    /// Only fails on internal inconsistencies, never on normal shutdown.
    pub fn close(&self) -> CoreResult<()> {
        self.arena.close(self.id, &self.shared)
    }

    /// Queues `hook` to run after the whole tree commits.
    ///
    /// # Errors
    ///
    /// Fails with `AlreadyTerminal` on a finished unit; chain hooks on the
    /// [`PostCommit`] receipt instead once commit has happened.
    pub fn after_commit(&self, hook: impl FnOnce() + Send + 'static) -> CoreResult<()> {
        self.shared.state.ensure_open(self.id)?;
        self.arena.queue_hook(self.id, &self.shared, Box::new(hook));
        Ok(())
    }

    /// Labels this unit for the commit summary.
    ///
    /// # Errors
    ///
    /// Fails with `AlreadyTerminal` on a finished unit.
    pub fn set_purpose(&self, purpose: &str) -> CoreResult<()> {
        self.arena.set_purpose(self.id, &self.shared, purpose)
    }

    /// The label set by [`set_purpose`](Self::set_purpose), while the tree
    /// is alive.
    #[must_use]
    pub fn purpose(&self) -> Option<String> {
        self.arena.purpose_of(self.id)
    }

    /// Counts one backing-store round trip against this unit.
    ///
    /// # Errors
    ///
    /// Fails with `AlreadyTerminal` on a finished unit.
    pub fn record_store_read(&self) -> CoreResult<()> {
        self.arena.record_store_read(self.id, &self.shared)
    }

    /// Adds backing-store time spent on `collection` to this unit.
    ///
    /// # Errors
    ///
    /// Fails with `AlreadyTerminal` on a finished unit.
    pub fn record_store_time(&self, collection: &str, elapsed: Duration) -> CoreResult<()> {
        self.arena
            .record_store_time(self.id, &self.shared, collection, elapsed)
    }

    /// A point-in-time copy of this unit's statistics; frozen once the
    /// unit finishes.
    #[must_use]
    pub fn stats(&self) -> UowStats {
        self.arena.stats_of(self.id, &self.shared)
    }
}

impl<V> Drop for UnitOfWork<V> {
    fn drop(&mut self) {
        let _ = self.arena.close(self.id, &self.shared);
    }
}
