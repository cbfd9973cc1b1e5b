//! Post-commit hooks.
//!
//! Commit hands back a [`PostCommit`] receipt. Hooks chained on it run
//! exactly once, after the outermost unit of the tree has committed and
//! its cache has reached the session cache; until then they sit queued on
//! the unit they were chained to. Hooks on a tree that aborts are dropped
//! without running.

use crate::types::UowId;
use crate::uow::arena::UowArena;
use crate::uow::node::UowShared;
use std::sync::Arc;

/// Receipt of a successful commit, used to chain follow-up work.
pub struct PostCommit<V> {
    uow: UowId,
    shared: Arc<UowShared>,
    arena: Arc<UowArena<V>>,
}

impl<V> PostCommit<V> {
    pub(crate) fn new(uow: UowId, shared: Arc<UowShared>, arena: Arc<UowArena<V>>) -> Self {
        Self { uow, shared, arena }
    }

    /// The unit this receipt belongs to.
    #[must_use]
    pub fn uow(&self) -> UowId {
        self.uow
    }

    /// Chains `hook` to run once the whole tree has committed.
    ///
    /// After a nested commit the hook is deferred until the root commits.
    /// After a root commit the tree is already done, so the hook runs
    /// before this call returns.
    pub fn and_then(self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.arena.queue_hook(self.uow, &self.shared, Box::new(hook));
        self
    }
}
