//! Arena node for one unit of work.

use crate::cache::CacheTable;
use crate::stats::{UowStats, UowSummary};
use crate::types::UowId;
use crate::uow::state::{StateCell, UowState};
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant, SystemTime};

/// The slice of a unit of work that outlives its arena node.
///
/// Handles keep an `Arc` to this, so terminal state, commit time and final
/// statistics remain answerable after the tree is torn down.
#[derive(Debug)]
pub(crate) struct UowShared {
    pub(crate) state: StateCell,
    pub(crate) committed_at: OnceLock<SystemTime>,
    pub(crate) final_stats: OnceLock<UowStats>,
}

impl UowShared {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: StateCell::new(),
            committed_at: OnceLock::new(),
            final_stats: OnceLock::new(),
        })
    }
}

/// One unit of work as the arena stores it.
///
/// Parent and children are IDs, never owning references, so the tree has
/// no reference cycles and nodes can be dropped wholesale when their tree
/// finishes.
pub(crate) struct UowNode<V> {
    id: UowId,
    parent: Option<UowId>,
    children: Vec<UowId>,
    shared: Arc<UowShared>,
    cache: CacheTable<V>,
    stats: UowStats,
    purpose: Option<String>,
    nested_purposes: Vec<String>,
    hooks: Vec<Box<dyn FnOnce() + Send>>,
    started_at: Instant,
    finalized: bool,
    summary: Option<UowSummary>,
}

impl<V> UowNode<V> {
    pub(crate) fn new(id: UowId, parent: Option<UowId>) -> Self {
        Self {
            id,
            parent,
            children: Vec::new(),
            shared: UowShared::new(),
            cache: CacheTable::new(),
            stats: UowStats::new(),
            purpose: None,
            nested_purposes: Vec::new(),
            hooks: Vec::new(),
            started_at: Instant::now(),
            finalized: false,
            summary: None,
        }
    }

    pub(crate) fn id(&self) -> UowId {
        self.id
    }

    pub(crate) fn parent(&self) -> Option<UowId> {
        self.parent
    }

    pub(crate) fn children(&self) -> &[UowId] {
        &self.children
    }

    pub(crate) fn push_child(&mut self, child: UowId) {
        self.children.push(child);
    }

    pub(crate) fn shared(&self) -> &Arc<UowShared> {
        &self.shared
    }

    pub(crate) fn state(&self) -> UowState {
        self.shared.state.get()
    }

    pub(crate) fn cache(&self) -> &CacheTable<V> {
        &self.cache
    }

    pub(crate) fn cache_mut(&mut self) -> &mut CacheTable<V> {
        &mut self.cache
    }

    /// Drains the cache out of the node, leaving it empty.
    pub(crate) fn take_cache(&mut self) -> CacheTable<V> {
        std::mem::take(&mut self.cache)
    }

    pub(crate) fn stats(&self) -> &UowStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut UowStats {
        &mut self.stats
    }

    pub(crate) fn purpose(&self) -> Option<&str> {
        self.purpose.as_deref()
    }

    pub(crate) fn set_purpose(&mut self, purpose: String) {
        self.purpose = Some(purpose);
    }

    /// Folds a committed child's purpose trail into this node.
    pub(crate) fn absorb_child_meta(&mut self, purpose: Option<String>, mut nested: Vec<String>) {
        if let Some(p) = purpose {
            self.nested_purposes.push(p);
        }
        self.nested_purposes.append(&mut nested);
    }

    pub(crate) fn take_nested_purposes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.nested_purposes)
    }

    pub(crate) fn push_hook(&mut self, hook: Box<dyn FnOnce() + Send>) {
        self.hooks.push(hook);
    }

    pub(crate) fn take_hooks(&mut self) -> Vec<Box<dyn FnOnce() + Send>> {
        std::mem::take(&mut self.hooks)
    }

    pub(crate) fn finalized(&self) -> bool {
        self.finalized
    }

    /// Wall-clock span of this unit so far, frozen at the terminal
    /// transition.
    pub(crate) fn live_elapsed(&self) -> Duration {
        if self.finalized {
            self.stats.elapsed
        } else {
            self.started_at.elapsed()
        }
    }

    /// The one-time terminal transition: freezes the clock, publishes the
    /// terminal state and final statistics, and builds the summary that
    /// will be emitted later.
    ///
    /// A second call is a no-op. This is what keeps finalization (and the
    /// summary) happening exactly once per node no matter whether the node
    /// is the direct target of a commit or abort, or was swept up by a
    /// cascade.
    pub(crate) fn terminalize(&mut self, outcome: UowState) {
        if self.finalized {
            return;
        }
        self.finalized = true;
        self.stats.elapsed = self.started_at.elapsed();
        self.shared.state.set(outcome);
        if outcome == UowState::Committed {
            let _ = self.shared.committed_at.set(SystemTime::now());
        }
        let _ = self.shared.final_stats.set(self.stats.clone());

        let mut summary = UowSummary::new(self.id, outcome, &self.stats);
        summary.purpose = self.purpose.clone();
        let mut seen = HashSet::new();
        summary.nested_purposes = self
            .nested_purposes
            .iter()
            .filter(|p| seen.insert(p.as_str()))
            .cloned()
            .collect();
        summary.children = self.children.len();
        self.summary = Some(summary);
    }

    /// Rewrites an already-committed node to aborted.
    ///
    /// An abort cascade flips committed descendants: their merged-up
    /// writes die with the subtree. The stored summary (not yet emitted,
    /// because only a root commit emits commit summaries) changes outcome
    /// with it.
    pub(crate) fn flip_to_aborted(&mut self) {
        self.shared.state.set(UowState::Aborted);
        if let Some(summary) = self.summary.as_mut() {
            summary.outcome = UowState::Aborted;
        }
    }

    pub(crate) fn take_summary(&mut self) -> Option<UowSummary> {
        self.summary.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminalize_publishes_terminal_facts() {
        let mut node: UowNode<String> = UowNode::new(UowId::new(1), None);
        node.set_purpose("loading".to_owned());

        node.terminalize(UowState::Committed);

        assert!(node.finalized());
        assert_eq!(node.state(), UowState::Committed);
        assert!(node.shared().committed_at.get().is_some());
        assert!(node.shared().final_stats.get().is_some());
        let summary = node.take_summary().unwrap();
        assert_eq!(summary.outcome, UowState::Committed);
        assert_eq!(summary.purpose.as_deref(), Some("loading"));
    }

    #[test]
    fn terminalize_twice_is_a_noop() {
        let mut node: UowNode<String> = UowNode::new(UowId::new(1), None);
        node.terminalize(UowState::Aborted);
        let elapsed = node.stats().elapsed;

        node.terminalize(UowState::Committed);

        assert_eq!(node.state(), UowState::Aborted);
        assert_eq!(node.stats().elapsed, elapsed);
        assert!(node.shared().committed_at.get().is_none());
    }

    #[test]
    fn abort_does_not_record_a_commit_time() {
        let mut node: UowNode<String> = UowNode::new(UowId::new(2), None);
        node.terminalize(UowState::Aborted);
        assert!(node.shared().committed_at.get().is_none());
    }

    #[test]
    fn flip_rewrites_summary_outcome() {
        let mut node: UowNode<String> = UowNode::new(UowId::new(3), Some(UowId::new(1)));
        node.terminalize(UowState::Committed);

        node.flip_to_aborted();

        assert_eq!(node.state(), UowState::Aborted);
        assert_eq!(node.take_summary().unwrap().outcome, UowState::Aborted);
    }

    #[test]
    fn nested_purposes_dedup_in_summary() {
        let mut node: UowNode<String> = UowNode::new(UowId::new(4), None);
        node.absorb_child_meta(Some("sync".to_owned()), vec!["refresh".to_owned()]);
        node.absorb_child_meta(Some("sync".to_owned()), Vec::new());

        node.terminalize(UowState::Committed);

        let summary = node.take_summary().unwrap();
        assert_eq!(summary.nested_purposes, vec!["sync".to_owned(), "refresh".to_owned()]);
    }
}
