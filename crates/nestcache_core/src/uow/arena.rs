//! The arena owning every live unit-of-work tree.
//!
//! All tree structure lives behind one lock: nodes refer to each other by
//! [`UowId`], handles refer to nodes by ID plus a shared state cell, and
//! the arena is the only place edges are followed. Commit and abort are
//! arena operations so the whole protocol (gate, merge, cascade, teardown)
//! runs under a consistent view of the tree.
//!
//! Lock order is `nodes` before `session_cache`; only a root commit takes
//! both. Hooks and summary events run strictly after the locks drop.

use crate::cache::{CacheEntry, CacheTable, CachedObject, Lookup, MergePolicy, ValueMerge};
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::facet::{collection_of, union_facets, Facet};
use crate::stats::{SessionStats, UowStats, UowSummary};
use crate::types::{ObjectToken, UowId};
use crate::uow::node::{UowNode, UowShared};
use crate::uow::state::UowState;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// What a successful commit did, from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommitKind {
    /// The unit merged into its parent; the tree is still running.
    Nested,
    /// The unit was a tree root: its cache reached the session cache and
    /// the tree was torn down.
    Root,
}

pub(crate) struct UowArena<V> {
    nodes: Mutex<HashMap<UowId, UowNode<V>>>,
    next_id: AtomicU64,
    next_token: AtomicU64,
    session_cache: Mutex<CacheTable<V>>,
    config: Config,
    reconciler: Arc<dyn ValueMerge<V>>,
    stats: SessionStats,
}

impl<V> UowArena<V> {
    pub(crate) fn new(config: Config, reconciler: Arc<dyn ValueMerge<V>>) -> Self {
        Self {
            nodes: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            next_token: AtomicU64::new(0),
            session_cache: Mutex::new(CacheTable::new()),
            config,
            reconciler,
            stats: SessionStats::new(),
        }
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn session_stats(&self) -> &SessionStats {
        &self.stats
    }

    pub(crate) fn node_count(&self) -> usize {
        self.nodes.lock().len()
    }

    pub(crate) fn session_entry_count(&self) -> usize {
        self.session_cache.lock().entry_count()
    }

    fn mint_token(&self) -> ObjectToken {
        ObjectToken::new(self.next_token.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Opens a new unit of work, optionally under a parent.
    pub(crate) fn begin(
        &self,
        parent: Option<(UowId, &UowShared)>,
    ) -> CoreResult<(UowId, Arc<UowShared>)> {
        let mut nodes = self.nodes.lock();
        if let Some((parent_id, parent_shared)) = parent {
            let Some(parent_node) = nodes.get(&parent_id) else {
                return Err(gone_error(parent_id, parent_shared));
            };
            parent_node.shared().state.ensure_open(parent_id)?;
        }
        let id = UowId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let node = UowNode::new(id, parent.map(|(parent_id, _)| parent_id));
        let shared = Arc::clone(node.shared());
        nodes.insert(id, node);
        if let Some((parent_id, _)) = parent {
            if let Some(parent_node) = nodes.get_mut(&parent_id) {
                parent_node.push_child(id);
            }
        }
        self.stats.record_begin();
        Ok((id, shared))
    }

    /// Probes the cache chain from `at` up to its tree root.
    ///
    /// The nearest entry wins, so a unit's own writes shadow its
    /// ancestors'. Both live hits and tombstones count as cache hits;
    /// only `Ok(None)` sends the caller to the backing store.
    pub(crate) fn lookup(
        &self,
        at: UowId,
        shared: &UowShared,
        facets: &[Facet],
    ) -> CoreResult<Option<Lookup<V>>> {
        let mut nodes = self.nodes.lock();
        if !nodes.contains_key(&at) {
            return Err(gone_error(at, shared));
        }
        let start = Instant::now();
        let found = chain_probe(&nodes, at, facets)?.map(CacheEntry::to_lookup);
        let elapsed = start.elapsed();
        let hit = found.is_some();
        if let Some(node) = nodes.get_mut(&at) {
            node.stats_mut().record_lookup(hit, elapsed);
        }
        self.stats.record_lookup(hit);
        Ok(found)
    }

    /// Stores `value` in the unit's own cache under every non-fixed facet.
    ///
    /// Returns the identity token minted for this version; every alias
    /// written here carries it.
    pub(crate) fn update(
        &self,
        at: UowId,
        shared: &UowShared,
        value: Arc<V>,
        facets: &[Facet],
    ) -> CoreResult<ObjectToken> {
        let mut nodes = self.nodes.lock();
        let Some(node) = nodes.get_mut(&at) else {
            return Err(gone_error(at, shared));
        };
        node.shared().state.ensure_open(at)?;
        let token = self.mint_token();
        let object = CachedObject::new(token, value);
        node.cache_mut().store(&object, facets)?;
        Ok(token)
    }

    /// Records a deletion in the unit's own cache.
    ///
    /// The tombstoned closure is the supplied facets plus every alias of
    /// the cached object discovered along the ancestor chain, matched by
    /// identity token. Tombstones land in the evicting unit only, so the
    /// deletion shadows ancestors without touching them until commit.
    pub(crate) fn evict(
        &self,
        at: UowId,
        shared: &UowShared,
        facets: &[Facet],
    ) -> CoreResult<Vec<Facet>> {
        let mut nodes = self.nodes.lock();
        {
            let Some(node) = nodes.get(&at) else {
                return Err(gone_error(at, shared));
            };
            node.shared().state.ensure_open(at)?;
        }
        let collection = collection_of(facets)?;
        let closure = match chain_probe(&nodes, at, facets)? {
            None => facets.to_vec(),
            Some(CacheEntry::Tombstone(existing)) => union_facets(existing, facets),
            Some(CacheEntry::Live(object)) => {
                let token = object.token();
                let mut closure = facets.to_vec();
                let mut cursor = Some(at);
                while let Some(id) = cursor {
                    let Some(node) = nodes.get(&id) else { break };
                    let swept = node.cache().sweep_aliases(&collection, token);
                    closure = union_facets(&closure, &swept);
                    cursor = node.parent();
                }
                closure
            }
        };
        if let Some(node) = nodes.get_mut(&at) {
            node.cache_mut().write_tombstones(&collection, &closure);
        }
        Ok(closure)
    }

    /// Commits the unit at `at`.
    ///
    /// Every descendant must already be committed, otherwise the call
    /// fails with [`CoreError::CommitConflict`] and changes nothing; the
    /// caller can finish or abort the blockers and retry. A nested commit
    /// folds cache, statistics and purposes into the parent. A root
    /// commit folds the root cache into the session cache, tears the tree
    /// down, then runs queued hooks and emits one summary per unit.
    pub(crate) fn commit(&self, at: UowId, shared: &UowShared) -> CoreResult<CommitKind> {
        let mut hooks: Vec<Box<dyn FnOnce() + Send>> = Vec::new();
        let mut summaries: Vec<UowSummary> = Vec::new();
        let kind = {
            let mut nodes = self.nodes.lock();
            let Some(node) = nodes.get(&at) else {
                return Err(gone_error(at, shared));
            };
            node.shared().state.ensure_open(at)?;
            let parent = node.parent();

            let (open, aborted) = blockers(&nodes, at);
            if !(open.is_empty() && aborted.is_empty()) {
                return Err(CoreError::commit_conflict(open, aborted));
            }

            match parent {
                Some(parent_id) => {
                    if self.config.merge_policy == MergePolicy::Reject {
                        let colliding = match (nodes.get(&parent_id), nodes.get(&at)) {
                            (Some(parent_node), Some(child)) => {
                                parent_node.cache().first_collision(child.cache())
                            }
                            _ => None,
                        };
                        if let Some((collection, column)) = colliding {
                            return Err(CoreError::merge_ambiguity(collection, column));
                        }
                    }
                    let (child_cache, child_stats, child_purpose, child_nested) = {
                        let Some(child) = nodes.get_mut(&at) else {
                            return Err(gone_error(at, shared));
                        };
                        child.terminalize(UowState::Committed);
                        let cache = child.take_cache();
                        let stats = child.stats().clone();
                        let purpose = child.purpose().map(str::to_owned);
                        let nested = child.take_nested_purposes();
                        (cache, stats, purpose, nested)
                    };
                    if let Some(parent_node) = nodes.get_mut(&parent_id) {
                        parent_node.cache_mut().merge_from(
                            child_cache,
                            self.config.merge_policy,
                            self.reconciler.as_ref(),
                            || self.mint_token(),
                        )?;
                        parent_node.stats_mut().absorb(&child_stats);
                        parent_node.absorb_child_meta(child_purpose, child_nested);
                    }
                    self.stats.record_commit();
                    CommitKind::Nested
                }
                None => {
                    let mut session_cache = self.session_cache.lock();
                    if self.config.merge_policy == MergePolicy::Reject {
                        let colliding = nodes
                            .get(&at)
                            .and_then(|root| session_cache.first_collision(root.cache()));
                        if let Some((collection, column)) = colliding {
                            return Err(CoreError::merge_ambiguity(collection, column));
                        }
                    }
                    let root_cache = {
                        let Some(root) = nodes.get_mut(&at) else {
                            return Err(gone_error(at, shared));
                        };
                        root.terminalize(UowState::Committed);
                        root.take_cache()
                    };
                    session_cache.merge_from(
                        root_cache,
                        self.config.merge_policy,
                        self.reconciler.as_ref(),
                        || self.mint_token(),
                    )?;
                    drop(session_cache);
                    self.stats.record_commit();
                    for id in post_order(&nodes, at) {
                        if let Some(node) = nodes.get_mut(&id) {
                            hooks.append(&mut node.take_hooks());
                            if let Some(summary) = node.take_summary() {
                                summaries.push(summary);
                            }
                        }
                    }
                    remove_subtree(&mut nodes, at);
                    CommitKind::Root
                }
            }
        };
        for hook in hooks {
            hook();
        }
        if self.config.log_summaries {
            for summary in &summaries {
                info!("{}", summary);
            }
        }
        Ok(kind)
    }

    /// Aborts the unit at `at` and its entire subtree.
    ///
    /// The cascade flips committed descendants too: their merged-up
    /// writes die with the subtree. A nested subtree stays in the arena
    /// afterwards, frozen, so the parent's commit gate keeps seeing it;
    /// the tree is torn down only when its root finishes.
    pub(crate) fn abort(&self, at: UowId, shared: &UowShared) -> CoreResult<()> {
        let mut summaries: Vec<UowSummary> = Vec::new();
        {
            let mut nodes = self.nodes.lock();
            let Some(node) = nodes.get(&at) else {
                return Err(gone_error(at, shared));
            };
            node.shared().state.ensure_open(at)?;
            let is_tree_root = node.parent().is_none();
            for id in post_order(&nodes, at) {
                let Some(node) = nodes.get_mut(&id) else {
                    continue;
                };
                if !node.finalized() {
                    node.terminalize(UowState::Aborted);
                    self.stats.record_abort();
                } else if node.state() == UowState::Committed {
                    node.flip_to_aborted();
                    self.stats.record_abort();
                } else {
                    // Aborted earlier; its summary already went out.
                    continue;
                }
                if let Some(summary) = node.take_summary() {
                    summaries.push(summary);
                }
            }
            if is_tree_root {
                remove_subtree(&mut nodes, at);
            }
        }
        if self.config.log_summaries {
            for summary in &summaries {
                info!("{}", summary);
            }
        }
        Ok(())
    }

    /// Abort that forgives an already-finished unit. Backs `close` and
    /// the drop guard.
    pub(crate) fn close(&self, at: UowId, shared: &UowShared) -> CoreResult<()> {
        match self.abort(at, shared) {
            Ok(()) | Err(CoreError::AlreadyTerminal { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Queues a hook to run after the tree commits, or runs it at once if
    /// that already happened. Hooks on an aborted tree are dropped.
    pub(crate) fn queue_hook(
        &self,
        at: UowId,
        shared: &UowShared,
        hook: Box<dyn FnOnce() + Send>,
    ) {
        let run_now = {
            let mut nodes = self.nodes.lock();
            match nodes.get_mut(&at) {
                Some(node) if node.state() != UowState::Aborted => {
                    node.push_hook(hook);
                    None
                }
                Some(_) => None,
                None => match shared.state.get() {
                    UowState::Committed => Some(hook),
                    _ => None,
                },
            }
        };
        if let Some(hook) = run_now {
            hook();
        }
    }

    pub(crate) fn set_purpose(&self, at: UowId, shared: &UowShared, purpose: &str) -> CoreResult<()> {
        let mut nodes = self.nodes.lock();
        let Some(node) = nodes.get_mut(&at) else {
            return Err(gone_error(at, shared));
        };
        node.shared().state.ensure_open(at)?;
        node.set_purpose(purpose.to_owned());
        Ok(())
    }

    pub(crate) fn purpose_of(&self, at: UowId) -> Option<String> {
        let nodes = self.nodes.lock();
        nodes.get(&at).and_then(|node| node.purpose().map(str::to_owned))
    }

    pub(crate) fn record_store_read(&self, at: UowId, shared: &UowShared) -> CoreResult<()> {
        let mut nodes = self.nodes.lock();
        let Some(node) = nodes.get_mut(&at) else {
            return Err(gone_error(at, shared));
        };
        node.shared().state.ensure_open(at)?;
        node.stats_mut().record_store_read();
        self.stats.record_store_read();
        Ok(())
    }

    pub(crate) fn record_store_time(
        &self,
        at: UowId,
        shared: &UowShared,
        collection: &str,
        elapsed: Duration,
    ) -> CoreResult<()> {
        let mut nodes = self.nodes.lock();
        let Some(node) = nodes.get_mut(&at) else {
            return Err(gone_error(at, shared));
        };
        node.shared().state.ensure_open(at)?;
        node.stats_mut().record_store_time(collection, elapsed);
        Ok(())
    }

    /// A point-in-time copy of the unit's statistics. While the unit is
    /// open, `elapsed` is the running wall clock; afterwards the frozen
    /// final numbers are returned, even once the tree is gone.
    pub(crate) fn stats_of(&self, at: UowId, shared: &UowShared) -> UowStats {
        if let Some(stats) = shared.final_stats.get() {
            return stats.clone();
        }
        let nodes = self.nodes.lock();
        match nodes.get(&at) {
            Some(node) => {
                let mut stats = node.stats().clone();
                stats.elapsed = node.live_elapsed();
                stats
            }
            None => shared.final_stats.get().cloned().unwrap_or_else(UowStats::new),
        }
    }

    /// Probes the process-wide session cache, outside any unit of work.
    pub(crate) fn session_lookup(&self, facets: &[Facet]) -> CoreResult<Option<Lookup<V>>> {
        let cache = self.session_cache.lock();
        let found = cache.probe(facets)?.map(CacheEntry::to_lookup);
        self.stats.record_session_lookup(found.is_some());
        Ok(found)
    }
}

/// Maps "the node is gone" onto the error the caller can act on: the
/// handle's state cell still knows how the unit ended.
fn gone_error(uow: UowId, shared: &UowShared) -> CoreError {
    match shared.state.get() {
        UowState::Open => CoreError::unknown_unit_of_work(uow),
        state => CoreError::already_terminal(uow, state),
    }
}

fn chain_probe<'a, V>(
    nodes: &'a HashMap<UowId, UowNode<V>>,
    start: UowId,
    facets: &[Facet],
) -> CoreResult<Option<&'a CacheEntry<V>>> {
    let mut cursor = Some(start);
    while let Some(id) = cursor {
        let Some(node) = nodes.get(&id) else { break };
        if let Some(entry) = node.cache().probe(facets)? {
            return Ok(Some(entry));
        }
        cursor = node.parent();
    }
    Ok(None)
}

fn post_order<V>(nodes: &HashMap<UowId, UowNode<V>>, root: UowId) -> Vec<UowId> {
    let mut order = Vec::new();
    collect_post_order(nodes, root, &mut order);
    order
}

fn collect_post_order<V>(nodes: &HashMap<UowId, UowNode<V>>, id: UowId, order: &mut Vec<UowId>) {
    if let Some(node) = nodes.get(&id) {
        for child in node.children() {
            collect_post_order(nodes, *child, order);
        }
    }
    order.push(id);
}

/// Splits the strict descendants of `root` into still-open and aborted.
fn blockers<V>(nodes: &HashMap<UowId, UowNode<V>>, root: UowId) -> (Vec<UowId>, Vec<UowId>) {
    let mut open = Vec::new();
    let mut aborted = Vec::new();
    for id in post_order(nodes, root) {
        if id == root {
            continue;
        }
        if let Some(node) = nodes.get(&id) {
            match node.state() {
                UowState::Open => open.push(id),
                UowState::Aborted => aborted.push(id),
                UowState::Committed => {}
            }
        }
    }
    (open, aborted)
}

fn remove_subtree<V>(nodes: &mut HashMap<UowId, UowNode<V>>, root: UowId) {
    for id in post_order(nodes, root) {
        nodes.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::PreferIncoming;
    use std::sync::atomic::AtomicBool;

    fn arena() -> UowArena<String> {
        UowArena::new(Config::default(), Arc::new(PreferIncoming))
    }

    fn widget(id: &str, name: &str) -> Vec<Facet> {
        vec![
            Facet::fixed("table", "widget"),
            Facet::new("id", id),
            Facet::new("name", name),
        ]
    }

    fn by_id(id: &str) -> Vec<Facet> {
        vec![Facet::fixed("table", "widget"), Facet::new("id", id)]
    }

    fn by_name(name: &str) -> Vec<Facet> {
        vec![Facet::fixed("table", "widget"), Facet::new("name", name)]
    }

    fn value(text: &str) -> Arc<String> {
        Arc::new(text.to_owned())
    }

    #[test]
    fn begin_links_children_under_their_parent() {
        let arena = arena();
        let (root, root_shared) = arena.begin(None).unwrap();
        let (child, _) = arena.begin(Some((root, &root_shared))).unwrap();

        assert_ne!(root, child);
        assert_eq!(arena.node_count(), 2);
        assert_eq!(arena.session_stats().uows_begun(), 2);
    }

    #[test]
    fn begin_under_a_finished_parent_is_refused() {
        let arena = arena();
        let (root, root_shared) = arena.begin(None).unwrap();
        arena.abort(root, &root_shared).unwrap();

        let err = arena.begin(Some((root, &root_shared))).unwrap_err();
        assert!(matches!(
            err,
            CoreError::AlreadyTerminal { state: UowState::Aborted, .. }
        ));
    }

    #[test]
    fn lookups_read_through_to_ancestors() {
        let arena = arena();
        let (root, root_shared) = arena.begin(None).unwrap();
        arena.update(root, &root_shared, value("disc"), &widget("1", "disc")).unwrap();
        let (child, child_shared) = arena.begin(Some((root, &root_shared))).unwrap();

        let found = arena.lookup(child, &child_shared, &by_id("1")).unwrap().unwrap();
        assert_eq!(found.value().unwrap().as_str(), "disc");
    }

    #[test]
    fn siblings_do_not_see_each_other() {
        let arena = arena();
        let (root, root_shared) = arena.begin(None).unwrap();
        let (left, left_shared) = arena.begin(Some((root, &root_shared))).unwrap();
        let (right, right_shared) = arena.begin(Some((root, &root_shared))).unwrap();
        arena.update(left, &left_shared, value("draft"), &widget("1", "draft")).unwrap();

        assert!(arena.lookup(right, &right_shared, &by_id("1")).unwrap().is_none());
        assert!(arena.lookup(root, &root_shared, &by_id("1")).unwrap().is_none());
    }

    #[test]
    fn nested_commit_merges_into_the_parent() {
        let arena = arena();
        let (root, root_shared) = arena.begin(None).unwrap();
        let (child, child_shared) = arena.begin(Some((root, &root_shared))).unwrap();
        arena.update(child, &child_shared, value("draft"), &widget("1", "draft")).unwrap();

        let kind = arena.commit(child, &child_shared).unwrap();

        assert_eq!(kind, CommitKind::Nested);
        let found = arena.lookup(root, &root_shared, &by_id("1")).unwrap().unwrap();
        assert_eq!(found.value().unwrap().as_str(), "draft");
        // The session cache stays untouched until the root commits.
        assert!(arena.session_lookup(&by_id("1")).unwrap().is_none());
    }

    #[test]
    fn root_commit_publishes_to_the_session_cache() {
        let arena = arena();
        let (root, root_shared) = arena.begin(None).unwrap();
        arena.update(root, &root_shared, value("disc"), &widget("1", "disc")).unwrap();

        let kind = arena.commit(root, &root_shared).unwrap();

        assert_eq!(kind, CommitKind::Root);
        assert_eq!(arena.node_count(), 0);
        assert_eq!(root_shared.state.get(), UowState::Committed);
        assert!(root_shared.committed_at.get().is_some());
        let found = arena.session_lookup(&by_id("1")).unwrap().unwrap();
        assert_eq!(found.value().unwrap().as_str(), "disc");
        assert_eq!(arena.session_entry_count(), 2);
    }

    #[test]
    fn commit_with_unfinished_descendants_is_refused() {
        let arena = arena();
        let (root, root_shared) = arena.begin(None).unwrap();
        let (child, child_shared) = arena.begin(Some((root, &root_shared))).unwrap();
        let (grandchild, grandchild_shared) = arena.begin(Some((child, &child_shared))).unwrap();

        let err = arena.commit(root, &root_shared).unwrap_err();
        let CoreError::CommitConflict { open, aborted } = err else {
            panic!("expected a commit conflict");
        };
        assert_eq!(open.len(), 2);
        assert!(open.contains(&child) && open.contains(&grandchild));
        assert!(aborted.is_empty());
        assert_eq!(root_shared.state.get(), UowState::Open);

        // Finishing the blockers deepest-first makes the same call succeed.
        arena.commit(grandchild, &grandchild_shared).unwrap();
        arena.commit(child, &child_shared).unwrap();
        arena.commit(root, &root_shared).unwrap();
    }

    #[test]
    fn aborted_descendant_blocks_every_retry() {
        let arena = arena();
        let (root, root_shared) = arena.begin(None).unwrap();
        let (child, child_shared) = arena.begin(Some((root, &root_shared))).unwrap();
        arena.abort(child, &child_shared).unwrap();

        for _ in 0..2 {
            let err = arena.commit(root, &root_shared).unwrap_err();
            let CoreError::CommitConflict { open, aborted } = err else {
                panic!("expected a commit conflict");
            };
            assert!(open.is_empty());
            assert_eq!(aborted, vec![child]);
        }

        arena.abort(root, &root_shared).unwrap();
        assert_eq!(arena.node_count(), 0);
    }

    #[test]
    fn abort_cascades_over_committed_children() {
        let arena = arena();
        let (root, root_shared) = arena.begin(None).unwrap();
        let (child, child_shared) = arena.begin(Some((root, &root_shared))).unwrap();
        arena.update(child, &child_shared, value("draft"), &widget("1", "draft")).unwrap();
        arena.commit(child, &child_shared).unwrap();

        arena.abort(root, &root_shared).unwrap();

        assert_eq!(child_shared.state.get(), UowState::Aborted);
        assert_eq!(root_shared.state.get(), UowState::Aborted);
        assert!(arena.session_lookup(&by_id("1")).unwrap().is_none());
        assert_eq!(arena.node_count(), 0);
        assert_eq!(arena.session_stats().uows_aborted(), 2);
    }

    #[test]
    fn double_commit_is_already_terminal() {
        let arena = arena();
        let (root, root_shared) = arena.begin(None).unwrap();
        let (child, child_shared) = arena.begin(Some((root, &root_shared))).unwrap();
        arena.commit(child, &child_shared).unwrap();

        let err = arena.commit(child, &child_shared).unwrap_err();
        assert!(matches!(
            err,
            CoreError::AlreadyTerminal { state: UowState::Committed, .. }
        ));
    }

    #[test]
    fn operations_after_teardown_report_the_terminal_state() {
        let arena = arena();
        let (root, root_shared) = arena.begin(None).unwrap();
        arena.commit(root, &root_shared).unwrap();

        let err = arena.lookup(root, &root_shared, &by_id("1")).unwrap_err();
        assert!(matches!(
            err,
            CoreError::AlreadyTerminal { state: UowState::Committed, .. }
        ));
        let err = arena
            .update(root, &root_shared, value("late"), &widget("1", "late"))
            .unwrap_err();
        assert!(matches!(err, CoreError::AlreadyTerminal { .. }));
    }

    #[test]
    fn evict_collects_the_alias_closure() {
        let arena = arena();
        let (root, root_shared) = arena.begin(None).unwrap();
        arena.update(root, &root_shared, value("disc"), &widget("1", "disc")).unwrap();

        let closure = arena.evict(root, &root_shared, &by_id("1")).unwrap();

        assert!(closure.contains(&Facet::new("id", "1")));
        assert!(closure.contains(&Facet::new("name", "disc")));
        let by_alias = arena.lookup(root, &root_shared, &by_name("disc")).unwrap().unwrap();
        assert!(by_alias.is_deleted());
    }

    #[test]
    fn evict_shadows_ancestors_without_touching_them() {
        let arena = arena();
        let (root, root_shared) = arena.begin(None).unwrap();
        arena.update(root, &root_shared, value("disc"), &widget("1", "disc")).unwrap();
        let (child, child_shared) = arena.begin(Some((root, &root_shared))).unwrap();

        let closure = arena.evict(child, &child_shared, &by_id("1")).unwrap();

        // The closure was swept out of the ancestor's live entries.
        assert!(closure.contains(&Facet::new("name", "disc")));
        let child_view = arena.lookup(child, &child_shared, &by_id("1")).unwrap().unwrap();
        assert!(child_view.is_deleted());
        let root_view = arena.lookup(root, &root_shared, &by_id("1")).unwrap().unwrap();
        assert!(root_view.is_hit());
    }

    #[test]
    fn evicting_an_unknown_object_still_records_the_deletion() {
        let arena = arena();
        let (root, root_shared) = arena.begin(None).unwrap();

        let closure = arena.evict(root, &root_shared, &by_id("9")).unwrap();

        assert_eq!(closure, by_id("9"));
        let found = arena.lookup(root, &root_shared, &by_id("9")).unwrap().unwrap();
        assert!(found.is_deleted());
    }

    #[test]
    fn tombstones_survive_the_default_merge() {
        let arena = arena();
        let (root, root_shared) = arena.begin(None).unwrap();
        arena.update(root, &root_shared, value("disc"), &widget("1", "disc")).unwrap();
        let (child, child_shared) = arena.begin(Some((root, &root_shared))).unwrap();
        arena.evict(child, &child_shared, &by_id("1")).unwrap();

        arena.commit(child, &child_shared).unwrap();
        let root_view = arena.lookup(root, &root_shared, &by_id("1")).unwrap().unwrap();
        assert!(root_view.is_deleted());

        arena.commit(root, &root_shared).unwrap();
        let session_view = arena.session_lookup(&by_id("1")).unwrap().unwrap();
        assert!(session_view.is_deleted());
    }

    #[test]
    fn live_wins_policy_drops_incoming_tombstones() {
        let config = Config::new().merge_policy(MergePolicy::LiveWins);
        let arena: UowArena<String> = UowArena::new(config, Arc::new(PreferIncoming));
        let (root, root_shared) = arena.begin(None).unwrap();
        arena.update(root, &root_shared, value("disc"), &widget("1", "disc")).unwrap();
        let (child, child_shared) = arena.begin(Some((root, &root_shared))).unwrap();
        arena.evict(child, &child_shared, &by_id("1")).unwrap();

        arena.commit(child, &child_shared).unwrap();

        let root_view = arena.lookup(root, &root_shared, &by_id("1")).unwrap().unwrap();
        assert!(root_view.is_hit());
    }

    #[test]
    fn reject_policy_fails_the_commit_cleanly() {
        let config = Config::new().merge_policy(MergePolicy::Reject);
        let arena: UowArena<String> = UowArena::new(config, Arc::new(PreferIncoming));
        let (root, root_shared) = arena.begin(None).unwrap();
        arena.update(root, &root_shared, value("disc"), &widget("1", "disc")).unwrap();
        let (child, child_shared) = arena.begin(Some((root, &root_shared))).unwrap();
        arena.evict(child, &child_shared, &by_id("1")).unwrap();

        let err = arena.commit(child, &child_shared).unwrap_err();

        assert!(matches!(err, CoreError::MergeAmbiguity { .. }));
        // Nothing happened: the child is still open and the parent entry
        // is still live, so the caller can abort or resolve and retry.
        assert_eq!(child_shared.state.get(), UowState::Open);
        let root_view = arena.lookup(root, &root_shared, &by_id("1")).unwrap().unwrap();
        assert!(root_view.is_hit());

        arena.abort(child, &child_shared).unwrap();
    }

    #[test]
    fn hooks_run_once_after_the_root_commit() {
        let arena = arena();
        let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let (root, root_shared) = arena.begin(None).unwrap();
        let (child, child_shared) = arena.begin(Some((root, &root_shared))).unwrap();

        let child_log = Arc::clone(&log);
        arena.queue_hook(child, &child_shared, Box::new(move || child_log.lock().push("child")));
        let root_log = Arc::clone(&log);
        arena.queue_hook(root, &root_shared, Box::new(move || root_log.lock().push("root")));

        arena.commit(child, &child_shared).unwrap();
        assert!(log.lock().is_empty());

        arena.commit(root, &root_shared).unwrap();
        assert_eq!(*log.lock(), vec!["child", "root"]);
    }

    #[test]
    fn hooks_queued_after_commit_run_immediately() {
        let arena = arena();
        let (root, root_shared) = arena.begin(None).unwrap();
        arena.commit(root, &root_shared).unwrap();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        arena.queue_hook(root, &root_shared, Box::new(move || flag.store(true, Ordering::Relaxed)));

        assert!(ran.load(Ordering::Relaxed));
    }

    #[test]
    fn hooks_die_with_an_aborted_tree() {
        let arena = arena();
        let (root, root_shared) = arena.begin(None).unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        arena.queue_hook(root, &root_shared, Box::new(move || flag.store(true, Ordering::Relaxed)));

        arena.abort(root, &root_shared).unwrap();
        assert!(!ran.load(Ordering::Relaxed));

        let late = Arc::clone(&ran);
        arena.queue_hook(root, &root_shared, Box::new(move || late.store(true, Ordering::Relaxed)));
        assert!(!ran.load(Ordering::Relaxed));
    }

    #[test]
    fn lookup_statistics_accumulate_on_the_probed_unit() {
        let arena = arena();
        let (root, root_shared) = arena.begin(None).unwrap();
        arena.update(root, &root_shared, value("disc"), &widget("1", "disc")).unwrap();

        arena.lookup(root, &root_shared, &by_id("1")).unwrap();
        arena.lookup(root, &root_shared, &by_id("9")).unwrap();

        let stats = arena.stats_of(root, &root_shared);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(arena.session_stats().cache_hits(), 1);
        assert_eq!(arena.session_stats().cache_misses(), 1);
    }

    #[test]
    fn nested_statistics_fold_into_the_parent_at_commit() {
        let arena = arena();
        let (root, root_shared) = arena.begin(None).unwrap();
        let (child, child_shared) = arena.begin(Some((root, &root_shared))).unwrap();
        arena.update(child, &child_shared, value("draft"), &widget("1", "draft")).unwrap();
        arena.lookup(child, &child_shared, &by_id("1")).unwrap();
        arena.record_store_read(child, &child_shared).unwrap();

        arena.commit(child, &child_shared).unwrap();

        let stats = arena.stats_of(root, &root_shared);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.store_reads, 1);
    }

    #[test]
    fn terminal_units_keep_frozen_statistics() {
        let arena = arena();
        let (root, root_shared) = arena.begin(None).unwrap();
        arena.update(root, &root_shared, value("disc"), &widget("1", "disc")).unwrap();
        arena.lookup(root, &root_shared, &by_id("1")).unwrap();
        arena.commit(root, &root_shared).unwrap();

        let stats = arena.stats_of(root, &root_shared);
        assert_eq!(stats.cache_hits, 1);
        assert!(stats.elapsed > Duration::ZERO);
    }

    #[test]
    fn store_reads_only_count_while_open() {
        let arena = arena();
        let (root, root_shared) = arena.begin(None).unwrap();
        arena.record_store_read(root, &root_shared).unwrap();
        arena
            .record_store_time(root, &root_shared, "widget", Duration::from_millis(2))
            .unwrap();
        arena.commit(root, &root_shared).unwrap();

        let err = arena.record_store_read(root, &root_shared).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyTerminal { .. }));
        let stats = arena.stats_of(root, &root_shared);
        assert_eq!(stats.store_reads, 1);
        assert_eq!(stats.store_time.get("widget"), Some(&Duration::from_millis(2)));
    }

    #[test]
    fn purposes_live_and_die_with_the_tree() {
        let arena = arena();
        let (root, root_shared) = arena.begin(None).unwrap();
        arena.set_purpose(root, &root_shared, "loading discs").unwrap();
        assert_eq!(arena.purpose_of(root).as_deref(), Some("loading discs"));

        arena.commit(root, &root_shared).unwrap();
        assert!(arena.purpose_of(root).is_none());
    }

    #[test]
    fn close_aborts_open_units_and_forgives_finished_ones() {
        let arena = arena();
        let (first, first_shared) = arena.begin(None).unwrap();
        arena.commit(first, &first_shared).unwrap();
        arena.close(first, &first_shared).unwrap();
        assert_eq!(first_shared.state.get(), UowState::Committed);

        let (second, second_shared) = arena.begin(None).unwrap();
        arena.close(second, &second_shared).unwrap();
        assert_eq!(second_shared.state.get(), UowState::Aborted);
        assert_eq!(arena.node_count(), 0);
    }
}
