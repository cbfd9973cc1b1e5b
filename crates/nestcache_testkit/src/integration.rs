//! Read-through integration helpers.
//!
//! Wires a session to a [`MemoryStore`] the way a data access layer
//! would: probe the unit of work first, fall back to the store on a
//! miss, and cache whatever the store returned.

use crate::fixtures::Widget;
use crate::store::{MemoryStore, WidgetQuery};
use nestcache_core::{
    BackingStore, Facet, Faceted, Lookup, OperationKind, Session, UnitOfWork,
};
use std::sync::Arc;
use std::time::Instant;

/// The answer a read-through resolution produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// The cache or the store produced a live widget.
    Found(Widget),
    /// A tombstone answered: the widget is known deleted.
    Deleted,
    /// Neither the cache nor the store knows the widget.
    Missing,
}

/// A session wired to an in-memory store for read-through tests.
pub struct ReadThroughHarness {
    /// The cache session under test.
    pub session: Session<Widget>,
    /// The store behind it.
    pub store: Arc<MemoryStore>,
}

impl ReadThroughHarness {
    /// Creates a harness with an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    /// Creates a harness over `store`.
    #[must_use]
    pub fn with_store(store: MemoryStore) -> Self {
        Self {
            session: Session::new(),
            store: Arc::new(store),
        }
    }

    /// Seeds the store (not the cache) with `widgets`.
    pub fn seed(&self, widgets: impl IntoIterator<Item = Widget>) {
        for widget in widgets {
            self.store.insert(widget);
        }
    }

    /// Resolves `query` inside `uow`: cache first, store on a miss.
    ///
    /// Store rows are cached under their full facet sets, so later
    /// lookups by any alias hit without another round trip.
    pub fn resolve(&self, uow: &UnitOfWork<Widget>, query: &WidgetQuery) -> Resolved {
        match uow.lookup(&query.facets()).expect("Failed to probe cache") {
            Some(Lookup::Hit(value)) => return Resolved::Found((*value).clone()),
            Some(Lookup::Deleted(_)) => return Resolved::Deleted,
            None => {}
        }

        let started = Instant::now();
        let rows = self.store.execute(query).expect("Store query failed");
        uow.record_store_read().expect("Failed to record store read");
        uow.record_store_time("widget", started.elapsed())
            .expect("Failed to record store time");

        let Some(row) = rows.into_iter().next() else {
            return Resolved::Missing;
        };
        uow.update(row.clone(), &row.facets_for(OperationKind::Select))
            .expect("Failed to cache store row");
        Resolved::Found(row)
    }

    /// Deletes through the cache: evicts in `uow`, removes the store
    /// rows, and returns the invalidated facet closure.
    pub fn delete(&self, uow: &UnitOfWork<Widget>, query: &WidgetQuery) -> Vec<Facet> {
        let closure = uow.evict(&query.facets()).expect("Failed to evict");
        self.store.remove(query);
        closure
    }
}

impl Default for ReadThroughHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Isolation checks usable against any widget session.
pub mod isolation {
    use super::*;

    /// Verifies local writes stay invisible to siblings until commit.
    pub fn assert_sibling_isolation(session: &Session<Widget>) {
        let root = session.begin().expect("Failed to begin root");
        let left = root.begin_nested().expect("Failed to begin left child");
        let right = root.begin_nested().expect("Failed to begin right child");

        let widget = Widget::new("only-left");
        left.update(widget.clone(), &widget.facets_for(OperationKind::Insert))
            .expect("Failed to cache widget");

        assert!(left.lookup(&widget.by_id()).expect("Failed to probe").is_some());
        assert!(right.lookup(&widget.by_id()).expect("Failed to probe").is_none());
        assert!(root.lookup(&widget.by_id()).expect("Failed to probe").is_none());

        left.commit().expect("Failed to commit left child");
        right.commit().expect("Failed to commit right child");

        // Committed into the parent, so everyone under root sees it now.
        assert!(root.lookup(&widget.by_id()).expect("Failed to probe").is_some());
        root.commit().expect("Failed to commit root");
    }

    /// Verifies a committed child publishes to its parent, and to the
    /// session only when the whole tree commits.
    pub fn assert_upward_publication(session: &Session<Widget>) {
        let root = session.begin().expect("Failed to begin root");
        let child = root.begin_nested().expect("Failed to begin child");

        let widget = Widget::new("climber");
        child
            .update(widget.clone(), &widget.facets_for(OperationKind::Insert))
            .expect("Failed to cache widget");
        child.commit().expect("Failed to commit child");

        assert!(root.lookup(&widget.by_id()).expect("Failed to probe").is_some());
        assert!(session.lookup(&widget.by_id()).expect("Failed to probe").is_none());

        root.commit().expect("Failed to commit root");
        assert!(session.lookup(&widget.by_id()).expect("Failed to probe").is_some());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_read_hits_the_store_second_hits_the_cache() {
        let harness = ReadThroughHarness::new();
        let widget = Widget::new("disc");
        harness.seed([widget.clone()]);

        let uow = harness.session.begin().expect("Failed to begin");
        let query = WidgetQuery::ById(widget.id.to_string());

        assert_eq!(harness.resolve(&uow, &query), Resolved::Found(widget.clone()));
        assert_eq!(harness.store.executed(), 1);

        assert_eq!(harness.resolve(&uow, &query), Resolved::Found(widget));
        assert_eq!(harness.store.executed(), 1);

        let stats = uow.stats();
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.store_reads, 1);
        uow.commit().expect("Failed to commit");
    }

    #[test]
    fn store_rows_cache_under_every_alias() {
        let harness = ReadThroughHarness::new();
        let widget = Widget::new("disc");
        harness.seed([widget.clone()]);

        let uow = harness.session.begin().expect("Failed to begin");
        harness.resolve(&uow, &WidgetQuery::ById(widget.id.to_string()));

        // The other aliases were cached by the read-through, so no second
        // round trip happens.
        let by_name = WidgetQuery::ByName(widget.name.clone());
        assert_eq!(harness.resolve(&uow, &by_name), Resolved::Found(widget.clone()));
        assert_eq!(harness.store.executed(), 1);

        let combined = uow.lookup(&widget.by_ab()).expect("Failed to probe");
        assert!(combined.is_some_and(|entry| entry.is_hit()));
        uow.commit().expect("Failed to commit");
    }

    #[test]
    fn tombstones_are_authoritative_negatives() {
        let harness = ReadThroughHarness::new();
        let widget = Widget::new("disc");
        harness.seed([widget.clone()]);

        let uow = harness.session.begin().expect("Failed to begin");
        let by_id = WidgetQuery::ById(widget.id.to_string());
        harness.resolve(&uow, &by_id);
        let closure = harness.delete(&uow, &by_id);
        assert!(closure.iter().any(|f| f.name() == "name"));
        assert!(closure.iter().any(|f| f.name() == "a.b"));

        // Deleted, not Missing: the tombstone answers before the store.
        assert_eq!(harness.resolve(&uow, &by_id), Resolved::Deleted);
        let by_name = WidgetQuery::ByName(widget.name.clone());
        assert_eq!(harness.resolve(&uow, &by_name), Resolved::Deleted);
        let combined = uow.lookup(&widget.by_ab()).expect("Failed to probe");
        assert!(matches!(combined, Some(Lookup::Deleted(_))));
        assert_eq!(harness.store.executed(), 1);
        uow.commit().expect("Failed to commit");
    }

    #[test]
    fn missing_rows_stay_missing() {
        let harness = ReadThroughHarness::new();
        let uow = harness.session.begin().expect("Failed to begin");
        let query = WidgetQuery::ByName("nobody".to_owned());

        assert_eq!(harness.resolve(&uow, &query), Resolved::Missing);
        // A miss is not cached, so the store is consulted again.
        assert_eq!(harness.resolve(&uow, &query), Resolved::Missing);
        assert_eq!(harness.store.executed(), 2);
        uow.commit().expect("Failed to commit");
    }

    #[test]
    fn sibling_isolation_holds() {
        let harness = ReadThroughHarness::new();
        isolation::assert_sibling_isolation(&harness.session);
    }

    #[test]
    fn upward_publication_holds() {
        let harness = ReadThroughHarness::new();
        isolation::assert_upward_publication(&harness.session);
    }
}
