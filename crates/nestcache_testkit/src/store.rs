//! An in-memory backing store with query accounting.
//!
//! Stands in for the persistent store behind the cache: rows are
//! [`Widget`]s, queries address them by id or by name, and every
//! execution is counted so tests can assert how often the cache failed
//! to answer on its own.

use crate::fixtures::{widget_by_id, widget_by_name, Widget};
use nestcache_core::{BackingStore, Facet, StoreError, StoreResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// The queries the in-memory store understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetQuery {
    /// Select the widget whose id matches.
    ById(String),
    /// Select the widget whose name matches.
    ByName(String),
    /// Select every widget.
    All,
}

impl WidgetQuery {
    /// Whether `widget` satisfies this query.
    #[must_use]
    pub fn matches(&self, widget: &Widget) -> bool {
        match self {
            Self::ById(id) => widget.id.to_string() == *id,
            Self::ByName(name) => widget.name == *name,
            Self::All => true,
        }
    }

    /// The cache facets equivalent to this query.
    ///
    /// `All` has no single-object equivalent; its facet set carries only
    /// the collection, which the cache answers with a miss.
    #[must_use]
    pub fn facets(&self) -> Vec<Facet> {
        match self {
            Self::ById(id) => widget_by_id(id),
            Self::ByName(name) => widget_by_name(name),
            Self::All => vec![Facet::fixed("table", "widget")],
        }
    }
}

/// An in-memory [`BackingStore`] over [`Widget`] rows.
///
/// Thread-safe so read-through harnesses can share one store across
/// concurrent units of work.
pub struct MemoryStore {
    rows: Mutex<Vec<Widget>>,
    executed: AtomicU64,
    fail_next: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rows(Vec::new())
    }

    /// Creates a store seeded with `rows`.
    #[must_use]
    pub fn with_rows(rows: Vec<Widget>) -> Self {
        Self {
            rows: Mutex::new(rows),
            executed: AtomicU64::new(0),
            fail_next: AtomicBool::new(false),
        }
    }

    /// Adds a row.
    pub fn insert(&self, widget: Widget) {
        self.rows.lock().push(widget);
    }

    /// Removes the rows matching `query`, returning how many went away.
    pub fn remove(&self, query: &WidgetQuery) -> usize {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|widget| !query.matches(widget));
        before - rows.len()
    }

    /// How many queries have been executed successfully.
    #[must_use]
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    /// How many rows the store currently holds.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }

    /// Makes the next execution fail with [`StoreError::Unavailable`].
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::Relaxed);
    }
}

impl BackingStore for MemoryStore {
    type Query = WidgetQuery;
    type Row = Widget;

    fn execute(&self, query: &WidgetQuery) -> StoreResult<Vec<Widget>> {
        if self.fail_next.swap(false, Ordering::Relaxed) {
            return Err(StoreError::unavailable("store offline (requested by test)"));
        }
        self.executed.fetch_add(1, Ordering::Relaxed);
        let rows = self.rows.lock();
        Ok(rows.iter().filter(|w| query.matches(w)).cloned().collect())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestcache_core::collection_of;

    #[test]
    fn queries_match_by_id_and_name() {
        let widget = Widget::new("disc");
        assert!(WidgetQuery::ById(widget.id.to_string()).matches(&widget));
        assert!(WidgetQuery::ByName("disc".to_owned()).matches(&widget));
        assert!(!WidgetQuery::ByName("other".to_owned()).matches(&widget));
        assert!(WidgetQuery::All.matches(&widget));
    }

    #[test]
    fn query_facets_address_the_widget_collection() {
        for query in [
            WidgetQuery::ById("1".to_owned()),
            WidgetQuery::ByName("disc".to_owned()),
            WidgetQuery::All,
        ] {
            let facets = query.facets();
            assert_eq!(collection_of(&facets).expect("collection"), "widget");
        }
    }

    #[test]
    fn execute_counts_round_trips() {
        let store = MemoryStore::with_rows(vec![Widget::new("a"), Widget::new("b")]);
        assert_eq!(store.executed(), 0);

        let rows = store.execute(&WidgetQuery::All).expect("Failed to query");
        assert_eq!(rows.len(), 2);
        let rows = store
            .execute(&WidgetQuery::ByName("a".to_owned()))
            .expect("Failed to query");
        assert_eq!(rows.len(), 1);
        assert_eq!(store.executed(), 2);
    }

    #[test]
    fn fail_next_fails_exactly_once() {
        let store = MemoryStore::new();
        store.fail_next();
        assert!(store.execute(&WidgetQuery::All).is_err());
        assert!(store.execute(&WidgetQuery::All).is_ok());
    }

    #[test]
    fn failed_executions_are_not_counted() {
        let store = MemoryStore::new();
        store.fail_next();
        let _ = store.execute(&WidgetQuery::All);
        assert_eq!(store.executed(), 0);
    }

    #[test]
    fn remove_drops_matching_rows() {
        let store = MemoryStore::with_rows(vec![Widget::new("a"), Widget::new("b")]);
        assert_eq!(store.remove(&WidgetQuery::ByName("a".to_owned())), 1);
        assert_eq!(store.row_count(), 1);
    }
}
