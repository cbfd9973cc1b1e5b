//! Test fixtures and session helpers.
//!
//! Provides a sample `Widget` entity with a deterministic facet mapping,
//! plus closure helpers for tests that need a ready-made session.

use nestcache_core::{Facet, Faceted, OperationKind, Session, UnitOfWork};
use uuid::Uuid;

/// A sample record with several distinct constraints: cached by id, by
/// name and by the combined `(a, b)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Widget {
    /// Stable identifier, unique per widget.
    pub id: Uuid,
    /// Display name, unique per widget in these fixtures.
    pub name: String,
    /// First half of the combined `(a, b)` lookup pair.
    pub a: String,
    /// Second half of the combined `(a, b)` lookup pair.
    pub b: String,
    /// Plain column, never a lookup path on its own.
    pub c: String,
    /// Plain column, never a lookup path on its own.
    pub d: String,
}

impl Widget {
    /// Creates a widget with a fresh random id and columns derived from
    /// `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: Uuid::new_v4(),
            a: format!("{name}-a"),
            b: format!("{name}-b"),
            c: format!("{name}-c"),
            d: format!("{name}-d"),
            name,
        }
    }

    /// The full facet set: the collection facet plus all three aliases.
    #[must_use]
    pub fn all_facets(&self) -> Vec<Facet> {
        vec![
            Facet::fixed("table", "widget"),
            Facet::new("id", self.id.to_string()),
            Facet::new("name", self.name.clone()),
            self.ab_facet(),
        ]
    }

    /// The synthetic facet for the combined `(a, b)` pair, which forms a
    /// single lookup path.
    #[must_use]
    pub fn ab_facet(&self) -> Facet {
        Facet::new("a.b", format!("{}.{}", self.a, self.b))
    }

    /// Facets addressing this widget by id only.
    #[must_use]
    pub fn by_id(&self) -> Vec<Facet> {
        widget_by_id(&self.id.to_string())
    }

    /// Facets addressing this widget by name only.
    #[must_use]
    pub fn by_name(&self) -> Vec<Facet> {
        widget_by_name(&self.name)
    }

    /// Facets addressing this widget by the combined pair only.
    #[must_use]
    pub fn by_ab(&self) -> Vec<Facet> {
        vec![Facet::fixed("table", "widget"), self.ab_facet()]
    }
}

impl Faceted for Widget {
    fn facets_for(&self, op: OperationKind) -> Vec<Facet> {
        match op {
            // Deletions address the primary key; eviction discovers the
            // remaining aliases through the identity token.
            OperationKind::Delete => self.by_id(),
            _ => self.all_facets(),
        }
    }
}

/// Facets addressing a widget row by id.
#[must_use]
pub fn widget_by_id(id: &str) -> Vec<Facet> {
    vec![Facet::fixed("table", "widget"), Facet::new("id", id)]
}

/// Facets addressing a widget row by name.
#[must_use]
pub fn widget_by_name(name: &str) -> Vec<Facet> {
    vec![Facet::fixed("table", "widget"), Facet::new("name", name)]
}

/// Creates a session over `Widget` values with the default configuration.
#[must_use]
pub fn widget_session() -> Session<Widget> {
    Session::new()
}

/// Runs `f` with a fresh widget session.
pub fn with_session<F, R>(f: F) -> R
where
    F: FnOnce(&Session<Widget>) -> R,
{
    let session = widget_session();
    f(&session)
}

/// Runs `f` with an open root unit of a fresh session.
///
/// The unit is closed afterwards, which aborts it unless `f` already
/// finished it.
pub fn with_open_uow<F, R>(f: F) -> R
where
    F: FnOnce(&UnitOfWork<Widget>) -> R,
{
    with_session(|session| {
        let uow = session.begin().expect("Failed to begin root unit");
        let result = f(&uow);
        uow.close().expect("Failed to close root unit");
        result
    })
}

/// Installs a test subscriber that honors `RUST_LOG`.
///
/// Safe to call from every test; repeated calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Ready-made cache populations for tests that need existing state.
pub mod scenarios {
    use super::*;

    /// A session whose shared cache already holds `count` committed
    /// widgets, returned alongside the widgets themselves.
    pub fn populated_session(count: usize) -> (Session<Widget>, Vec<Widget>) {
        let session = widget_session();
        let widgets: Vec<Widget> = (0..count)
            .map(|i| Widget::new(format!("widget-{i}")))
            .collect();

        let uow = session.begin().expect("Failed to begin root unit");
        for widget in &widgets {
            uow.update(widget.clone(), &widget.facets_for(OperationKind::Insert))
                .expect("Failed to cache widget");
        }
        uow.commit().expect("Failed to commit population");

        (session, widgets)
    }

    /// A session caching `per_collection` widgets and as many gadgets,
    /// in separate collections.
    pub fn multi_collection_session(per_collection: usize) -> Session<Widget> {
        let session = widget_session();
        let uow = session.begin().expect("Failed to begin root unit");
        for i in 0..per_collection {
            let widget = Widget::new(format!("widget-{i}"));
            uow.update(widget.clone(), &widget.facets_for(OperationKind::Insert))
                .expect("Failed to cache widget");

            let gadget = Widget::new(format!("gadget-{i}"));
            let facets = vec![
                Facet::fixed("table", "gadget"),
                Facet::new("id", gadget.id.to_string()),
                Facet::new("name", gadget.name.clone()),
            ];
            uow.update(gadget, &facets).expect("Failed to cache gadget");
        }
        uow.commit().expect("Failed to commit population");
        session
    }
}
