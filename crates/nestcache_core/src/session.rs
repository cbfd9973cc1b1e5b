//! The process-level session owning the shared cache and every tree.

use crate::cache::{Lookup, PreferIncoming, ValueMerge};
use crate::config::Config;
use crate::error::CoreResult;
use crate::facet::Facet;
use crate::stats::SessionStatsSnapshot;
use crate::uow::arena::UowArena;
use crate::uow::UnitOfWork;
use std::sync::Arc;

/// One cache domain: a process-wide cache table plus the unit-of-work
/// trees feeding it.
///
/// Sessions are cheap to clone; clones share the same caches, so a
/// session can be handed to as many threads as needed.
pub struct Session<V> {
    arena: Arc<UowArena<V>>,
}

impl<V: Clone> Session<V> {
    /// Creates a session with the default configuration and the default
    /// reconciler (the committing side wins live-versus-live merges).
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a session with `config` and the default reconciler.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self::with_reconciler(config, PreferIncoming)
    }
}

impl<V> Session<V> {
    /// Creates a session with a domain-specific reconciler for
    /// live-versus-live merge collisions.
    pub fn with_reconciler(config: Config, reconciler: impl ValueMerge<V> + 'static) -> Self {
        Self {
            arena: Arc::new(UowArena::new(config, Arc::new(reconciler))),
        }
    }

    /// Opens a new root unit of work.
    ///
    /// # Errors
    ///
    /// Does not fail today; the `Result` keeps the signature uniform with
    /// [`UnitOfWork::begin_nested`].
    pub fn begin(&self) -> CoreResult<UnitOfWork<V>> {
        let (id, shared) = self.arena.begin(None)?;
        Ok(UnitOfWork::new(id, shared, Arc::clone(&self.arena)))
    }

    /// Runs `f` inside a fresh root unit: commits when `f` returns `Ok`,
    /// aborts when it returns `Err`.
    ///
    /// The closure must leave finishing the unit to this method.
    ///
    /// # Errors
    ///
    /// Returns `f`'s error after aborting, or the commit's own error.
    pub fn scope<T>(&self, f: impl FnOnce(&UnitOfWork<V>) -> CoreResult<T>) -> CoreResult<T> {
        let uow = self.begin()?;
        match f(&uow) {
            Ok(value) => {
                uow.commit()?;
                Ok(value)
            }
            Err(err) => {
                let _ = uow.close();
                Err(err)
            }
        }
    }

    /// Probes the process-wide cache, outside any unit of work.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidFacets` when the facets name no collection.
    pub fn lookup(&self, facets: &[Facet]) -> CoreResult<Option<Lookup<V>>> {
        self.arena.session_lookup(facets)
    }

    /// The session's configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        self.arena.config()
    }

    /// A point-in-time copy of the session counters.
    #[must_use]
    pub fn stats(&self) -> SessionStatsSnapshot {
        self.arena.session_stats().snapshot()
    }

    /// How many entries the process-wide cache currently holds.
    #[must_use]
    pub fn cached_entries(&self) -> usize {
        self.arena.session_entry_count()
    }
}

impl<V> Clone for Session<V> {
    fn clone(&self) -> Self {
        Self {
            arena: Arc::clone(&self.arena),
        }
    }
}

impl<V: Clone> Default for Session<V> {
    fn default() -> Self {
        Self::new()
    }
}
