//! The two-dimensional cache table.

use crate::cache::entry::{CacheEntry, CachedObject};
use crate::error::CoreResult;
use crate::facet::{collection_of, ColumnKey, Facet};
use crate::types::ObjectToken;
use std::collections::HashMap;

/// A facet-keyed cache table.
///
/// Rows are collections (derived from the fixed facets), columns are the
/// lookup keys derived from non-fixed facets. One logical object occupies
/// as many cells of its row as it has lookup facets, all sharing one
/// [`CachedObject`] and therefore one identity token.
///
/// Tables are plain data; every unit of work owns one and the session owns
/// the process-wide one. Synchronization lives with the owners.
#[derive(Debug)]
pub struct CacheTable<V> {
    rows: HashMap<String, HashMap<ColumnKey, CacheEntry<V>>>,
}

impl<V> CacheTable<V> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: HashMap::new(),
        }
    }

    /// Returns whether the table holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.values().all(HashMap::is_empty)
    }

    /// Returns the total number of entries across all rows.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.rows.values().map(HashMap::len).sum()
    }

    /// Returns the number of collections with at least one entry.
    #[must_use]
    pub fn collection_count(&self) -> usize {
        self.rows.values().filter(|row| !row.is_empty()).count()
    }

    /// Probes the table with a facet set.
    ///
    /// The first non-fixed facet with an entry wins. The update and evict
    /// protocols keep every key of one logical row consistent, so which
    /// alias answers is immaterial.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFacets`](crate::error::CoreError::InvalidFacets)
    /// if the facet set names no collection.
    pub fn probe(&self, facets: &[Facet]) -> CoreResult<Option<&CacheEntry<V>>> {
        let collection = collection_of(facets)?;
        let Some(row) = self.rows.get(&collection) else {
            return Ok(None);
        };
        for facet in facets.iter().filter(|f| !f.is_fixed()) {
            if let Some(entry) = row.get(&ColumnKey::of(facet)) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Stores a live object at every non-fixed key of `facets`.
    ///
    /// Existing entries at those keys are replaced, tombstones included: a
    /// fresh write is newer information than a recorded deletion.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFacets`](crate::error::CoreError::InvalidFacets)
    /// if the facet set names no collection.
    pub fn store(&mut self, object: &CachedObject<V>, facets: &[Facet]) -> CoreResult<()> {
        let collection = collection_of(facets)?;
        let row = self.rows.entry(collection).or_default();
        for facet in facets.iter().filter(|f| !f.is_fixed()) {
            row.insert(ColumnKey::of(facet), CacheEntry::Live(object.clone()));
        }
        Ok(())
    }

    /// Collects the lookup facets of every live entry in `collection`
    /// whose token equals `token`.
    pub fn sweep_aliases(&self, collection: &str, token: ObjectToken) -> Vec<Facet> {
        let Some(row) = self.rows.get(collection) else {
            return Vec::new();
        };
        let mut aliases: Vec<Facet> = row
            .iter()
            .filter(|(_, entry)| entry.as_live().is_some_and(|o| o.token() == token))
            .map(|(key, _)| key.to_facet())
            .collect();
        aliases.sort_by(|a, b| (a.name(), a.value()).cmp(&(b.name(), b.value())));
        aliases
    }

    /// Writes a tombstone carrying `closure` at every non-fixed key of the
    /// closure.
    pub fn write_tombstones(&mut self, collection: &str, closure: &[Facet]) {
        let row = self.rows.entry(collection.to_owned()).or_default();
        for facet in closure.iter().filter(|f| !f.is_fixed()) {
            row.insert(ColumnKey::of(facet), CacheEntry::Tombstone(closure.to_vec()));
        }
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Iterates all `(collection, column, entry)` coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnKey, &CacheEntry<V>)> {
        self.rows.iter().flat_map(|(collection, row)| {
            row.iter()
                .map(move |(key, entry)| (collection.as_str(), key, entry))
        })
    }

    pub(crate) fn row(&self, collection: &str) -> Option<&HashMap<ColumnKey, CacheEntry<V>>> {
        self.rows.get(collection)
    }

    pub(crate) fn row_mut(&mut self, collection: &str) -> &mut HashMap<ColumnKey, CacheEntry<V>> {
        self.rows.entry(collection.to_owned()).or_default()
    }

    pub(crate) fn into_rows(
        self,
    ) -> impl Iterator<Item = (String, HashMap<ColumnKey, CacheEntry<V>>)> {
        self.rows.into_iter()
    }
}

impl<V> Default for CacheTable<V> {
    fn default() -> Self {
        Self::new()
    }
}
