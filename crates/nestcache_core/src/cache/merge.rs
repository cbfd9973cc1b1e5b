//! Cache merge: folding a committed table into the level above.
//!
//! A child's table merges into its parent at commit; a root's table merges
//! into the process-wide session cache. The algorithm is coordinate-wise,
//! with one wrinkle: when both sides hold a live version of the same
//! logical row, the reconciled object is minted once per row and reused at
//! every alias, so the merged row still points at a single object.

use crate::cache::entry::{CacheEntry, CachedObject};
use crate::cache::table::CacheTable;
use crate::error::{CoreError, CoreResult};
use crate::facet::union_facets;
use crate::types::ObjectToken;
use std::collections::HashMap;
use std::sync::Arc;

/// How a merge resolves a live entry colliding with a tombstone at the
/// same coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// The tombstone survives: a recorded deletion must not be resurrected
    /// by a stale live value. This is the default.
    TombstoneWins,
    /// The live entry survives.
    LiveWins,
    /// Surface the collision as
    /// [`CoreError::MergeAmbiguity`](crate::error::CoreError::MergeAmbiguity).
    Reject,
}

/// Domain reconciliation of two live versions of one logical object.
///
/// Called once per logical row when a merge finds both sides live. The
/// session holds one reconciler and threads it through every merge.
pub trait ValueMerge<V>: Send + Sync {
    /// Returns the value the merged cache should keep, given the resident
    /// version (`into`) and the committing version (`from`).
    fn merge(&self, into: &V, from: &V) -> V;
}

impl<V, F> ValueMerge<V> for F
where
    F: Fn(&V, &V) -> V + Send + Sync,
{
    fn merge(&self, into: &V, from: &V) -> V {
        self(into, from)
    }
}

/// The default reconciler: the committing side wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferIncoming;

impl<V: Clone> ValueMerge<V> for PreferIncoming {
    fn merge(&self, _into: &V, from: &V) -> V {
        from.clone()
    }
}

impl<V> CacheTable<V> {
    /// Merges `from` into this table.
    ///
    /// Coordinates absent here are copied verbatim, identity tokens
    /// included. Live-versus-live coordinates go through `reconciler`,
    /// memoized per token pair so aliases stay aliased. Live-versus-
    /// tombstone coordinates follow `policy`, and two tombstones union
    /// their facet closures.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MergeAmbiguity`] under [`MergePolicy::Reject`]
    /// when a live entry and a tombstone collide. Coordinates merged
    /// before the collision keep their merged values.
    pub fn merge_from(
        &mut self,
        from: CacheTable<V>,
        policy: MergePolicy,
        reconciler: &dyn ValueMerge<V>,
        mut next_token: impl FnMut() -> ObjectToken,
    ) -> CoreResult<()> {
        // One reconciled object per (resident, incoming) token pair.
        let mut minted: HashMap<(ObjectToken, ObjectToken), CachedObject<V>> = HashMap::new();
        for (collection, row) in from.into_rows() {
            let into_row = self.row_mut(&collection);
            for (column, incoming) in row {
                let resolved = match (into_row.get(&column), incoming) {
                    (None, incoming) => Some(incoming),
                    (Some(CacheEntry::Live(mine)), CacheEntry::Live(theirs)) => {
                        let object = minted
                            .entry((mine.token(), theirs.token()))
                            .or_insert_with(|| {
                                let value =
                                    reconciler.merge(mine.value().as_ref(), theirs.value().as_ref());
                                CachedObject::new(next_token(), Arc::new(value))
                            })
                            .clone();
                        Some(CacheEntry::Live(object))
                    }
                    (Some(CacheEntry::Live(_)), CacheEntry::Tombstone(closure)) => match policy {
                        MergePolicy::TombstoneWins => Some(CacheEntry::Tombstone(closure)),
                        MergePolicy::LiveWins => None,
                        MergePolicy::Reject => {
                            return Err(CoreError::merge_ambiguity(collection, column.to_string()))
                        }
                    },
                    (Some(CacheEntry::Tombstone(_)), CacheEntry::Live(theirs)) => match policy {
                        MergePolicy::TombstoneWins => None,
                        MergePolicy::LiveWins => Some(CacheEntry::Live(theirs)),
                        MergePolicy::Reject => {
                            return Err(CoreError::merge_ambiguity(collection, column.to_string()))
                        }
                    },
                    (Some(CacheEntry::Tombstone(mine)), CacheEntry::Tombstone(theirs)) => {
                        Some(CacheEntry::Tombstone(union_facets(mine, &theirs)))
                    }
                };
                if let Some(entry) = resolved {
                    into_row.insert(column, entry);
                }
            }
        }
        Ok(())
    }

    /// Finds a coordinate where merging `from` into this table would pit
    /// a live entry against a tombstone, if any exists.
    ///
    /// Commit runs this under [`MergePolicy::Reject`] before touching
    /// either table, so a rejected merge fails with no side effects and
    /// the caller can retry or abort with both tables intact.
    pub(crate) fn first_collision(&self, from: &CacheTable<V>) -> Option<(String, String)> {
        for (collection, column, incoming) in from.iter() {
            let Some(resident) = self.row(collection).and_then(|row| row.get(column)) else {
                continue;
            };
            match (resident, incoming) {
                (CacheEntry::Live(_), CacheEntry::Tombstone(_))
                | (CacheEntry::Tombstone(_), CacheEntry::Live(_)) => {
                    return Some((collection.to_owned(), column.to_string()));
                }
                _ => {}
            }
        }
        None
    }
}
