//! Cache entry types.

use crate::facet::Facet;
use crate::types::ObjectToken;
use std::sync::Arc;

/// A live cached value together with its identity token.
///
/// Every cache entry written for one logical row shares the same token, so
/// two entries alias the same object exactly when their tokens are equal.
#[derive(Debug)]
pub struct CachedObject<V> {
    token: ObjectToken,
    value: Arc<V>,
}

impl<V> CachedObject<V> {
    /// Creates a cached object from a token and a shared value.
    #[must_use]
    pub fn new(token: ObjectToken, value: Arc<V>) -> Self {
        Self { token, value }
    }

    /// Returns the identity token.
    #[must_use]
    pub fn token(&self) -> ObjectToken {
        self.token
    }

    /// Returns the shared value.
    #[must_use]
    pub fn value(&self) -> &Arc<V> {
        &self.value
    }
}

// Manual impl: `V` itself need not be `Clone`, the `Arc` is shared.
impl<V> Clone for CachedObject<V> {
    fn clone(&self) -> Self {
        Self {
            token: self.token,
            value: Arc::clone(&self.value),
        }
    }
}

/// One cell of a cache table.
#[derive(Debug)]
pub enum CacheEntry<V> {
    /// A cached value, present and current as far as this unit knows.
    Live(CachedObject<V>),
    /// A recorded deletion. The payload is the full facet closure that was
    /// invalidated, so callers can learn every alias the deletion covered.
    Tombstone(Vec<Facet>),
}

impl<V> CacheEntry<V> {
    /// Returns whether this entry is live.
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    /// Returns whether this entry is a tombstone.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Self::Tombstone(_))
    }

    /// Returns the live object, if this entry is live.
    #[must_use]
    pub fn as_live(&self) -> Option<&CachedObject<V>> {
        match self {
            Self::Live(object) => Some(object),
            Self::Tombstone(_) => None,
        }
    }

    /// Returns the tombstone closure, if this entry is a tombstone.
    #[must_use]
    pub fn as_tombstone(&self) -> Option<&[Facet]> {
        match self {
            Self::Live(_) => None,
            Self::Tombstone(facets) => Some(facets),
        }
    }

    /// Converts this entry into the answer a probe hands back, dropping
    /// the identity token live entries carry internally.
    #[must_use]
    pub fn to_lookup(&self) -> Lookup<V> {
        match self {
            Self::Live(object) => Lookup::Hit(Arc::clone(object.value())),
            Self::Tombstone(facets) => Lookup::Deleted(facets.clone()),
        }
    }
}

impl<V> Clone for CacheEntry<V> {
    fn clone(&self) -> Self {
        match self {
            Self::Live(object) => Self::Live(object.clone()),
            Self::Tombstone(facets) => Self::Tombstone(facets.clone()),
        }
    }
}

/// The outcome of a cache probe that found something.
///
/// A probe returns `Option<Lookup<V>>`: `None` means the cache knows
/// nothing and the caller should consult the backing store, while
/// `Some(Lookup::Deleted(..))` is an authoritative negative. Conflating
/// the two turns every delete into a phantom read.
#[derive(Debug)]
pub enum Lookup<V> {
    /// Found a live value.
    Hit(Arc<V>),
    /// Found a deletion marker; the payload is its facet closure.
    Deleted(Vec<Facet>),
}

impl<V> Lookup<V> {
    /// Returns whether this is a live hit.
    #[must_use]
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    /// Returns whether this found a deletion marker.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted(_))
    }

    /// Returns the live value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&Arc<V>> {
        match self {
            Self::Hit(value) => Some(value),
            Self::Deleted(_) => None,
        }
    }
}

impl<V> Clone for Lookup<V> {
    fn clone(&self) -> Self {
        match self {
            Self::Hit(value) => Self::Hit(Arc::clone(value)),
            Self::Deleted(facets) => Self::Deleted(facets.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_shares_the_value() {
        let object = CachedObject::new(ObjectToken::new(1), Arc::new("widget"));
        let copy = object.clone();
        assert!(Arc::ptr_eq(object.value(), copy.value()));
        assert_eq!(object.token(), copy.token());
    }

    #[test]
    fn entry_accessors() {
        let object = CachedObject::new(ObjectToken::new(1), Arc::new(42));
        let live: CacheEntry<i32> = CacheEntry::Live(object);
        assert!(live.is_live());
        assert!(live.as_tombstone().is_none());

        let dead: CacheEntry<i32> = CacheEntry::Tombstone(vec![Facet::new("id", "1")]);
        assert!(dead.is_tombstone());
        assert_eq!(dead.as_tombstone().unwrap().len(), 1);
    }

    #[test]
    fn lookup_distinguishes_hit_from_deleted() {
        let hit: Lookup<i32> = Lookup::Hit(Arc::new(7));
        assert!(hit.is_hit());
        assert_eq!(**hit.value().unwrap(), 7);

        let deleted: Lookup<i32> = Lookup::Deleted(vec![Facet::new("id", "1")]);
        assert!(deleted.is_deleted());
        assert!(deleted.value().is_none());
    }
}
