//! Core type definitions for nestcache.

use std::fmt;

/// Unique identifier for a unit of work within a session.
///
/// Unit of work IDs are monotonically increasing and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UowId(pub u64);

impl UowId {
    /// Creates a new unit of work ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uow:{}", self.0)
    }
}

/// Identity token for a cached object.
///
/// Every logical object entering the cache is stamped with a fresh token,
/// and all cache entries that alias the same object share it. Alias
/// discovery during eviction compares tokens, never object values, so
/// domain types are free to define value equality however they like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectToken(pub u64);

impl ObjectToken {
    /// Creates a new object token.
    #[must_use]
    pub const fn new(token: u64) -> Self {
        Self(token)
    }

    /// Returns the raw token value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj:{}", self.0)
    }
}

/// The kind of data-access operation a facet set is being produced for.
///
/// Passed to [`Faceted::facets_for`](crate::Faceted::facets_for) so
/// producers can vary the key set per operation (an insert knows every
/// alias, a select may only know the one it queried by).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// A row is being inserted.
    Insert,
    /// A row is being updated.
    Update,
    /// A row is being read.
    Select,
    /// A row is being deleted.
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Select => "select",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}
