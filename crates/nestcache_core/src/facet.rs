//! Facets: the key descriptors domain layers use to address cached rows.
//!
//! A facet binds a key name to a key value. *Fixed* facets carry structural
//! identity (they name the collection a row belongs to) and never form
//! lookup keys; non-fixed facets each describe one independent path by
//! which the same logical row can be found, such as a primary key or a
//! unique index value.

use crate::error::{CoreError, CoreResult};
use crate::types::OperationKind;
use std::fmt;

/// A single key descriptor: a name bound to a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Facet {
    name: String,
    value: String,
    fixed: bool,
}

impl Facet {
    /// Creates a lookup facet (one cache key path).
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            fixed: false,
        }
    }

    /// Creates a fixed facet (collection identity, excluded from key
    /// construction).
    #[must_use]
    pub fn fixed(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            fixed: true,
        }
    }

    /// Returns the facet name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the facet value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns whether this facet is fixed.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=={}", self.name, self.value)
    }
}

/// The column coordinate of the cache table, derived from one non-fixed
/// facet.
///
/// Kept structured rather than as a concatenated string so the facet can
/// be recovered from the key without parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnKey {
    name: String,
    value: String,
}

impl ColumnKey {
    /// Derives the column key of a non-fixed facet.
    #[must_use]
    pub fn of(facet: &Facet) -> Self {
        Self {
            name: facet.name.clone(),
            value: facet.value.clone(),
        }
    }

    /// Returns the key name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the key value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Recovers the lookup facet this key was derived from.
    #[must_use]
    pub fn to_facet(&self) -> Facet {
        Facet::new(self.name.clone(), self.value.clone())
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=={}", self.name, self.value)
    }
}

/// Derives the collection (row key) a facet set addresses: the values of
/// its fixed facets joined with `.`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidFacets`] if the set is empty or carries no
/// fixed facet, both of which violate the facet producer contract.
pub fn collection_of(facets: &[Facet]) -> CoreResult<String> {
    if facets.is_empty() {
        return Err(CoreError::invalid_facets("facet set is empty"));
    }
    let mut parts = facets.iter().filter(|f| f.is_fixed()).map(Facet::value);
    let first = parts
        .next()
        .ok_or_else(|| CoreError::invalid_facets("facet set names no collection (no fixed facet)"))?;
    let mut name = String::from(first);
    for part in parts {
        name.push('.');
        name.push_str(part);
    }
    Ok(name)
}

/// Unions two facet sets, preserving `first`'s order and deduplicating.
pub(crate) fn union_facets(first: &[Facet], second: &[Facet]) -> Vec<Facet> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(first.len() + second.len());
    for facet in first.iter().chain(second) {
        if seen.insert(facet.clone()) {
            out.push(facet.clone());
        }
    }
    out
}

/// The facet producer contract.
///
/// Domain layers implement this next to their entity mapping: given an
/// object and the operation being performed, produce every facet the
/// operation touches. The set must be deterministic for a given object and
/// operation, and must mark exactly the collection-identifying facets as
/// fixed.
pub trait Faceted {
    /// Produces the facet set for `op` on this object.
    fn facets_for(&self, op: OperationKind) -> Vec<Facet>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_from_single_fixed_facet() {
        let facets = vec![Facet::fixed("table", "widget"), Facet::new("id", "1")];
        assert_eq!(collection_of(&facets).unwrap(), "widget");
    }

    #[test]
    fn collection_joins_fixed_values() {
        let facets = vec![
            Facet::fixed("keyspace", "shop"),
            Facet::fixed("table", "widget"),
            Facet::new("id", "1"),
        ];
        assert_eq!(collection_of(&facets).unwrap(), "shop.widget");
    }

    #[test]
    fn empty_facet_set_is_rejected() {
        let err = collection_of(&[]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFacets { .. }));
    }

    #[test]
    fn missing_fixed_facet_is_rejected() {
        let facets = vec![Facet::new("id", "1"), Facet::new("name", "a")];
        let err = collection_of(&facets).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFacets { .. }));
    }

    #[test]
    fn column_key_round_trips_to_facet() {
        let facet = Facet::new("name", "gadget");
        let key = ColumnKey::of(&facet);
        assert_eq!(format!("{key}"), "name==gadget");
        assert_eq!(key.to_facet(), facet);
    }

    #[test]
    fn union_preserves_order_and_dedups() {
        let first = vec![Facet::fixed("table", "widget"), Facet::new("id", "1")];
        let second = vec![Facet::new("id", "1"), Facet::new("name", "a")];
        let union = union_facets(&first, &second);
        assert_eq!(
            union,
            vec![
                Facet::fixed("table", "widget"),
                Facet::new("id", "1"),
                Facet::new("name", "a"),
            ]
        );
    }
}
