//! Property-based test generators using proptest.
//!
//! Provides strategies for generating facets, widgets and operation
//! sequences that maintain the facet producer contract.

use crate::fixtures::Widget;
use nestcache_core::Facet;
use proptest::prelude::*;
use uuid::Uuid;

/// Strategy for generating valid facet names.
pub fn facet_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating facet values.
pub fn facet_value_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9][a-zA-Z0-9_-]{0,23}").expect("Invalid regex")
}

/// Strategy for generating a single lookup (non-fixed) facet.
pub fn lookup_facet_strategy() -> impl Strategy<Value = Facet> {
    (facet_name_strategy(), facet_value_strategy())
        .prop_map(|(name, value)| Facet::new(name, value))
}

/// Strategy for generating a full widget facet set: the fixed collection
/// facet plus one to three lookup facets with distinct names.
pub fn facet_set_strategy() -> impl Strategy<Value = Vec<Facet>> {
    prop::collection::btree_map(facet_name_strategy(), facet_value_strategy(), 1..4).prop_map(
        |columns| {
            let mut facets = vec![Facet::fixed("table", "widget")];
            facets.extend(columns.into_iter().map(|(n, v)| Facet::new(n, v)));
            facets
        },
    )
}

/// Strategy for generating widgets with stable ids.
pub fn widget_strategy() -> impl Strategy<Value = Widget> {
    (any::<u128>(), facet_value_strategy()).prop_map(|(raw, name)| {
        let mut widget = Widget::new(name);
        widget.id = Uuid::from_u128(raw);
        widget
    })
}

/// One cache operation in a generated sequence.
#[derive(Debug, Clone)]
pub enum CacheOperation {
    /// Cache a value
    Update {
        /// Facets to cache under
        facets: Vec<Facet>,
        /// Payload to cache
        payload: String,
    },
    /// Record a deletion
    Evict {
        /// Facets naming the victim
        facets: Vec<Facet>,
    },
    /// Probe the cache
    Lookup {
        /// Facets to probe with
        facets: Vec<Facet>,
    },
}

/// Strategy for generating cache operations.
pub fn cache_operation_strategy() -> impl Strategy<Value = CacheOperation> {
    prop_oneof![
        3 => (facet_set_strategy(), facet_value_strategy())
            .prop_map(|(facets, payload)| CacheOperation::Update { facets, payload }),
        1 => facet_set_strategy().prop_map(|facets| CacheOperation::Evict { facets }),
        2 => facet_set_strategy().prop_map(|facets| CacheOperation::Lookup { facets }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<CacheOperation>> {
    prop::collection::vec(cache_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
