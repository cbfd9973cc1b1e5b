//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use nestcache_core::{Config, Facet, Session, UnitOfWork};

/// The benches cache plain text payloads.
pub type BenchSession = Session<String>;

/// A default configuration with summary logging off, so the subscriber
/// never shows up in the measurements.
#[must_use]
pub fn quiet_config() -> Config {
    Config::new().log_summaries(false)
}

/// A session with [`quiet_config`].
#[must_use]
pub fn quiet_session() -> BenchSession {
    Session::with_config(quiet_config())
}

/// The facet set of the `i`th benchmark object: the collection facet
/// plus two lookup aliases.
#[must_use]
pub fn bench_facets(i: usize) -> Vec<Facet> {
    vec![
        Facet::fixed("table", "bench"),
        Facet::new("id", i.to_string()),
        Facet::new("name", format!("object-{i}")),
    ]
}

/// Facets addressing the `i`th benchmark object by id only.
#[must_use]
pub fn bench_by_id(i: usize) -> Vec<Facet> {
    vec![Facet::fixed("table", "bench"), Facet::new("id", i.to_string())]
}

/// A payload of `size` bytes of printable text.
#[must_use]
pub fn payload(size: usize) -> String {
    "x".repeat(size)
}

/// Caches `count` objects in `uow`, each under both aliases.
pub fn populate(uow: &UnitOfWork<String>, count: usize) {
    for i in 0..count {
        uow.update(payload(64), &bench_facets(i)).unwrap();
    }
}

/// Opens a chain of nested units `depth` levels under `root`, returning
/// the intermediate handles and the leaf.
pub fn nest_chain(
    root: &UnitOfWork<String>,
    depth: usize,
) -> (Vec<UnitOfWork<String>>, UnitOfWork<String>) {
    let mut chain = Vec::with_capacity(depth.saturating_sub(1));
    let mut leaf = root.begin_nested().unwrap();
    for _ in 1..depth {
        let child = leaf.begin_nested().unwrap();
        chain.push(leaf);
        leaf = child;
    }
    (chain, leaf)
}
