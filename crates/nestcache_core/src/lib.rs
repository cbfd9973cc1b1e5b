//! # NestCache Core
//!
//! Nested transactional object cache.
//!
//! This crate provides:
//! - Facet-keyed caching: one object reachable under several lookup keys
//! - Unit-of-work trees with read-your-own-and-ancestors'-writes visibility
//! - Commit gating, abort cascades, and upward cache merges
//! - Tombstoned deletion with identity-based alias invalidation
//! - Post-commit hooks and per-unit statistics
//!
//! ## Design Principles
//!
//! - A unit of work sees its own writes and its ancestors', never a
//!   sibling's or a descendant's
//! - A tombstone is an authoritative negative, distinct from a cache miss
//! - The process-wide cache changes only when a root unit commits
//! - Handles stay answerable after their unit finishes
//!
//! ## Example
//!
//! ```rust
//! use nestcache_core::{Facet, Session};
//!
//! let session: Session<String> = Session::new();
//!
//! let uow = session.begin().unwrap();
//! uow.update(
//!     "blue disc".to_owned(),
//!     &[Facet::fixed("table", "widget"), Facet::new("id", "17")],
//! )
//! .unwrap();
//! uow.commit().unwrap();
//!
//! let key = [Facet::fixed("table", "widget"), Facet::new("id", "17")];
//! assert!(session.lookup(&key).unwrap().is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod error;
mod facet;
mod hooks;
mod session;
mod stats;
mod store;
mod types;
mod uow;

pub use cache::{Lookup, MergePolicy, PreferIncoming, ValueMerge};
pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use facet::{collection_of, Facet, Faceted};
pub use hooks::PostCommit;
pub use session::Session;
pub use stats::{SessionStatsSnapshot, UowStats};
pub use store::{BackingStore, StoreError, StoreResult};
pub use types::{ObjectToken, OperationKind, UowId};
pub use uow::{UnitOfWork, UowState};
