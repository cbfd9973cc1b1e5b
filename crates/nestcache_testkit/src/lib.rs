//! # NestCache Testkit
//!
//! Test utilities for NestCache.
//!
//! This crate provides:
//! - Session fixtures and a sample faceted entity
//! - An in-memory backing store with query accounting
//! - Property-based test generators using proptest
//! - Read-through integration harnesses
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nestcache_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_session() {
//!     with_session(|session| {
//!         let uow = session.begin().expect("begin");
//!         // ... cache operations
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod store;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::store::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use store::*;
pub use stress::*;
