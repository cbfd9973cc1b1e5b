//! Unit-of-work trees.
//!
//! A unit of work is a node in a tree: it owns a private cache table,
//! sees its ancestors' entries, and is invisible to siblings until it
//! commits. An arena owns all nodes and runs the commit and abort
//! protocols; [`UnitOfWork`] is the caller-facing handle.

pub(crate) mod arena;
mod handle;
pub(crate) mod node;
pub(crate) mod state;

pub use handle::UnitOfWork;
pub use state::UowState;
