//! Error types for nestcache core.

use crate::store::StoreError;
use crate::types::UowId;
use crate::uow::UowState;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in nestcache core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Commit was attempted while the subtree still contains open or
    /// aborted descendants.
    ///
    /// The commit had no effect: the unit of work remains open and may be
    /// retried once the listed descendants are resolved. An aborted
    /// descendant never resolves, so its presence makes the parent
    /// permanently uncommittable.
    #[error("commit conflict: open descendants {open:?}, aborted descendants {aborted:?}")]
    CommitConflict {
        /// Descendants still open at commit time.
        open: Vec<UowId>,
        /// Descendants already aborted at commit time.
        aborted: Vec<UowId>,
    },

    /// An operation was invoked on a unit of work that already reached a
    /// terminal state.
    #[error("unit of work {uow} is already {state}")]
    AlreadyTerminal {
        /// The unit of work that was targeted.
        uow: UowId,
        /// Its terminal state.
        state: UowState,
    },

    /// A cache merge met a live entry and a tombstone at the same
    /// coordinate under [`MergePolicy::Reject`](crate::MergePolicy::Reject).
    #[error("merge ambiguity: live and tombstone collide at {collection}[{column}]")]
    MergeAmbiguity {
        /// The collection (row key) where the collision occurred.
        collection: String,
        /// The column key where the collision occurred.
        column: String,
    },

    /// A facet set violated the facet producer contract.
    #[error("invalid facets: {message}")]
    InvalidFacets {
        /// Description of the violation.
        message: String,
    },

    /// A handle referenced a unit of work the session no longer tracks.
    #[error("unknown unit of work: {uow}")]
    UnknownUnitOfWork {
        /// The stale ID.
        uow: UowId,
    },

    /// Backing store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl CoreError {
    /// Creates a commit conflict error.
    pub fn commit_conflict(open: Vec<UowId>, aborted: Vec<UowId>) -> Self {
        Self::CommitConflict { open, aborted }
    }

    /// Creates an already-terminal error.
    pub fn already_terminal(uow: UowId, state: UowState) -> Self {
        Self::AlreadyTerminal { uow, state }
    }

    /// Creates a merge ambiguity error.
    pub fn merge_ambiguity(collection: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MergeAmbiguity {
            collection: collection.into(),
            column: column.into(),
        }
    }

    /// Creates an invalid facets error.
    pub fn invalid_facets(message: impl Into<String>) -> Self {
        Self::InvalidFacets {
            message: message.into(),
        }
    }

    /// Creates an unknown unit of work error.
    pub fn unknown_unit_of_work(uow: UowId) -> Self {
        Self::UnknownUnitOfWork { uow }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_conflict_lists_blockers() {
        let err = CoreError::commit_conflict(vec![UowId::new(3)], vec![UowId::new(5)]);
        let text = err.to_string();
        assert!(text.contains("commit conflict"));
        assert!(text.contains('3'));
        assert!(text.contains('5'));
    }

    #[test]
    fn already_terminal_names_state() {
        let err = CoreError::already_terminal(UowId::new(2), UowState::Aborted);
        assert_eq!(err.to_string(), "unit of work uow:2 is already aborted");
    }

    #[test]
    fn merge_ambiguity_names_coordinate() {
        let err = CoreError::merge_ambiguity("widget", "name==a");
        assert!(err.to_string().contains("widget[name==a]"));
    }
}
