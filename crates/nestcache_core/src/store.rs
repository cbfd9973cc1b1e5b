//! The backing store contract.
//!
//! The cache never talks to a database itself. A cache miss (`None` from a
//! lookup) is the caller's signal to run the query against its backing
//! store through this trait and feed the result back with
//! [`UnitOfWork::update`](crate::uow::UnitOfWork::update).

use thiserror::Error;

/// Result type for backing store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors a backing store can surface.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// The store rejected or failed the query.
    #[error("query failed: {message}")]
    QueryFailed {
        /// Description of the failure.
        message: String,
    },
}

impl StoreError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a query failed error.
    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::QueryFailed {
            message: message.into(),
        }
    }
}

/// A query executor for the system of record.
///
/// Implementations are **opaque row sources**: they run a query and return
/// the matching rows. The cache owns all key construction and
/// invalidation; executors do not see facets or tables.
///
/// Implementations must be `Send + Sync` so one executor can serve every
/// unit of work in a session.
pub trait BackingStore: Send + Sync {
    /// The query type this store executes.
    type Query;
    /// The row type this store returns.
    type Row;

    /// Executes `query` against the system of record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable or the query fails.
    fn execute(&self, query: &Self::Query) -> StoreResult<Vec<Self::Row>>;
}
