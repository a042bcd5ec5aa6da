//! Error types returned by table and index operations.

use crate::{backend, common};

use aws_sdk_dynamodb::error::BuildError;
use std::fmt;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced to callers of [`crate::table::TableClient`] and [`crate::index::IndexClient`].
///
/// The variants are kinds, not messages: callers branch on them with the `is_*` helpers
/// or by matching, never by inspecting the rendered text.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested item does not exist.
    ///
    /// Expected outcome of point reads and first/last queries.
    #[error("item does not exist")]
    NotExist,
    /// The caller supplied an invalid continuation cursor.
    #[error("bad request: {0}")]
    BadRequest(#[from] common::cursor::CursorError),
    /// The caller asked for pages of fewer than one item.
    #[error("bad request: page limit must be at least 1, got {limit}")]
    InvalidLimit {
        /// The rejected limit.
        limit: i32,
    },
    /// A conditional write was rejected by the backend.
    ///
    /// Returned by `insert` when the key already exists and by `update` when it does not.
    #[error("{operation}: conditional check failed")]
    ConditionalCheckFailed {
        /// The operation that failed.
        operation: &'static str,
    },
    /// The backend call failed.
    #[error("{operation}: {source}")]
    Backend {
        /// The operation that failed.
        operation: &'static str,
        /// The underlying backend failure.
        #[source]
        source: backend::BackendError,
    },
    /// An item could not be converted to or from backend attribute values.
    #[error("{operation}: {source}")]
    Serialization {
        /// The operation that failed.
        operation: &'static str,
        /// The underlying marshalling failure.
        #[source]
        source: serde_dynamo::Error,
    },
    /// A backend request could not be built.
    #[error("{operation}: {source}")]
    Build {
        /// The operation that failed.
        operation: &'static str,
        /// The underlying builder failure.
        #[source]
        source: BuildError,
    },
    /// The backend accepted a batch but left part of it unprocessed.
    #[error("{operation}: {count} requests left unprocessed")]
    Unprocessed {
        /// The operation that failed.
        operation: &'static str,
        /// How many requests were not applied.
        count: usize,
    },
    /// The caller's deadline passed between two pages of a query.
    #[error("query deadline exceeded")]
    DeadlineExceeded,
    /// A query needed more pages than the configured maximum.
    #[error("query exceeded {pages} pages")]
    PageLimitExceeded {
        /// The configured page cap.
        pages: usize,
    },
}

impl Error {
    /// Whether the error is [`Error::NotExist`].
    pub fn is_not_exist(&self) -> bool {
        matches!(self, Self::NotExist)
    }

    /// Whether the error is a client-input error (an invalid cursor or page limit).
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::BadRequest(_) | Self::InvalidLimit { .. })
    }

    /// Whether the error is a rejected conditional write.
    pub fn is_conditional_check_failed(&self) -> bool {
        matches!(self, Self::ConditionalCheckFailed { .. })
    }

    pub(crate) fn backend(operation: &'static str, source: backend::BackendError) -> Self {
        match source {
            backend::BackendError::ConditionalCheckFailed => {
                Self::ConditionalCheckFailed { operation }
            }
            source => Self::Backend { operation, source },
        }
    }

    pub(crate) fn serialization(operation: &'static str) -> impl FnOnce(serde_dynamo::Error) -> Self {
        move |source| Self::Serialization { operation, source }
    }

    pub(crate) fn build(operation: &'static str) -> impl FnOnce(BuildError) -> Self {
        move |source| Self::Build { operation, source }
    }
}

/// A multi-page query that stopped early.
///
/// Holds every item fetched before the failure so that no page already read is lost.
/// Converts into [`Error`] (dropping the items) for use with `?`.
pub struct Partial<E> {
    /// Items fetched before the failure, in query order.
    pub items: Vec<E>,
    /// Why the query stopped.
    pub error: Error,
}

impl<E> fmt::Debug for Partial<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partial")
            .field("items", &self.items.len())
            .field("error", &self.error)
            .finish()
    }
}

impl<E> fmt::Display for Partial<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (after {} items)", self.error, self.items.len())
    }
}

impl<E> std::error::Error for Partial<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<E> From<Partial<E>> for Error {
    fn from(partial: Partial<E>) -> Self {
        partial.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case::not_exist(Error::NotExist, true, false, false)]
    #[case::bad_request(
        Error::BadRequest(common::cursor::CursorError::UnknownAttribute("a".to_string())),
        false,
        true,
        false
    )]
    #[case::conditional(
        Error::ConditionalCheckFailed { operation: "put item" },
        false,
        false,
        true
    )]
    #[case::invalid_limit(Error::InvalidLimit { limit: 0 }, false, true, false)]
    #[case::deadline(Error::DeadlineExceeded, false, false, false)]
    fn test_error_kind(
        #[case] error: Error,
        #[case] not_exist: bool,
        #[case] bad_request: bool,
        #[case] conditional: bool,
    ) {
        assert_eq!(error.is_not_exist(), not_exist);
        assert_eq!(error.is_bad_request(), bad_request);
        assert_eq!(error.is_conditional_check_failed(), conditional);
    }

    #[test]
    fn test_backend_conditional_check_is_distinct() {
        let error = Error::backend("put item", backend::BackendError::ConditionalCheckFailed);
        assert!(error.is_conditional_check_failed());
        assert_eq!(error.to_string(), "put item: conditional check failed");
    }

    #[test]
    fn test_partial_converts_into_error() {
        let partial = Partial {
            items: vec![1, 2, 3],
            error: Error::DeadlineExceeded,
        };
        assert_eq!(partial.to_string(), "query deadline exceeded (after 3 items)");
        let error: Error = partial.into();
        assert!(matches!(error, Error::DeadlineExceeded));
    }
}
