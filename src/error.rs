//! error
//!
//! The error taxonomy surfaced to callers of the core.
//!
//! Validation errors (`InvalidArgument`, `ChecksumMismatch`, `NotSupported`,
//! `NotFound`) are fatal for the call and must not be retried. Transient
//! errors report `is_retryable() == true` so the task executor can apply its
//! own backoff.

use thiserror::Error;

use crate::backend::BackendError;
use crate::core::relations::Relation;
use crate::core::types::{ContentDigest, Identifier, TypeError};
use crate::engine::rollback::RollbackReport;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input: missing prefix, singular value where a list is
    /// required, a kind the relation does not accept.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A supplied identifier does not match the one minted from its seed.
    #[error("identifier must match checksum: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Identifier recomputed from prefix and seed.
        expected: String,
        /// Identifier that was supplied.
        actual: String,
    },

    /// The operation does not apply to this relation's cardinality.
    #[error("{operation} is not supported for relation '{relation}'")]
    NotSupported {
        /// Operation that was attempted.
        operation: &'static str,
        /// Relation it was attempted on.
        relation: Relation,
    },

    /// An identifier did not resolve to a stored resource.
    #[error("resource not found: {0}")]
    NotFound(Identifier),

    /// The resource changed since it was loaded.
    #[error("store conflict on {id}: expected {expected}, found {actual}")]
    StoreConflict {
        /// Resource whose write was rejected.
        id: Identifier,
        /// Version the writer loaded.
        expected: String,
        /// Version currently stored.
        actual: String,
    },

    /// The resource store could not be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The search index could not be reached.
    #[error("index unavailable: {0}")]
    IndexUnavailable(String),

    /// The task queue rejected an enqueue.
    #[error("task queue unavailable: {0}")]
    QueueUnavailable(String),

    /// A backend call exceeded its configured timeout.
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        /// Backend operation name.
        operation: &'static str,
        /// Configured limit in milliseconds.
        after_ms: u64,
    },

    /// Content with this digest is already held and the policy blocks it.
    #[error("duplicate content {digest}: already held by {}", join_ids(.owners))]
    DuplicateContent {
        /// Digest of the rejected upload.
        digest: ContentDigest,
        /// Resources that already own identical content.
        owners: Vec<Identifier>,
    },

    /// Persisting a multi-resource change failed part-way through.
    ///
    /// Writes already applied were reverted; `rollback` says which.
    #[error("commit failed: {cause} ({})", .rollback.summary())]
    CommitFailed {
        /// The error that stopped the commit.
        cause: Box<Error>,
        /// Outcome of reverting already-applied writes.
        rollback: RollbackReport,
    },
}

impl Error {
    /// Whether the task executor should retry the unit of work.
    ///
    /// # Example
    ///
    /// ```
    /// use lakeshore::Error;
    ///
    /// assert!(Error::IndexUnavailable("solr down".into()).is_retryable());
    /// assert!(!Error::InvalidArgument("no prefix".into()).is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::StoreConflict { .. }
            | Error::StoreUnavailable(_)
            | Error::IndexUnavailable(_)
            | Error::QueueUnavailable(_)
            | Error::Timeout { .. } => true,
            Error::CommitFailed { cause, .. } => cause.is_retryable(),
            Error::InvalidArgument(_)
            | Error::ChecksumMismatch { .. }
            | Error::NotSupported { .. }
            | Error::NotFound(_)
            | Error::DuplicateContent { .. } => false,
        }
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::InvalidArgument(err.to_string())
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Conflict {
                id,
                expected,
                actual,
            } => Error::StoreConflict {
                id,
                expected,
                actual,
            },
            BackendError::NotFound(id) => Error::NotFound(id),
            BackendError::StoreUnavailable(msg) => Error::StoreUnavailable(msg),
            BackendError::IndexUnavailable(msg) => Error::IndexUnavailable(msg),
            BackendError::QueueUnavailable(msg) => Error::QueueUnavailable(msg),
            BackendError::Timeout {
                operation,
                after_ms,
            } => Error::Timeout {
                operation,
                after_ms,
            },
        }
    }
}

fn join_ids(ids: &[Identifier]) -> String {
    ids.iter()
        .map(Identifier::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_id() -> Identifier {
        Identifier::new("fe4c0f30-aa35-9c41-d9f9-a5f69c8c4192").unwrap()
    }

    #[test]
    fn backend_conflict_maps_to_store_conflict() {
        let err: Error = BackendError::Conflict {
            id: sample_id(),
            expected: "v1".into(),
            actual: "v2".into(),
        }
        .into();
        assert!(matches!(err, Error::StoreConflict { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn type_error_maps_to_invalid_argument() {
        let err: Error = TypeError::InvalidPrefix("empty".into()).into();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn duplicate_content_lists_owners() {
        let err = Error::DuplicateContent {
            digest: ContentDigest::sha256(b"x"),
            owners: vec![sample_id()],
        };
        assert!(err.to_string().contains("fe4c0f30"));
    }

    #[test]
    fn commit_failure_inherits_retryability() {
        let err = Error::CommitFailed {
            cause: Box::new(Error::Timeout {
                operation: "store.put",
                after_ms: 10,
            }),
            rollback: RollbackReport::new(),
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("store.put"));
    }
}
