//! backend::traits
//!
//! Collaborator traits for the resource store, search index and task queue.
//!
//! # Design
//!
//! The core never holds a global connection. Each operation receives a
//! [`Backends`](super::Backends) bundle of `Arc<dyn _>` handles, so tests
//! can substitute [`MemoryRepository`](super::memory::MemoryRepository) and
//! production can wire a graph store and a search service.
//!
//! All traits are object-safe via `async_trait`.
//!
//! # Consistency
//!
//! The store is the source of truth and enforces compare-and-swap on every
//! write. The index is eventually consistent: queries may return entries
//! that no longer match the store, and callers must re-check what they
//! load.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::relations::Relation;
use crate::core::resource::{FileRole, Resource, ResourceEntry};
use crate::core::types::{ContentDigest, Identifier, Version};

/// Errors from backend calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The stored version differs from the one the writer expected.
    #[error("version conflict on {id}: expected {expected}, found {actual}")]
    Conflict {
        id: Identifier,
        expected: String,
        actual: String,
    },

    /// The resource does not exist.
    #[error("resource not found: {0}")]
    NotFound(Identifier),

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The index could not be reached.
    #[error("index unavailable: {0}")]
    IndexUnavailable(String),

    /// The queue rejected the task.
    #[error("queue unavailable: {0}")]
    QueueUnavailable(String),

    /// The call did not complete within its limit.
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },
}

/// Asynchronous work handed to the task executor.
///
/// Delivery is at-least-once, so every task must be idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Task {
    /// Rebuild the index document of a resource.
    Reindex { id: Identifier },
    /// Characterize the content of a file set.
    Characterize { file_set: Identifier },
    /// Generate derivatives for a characterized file set.
    CreateDerivatives { file_set: Identifier },
    /// Replace the stored content of an existing file set.
    IngestFile { file_set: Identifier, role: FileRole },
}

impl Task {
    /// The resource the task operates on.
    pub fn subject(&self) -> &Identifier {
        match self {
            Task::Reindex { id } => id,
            Task::Characterize { file_set }
            | Task::CreateDerivatives { file_set }
            | Task::IngestFile { file_set, .. } => file_set,
        }
    }
}

/// Versioned resource persistence.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Load a resource with its current version.
    async fn get(&self, id: &Identifier) -> Result<Option<ResourceEntry>, BackendError>;

    /// Write a resource.
    ///
    /// `expected` is the version observed at load time, or `None` if the
    /// resource must not exist yet. Returns the new version.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Conflict` if the stored version differs.
    async fn put(
        &self,
        resource: &Resource,
        expected: Option<Version>,
    ) -> Result<Version, BackendError>;

    /// Delete a resource at the expected version.
    async fn delete(&self, id: &Identifier, expected: Version) -> Result<(), BackendError>;
}

/// Eventually consistent search over indexed resources.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Identifiers of indexed resources whose digest equals `digest`.
    async fn find_by_digest(&self, digest: &ContentDigest)
        -> Result<Vec<Identifier>, BackendError>;

    /// Identifiers of indexed resources holding `target` under `relation`.
    async fn find_sources(
        &self,
        relation: Relation,
        target: &Identifier,
    ) -> Result<Vec<Identifier>, BackendError>;

    /// Rebuild the document for `id` from the store.
    ///
    /// A resource missing from the store is removed from the index.
    async fn reindex(&self, id: &Identifier) -> Result<(), BackendError>;
}

/// Fire-and-forget task submission.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Submit a task for at-least-once execution.
    async fn enqueue(&self, task: Task) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_serializes_with_tag() {
        let id = Identifier::new("fe4c0f30-aa35-9c41-d9f9-a5f69c8c4192").unwrap();
        let task = Task::IngestFile {
            file_set: id.clone(),
            role: FileRole::Preservation,
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["task"], "ingest_file");
        assert_eq!(json["role"], "preservation");
        assert_eq!(task.subject(), &id);

        let parsed: Task = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, task);
    }

    #[test]
    fn conflict_message_names_versions() {
        let err = BackendError::Conflict {
            id: Identifier::new("fe4c0f30-aa35-9c41-d9f9-a5f69c8c4192").unwrap(),
            expected: "v1".into(),
            actual: "v3".into(),
        };
        assert!(err.to_string().contains("expected v1, found v3"));
    }
}
