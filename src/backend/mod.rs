//! backend
//!
//! External collaborators consumed by the core.
//!
//! # Modules
//!
//! - [`traits`] - `ResourceStore`, `SearchIndex`, `TaskQueue` and `Task`
//! - [`document`] - Index document projection with facets and rollups
//! - [`memory`] - In-memory implementation of all three for tests
//!
//! # Timeouts
//!
//! [`Backends`] wraps every call in `tokio::time::timeout` using the
//! configured [`Timeouts`]. An elapsed limit surfaces as
//! `BackendError::Timeout`, which the core reports as retryable.

pub mod document;
pub mod memory;
pub mod traits;

pub use document::IndexDocument;
pub use traits::{BackendError, ResourceStore, SearchIndex, Task, TaskQueue};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::core::config::Timeouts;
use crate::core::relations::Relation;
use crate::core::resource::{Resource, ResourceEntry};
use crate::core::types::{ContentDigest, Identifier, Version};
use memory::MemoryRepository;

/// Handles to the store, index and queue used by one operation.
#[derive(Clone)]
pub struct Backends {
    store: Arc<dyn ResourceStore>,
    index: Arc<dyn SearchIndex>,
    queue: Arc<dyn TaskQueue>,
    timeouts: Timeouts,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl Backends {
    /// Bundle backend handles with default timeouts.
    pub fn new(
        store: Arc<dyn ResourceStore>,
        index: Arc<dyn SearchIndex>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            store,
            index,
            queue,
            timeouts: Timeouts::default(),
        }
    }

    /// Wire all three roles to one in-memory repository.
    pub fn in_memory(repo: &MemoryRepository) -> Self {
        let shared = Arc::new(repo.clone());
        Self::new(shared.clone(), shared.clone(), shared)
    }

    /// Replace the call limits.
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Configured call limits.
    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Load a resource and its version, bounded by the store limit.
    pub async fn get(&self, id: &Identifier) -> Result<Option<ResourceEntry>, BackendError> {
        bounded(self.timeouts.store, "store.get", self.store.get(id)).await
    }

    /// Write a resource if the stored version still equals `expected`.
    ///
    /// `None` means the resource must not exist yet.
    pub async fn put(
        &self,
        resource: &Resource,
        expected: Option<Version>,
    ) -> Result<Version, BackendError> {
        bounded(
            self.timeouts.store,
            "store.put",
            self.store.put(resource, expected),
        )
        .await
    }

    /// Delete a resource if the stored version still equals `expected`.
    pub async fn delete(&self, id: &Identifier, expected: Version) -> Result<(), BackendError> {
        bounded(
            self.timeouts.store,
            "store.delete",
            self.store.delete(id, expected),
        )
        .await
    }

    /// Content resources the index lists under `digest`.
    pub async fn find_by_digest(
        &self,
        digest: &ContentDigest,
    ) -> Result<Vec<Identifier>, BackendError> {
        bounded(
            self.timeouts.index,
            "index.find_by_digest",
            self.index.find_by_digest(digest),
        )
        .await
    }

    /// Resources the index lists as holding `target` under `relation`.
    pub async fn find_sources(
        &self,
        relation: Relation,
        target: &Identifier,
    ) -> Result<Vec<Identifier>, BackendError> {
        bounded(
            self.timeouts.index,
            "index.find_sources",
            self.index.find_sources(relation, target),
        )
        .await
    }

    /// Rebuild the index document of one resource.
    pub async fn reindex(&self, id: &Identifier) -> Result<(), BackendError> {
        bounded(self.timeouts.index, "index.reindex", self.index.reindex(id)).await
    }

    /// Hand a task to the queue, bounded by the queue limit.
    pub async fn enqueue(&self, task: Task) -> Result<(), BackendError> {
        bounded(self.timeouts.queue, "queue.enqueue", self.queue.enqueue(task)).await
    }
}

/// Run `fut` with a time limit.
async fn bounded<T, F>(limit: Duration, operation: &'static str, fut: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout {
            operation,
            after_ms: limit.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resource::ResourceKind;

    #[tokio::test]
    async fn slow_backend_times_out() {
        let repo = MemoryRepository::new().with_latency(Duration::from_millis(200));
        let backends =
            Backends::in_memory(&repo).with_timeouts(Timeouts::uniform(Duration::from_millis(10)));

        let err = backends.get(&Identifier::random()).await.unwrap_err();
        assert_eq!(
            err,
            BackendError::Timeout {
                operation: "store.get",
                after_ms: 10,
            }
        );
    }

    #[tokio::test]
    async fn calls_within_limit_pass_through() {
        let repo = MemoryRepository::new();
        let backends = Backends::in_memory(&repo);
        let work = Resource::assigned(ResourceKind::Work);

        let version = backends.put(&work, None).await.unwrap();
        let entry = backends.get(&work.id).await.unwrap().unwrap();
        assert_eq!(entry.version, version);
    }
}
