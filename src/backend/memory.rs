//! backend::memory
//!
//! In-memory store, index and queue for deterministic testing.
//!
//! # Design
//!
//! One [`MemoryRepository`] implements all three collaborator traits over
//! shared state, so a test can wire it into
//! [`Backends::in_memory`](super::Backends::in_memory) and then inspect
//! what was written, indexed and enqueued.
//!
//! The index is kept separately from the store and is only refreshed by
//! `reindex` (or [`MemoryRepository::insert`]), so tests can observe stale
//! index behavior by editing the store behind its back.
//!
//! Failures are injected with [`FailOn`]; every call is recorded as a
//! [`MemoryOperation`] before the failure check, as a real backend would
//! see the request even when it fails.
//!
//! # Example
//!
//! ```
//! use lakeshore::backend::memory::MemoryRepository;
//! use lakeshore::backend::ResourceStore;
//! use lakeshore::core::resource::{Resource, ResourceKind};
//!
//! # tokio_test::block_on(async {
//! let repo = MemoryRepository::new();
//! let work = Resource::minted(ResourceKind::Work, "SI", "SI-1").unwrap();
//! repo.insert(work.clone());
//!
//! let entry = repo.get(&work.id).await.unwrap().unwrap();
//! assert_eq!(entry.resource, work);
//! # });
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::document::IndexDocument;
use super::traits::{BackendError, ResourceStore, SearchIndex, Task, TaskQueue};
use crate::core::relations::Relation;
use crate::core::resource::{Resource, ResourceEntry};
use crate::core::types::{ContentDigest, Identifier, Version};

/// In-memory repository for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    /// Stored resources with their versions.
    resources: HashMap<Identifier, ResourceEntry>,
    /// Index documents, refreshed only on reindex.
    documents: HashMap<Identifier, IndexDocument>,
    /// Tasks accepted by the queue, in order.
    tasks: Vec<Task>,
    /// Injected failures.
    fail_on: Vec<FailOn>,
    /// Delay applied to every call.
    latency: Option<Duration>,
    /// Recorded calls.
    operations: Vec<MemoryOperation>,
}

/// Which call should fail, and with what.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail every store `get`.
    Get(BackendError),
    /// Fail every store `put`.
    Put(BackendError),
    /// Fail store `put` of one resource only.
    PutFor(Identifier, BackendError),
    /// Fail every store `delete`.
    Delete(BackendError),
    /// Fail index digest lookups.
    FindByDigest(BackendError),
    /// Fail index source lookups.
    FindSources(BackendError),
    /// Fail reindex calls.
    Reindex(BackendError),
    /// Fail enqueue calls.
    Enqueue(BackendError),
}

/// Recorded call for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryOperation {
    Get {
        id: Identifier,
    },
    Put {
        id: Identifier,
        expected: Option<Version>,
    },
    Delete {
        id: Identifier,
        expected: Version,
    },
    FindByDigest {
        digest: ContentDigest,
    },
    FindSources {
        relation: Relation,
        target: Identifier,
    },
    Reindex {
        id: Identifier,
    },
    Enqueue {
        task: Task,
    },
}

impl MemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure an additional failure.
    ///
    /// # Example
    ///
    /// ```
    /// use lakeshore::backend::memory::{FailOn, MemoryRepository};
    /// use lakeshore::backend::BackendError;
    ///
    /// let repo = MemoryRepository::new()
    ///     .fail_on(FailOn::Reindex(BackendError::IndexUnavailable("solr down".into())));
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.state().fail_on.push(fail_on);
        self
    }

    /// Add a failure to a shared repository.
    pub fn inject(&self, fail_on: FailOn) {
        self.state().fail_on.push(fail_on);
    }

    /// Clear all configured failures.
    pub fn clear_fail_on(&self) {
        self.state().fail_on.clear();
    }

    /// Delay every call by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state().latency = Some(latency);
        self
    }

    /// Store a resource and index it, bypassing version checks.
    ///
    /// Returns the stored version.
    pub fn insert(&self, resource: Resource) -> Version {
        let mut inner = self.state();
        let id = resource.id.clone();
        let version = inner.store(resource);
        inner.index(&id);
        version
    }

    /// Store a resource without touching the index.
    pub fn insert_unindexed(&self, resource: Resource) -> Version {
        self.state().store(resource)
    }

    /// Remove a resource from the store, leaving its index document stale.
    pub fn forget(&self, id: &Identifier) -> Option<Resource> {
        self.state().resources.remove(id).map(|e| e.resource)
    }

    /// Current stored state of a resource.
    pub fn resource(&self, id: &Identifier) -> Option<Resource> {
        self.state().resources.get(id).map(|e| e.resource.clone())
    }

    /// Current stored version of a resource.
    pub fn version(&self, id: &Identifier) -> Option<Version> {
        self.state().resources.get(id).map(|e| e.version)
    }

    /// Current index document of a resource.
    pub fn document(&self, id: &Identifier) -> Option<IndexDocument> {
        self.state().documents.get(id).cloned()
    }

    /// Number of stored resources.
    pub fn resource_count(&self) -> usize {
        self.state().resources.len()
    }

    /// Tasks accepted by the queue.
    pub fn tasks(&self) -> Vec<Task> {
        self.state().tasks.clone()
    }

    /// All recorded operations.
    pub fn operations(&self) -> Vec<MemoryOperation> {
        self.state().operations.clone()
    }

    /// Clear recorded operations and accepted tasks.
    pub fn clear_operations(&self) {
        let mut inner = self.state();
        inner.operations.clear();
        inner.tasks.clear();
    }

    /// Identifiers passed to `put`, in call order.
    pub fn puts(&self) -> Vec<Identifier> {
        self.state()
            .operations
            .iter()
            .filter_map(|op| match op {
                MemoryOperation::Put { id, .. } => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Identifiers passed to `reindex`, in call order.
    pub fn reindexed(&self) -> Vec<Identifier> {
        self.state()
            .operations
            .iter()
            .filter_map(|op| match op {
                MemoryOperation::Reindex { id } => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    fn state(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call, then apply latency and injected failures.
    async fn begin(&self, op: MemoryOperation) -> Result<(), BackendError> {
        let (latency, failure) = {
            let mut inner = self.state();
            let failure = inner.failure_for(&op);
            inner.operations.push(op);
            (inner.latency, failure)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl MemoryInner {
    fn store(&mut self, resource: Resource) -> Version {
        let version = self
            .resources
            .get(&resource.id)
            .map(|e| e.version.next())
            .unwrap_or(Version::INITIAL);
        self.resources
            .insert(resource.id.clone(), ResourceEntry { version, resource });
        version
    }

    fn index(&mut self, id: &Identifier) {
        let Some(entry) = self.resources.get(id) else {
            self.documents.remove(id);
            return;
        };
        let resource = &entry.resource;
        let children: Vec<Resource> = resource
            .targets(Relation::Members)
            .chain(resource.targets(Relation::CollectionMembers))
            .filter_map(|child| self.resources.get(child))
            .map(|e| e.resource.clone())
            .collect();
        let document = IndexDocument::build(resource, &children);
        self.documents.insert(id.clone(), document);
    }

    fn failure_for(&self, op: &MemoryOperation) -> Option<BackendError> {
        self.fail_on.iter().find_map(|fail| match (fail, op) {
            (FailOn::Get(e), MemoryOperation::Get { .. })
            | (FailOn::Put(e), MemoryOperation::Put { .. })
            | (FailOn::Delete(e), MemoryOperation::Delete { .. })
            | (FailOn::FindByDigest(e), MemoryOperation::FindByDigest { .. })
            | (FailOn::FindSources(e), MemoryOperation::FindSources { .. })
            | (FailOn::Reindex(e), MemoryOperation::Reindex { .. })
            | (FailOn::Enqueue(e), MemoryOperation::Enqueue { .. }) => Some(e.clone()),
            (FailOn::PutFor(target, e), MemoryOperation::Put { id, .. }) if target == id => {
                Some(e.clone())
            }
            _ => None,
        })
    }
}

fn describe(version: Option<Version>) -> String {
    version.map_or_else(|| "absent".to_string(), |v| v.to_string())
}

#[async_trait]
impl ResourceStore for MemoryRepository {
    async fn get(&self, id: &Identifier) -> Result<Option<ResourceEntry>, BackendError> {
        self.begin(MemoryOperation::Get { id: id.clone() }).await?;
        Ok(self.state().resources.get(id).cloned())
    }

    async fn put(
        &self,
        resource: &Resource,
        expected: Option<Version>,
    ) -> Result<Version, BackendError> {
        self.begin(MemoryOperation::Put {
            id: resource.id.clone(),
            expected,
        })
        .await?;

        let mut inner = self.state();
        let current = inner.resources.get(&resource.id).map(|e| e.version);
        if current != expected {
            return Err(BackendError::Conflict {
                id: resource.id.clone(),
                expected: describe(expected),
                actual: describe(current),
            });
        }
        let version = inner.store(resource.clone());
        debug!(id = %resource.id, %version, "memory store put");
        Ok(version)
    }

    async fn delete(&self, id: &Identifier, expected: Version) -> Result<(), BackendError> {
        self.begin(MemoryOperation::Delete {
            id: id.clone(),
            expected,
        })
        .await?;

        let mut inner = self.state();
        let current = match inner.resources.get(id) {
            Some(entry) => entry.version,
            None => return Err(BackendError::NotFound(id.clone())),
        };
        if current != expected {
            return Err(BackendError::Conflict {
                id: id.clone(),
                expected: expected.to_string(),
                actual: current.to_string(),
            });
        }
        inner.resources.remove(id);
        debug!(%id, "memory store delete");
        Ok(())
    }
}

#[async_trait]
impl SearchIndex for MemoryRepository {
    async fn find_by_digest(
        &self,
        digest: &ContentDigest,
    ) -> Result<Vec<Identifier>, BackendError> {
        self.begin(MemoryOperation::FindByDigest {
            digest: digest.clone(),
        })
        .await?;

        let inner = self.state();
        let mut ids: Vec<Identifier> = inner
            .documents
            .values()
            .filter(|doc| doc.digest.as_ref() == Some(digest))
            .map(|doc| doc.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn find_sources(
        &self,
        relation: Relation,
        target: &Identifier,
    ) -> Result<Vec<Identifier>, BackendError> {
        self.begin(MemoryOperation::FindSources {
            relation,
            target: target.clone(),
        })
        .await?;

        let inner = self.state();
        let mut ids: Vec<Identifier> = inner
            .documents
            .values()
            .filter(|doc| doc.links(relation, target))
            .map(|doc| doc.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn reindex(&self, id: &Identifier) -> Result<(), BackendError> {
        self.begin(MemoryOperation::Reindex { id: id.clone() })
            .await?;
        self.state().index(id);
        Ok(())
    }
}

#[async_trait]
impl TaskQueue for MemoryRepository {
    async fn enqueue(&self, task: Task) -> Result<(), BackendError> {
        self.begin(MemoryOperation::Enqueue { task: task.clone() })
            .await?;
        debug!(?task, "memory queue enqueue");
        self.state().tasks.push(task);
        Ok(())
    }
}
