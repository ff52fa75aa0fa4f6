//! engine::transaction
//!
//! A multi-resource unit of work that commits or fails together.
//!
//! # Lifecycle
//!
//! 1. Resources are loaded into the transaction with their store version.
//! 2. Callers mutate the loaded copies, create new resources, or mark
//!    loaded ones for removal.
//! 3. `commit` verifies every minted identifier still matches its seed,
//!    then writes each changed resource with compare-and-swap. If any write
//!    fails, the writes already applied are reverted and the error carries
//!    a [`RollbackReport`](super::rollback::RollbackReport).
//!
//! Resources that were loaded but not changed are never written.
//!
//! # Example
//!
//! ```
//! use lakeshore::backend::{memory::MemoryRepository, Backends};
//! use lakeshore::core::relations::Relation;
//! use lakeshore::core::resource::{Resource, ResourceKind};
//! use lakeshore::core::types::Identifier;
//! use lakeshore::engine::Transaction;
//!
//! # tokio_test::block_on(async {
//! let repo = MemoryRepository::new();
//! let work = Resource::assigned(ResourceKind::Work);
//! repo.insert(work.clone());
//! let backends = Backends::in_memory(&repo);
//!
//! let mut tx = Transaction::new();
//! tx.load(&backends, &work.id).await.unwrap()
//!     .insert(Relation::Attachments, Identifier::random());
//! let committed = tx.commit(&backends).await.unwrap();
//! assert_eq!(committed.persisted, vec![work.id.clone()]);
//! # });
//! ```

use std::collections::BTreeMap;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::rollback::{rollback, AppliedWrite};
use crate::backend::Backends;
use crate::core::resource::{Resource, ResourceEntry};
use crate::core::types::Identifier;
use crate::error::{Error, Result};

/// Loaded state and pending change of one resource.
#[derive(Debug, Clone)]
struct Pending {
    /// What the store held at load time; `None` for created resources.
    loaded: Option<ResourceEntry>,
    /// Desired state; `None` means delete.
    current: Option<Resource>,
}

impl Pending {
    fn is_changed(&self) -> bool {
        match (&self.loaded, &self.current) {
            (Some(entry), Some(current)) => entry.resource != *current,
            (None, None) => false,
            _ => true,
        }
    }
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Committed {
    /// Resources written (created or updated), in write order.
    pub persisted: Vec<Identifier>,
    /// Resources deleted.
    pub deleted: Vec<Identifier>,
}

/// Pending writes across several resources.
#[derive(Debug, Clone)]
pub struct Transaction {
    id: Uuid,
    entries: BTreeMap<Identifier, Pending>,
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Transaction {
    /// Start an empty transaction.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            entries: BTreeMap::new(),
        }
    }

    /// Transaction identifier for logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Load a resource, or return the already-loaded copy.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the store has no such resource or it
    /// was removed in this transaction.
    pub async fn load(&mut self, backends: &Backends, id: &Identifier) -> Result<&mut Resource> {
        if !self.try_load(backends, id).await? {
            return Err(Error::NotFound(id.clone()));
        }
        self.get_mut(id).ok_or_else(|| Error::NotFound(id.clone()))
    }

    /// Load a resource if it exists. Returns whether it is present.
    pub async fn try_load(&mut self, backends: &Backends, id: &Identifier) -> Result<bool> {
        if let Some(pending) = self.entries.get(id) {
            return Ok(pending.current.is_some());
        }
        match backends.get(id).await? {
            Some(entry) => {
                debug!(tx = %self.id, %id, version = %entry.version, "loaded");
                self.entries.insert(
                    id.clone(),
                    Pending {
                        current: Some(entry.resource.clone()),
                        loaded: Some(entry),
                    },
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The pending state of a loaded resource.
    pub fn get(&self, id: &Identifier) -> Option<&Resource> {
        self.entries.get(id).and_then(|p| p.current.as_ref())
    }

    /// Mutable access to a loaded resource.
    pub fn get_mut(&mut self, id: &Identifier) -> Option<&mut Resource> {
        self.entries.get_mut(id).and_then(|p| p.current.as_mut())
    }

    /// The state of a resource as it was loaded.
    pub fn original(&self, id: &Identifier) -> Option<&Resource> {
        self.entries
            .get(id)
            .and_then(|p| p.loaded.as_ref())
            .map(|e| &e.resource)
    }

    /// Add a new resource to be created on commit.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` if the identifier is already part
    /// of the transaction.
    pub fn create(&mut self, resource: Resource) -> Result<()> {
        if self.entries.contains_key(&resource.id) {
            return Err(Error::InvalidArgument(format!(
                "resource {} already exists in transaction",
                resource.id
            )));
        }
        self.entries.insert(
            resource.id.clone(),
            Pending {
                loaded: None,
                current: Some(resource),
            },
        );
        Ok(())
    }

    /// Mark a loaded resource for deletion.
    pub fn remove(&mut self, id: &Identifier) -> Result<Resource> {
        self.entries
            .get_mut(id)
            .and_then(|p| p.current.take())
            .ok_or_else(|| Error::NotFound(id.clone()))
    }

    /// Identifiers whose state differs from what was loaded.
    pub fn changed(&self) -> Vec<Identifier> {
        self.entries
            .iter()
            .filter(|(_, p)| p.is_changed())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Whether committing would write anything.
    pub fn is_empty(&self) -> bool {
        !self.entries.values().any(Pending::is_changed)
    }

    /// Persist every changed resource.
    ///
    /// # Errors
    ///
    /// - `Error::ChecksumMismatch` if a minted resource no longer matches
    ///   its seed; nothing is written
    /// - The backend error, if the first write fails
    /// - `Error::CommitFailed` if a later write fails; earlier writes are
    ///   reverted
    pub async fn commit(&mut self, backends: &Backends) -> Result<Committed> {
        for pending in self.entries.values().filter(|p| p.is_changed()) {
            if let Some(resource) = &pending.current {
                resource.verify_checksum()?;
            }
        }

        let mut applied = Vec::new();
        let mut committed = Committed::default();

        for (id, pending) in self.entries.iter_mut() {
            if !pending.is_changed() {
                continue;
            }
            if let Some(resource) = pending.current.as_mut() {
                resource.touch();
            }

            let result = match (&pending.loaded, &pending.current) {
                (Some(entry), Some(resource)) => backends
                    .put(resource, Some(entry.version))
                    .await
                    .map(|version| AppliedWrite::Updated {
                        previous: entry.resource.clone(),
                        version,
                    }),
                (None, Some(resource)) => {
                    backends
                        .put(resource, None)
                        .await
                        .map(|version| AppliedWrite::Created {
                            id: id.clone(),
                            version,
                        })
                }
                (Some(entry), None) => backends
                    .delete(id, entry.version)
                    .await
                    .map(|()| AppliedWrite::Deleted {
                        previous: entry.resource.clone(),
                    }),
                (None, None) => continue,
            };

            match result {
                Ok(write) => {
                    match write {
                        AppliedWrite::Deleted { .. } => committed.deleted.push(id.clone()),
                        _ => committed.persisted.push(id.clone()),
                    }
                    applied.push(write);
                }
                Err(err) => {
                    warn!(tx = %self.id, %id, error = %err, "write failed");
                    if applied.is_empty() {
                        return Err(err.into());
                    }
                    let report = rollback(backends, &applied).await;
                    warn!(tx = %self.id, "{}", report.summary());
                    return Err(Error::CommitFailed {
                        cause: Box::new(err.into()),
                        rollback: report,
                    });
                }
            }
        }

        info!(
            tx = %self.id,
            persisted = committed.persisted.len(),
            deleted = committed.deleted.len(),
            "committed"
        );
        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{FailOn, MemoryRepository};
    use crate::backend::BackendError;
    use crate::core::relations::Relation;
    use crate::core::resource::{Identity, ResourceKind};

    fn setup() -> (MemoryRepository, Backends) {
        let repo = MemoryRepository::new();
        let backends = Backends::in_memory(&repo);
        (repo, backends)
    }

    #[tokio::test]
    async fn unchanged_resources_are_not_written() {
        let (repo, backends) = setup();
        let work = Resource::assigned(ResourceKind::Work);
        repo.insert(work.clone());

        let mut tx = Transaction::new();
        tx.load(&backends, &work.id).await.unwrap();
        assert!(tx.is_empty());

        let committed = tx.commit(&backends).await.unwrap();
        assert_eq!(committed, Committed::default());
        assert!(repo.puts().is_empty());
    }

    #[tokio::test]
    async fn missing_resource_is_not_found() {
        let (_repo, backends) = setup();
        let mut tx = Transaction::new();
        let id = Identifier::random();
        let err = tx.load(&backends, &id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(ref missing) if *missing == id));
        assert!(!tx.try_load(&backends, &id).await.unwrap());
    }

    #[tokio::test]
    async fn changed_seed_blocks_commit() {
        let (repo, backends) = setup();
        let asset = Resource::minted(ResourceKind::Asset, "SI", "SI-101010").unwrap();
        repo.insert(asset.clone());

        let mut tx = Transaction::new();
        tx.load(&backends, &asset.id).await.unwrap().identity = Identity::Minted {
            prefix: "SI".into(),
            seed: "SI-999".into(),
        };
        let err = tx.commit(&backends).await.unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
        assert!(repo.puts().is_empty());
    }

    #[tokio::test]
    async fn creates_and_deletes() {
        let (repo, backends) = setup();
        let doomed = Resource::assigned(ResourceKind::Work);
        repo.insert(doomed.clone());
        let fresh = Resource::assigned(ResourceKind::FileSet);

        let mut tx = Transaction::new();
        tx.load(&backends, &doomed.id).await.unwrap();
        tx.remove(&doomed.id).unwrap();
        tx.create(fresh.clone()).unwrap();
        assert!(tx.create(fresh.clone()).is_err());

        let committed = tx.commit(&backends).await.unwrap();
        assert_eq!(committed.persisted, vec![fresh.id.clone()]);
        assert_eq!(committed.deleted, vec![doomed.id.clone()]);
        assert!(repo.resource(&doomed.id).is_none());
        assert!(repo.resource(&fresh.id).is_some());
    }

    #[tokio::test]
    async fn stale_version_conflicts() {
        let (repo, backends) = setup();
        let work = Resource::assigned(ResourceKind::Work);
        repo.insert(work.clone());

        let mut tx = Transaction::new();
        tx.load(&backends, &work.id)
            .await
            .unwrap()
            .insert(Relation::Attachments, Identifier::random());

        // Concurrent writer bumps the version.
        repo.insert(work.clone());

        let err = tx.commit(&backends).await.unwrap_err();
        assert!(matches!(err, Error::StoreConflict { .. }));
        assert!(err.is_retryable());
        assert_eq!(repo.resource(&work.id), Some(work));
    }

    #[tokio::test]
    async fn later_failure_rolls_back_earlier_writes() {
        let (repo, backends) = setup();
        let mut a = Resource::assigned(ResourceKind::Work);
        let mut b = Resource::assigned(ResourceKind::Work);
        if b.id < a.id {
            std::mem::swap(&mut a, &mut b);
        }
        repo.insert(a.clone());
        repo.insert(b.clone());
        repo.inject(FailOn::PutFor(
            b.id.clone(),
            BackendError::StoreUnavailable("connection reset".into()),
        ));

        let mut tx = Transaction::new();
        for id in [&a.id, &b.id] {
            tx.load(&backends, id)
                .await
                .unwrap()
                .insert(Relation::Attachments, Identifier::random());
        }

        let err = tx.commit(&backends).await.unwrap_err();
        match err {
            Error::CommitFailed { cause, rollback } => {
                assert!(matches!(*cause, Error::StoreUnavailable(_)));
                assert!(rollback.complete);
                assert_eq!(rollback.rolled_back, vec![a.id.clone()]);
            }
            other => panic!("expected CommitFailed, got {other:?}"),
        }
        assert_eq!(repo.resource(&a.id), Some(a));
        assert_eq!(repo.resource(&b.id), Some(b));
    }
}
