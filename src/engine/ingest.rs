//! engine::ingest
//!
//! Attaching uploaded content to works, and recording characterization.
//!
//! # Flow
//!
//! ```text
//! attach:   duplicate gate -> replace same-role file set | create file set
//!           -> persist -> reindex -> enqueue IngestFile | Characterize
//! record:   store digest -> persist -> reindex file set and ancestors
//!           -> enqueue CreateDerivatives
//! ```
//!
//! A work holds at most one file set per [`FileRole`]; attaching content
//! for a role that already exists replaces that file set's content instead
//! of adding a second one.
//!
//! Both calls may be repeated. Content a work already holds under the same
//! role is neither a duplicate of the work itself nor a replacement: the
//! repeat writes nothing and resends `Characterize`. A follow-up task the
//! queue refuses after the commit is returned in
//! [`ChangeSet::pending`](super::manager::ChangeSet::pending).

use tracing::{debug, info};

use super::duplicates::{DuplicateCheck, DuplicateDetector};
use super::manager::{link, ChangeSet, RelationshipManager};
use super::transaction::Transaction;
use crate::backend::{Backends, Task};
use crate::core::config::DuplicatePolicy;
use crate::core::relations::Relation;
use crate::core::resource::{FileRole, Resource, ResourceKind, UploadCandidate};
use crate::core::types::{ContentDigest, Identifier};
use crate::error::{Error, Result};

/// Outcome of attaching content to a work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// The file set now holding the content.
    pub file_set: Identifier,
    /// Whether an existing file set's content was replaced.
    pub replaced: bool,
    /// Other owners of identical content (non-empty only under `warn`).
    pub duplicates: Vec<Identifier>,
    /// Persistence and reindex details.
    pub changes: ChangeSet,
}

/// Creates and updates file sets for uploaded content.
#[derive(Debug, Clone)]
pub struct Ingestor {
    manager: RelationshipManager,
    detector: DuplicateDetector,
    policy: DuplicatePolicy,
}

impl Ingestor {
    /// Create an ingestor applying `policy` to duplicate content.
    pub fn new(backends: Backends, policy: DuplicatePolicy) -> Self {
        Self {
            manager: RelationshipManager::new(backends.clone()),
            detector: DuplicateDetector::new(backends),
            policy,
        }
    }

    fn backends(&self) -> &Backends {
        self.manager.backends()
    }

    /// Attach uploaded content to `work`.
    ///
    /// The candidate's role defaults to [`FileRole::Original`].
    ///
    /// # Errors
    ///
    /// - `Error::DuplicateContent` under the block policy
    /// - `Error::NotFound` if the work does not exist
    /// - `Error::InvalidArgument` if the resource cannot own file sets
    pub async fn attach(&self, work: &Identifier, candidate: &UploadCandidate) -> Result<Attachment> {
        let duplicates = match self
            .detector
            .check_for_owner(candidate, self.policy, work)
            .await?
        {
            DuplicateCheck::Unique => vec![],
            DuplicateCheck::Duplicates(owners) => owners.into_iter().map(|o| o.id).collect(),
        };
        let role = candidate.role.unwrap_or(FileRole::Original);

        let mut tx = Transaction::new();
        let owner = tx.load(self.backends(), work).await?;
        if !Relation::Members.definition().accepts_source(owner.kind) {
            return Err(Error::InvalidArgument(format!(
                "a {} cannot own file sets",
                owner.kind
            )));
        }
        let members: Vec<Identifier> = owner.targets(Relation::Members).cloned().collect();

        let mut existing = None;
        for member in &members {
            if tx.try_load(self.backends(), member).await?
                && tx.get(member).is_some_and(|fs| fs.role == Some(role))
            {
                existing = Some(member.clone());
                break;
            }
        }

        let mut changes = ChangeSet::default();
        let unchanged = existing
            .as_ref()
            .and_then(|id| tx.get(id))
            .is_some_and(|fs| fs.digest.as_ref() == Some(&candidate.digest));
        let (file_set, replaced, task) = match existing {
            Some(id) if unchanged => {
                debug!(%work, file_set = %id, "content already attached");
                let task = Task::Characterize {
                    file_set: id.clone(),
                };
                (id, false, task)
            }
            Some(id) => {
                if let Some(fs) = tx.get_mut(&id) {
                    fs.digest = Some(candidate.digest.clone());
                    if let Some(name) = &candidate.file_name {
                        fs.title = Some(name.clone());
                    }
                }
                let task = Task::IngestFile {
                    file_set: id.clone(),
                    role,
                };
                (id, true, task)
            }
            None => {
                let mut fs = Resource::assigned(ResourceKind::FileSet)
                    .with_digest(candidate.digest.clone())
                    .with_role(role);
                if let Some(name) = &candidate.file_name {
                    fs = fs.with_title(name.clone());
                }
                let id = fs.id.clone();
                tx.create(fs)?;
                link(&mut tx, work, Relation::Members, Relation::MemberOf, &id);
                changes.added.push(id.clone());
                let task = Task::Characterize {
                    file_set: id.clone(),
                };
                (id, false, task)
            }
        };

        let mut changes = self.manager.finish(tx, changes).await?;
        self.manager.deliver(task, &mut changes).await;

        info!(%work, %file_set, ?role, replaced, "content attached");
        Ok(Attachment {
            file_set,
            replaced,
            duplicates,
            changes,
        })
    }

    /// Store the digest reported by characterization of `file_set`.
    ///
    /// Reindexes the file set, enqueues reindexing of its parent and the
    /// parent's collections, then derivative generation.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if the file set does not exist
    /// - `Error::InvalidArgument` if the resource is not a file set
    pub async fn record_characterization(
        &self,
        file_set: &Identifier,
        digest: ContentDigest,
    ) -> Result<ChangeSet> {
        let mut tx = Transaction::new();
        let fs = tx.load(self.backends(), file_set).await?;
        if fs.kind != ResourceKind::FileSet {
            return Err(Error::InvalidArgument(format!(
                "{} is a {}, not a file set",
                file_set, fs.kind
            )));
        }
        fs.digest = Some(digest);

        let mut changes = self.manager.finish(tx, ChangeSet::default()).await?;
        let task = Task::CreateDerivatives {
            file_set: file_set.clone(),
        };
        self.manager.deliver(task, &mut changes).await;
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryRepository;

    #[tokio::test]
    async fn collection_cannot_own_file_sets() {
        let repo = MemoryRepository::new();
        let collection = Resource::assigned(ResourceKind::Collection);
        repo.insert(collection.clone());

        let ingestor = Ingestor::new(Backends::in_memory(&repo), DuplicatePolicy::Warn);
        let err = ingestor
            .attach(&collection.id, &UploadCandidate::from_bytes(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(repo.resource_count(), 1);
    }

    #[tokio::test]
    async fn characterization_requires_file_set() {
        let repo = MemoryRepository::new();
        let work = Resource::assigned(ResourceKind::Work);
        repo.insert(work.clone());

        let ingestor = Ingestor::new(Backends::in_memory(&repo), DuplicatePolicy::Warn);
        let err = ingestor
            .record_characterization(&work.id, ContentDigest::sha256(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
