//! engine::duplicates
//!
//! Advisory detection of byte-identical uploads.
//!
//! The index is queried for content resources with the candidate's digest
//! and each match is resolved to its owning work. Matches are re-checked
//! against the store because the index may lag behind it: entries whose
//! resource is gone, whose digest changed, or whose owner is gone are
//! skipped. Nothing is locked, so a unique result is only valid at the
//! time it was observed.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::backend::Backends;
use crate::core::config::DuplicatePolicy;
use crate::core::resource::{Resource, UploadCandidate};
use crate::core::types::Identifier;
use crate::error::{Error, Result};

/// Outcome of a policy-gated duplicate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateCheck {
    /// No existing owner holds identical content.
    Unique,
    /// Owners already holding identical content, sorted by identifier.
    Duplicates(Vec<Resource>),
}

impl DuplicateCheck {
    /// Whether the candidate is unique.
    pub fn is_unique(&self) -> bool {
        matches!(self, DuplicateCheck::Unique)
    }
}

/// Finds existing owners of identical content.
#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    backends: Backends,
}

impl DuplicateDetector {
    /// Create a detector over the given backends.
    pub fn new(backends: Backends) -> Self {
        Self { backends }
    }

    /// Owners of content whose digest equals the candidate's.
    ///
    /// Returns the containers, never the matching content resources,
    /// without repeats and sorted by identifier.
    ///
    /// # Errors
    ///
    /// Propagates index and store failures; a stale match is not an error.
    pub async fn find_duplicates(&self, candidate: &UploadCandidate) -> Result<Vec<Resource>> {
        let matches = self.backends.find_by_digest(&candidate.digest).await?;
        debug!(digest = %candidate.digest, matches = matches.len(), "digest lookup");

        let mut owners = BTreeMap::new();
        for id in matches {
            let Some(entry) = self.backends.get(&id).await? else {
                warn!(%id, "index lists content missing from the store");
                continue;
            };
            let content = entry.resource;
            if content.digest.as_ref() != Some(&candidate.digest) {
                warn!(%id, "index digest is stale");
                continue;
            }
            let Some(owner_id) = content.parent() else {
                debug!(%id, "content has no owner");
                continue;
            };
            if owners.contains_key(owner_id) {
                continue;
            }
            match self.backends.get(owner_id).await? {
                Some(owner) => {
                    owners.insert(owner_id.clone(), owner.resource);
                }
                None => warn!(%id, owner = %owner_id, "owner missing from the store"),
            }
        }

        Ok(owners.into_values().collect())
    }

    /// Whether no existing owner holds identical content.
    pub async fn is_unique(&self, candidate: &UploadCandidate) -> Result<bool> {
        Ok(self.find_duplicates(candidate).await?.is_empty())
    }

    /// Apply a duplicate policy to the candidate.
    ///
    /// # Errors
    ///
    /// Returns `Error::DuplicateContent` under `DuplicatePolicy::Block`
    /// when owners exist.
    pub async fn check(
        &self,
        candidate: &UploadCandidate,
        policy: DuplicatePolicy,
    ) -> Result<DuplicateCheck> {
        let owners = self.find_duplicates(candidate).await?;
        Self::gate(candidate, owners, policy)
    }

    /// Apply a duplicate policy to content about to be attached to `owner`.
    ///
    /// Content `owner` already holds does not count against it, so
    /// repeating an attach is not rejected as a duplicate of itself.
    ///
    /// # Errors
    ///
    /// Returns `Error::DuplicateContent` under `DuplicatePolicy::Block`
    /// when other owners exist.
    pub async fn check_for_owner(
        &self,
        candidate: &UploadCandidate,
        policy: DuplicatePolicy,
        owner: &Identifier,
    ) -> Result<DuplicateCheck> {
        let mut owners = self.find_duplicates(candidate).await?;
        owners.retain(|o| &o.id != owner);
        Self::gate(candidate, owners, policy)
    }

    fn gate(
        candidate: &UploadCandidate,
        owners: Vec<Resource>,
        policy: DuplicatePolicy,
    ) -> Result<DuplicateCheck> {
        if owners.is_empty() {
            return Ok(DuplicateCheck::Unique);
        }

        let ids: Vec<_> = owners.iter().map(|o| o.id.clone()).collect();
        match policy {
            DuplicatePolicy::Block => Err(Error::DuplicateContent {
                digest: candidate.digest.clone(),
                owners: ids,
            }),
            DuplicatePolicy::Warn => {
                warn!(
                    digest = %candidate.digest,
                    owners = ?ids,
                    "content already held by other works"
                );
                Ok(DuplicateCheck::Duplicates(owners))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryRepository;
    use crate::core::relations::Relation;
    use crate::core::resource::ResourceKind;
    use crate::core::types::ContentDigest;

    fn owned_content(repo: &MemoryRepository, digest: &ContentDigest) -> (Resource, Resource) {
        let mut owner = Resource::minted(ResourceKind::Asset, "SI", "SI-101010").unwrap();
        let mut file_set = Resource::assigned(ResourceKind::FileSet).with_digest(digest.clone());
        owner.insert(Relation::Members, file_set.id.clone());
        file_set.insert(Relation::MemberOf, owner.id.clone());
        repo.insert(owner.clone());
        repo.insert(file_set.clone());
        (owner, file_set)
    }

    #[tokio::test]
    async fn stale_digest_is_skipped() {
        let repo = MemoryRepository::new();
        let digest = ContentDigest::sha256(b"original bytes");
        let (_owner, mut file_set) = owned_content(&repo, &digest);

        // Content replaced in the store, index not yet refreshed.
        file_set.digest = Some(ContentDigest::sha256(b"replacement"));
        repo.insert_unindexed(file_set);

        let detector = DuplicateDetector::new(Backends::in_memory(&repo));
        assert!(detector
            .is_unique(&UploadCandidate::new(digest))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn orphan_content_is_skipped() {
        let repo = MemoryRepository::new();
        let digest = ContentDigest::sha256(b"loose");
        repo.insert(Resource::assigned(ResourceKind::FileSet).with_digest(digest.clone()));

        let detector = DuplicateDetector::new(Backends::in_memory(&repo));
        assert!(detector
            .find_duplicates(&UploadCandidate::new(digest))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn missing_owner_is_skipped() {
        let repo = MemoryRepository::new();
        let digest = ContentDigest::sha256(b"bytes");
        let (owner, _) = owned_content(&repo, &digest);
        repo.forget(&owner.id);

        let detector = DuplicateDetector::new(Backends::in_memory(&repo));
        assert!(detector
            .is_unique(&UploadCandidate::new(digest))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn block_policy_rejects() {
        let repo = MemoryRepository::new();
        let digest = ContentDigest::sha256(b"bytes");
        let (owner, _) = owned_content(&repo, &digest);

        let detector = DuplicateDetector::new(Backends::in_memory(&repo));
        let err = detector
            .check(&UploadCandidate::new(digest), DuplicatePolicy::Block)
            .await
            .unwrap_err();
        match err {
            Error::DuplicateContent { owners, .. } => assert_eq!(owners, vec![owner.id]),
            other => panic!("expected DuplicateContent, got {other:?}"),
        }
    }
}
