//! core::resource
//!
//! Persisted repository objects and upload candidates.
//!
//! # Identity
//!
//! Works and assets carry a minted identity: the identifier is derived
//! from a seed within a namespace prefix and is re-verified on every
//! persist. File sets and collections are assigned a random identifier.
//!
//! # Relations
//!
//! Relations are a map from [`Relation`] to a set of identifiers. Empty
//! sets are never stored, so two resources with the same links compare
//! equal regardless of edit history.
//!
//! # Example
//!
//! ```
//! use lakeshore::core::relations::Relation;
//! use lakeshore::core::resource::{Resource, ResourceKind};
//!
//! let mut work = Resource::minted(ResourceKind::Work, "SI", "SI-101010").unwrap();
//! let file_set = Resource::assigned(ResourceKind::FileSet);
//!
//! assert!(work.insert(Relation::Members, file_set.id.clone()));
//! assert!(work.contains(Relation::Members, &file_set.id));
//! assert!(work.verify_checksum().is_ok());
//! ```

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::minter::{mint, verify_identifier};
use super::relations::{Direction, Relation};
use super::types::{ContentDigest, Identifier, Version};
use crate::error::Result;

/// The kind of repository object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A non-asset work (exhibition, agent, place).
    Work,
    /// A primary digital asset.
    Asset,
    /// A file variant belonging to a work.
    FileSet,
    /// A curated grouping of resources.
    Collection,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceKind::Work => "work",
            ResourceKind::Asset => "asset",
            ResourceKind::FileSet => "file_set",
            ResourceKind::Collection => "collection",
        };
        write!(f, "{}", s)
    }
}

/// The use of a file set within its work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    Original,
    Intermediate,
    Preservation,
    Legacy,
}

impl FileRole {
    /// Facet label for index rollups.
    pub fn label(self) -> &'static str {
        match self {
            FileRole::Original => "Original File Set",
            FileRole::Intermediate => "Intermediate File Set",
            FileRole::Preservation => "Preservation Master File Set",
            FileRole::Legacy => "Legacy File Set",
        }
    }
}

/// How a resource's identifier was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Identity {
    /// Derived from `seed` within `prefix`; must always re-verify.
    Minted { prefix: String, seed: String },
    /// Randomly assigned at creation.
    Assigned,
}

/// A persisted repository object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Globally unique identifier.
    pub id: Identifier,
    /// What kind of object this is.
    pub kind: ResourceKind,
    /// How the identifier was obtained.
    pub identity: Identity,
    /// Relation sets, keyed by predicate. Empty sets are pruned.
    #[serde(default)]
    pub relations: BTreeMap<Relation, BTreeSet<Identifier>>,
    /// Content digest for content-bearing resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<ContentDigest>,
    /// File role for file sets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<FileRole>,
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Last time the resource was persisted with changes.
    pub modified_at: DateTime<Utc>,
}

impl Resource {
    /// Create a resource whose identifier is minted from `seed`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` if the prefix or seed is empty.
    pub fn minted(kind: ResourceKind, prefix: &str, seed: &str) -> Result<Self> {
        let id = mint(prefix, seed)?;
        Ok(Self::with_identity(
            id,
            kind,
            Identity::Minted {
                prefix: prefix.to_string(),
                seed: seed.to_string(),
            },
        ))
    }

    /// Create a minted resource with a caller-supplied identifier.
    ///
    /// The override is accepted only if it equals the identifier minted
    /// from `seed`.
    ///
    /// # Errors
    ///
    /// Returns `Error::ChecksumMismatch` if the override does not match.
    ///
    /// # Example
    ///
    /// ```
    /// use lakeshore::core::resource::{Resource, ResourceKind};
    /// use lakeshore::core::types::Identifier;
    ///
    /// let good = Identifier::new("233b76a6-193d-8deb-7346-593a3857f05e").unwrap();
    /// assert!(Resource::minted_with_override(ResourceKind::Asset, "SI", "SI-101010", good).is_ok());
    ///
    /// let bad = Identifier::new("00000000-0000-0000-0000-000000000000").unwrap();
    /// assert!(Resource::minted_with_override(ResourceKind::Asset, "SI", "SI-101010", bad).is_err());
    /// ```
    pub fn minted_with_override(
        kind: ResourceKind,
        prefix: &str,
        seed: &str,
        id: Identifier,
    ) -> Result<Self> {
        verify_identifier(prefix, seed, &id)?;
        Ok(Self::with_identity(
            id,
            kind,
            Identity::Minted {
                prefix: prefix.to_string(),
                seed: seed.to_string(),
            },
        ))
    }

    /// Create a resource with a randomly assigned identifier.
    pub fn assigned(kind: ResourceKind) -> Self {
        Self::with_identity(Identifier::random(), kind, Identity::Assigned)
    }

    fn with_identity(id: Identifier, kind: ResourceKind, identity: Identity) -> Self {
        Self {
            id,
            kind,
            identity,
            relations: BTreeMap::new(),
            digest: None,
            role: None,
            title: None,
            modified_at: Utc::now(),
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the content digest.
    pub fn with_digest(mut self, digest: ContentDigest) -> Self {
        self.digest = Some(digest);
        self
    }

    /// Set the file role.
    pub fn with_role(mut self, role: FileRole) -> Self {
        self.role = Some(role);
        self
    }

    /// The seed the identifier was minted from, if any.
    pub fn seed(&self) -> Option<&str> {
        match &self.identity {
            Identity::Minted { seed, .. } => Some(seed),
            Identity::Assigned => None,
        }
    }

    /// Re-check that a minted identifier still matches its seed.
    ///
    /// Assigned identities always pass.
    ///
    /// # Errors
    ///
    /// Returns `Error::ChecksumMismatch` if the seed was changed after
    /// the identifier was assigned.
    pub fn verify_checksum(&self) -> Result<()> {
        match &self.identity {
            Identity::Minted { prefix, seed } => verify_identifier(prefix, seed, &self.id),
            Identity::Assigned => Ok(()),
        }
    }

    /// The targets of a relation.
    pub fn targets(&self, relation: Relation) -> impl Iterator<Item = &Identifier> {
        self.relations.get(&relation).into_iter().flatten()
    }

    /// The targets of a relation as an owned set.
    pub fn target_set(&self, relation: Relation) -> BTreeSet<Identifier> {
        self.relations.get(&relation).cloned().unwrap_or_default()
    }

    /// Whether `target` is a value of `relation`.
    pub fn contains(&self, relation: Relation, target: &Identifier) -> bool {
        self.relations
            .get(&relation)
            .is_some_and(|set| set.contains(target))
    }

    /// Add a target. Returns `false` if it was already present.
    pub fn insert(&mut self, relation: Relation, target: Identifier) -> bool {
        self.relations.entry(relation).or_default().insert(target)
    }

    /// Remove a target. Returns `false` if it was absent.
    pub fn remove(&mut self, relation: Relation, target: &Identifier) -> bool {
        let Some(set) = self.relations.get_mut(&relation) else {
            return false;
        };
        let removed = set.remove(target);
        if set.is_empty() {
            self.relations.remove(&relation);
        }
        removed
    }

    /// The single value of a single-valued relation.
    pub fn single(&self, relation: Relation) -> Option<&Identifier> {
        self.targets(relation).next()
    }

    /// The preferred representation, if set.
    pub fn preferred(&self) -> Option<&Identifier> {
        self.single(Relation::PreferredRepresentation)
    }

    /// The owning work of a file set.
    pub fn parent(&self) -> Option<&Identifier> {
        self.single(Relation::MemberOf)
    }

    /// Whether any other resource links to this one.
    pub fn has_inbound_relationships(&self) -> bool {
        self.relations
            .keys()
            .any(|r| r.definition().direction == Direction::Inverse)
    }

    /// Containers whose rollups depend on this resource.
    pub fn containers(&self) -> impl Iterator<Item = &Identifier> {
        Relation::ANCESTRY
            .into_iter()
            .flat_map(move |r| self.targets(r))
    }

    /// Record a modification time.
    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}

/// A resource as read from the store, with its CAS version.
#[derive(Debug, Clone)]
pub struct ResourceEntry {
    /// Version to pass back as `expected` when writing.
    pub version: Version,
    /// The stored resource.
    pub resource: Resource,
}

/// Content not yet persisted, awaiting a duplicate check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadCandidate {
    /// Digest of the uploaded bytes.
    pub digest: ContentDigest,
    /// Original file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Intended use within the work.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<FileRole>,
}

impl UploadCandidate {
    /// A candidate with only a digest.
    pub fn new(digest: ContentDigest) -> Self {
        Self {
            digest,
            file_name: None,
            role: None,
        }
    }

    /// A candidate for uploaded bytes, hashed with SHA-256.
    pub fn from_bytes(content: &[u8]) -> Self {
        Self::new(ContentDigest::sha256(content))
    }

    /// Set the original file name.
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Set the intended file role.
    pub fn with_role(mut self, role: FileRole) -> Self {
        self.role = Some(role);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn minted_identifier_matches_seed() {
        let asset = Resource::minted(ResourceKind::Asset, "SI", "SI-101010").unwrap();
        assert_eq!(asset.id.as_str(), "233b76a6-193d-8deb-7346-593a3857f05e");
        assert_eq!(asset.seed(), Some("SI-101010"));
        assert!(asset.verify_checksum().is_ok());
    }

    #[test]
    fn minted_without_prefix_fails() {
        let err = Resource::minted(ResourceKind::Asset, "", "SI-101010").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn changed_seed_fails_checksum() {
        let mut asset = Resource::minted(ResourceKind::Asset, "SI", "SI-101010").unwrap();
        asset.identity = Identity::Minted {
            prefix: "SI".into(),
            seed: "1234".into(),
        };
        assert!(matches!(
            asset.verify_checksum(),
            Err(Error::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn assigned_always_verifies() {
        let fs = Resource::assigned(ResourceKind::FileSet);
        assert!(fs.seed().is_none());
        assert!(fs.verify_checksum().is_ok());
    }

    #[test]
    fn insert_and_remove_are_idempotent() {
        let mut work = Resource::assigned(ResourceKind::Work);
        let target = Identifier::random();

        assert!(work.insert(Relation::Attachments, target.clone()));
        assert!(!work.insert(Relation::Attachments, target.clone()));
        assert!(work.remove(Relation::Attachments, &target));
        assert!(!work.remove(Relation::Attachments, &target));
    }

    #[test]
    fn empty_sets_are_pruned() {
        let mut work = Resource::assigned(ResourceKind::Work);
        let target = Identifier::random();
        work.insert(Relation::Documents, target.clone());
        work.remove(Relation::Documents, &target);
        assert!(work.relations.is_empty());
    }

    #[test]
    fn inbound_relationships_follow_inverse_predicates() {
        let mut asset = Resource::assigned(ResourceKind::Asset);
        assert!(!asset.has_inbound_relationships());

        asset.insert(Relation::Attachments, Identifier::random());
        assert!(!asset.has_inbound_relationships());

        asset.insert(Relation::RepresentationOf, Identifier::random());
        assert!(asset.has_inbound_relationships());
    }

    #[test]
    fn containers_cover_parent_and_collections() {
        let mut fs = Resource::assigned(ResourceKind::FileSet);
        let work = Identifier::random();
        let collection = Identifier::random();
        fs.insert(Relation::MemberOf, work.clone());
        fs.insert(Relation::InCollections, collection.clone());

        let containers: BTreeSet<_> = fs.containers().cloned().collect();
        assert_eq!(containers, BTreeSet::from([work.clone(), collection]));
        assert_eq!(fs.parent(), Some(&work));
    }

    #[test]
    fn serde_round_trip_preserves_relations() {
        let mut work = Resource::minted(ResourceKind::Work, "SI", "SI-1")
            .unwrap()
            .with_title("Nighthawks");
        work.insert(Relation::Representations, Identifier::random());

        let json = serde_json::to_string(&work).unwrap();
        let parsed: Resource = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, work);
    }

    #[test]
    fn candidate_from_bytes_uses_sha256() {
        let candidate = UploadCandidate::from_bytes(b"hello world").with_role(FileRole::Original);
        assert_eq!(candidate.digest.algorithm(), "sha256");
        assert_eq!(candidate.role, Some(FileRole::Original));
    }
}
