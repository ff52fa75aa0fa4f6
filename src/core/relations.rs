//! core::relations
//!
//! The closed registry of relation types.
//!
//! # Design
//!
//! Every predicate a resource may carry is a variant of [`Relation`], and
//! each variant has exactly one static [`RelationDefinition`]. Cardinality,
//! exclusivity and the inverse predicate are therefore known at compile
//! time; the manager checks an operation against the definition rather than
//! against a string key.
//!
//! Forward relations are edited by callers. Inverse relations are stored on
//! the target and maintained by the manager alongside every forward edit.
//!
//! # Example
//!
//! ```
//! use lakeshore::core::relations::{Cardinality, Relation};
//!
//! let def = Relation::Representations.definition();
//! assert_eq!(def.cardinality, Cardinality::Multiple);
//! assert!(def.exclusive);
//! assert_eq!(def.inverse, Some(Relation::RepresentationOf));
//!
//! let preferred: Relation = "preferred".parse().unwrap();
//! assert_eq!(preferred, Relation::PreferredRepresentation);
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::resource::ResourceKind;
use super::types::TypeError;

/// A predicate linking one resource to a set of others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Work to its file sets.
    Members,
    /// Work to the assets that depict it.
    Representations,
    /// Work to the assets that document it.
    Documents,
    /// Asset to the assets attached to it.
    Attachments,
    /// Work to its single preferred representation.
    PreferredRepresentation,
    /// Collection to anything it gathers.
    CollectionMembers,

    /// Inverse of [`Relation::Members`].
    MemberOf,
    /// Inverse of [`Relation::Representations`].
    RepresentationOf,
    /// Inverse of [`Relation::Documents`].
    DocumentOf,
    /// Inverse of [`Relation::Attachments`].
    AttachmentOf,
    /// Inverse of [`Relation::PreferredRepresentation`].
    PreferredRepresentationOf,
    /// Inverse of [`Relation::CollectionMembers`].
    InCollections,
}

/// How many targets a relation may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// At most one value; assignment replaces.
    Single,
    /// A set of values; edits add and remove.
    Multiple,
}

/// Which side of a link the relation is stored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Stored on the source; edited by callers.
    Forward,
    /// Stored on the target; maintained by the manager.
    Inverse,
}

/// Static description of one relation type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationDefinition {
    /// The relation this definition describes.
    pub relation: Relation,
    /// Predicate name as stored and indexed.
    pub name: &'static str,
    /// Single or multiple valued.
    pub cardinality: Cardinality,
    /// A target may be linked from at most one source at a time.
    pub exclusive: bool,
    /// Forward or inverse side.
    pub direction: Direction,
    /// The predicate kept consistent on the other side.
    pub inverse: Option<Relation>,
    /// Kinds allowed to hold this predicate.
    pub source_kinds: &'static [ResourceKind],
    /// Kinds allowed as values.
    pub target_kinds: &'static [ResourceKind],
    /// Index facet emitted when the predicate is non-empty.
    pub facet: Option<&'static str>,
}

impl RelationDefinition {
    /// Whether this is the single-valued preferred relation.
    pub fn is_preferred(&self) -> bool {
        self.cardinality == Cardinality::Single && self.direction == Direction::Forward
    }

    /// Whether callers may edit this relation with add/remove semantics.
    pub fn accepts_add_or_remove(&self) -> bool {
        self.cardinality == Cardinality::Multiple && self.direction == Direction::Forward
    }

    /// Whether `kind` may hold this predicate.
    pub fn accepts_source(&self, kind: ResourceKind) -> bool {
        self.source_kinds.contains(&kind)
    }

    /// Whether `kind` may be a value of this predicate.
    pub fn accepts_target(&self, kind: ResourceKind) -> bool {
        self.target_kinds.contains(&kind)
    }
}

const WORKS: &[ResourceKind] = &[ResourceKind::Work, ResourceKind::Asset];
const FILE_SETS: &[ResourceKind] = &[ResourceKind::FileSet];
const COLLECTIONS: &[ResourceKind] = &[ResourceKind::Collection];
const ANY: &[ResourceKind] = &[
    ResourceKind::Work,
    ResourceKind::Asset,
    ResourceKind::FileSet,
    ResourceKind::Collection,
];

static MEMBERS: RelationDefinition = RelationDefinition {
    relation: Relation::Members,
    name: "members",
    cardinality: Cardinality::Multiple,
    exclusive: true,
    direction: Direction::Forward,
    inverse: Some(Relation::MemberOf),
    source_kinds: WORKS,
    target_kinds: FILE_SETS,
    facet: Some("Has Files"),
};

static REPRESENTATIONS: RelationDefinition = RelationDefinition {
    relation: Relation::Representations,
    name: "representations",
    cardinality: Cardinality::Multiple,
    exclusive: true,
    direction: Direction::Forward,
    inverse: Some(Relation::RepresentationOf),
    source_kinds: WORKS,
    target_kinds: WORKS,
    facet: Some("Has Representation"),
};

static DOCUMENTS: RelationDefinition = RelationDefinition {
    relation: Relation::Documents,
    name: "documents",
    cardinality: Cardinality::Multiple,
    exclusive: true,
    direction: Direction::Forward,
    inverse: Some(Relation::DocumentOf),
    source_kinds: WORKS,
    target_kinds: WORKS,
    facet: Some("Has Document"),
};

static ATTACHMENTS: RelationDefinition = RelationDefinition {
    relation: Relation::Attachments,
    name: "attachments",
    cardinality: Cardinality::Multiple,
    exclusive: false,
    direction: Direction::Forward,
    inverse: Some(Relation::AttachmentOf),
    source_kinds: WORKS,
    target_kinds: WORKS,
    facet: Some("Is Attachment"),
};

static PREFERRED_REPRESENTATION: RelationDefinition = RelationDefinition {
    relation: Relation::PreferredRepresentation,
    name: "preferred_representation",
    cardinality: Cardinality::Single,
    exclusive: false,
    direction: Direction::Forward,
    inverse: Some(Relation::PreferredRepresentationOf),
    source_kinds: WORKS,
    target_kinds: WORKS,
    facet: Some("Has Preferred Representation"),
};

static COLLECTION_MEMBERS: RelationDefinition = RelationDefinition {
    relation: Relation::CollectionMembers,
    name: "collection_members",
    cardinality: Cardinality::Multiple,
    exclusive: false,
    direction: Direction::Forward,
    inverse: Some(Relation::InCollections),
    source_kinds: COLLECTIONS,
    target_kinds: ANY,
    facet: None,
};

static MEMBER_OF: RelationDefinition = RelationDefinition {
    relation: Relation::MemberOf,
    name: "member_of",
    cardinality: Cardinality::Multiple,
    exclusive: false,
    direction: Direction::Inverse,
    inverse: Some(Relation::Members),
    source_kinds: FILE_SETS,
    target_kinds: WORKS,
    facet: None,
};

static REPRESENTATION_OF: RelationDefinition = RelationDefinition {
    relation: Relation::RepresentationOf,
    name: "representation_of",
    cardinality: Cardinality::Multiple,
    exclusive: false,
    direction: Direction::Inverse,
    inverse: Some(Relation::Representations),
    source_kinds: WORKS,
    target_kinds: WORKS,
    facet: Some("Is Representation"),
};

static DOCUMENT_OF: RelationDefinition = RelationDefinition {
    relation: Relation::DocumentOf,
    name: "document_of",
    cardinality: Cardinality::Multiple,
    exclusive: false,
    direction: Direction::Inverse,
    inverse: Some(Relation::Documents),
    source_kinds: WORKS,
    target_kinds: WORKS,
    facet: Some("Is Document"),
};

static ATTACHMENT_OF: RelationDefinition = RelationDefinition {
    relation: Relation::AttachmentOf,
    name: "attachment_of",
    cardinality: Cardinality::Multiple,
    exclusive: false,
    direction: Direction::Inverse,
    inverse: Some(Relation::Attachments),
    source_kinds: WORKS,
    target_kinds: WORKS,
    facet: Some("Has Attachment"),
};

static PREFERRED_REPRESENTATION_OF: RelationDefinition = RelationDefinition {
    relation: Relation::PreferredRepresentationOf,
    name: "preferred_representation_of",
    cardinality: Cardinality::Multiple,
    exclusive: false,
    direction: Direction::Inverse,
    inverse: Some(Relation::PreferredRepresentation),
    source_kinds: WORKS,
    target_kinds: WORKS,
    facet: Some("Is Preferred Representation"),
};

static IN_COLLECTIONS: RelationDefinition = RelationDefinition {
    relation: Relation::InCollections,
    name: "in_collections",
    cardinality: Cardinality::Multiple,
    exclusive: false,
    direction: Direction::Inverse,
    inverse: Some(Relation::CollectionMembers),
    source_kinds: ANY,
    target_kinds: COLLECTIONS,
    facet: Some("In Collection"),
};

impl Relation {
    /// Every relation, forward relations first.
    pub const ALL: [Relation; 12] = [
        Relation::Members,
        Relation::Representations,
        Relation::Documents,
        Relation::Attachments,
        Relation::PreferredRepresentation,
        Relation::CollectionMembers,
        Relation::MemberOf,
        Relation::RepresentationOf,
        Relation::DocumentOf,
        Relation::AttachmentOf,
        Relation::PreferredRepresentationOf,
        Relation::InCollections,
    ];

    /// The static definition of this relation.
    pub fn definition(self) -> &'static RelationDefinition {
        match self {
            Relation::Members => &MEMBERS,
            Relation::Representations => &REPRESENTATIONS,
            Relation::Documents => &DOCUMENTS,
            Relation::Attachments => &ATTACHMENTS,
            Relation::PreferredRepresentation => &PREFERRED_REPRESENTATION,
            Relation::CollectionMembers => &COLLECTION_MEMBERS,
            Relation::MemberOf => &MEMBER_OF,
            Relation::RepresentationOf => &REPRESENTATION_OF,
            Relation::DocumentOf => &DOCUMENT_OF,
            Relation::AttachmentOf => &ATTACHMENT_OF,
            Relation::PreferredRepresentationOf => &PREFERRED_REPRESENTATION_OF,
            Relation::InCollections => &IN_COLLECTIONS,
        }
    }

    /// Predicate name as stored and indexed.
    pub fn name(self) -> &'static str {
        self.definition().name
    }

    /// The predicate kept consistent on the other side of the link.
    pub fn inverse(self) -> Option<Relation> {
        self.definition().inverse
    }

    /// Whether this relation is maintained by the manager only.
    pub fn is_inverse(self) -> bool {
        self.definition().direction == Direction::Inverse
    }

    /// Forward relations, the ones callers may edit.
    pub fn forward() -> impl Iterator<Item = Relation> {
        Self::ALL.into_iter().filter(|r| !r.is_inverse())
    }

    /// Relations whose targets are the holder's containers.
    ///
    /// Walking these upward yields the ancestors whose index rollups
    /// depend on the holder's state.
    pub const ANCESTRY: [Relation; 2] = [Relation::MemberOf, Relation::InCollections];
}

impl FromStr for Relation {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "preferred" {
            return Ok(Relation::PreferredRepresentation);
        }
        Self::ALL
            .into_iter()
            .find(|r| r.name() == s)
            .ok_or_else(|| TypeError::UnknownRelation(s.to_string()))
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definitions_describe_their_own_relation() {
        for relation in Relation::ALL {
            assert_eq!(relation.definition().relation, relation);
        }
    }

    #[test]
    fn inverses_are_symmetric() {
        for relation in Relation::ALL {
            let inverse = relation.inverse().expect("every relation has an inverse");
            assert_eq!(inverse.inverse(), Some(relation));
            assert_ne!(relation.is_inverse(), inverse.is_inverse());
        }
    }

    #[test]
    fn inverse_kinds_mirror_forward_kinds() {
        for relation in Relation::forward() {
            let def = relation.definition();
            let inv = def.inverse.unwrap().definition();
            assert_eq!(def.source_kinds, inv.target_kinds);
            assert_eq!(def.target_kinds, inv.source_kinds);
        }
    }

    #[test]
    fn names_round_trip() {
        for relation in Relation::ALL {
            assert_eq!(relation.name().parse::<Relation>().unwrap(), relation);
        }
    }

    #[test]
    fn unknown_name_rejected() {
        assert_eq!(
            "keywords".parse::<Relation>(),
            Err(TypeError::UnknownRelation("keywords".into()))
        );
    }

    #[test]
    fn only_preferred_is_single_valued() {
        let singles: Vec<_> = Relation::forward()
            .filter(|r| r.definition().is_preferred())
            .collect();
        assert_eq!(singles, vec![Relation::PreferredRepresentation]);
    }

    #[test]
    fn add_or_remove_excludes_preferred_and_inverse() {
        assert!(Relation::Representations
            .definition()
            .accepts_add_or_remove());
        assert!(!Relation::PreferredRepresentation
            .definition()
            .accepts_add_or_remove());
        assert!(!Relation::MemberOf.definition().accepts_add_or_remove());
    }

    #[test]
    fn serde_uses_snake_case_names() {
        let json = serde_json::to_string(&Relation::PreferredRepresentation).unwrap();
        assert_eq!(json, "\"preferred_representation\"");
    }
}
