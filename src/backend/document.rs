//! backend::document
//!
//! The searchable projection of a resource.
//!
//! A document carries the resource's own fields plus facets derived from
//! its relations and rollups computed from its children. Rollups are why a
//! change to a file set requires its ancestors to be reindexed.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::relations::Relation;
use crate::core::resource::{Resource, ResourceKind};
use crate::core::types::{ContentDigest, Identifier};

/// Facet emitted for a resource with at least one inbound link.
pub const HAS_RELATIONSHIPS_FACET: &str = "Has Relationships";

/// Indexed view of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub id: Identifier,
    pub kind: ResourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<ContentDigest>,
    /// Relation name to target identifiers.
    pub relations: BTreeMap<String, BTreeSet<Identifier>>,
    /// Facet labels derived from relations and identity.
    pub facets: BTreeSet<String>,
    /// Role labels of member file sets.
    pub file_roles: BTreeSet<String>,
    /// Number of direct children (file sets or collection members).
    pub member_count: usize,
}

impl IndexDocument {
    /// Build the document for `resource`.
    ///
    /// `children` are the loaded members of the resource; identifiers that
    /// did not resolve are simply absent.
    pub fn build(resource: &Resource, children: &[Resource]) -> Self {
        let mut relations = BTreeMap::new();
        let mut facets = BTreeSet::new();

        for (relation, targets) in &resource.relations {
            if targets.is_empty() {
                continue;
            }
            relations.insert(relation.name().to_string(), targets.clone());
            if let Some(facet) = relation.definition().facet {
                facets.insert(facet.to_string());
            }
        }

        if resource.has_inbound_relationships() {
            facets.insert(HAS_RELATIONSHIPS_FACET.to_string());
        }

        let file_roles = children
            .iter()
            .filter(|c| c.kind == ResourceKind::FileSet)
            .filter_map(|c| c.role)
            .map(|role| role.label().to_string())
            .collect();

        let member_count = resource
            .targets(Relation::Members)
            .chain(resource.targets(Relation::CollectionMembers))
            .count();

        Self {
            id: resource.id.clone(),
            kind: resource.kind,
            title: resource.title.clone(),
            digest: resource.digest.clone(),
            relations,
            facets,
            file_roles,
            member_count,
        }
    }

    /// Whether the document lists `target` under `relation`.
    pub fn links(&self, relation: Relation, target: &Identifier) -> bool {
        self.relations
            .get(relation.name())
            .is_some_and(|set| set.contains(target))
    }

    /// Whether the document carries `facet`.
    pub fn has_facet(&self, facet: &str) -> bool {
        self.facets.contains(facet)
    }
}
