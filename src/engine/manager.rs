//! engine::manager
//!
//! Relationship consistency manager.
//!
//! # Architecture
//!
//! Every operation runs the same stages within one [`Transaction`]:
//!
//! ```text
//! load -> validate -> mutate -> persist -> reindex
//! ```
//!
//! Validation that needs no I/O (cardinality, self-links) runs before
//! anything is loaded. A failure before `persist` leaves the store
//! untouched; a failure during `persist` rolls back the writes already
//! applied. Nothing after `persist` fails the call: reindex work the index
//! and the queue both refuse is returned in [`ChangeSet::pending`].
//!
//! # Invariants
//!
//! - Exclusive relations: a target is held by at most one source. Adding it
//!   to a new source detaches it from every other holder in the same
//!   commit.
//! - Preferred relation: at most one value; assignment replaces.
//! - Inverse predicates on targets mirror every forward mutation.
//! - A call that changes nothing writes nothing, reindexes nothing and
//!   enqueues nothing.
//!
//! # Example
//!
//! ```
//! use lakeshore::backend::{memory::MemoryRepository, Backends};
//! use lakeshore::core::relations::Relation;
//! use lakeshore::core::resource::{Resource, ResourceKind};
//! use lakeshore::core::targets::TargetList;
//! use lakeshore::engine::RelationshipManager;
//!
//! # tokio_test::block_on(async {
//! let repo = MemoryRepository::new();
//! let work = Resource::minted(ResourceKind::Work, "SI", "SI-1").unwrap();
//! let asset = Resource::minted(ResourceKind::Asset, "SI", "SI-101010").unwrap();
//! repo.insert(work.clone());
//! repo.insert(asset.clone());
//!
//! let manager = RelationshipManager::new(Backends::in_memory(&repo));
//! let targets = TargetList::from(vec![asset.id.clone()]);
//! manager.add_or_remove(&work.id, Relation::Representations, &targets).await.unwrap();
//!
//! let asset = repo.resource(&asset.id).unwrap();
//! assert!(asset.contains(Relation::RepresentationOf, &work.id));
//! # });
//! ```

use std::collections::{BTreeSet, VecDeque};

use tracing::{debug, info, warn};

use super::transaction::Transaction;
use crate::backend::{Backends, Task};
use crate::core::relations::{Direction, Relation};
use crate::core::resource::Resource;
use crate::core::targets::TargetList;
use crate::core::types::Identifier;
use crate::error::{Error, Result};

/// What one manager call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Targets linked by the call.
    pub added: Vec<Identifier>,
    /// Targets unlinked by the call.
    pub removed: Vec<Identifier>,
    /// Former holders an exclusive target was detached from.
    pub detached: Vec<Identifier>,
    /// Resources written.
    pub persisted: Vec<Identifier>,
    /// Resources deleted.
    pub deleted: Vec<Identifier>,
    /// Resources reindexed synchronously.
    pub reindexed: Vec<Identifier>,
    /// Tasks handed to the queue.
    pub enqueued: Vec<Task>,
    /// Follow-up work the queue refused after the change was committed.
    ///
    /// Repeating the call would find nothing left to change, so these must
    /// be delivered by the caller, for example through
    /// [`RelationshipManager::redeliver`].
    pub pending: Vec<Task>,
}

impl ChangeSet {
    /// Whether the call changed nothing.
    pub fn is_noop(&self) -> bool {
        self.persisted.is_empty() && self.deleted.is_empty()
    }

    /// Whether every follow-up task reached the index or the queue.
    pub fn is_settled(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Keeps relation sets consistent across resources.
#[derive(Debug, Clone)]
pub struct RelationshipManager {
    backends: Backends,
}

impl RelationshipManager {
    /// Create a manager over the given backends.
    pub fn new(backends: Backends) -> Self {
        Self { backends }
    }

    /// The backends this manager writes through.
    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    /// Make `relation` on `source` hold exactly `targets`.
    ///
    /// Only the symmetric difference is applied. For exclusive relations,
    /// each newly added target is first detached from its current holder.
    /// An empty list clears the relation.
    ///
    /// # Errors
    ///
    /// - `Error::NotSupported` for the preferred relation or an inverse
    ///   predicate
    /// - `Error::InvalidArgument` for a self-link or a kind the relation
    ///   does not accept
    /// - `Error::NotFound` if the source or an added target does not exist
    pub async fn add_or_remove(
        &self,
        source: &Identifier,
        relation: Relation,
        targets: &TargetList,
    ) -> Result<ChangeSet> {
        let def = relation.definition();
        if !def.accepts_add_or_remove() {
            return Err(Error::NotSupported {
                operation: "add_or_remove",
                relation,
            });
        }
        reject_self_link(source, targets)?;
        let inverse = inverse_of(relation)?;

        let mut tx = Transaction::new();
        debug!(tx = %tx.id(), %source, %relation, "add_or_remove: load");
        let holder = tx.load(&self.backends, source).await?;
        check_source(holder, relation)?;

        let current = holder.target_set(relation);
        let requested: BTreeSet<Identifier> = targets.as_slice().iter().cloned().collect();
        let to_add: Vec<Identifier> = requested.difference(&current).cloned().collect();
        let to_remove: Vec<Identifier> = current.difference(&requested).cloned().collect();

        let mut changes = ChangeSet::default();
        if to_add.is_empty() && to_remove.is_empty() {
            debug!(tx = %tx.id(), "add_or_remove: no change");
            return Ok(changes);
        }

        for target in &to_add {
            let loaded = tx.load(&self.backends, target).await?;
            check_target(loaded, relation)?;
            if def.exclusive {
                let detached = self
                    .detach_exclusive(&mut tx, relation, target, source)
                    .await?;
                changes.detached.extend(detached);
            }
            link(&mut tx, source, relation, inverse, target);
            changes.added.push(target.clone());
        }

        for target in &to_remove {
            self.unlink_loading(&mut tx, source, relation, inverse, target)
                .await?;
            changes.removed.push(target.clone());
        }

        self.finish(tx, changes).await
    }

    /// Set the single-valued preferred relation to the first of `targets`.
    ///
    /// Any existing value is replaced; an empty list unsets it.
    ///
    /// # Errors
    ///
    /// - `Error::NotSupported` for any relation other than the preferred one
    /// - `Error::InvalidArgument` for a self-link or disallowed kind
    /// - `Error::NotFound` if the source or the new value does not exist
    pub async fn update(
        &self,
        source: &Identifier,
        relation: Relation,
        targets: &TargetList,
    ) -> Result<ChangeSet> {
        if !relation.definition().is_preferred() {
            return Err(Error::NotSupported {
                operation: "update",
                relation,
            });
        }
        reject_self_link(source, targets)?;
        let inverse = inverse_of(relation)?;

        let mut tx = Transaction::new();
        debug!(tx = %tx.id(), %source, %relation, "update: load");
        let holder = tx.load(&self.backends, source).await?;
        check_source(holder, relation)?;

        let old = holder.single(relation).cloned();
        let new = targets.primary().cloned();
        let mut changes = ChangeSet::default();
        if old == new {
            debug!(tx = %tx.id(), "update: no change");
            return Ok(changes);
        }

        if let Some(new) = &new {
            let loaded = tx.load(&self.backends, new).await?;
            check_target(loaded, relation)?;
        }
        if let Some(old) = &old {
            self.unlink_loading(&mut tx, source, relation, inverse, old)
                .await?;
            changes.removed.push(old.clone());
        }
        if let Some(new) = &new {
            link(&mut tx, source, relation, inverse, new);
            changes.added.push(new.clone());
        }

        self.finish(tx, changes).await
    }

    /// Make exactly `sources` hold `target` under `relation`.
    ///
    /// This edits from the target's side: the target's inverse predicate is
    /// compared with `sources` and the difference is applied to each
    /// source's forward relation.
    ///
    /// # Errors
    ///
    /// - `Error::NotSupported` under the same rules as `add_or_remove`
    /// - `Error::InvalidArgument` if an exclusive relation is given more
    ///   than one source
    /// - `Error::NotFound` if the target or an added source does not exist
    pub async fn add_or_remove_inbound(
        &self,
        target: &Identifier,
        relation: Relation,
        sources: &TargetList,
    ) -> Result<ChangeSet> {
        let def = relation.definition();
        if !def.accepts_add_or_remove() {
            return Err(Error::NotSupported {
                operation: "add_or_remove_inbound",
                relation,
            });
        }
        if def.exclusive && sources.len() > 1 {
            return Err(Error::InvalidArgument(format!(
                "'{}' is exclusive: at most one source may hold a target, got {}",
                relation,
                sources.len()
            )));
        }
        reject_self_link(target, sources)?;
        let inverse = inverse_of(relation)?;

        let mut tx = Transaction::new();
        debug!(tx = %tx.id(), %target, %relation, "add_or_remove_inbound: load");
        let held = tx.load(&self.backends, target).await?;
        check_target(held, relation)?;

        let current = held.target_set(inverse);
        let requested: BTreeSet<Identifier> = sources.as_slice().iter().cloned().collect();
        let to_add: Vec<Identifier> = requested.difference(&current).cloned().collect();
        let to_remove: Vec<Identifier> = current.difference(&requested).cloned().collect();

        let mut changes = ChangeSet::default();
        if to_add.is_empty() && to_remove.is_empty() {
            debug!(tx = %tx.id(), "add_or_remove_inbound: no change");
            return Ok(changes);
        }

        for source in &to_remove {
            if tx.try_load(&self.backends, source).await? {
                unlink(&mut tx, source, relation, inverse, target);
            } else {
                warn!(%source, %target, "pruning dangling inbound link");
                if let Some(held) = tx.get_mut(target) {
                    held.remove(inverse, source);
                }
            }
            changes.removed.push(source.clone());
        }

        for source in &to_add {
            let holder = tx.load(&self.backends, source).await?;
            check_source(holder, relation)?;
            if def.exclusive {
                let detached = self
                    .detach_exclusive(&mut tx, relation, target, source)
                    .await?;
                changes.detached.extend(detached);
            }
            link(&mut tx, source, relation, inverse, target);
            changes.added.push(source.clone());
        }

        self.finish(tx, changes).await
    }

    /// Make the first of `sources` prefer `target`, and no other source.
    ///
    /// Sources currently preferring `target` that are not the requested
    /// one are unset. The new source's previous preference is replaced.
    ///
    /// # Errors
    ///
    /// - `Error::NotSupported` for any relation other than the preferred one
    /// - `Error::NotFound` if the target or the new source does not exist
    pub async fn update_inbound(
        &self,
        target: &Identifier,
        relation: Relation,
        sources: &TargetList,
    ) -> Result<ChangeSet> {
        if !relation.definition().is_preferred() {
            return Err(Error::NotSupported {
                operation: "update_inbound",
                relation,
            });
        }
        reject_self_link(target, sources)?;
        let inverse = inverse_of(relation)?;

        let mut tx = Transaction::new();
        debug!(tx = %tx.id(), %target, %relation, "update_inbound: load");
        let held = tx.load(&self.backends, target).await?;
        check_target(held, relation)?;

        let current = held.target_set(inverse);
        let requested = sources.primary().cloned();
        let mut changes = ChangeSet::default();

        for source in current.iter().filter(|s| Some(*s) != requested.as_ref()) {
            self.unlink_source_loading(&mut tx, source, relation, inverse, target)
                .await?;
            changes.removed.push(source.clone());
        }

        if let Some(source) = requested.filter(|s| !current.contains(s)) {
            let holder = tx.load(&self.backends, &source).await?;
            check_source(holder, relation)?;
            if let Some(previous) = holder.single(relation).cloned() {
                self.unlink_loading(&mut tx, &source, relation, inverse, &previous)
                    .await?;
                changes.detached.push(previous);
            }
            link(&mut tx, &source, relation, inverse, target);
            changes.added.push(source);
        }

        self.finish(tx, changes).await
    }

    /// Delete a resource and prune every link to and from it.
    ///
    /// Sources are found through the resource's inverse predicates; forward
    /// targets lose their inverse entry. Dangling links are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the resource does not exist.
    pub async fn destroy(&self, id: &Identifier) -> Result<ChangeSet> {
        let mut tx = Transaction::new();
        debug!(tx = %tx.id(), %id, "destroy: load");
        let doomed = tx.load(&self.backends, id).await?.clone();

        let mut changes = ChangeSet::default();
        for (relation, linked) in &doomed.relations {
            let Some(counterpart) = relation.inverse() else {
                continue;
            };
            for other in linked {
                if other == id || !tx.try_load(&self.backends, other).await? {
                    continue;
                }
                if let Some(resource) = tx.get_mut(other) {
                    if resource.remove(counterpart, id) {
                        changes.detached.push(other.clone());
                    }
                }
            }
        }

        tx.remove(id)?;
        self.finish(tx, changes).await
    }

    /// Detach `target` from every holder of an exclusive relation except
    /// `keep`.
    ///
    /// Holders come from both the index and the target's own inverse
    /// predicate, so a stale index cannot leave a second holder behind.
    async fn detach_exclusive(
        &self,
        tx: &mut Transaction,
        relation: Relation,
        target: &Identifier,
        keep: &Identifier,
    ) -> Result<Vec<Identifier>> {
        let inverse = inverse_of(relation)?;
        let mut holders: BTreeSet<Identifier> = self
            .backends
            .find_sources(relation, target)
            .await?
            .into_iter()
            .collect();
        if let Some(loaded) = tx.get(target) {
            holders.extend(loaded.target_set(inverse));
        }
        holders.remove(keep);

        let mut detached = Vec::new();
        for holder in holders {
            if !tx.try_load(&self.backends, &holder).await? {
                warn!(%holder, %target, "index lists a holder missing from the store");
                if let Some(loaded) = tx.get_mut(target) {
                    loaded.remove(inverse, &holder);
                }
                continue;
            }
            let holds = tx
                .get(&holder)
                .is_some_and(|h| h.contains(relation, target));
            if holds {
                debug!(%holder, %target, %relation, "detaching exclusive target");
                unlink(tx, &holder, relation, inverse, target);
                detached.push(holder);
            } else if let Some(loaded) = tx.get_mut(target) {
                if loaded.remove(inverse, &holder) {
                    warn!(%holder, %target, "pruning stale inverse entry");
                }
            }
        }
        Ok(detached)
    }

    /// Unlink `target` from `source`, loading the target if needed.
    ///
    /// A target missing from the store is pruned from the source alone.
    async fn unlink_loading(
        &self,
        tx: &mut Transaction,
        source: &Identifier,
        relation: Relation,
        inverse: Relation,
        target: &Identifier,
    ) -> Result<()> {
        if !tx.try_load(&self.backends, target).await? {
            warn!(%source, %target, %relation, "pruning dangling link");
        }
        unlink(tx, source, relation, inverse, target);
        Ok(())
    }

    /// Unlink `target` from `source`, loading the source if needed.
    async fn unlink_source_loading(
        &self,
        tx: &mut Transaction,
        source: &Identifier,
        relation: Relation,
        inverse: Relation,
        target: &Identifier,
    ) -> Result<()> {
        if !tx.try_load(&self.backends, source).await? {
            warn!(%source, %target, %relation, "pruning dangling inbound link");
        }
        unlink(tx, source, relation, inverse, target);
        Ok(())
    }

    /// Persist, reindex changed resources, and enqueue ancestor reindexes.
    pub(crate) async fn finish(
        &self,
        mut tx: Transaction,
        mut changes: ChangeSet,
    ) -> Result<ChangeSet> {
        if tx.is_empty() {
            debug!(tx = %tx.id(), "nothing to persist");
            return Ok(ChangeSet::default());
        }

        let changed = tx.changed();
        let committed = tx.commit(&self.backends).await?;
        changes.persisted = committed.persisted;
        changes.deleted = committed.deleted;
        info!(
            tx = %tx.id(),
            persisted = changes.persisted.len(),
            deleted = changes.deleted.len(),
            "relationship change committed"
        );

        for id in &changed {
            self.reindex_or_defer(id, &mut changes).await;
        }

        let seeds: Vec<Identifier> = changed
            .iter()
            .filter_map(|id| tx.get(id).or_else(|| tx.original(id)))
            .flat_map(|r| r.containers().cloned().collect::<Vec<_>>())
            .collect();
        let skip: BTreeSet<Identifier> = changed.into_iter().collect();
        self.enqueue_ancestors(seeds, &skip, &mut changes).await;

        if !changes.is_settled() {
            warn!(
                tx = %tx.id(),
                pending = changes.pending.len(),
                "committed with undelivered follow-up tasks"
            );
        }
        Ok(changes)
    }

    /// Deliver tasks left in [`ChangeSet::pending`] by an earlier call.
    ///
    /// Reindex tasks are run directly when the index is reachable, and the
    /// resource's containers are then walked as after a fresh commit. Other
    /// tasks are enqueued. Whatever still cannot be delivered comes back in
    /// `pending` of the returned change set.
    pub async fn redeliver(&self, pending: Vec<Task>) -> ChangeSet {
        let mut changes = ChangeSet::default();
        let mut reindexed = BTreeSet::new();

        for task in pending {
            match task {
                Task::Reindex { id } => {
                    if self.reindex_or_defer(&id, &mut changes).await {
                        reindexed.insert(id);
                    }
                }
                other => self.deliver(other, &mut changes).await,
            }
        }

        let seeds = reindexed.iter().cloned().collect();
        self.enqueue_ancestors(seeds, &reindexed, &mut changes).await;
        changes
    }

    /// Reindex `id` now, or queue the reindex if the index refuses.
    ///
    /// Returns whether the index document was rebuilt directly.
    async fn reindex_or_defer(&self, id: &Identifier, changes: &mut ChangeSet) -> bool {
        match self.backends.reindex(id).await {
            Ok(()) => {
                changes.reindexed.push(id.clone());
                true
            }
            Err(e) => {
                warn!(%id, error = %e, "reindex failed, deferring to queue");
                self.deliver(Task::Reindex { id: id.clone() }, changes)
                    .await;
                false
            }
        }
    }

    /// Enqueue `task`, or record it as pending if the queue refuses it.
    pub(crate) async fn deliver(&self, task: Task, changes: &mut ChangeSet) {
        match self.backends.enqueue(task.clone()).await {
            Ok(()) => changes.enqueued.push(task),
            Err(e) => {
                warn!(?task, error = %e, "enqueue failed, task left pending");
                if !changes.pending.contains(&task) {
                    changes.pending.push(task);
                }
            }
        }
    }

    /// Enqueue reindex tasks for the transitive containers of `seeds`.
    ///
    /// Identifiers in `skip` were reindexed directly and are walked through
    /// without being enqueued. If a container cannot be read the walk stops
    /// there and a reindex of that container is left pending.
    async fn enqueue_ancestors(
        &self,
        seeds: Vec<Identifier>,
        skip: &BTreeSet<Identifier>,
        changes: &mut ChangeSet,
    ) {
        let mut queue: VecDeque<Identifier> = seeds.into();
        let mut visited = BTreeSet::new();

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id.clone()) {
                continue;
            }
            if !skip.contains(&id) {
                self.deliver(Task::Reindex { id: id.clone() }, changes)
                    .await;
            }
            match self.backends.get(&id).await {
                Ok(Some(entry)) => queue.extend(entry.resource.containers().cloned()),
                Ok(None) => debug!(%id, "ancestor no longer exists"),
                Err(e) => {
                    warn!(%id, error = %e, "ancestor walk interrupted");
                    let task = Task::Reindex { id: id.clone() };
                    if !changes.pending.contains(&task) {
                        changes.pending.push(task);
                    }
                }
            }
        }
    }
}

fn inverse_of(relation: Relation) -> Result<Relation> {
    relation.inverse().ok_or(Error::NotSupported {
        operation: "link",
        relation,
    })
}

fn reject_self_link(id: &Identifier, others: &TargetList) -> Result<()> {
    if others.as_slice().contains(id) {
        return Err(Error::InvalidArgument(format!(
            "resource {} cannot be related to itself",
            id
        )));
    }
    Ok(())
}

fn check_source(resource: &Resource, relation: Relation) -> Result<()> {
    let def = relation.definition();
    debug_assert_eq!(def.direction, Direction::Forward);
    if !def.accepts_source(resource.kind) {
        return Err(Error::InvalidArgument(format!(
            "a {} cannot hold '{}'",
            resource.kind, relation
        )));
    }
    Ok(())
}

fn check_target(resource: &Resource, relation: Relation) -> Result<()> {
    if !relation.definition().accepts_target(resource.kind) {
        return Err(Error::InvalidArgument(format!(
            "a {} ({}) cannot be a value of '{}'",
            resource.kind, resource.id, relation
        )));
    }
    Ok(())
}

/// Link both sides. Either side may be absent from the transaction.
pub(crate) fn link(
    tx: &mut Transaction,
    source: &Identifier,
    relation: Relation,
    inverse: Relation,
    target: &Identifier,
) {
    if let Some(s) = tx.get_mut(source) {
        s.insert(relation, target.clone());
    }
    if let Some(t) = tx.get_mut(target) {
        t.insert(inverse, source.clone());
    }
}

/// Unlink both sides. Either side may be absent from the transaction.
fn unlink(
    tx: &mut Transaction,
    source: &Identifier,
    relation: Relation,
    inverse: Relation,
    target: &Identifier,
) {
    if let Some(s) = tx.get_mut(source) {
        s.remove(relation, target);
    }
    if let Some(t) = tx.get_mut(target) {
        t.remove(inverse, source);
    }
}
