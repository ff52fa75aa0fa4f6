//! engine::rollback
//!
//! Compensating writes for a partially applied commit.
//!
//! # Rollback Order
//!
//! Writes are reverted in reverse application order.
//!
//! # CAS Semantics
//!
//! Every compensating write carries the version the commit produced. If a
//! resource was modified by someone else in the meantime, its rollback
//! fails and is reported; the remaining writes are still reverted.

use tracing::warn;

use crate::backend::{BackendError, Backends};
use crate::core::resource::Resource;
use crate::core::types::{Identifier, Version};

/// Result of a rollback attempt.
#[derive(Debug, Clone)]
pub struct RollbackReport {
    /// Resources restored to their loaded state.
    pub rolled_back: Vec<Identifier>,
    /// Resources that could not be restored.
    pub failed: Vec<(Identifier, BackendError)>,
    /// Whether every applied write was reverted.
    pub complete: bool,
}

impl Default for RollbackReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RollbackReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self {
            rolled_back: vec![],
            failed: vec![],
            complete: true,
        }
    }

    /// Record a reverted write.
    pub fn record_success(&mut self, id: Identifier) {
        self.rolled_back.push(id);
    }

    /// Record a write that could not be reverted.
    pub fn record_failure(&mut self, id: Identifier, error: BackendError) {
        self.failed.push((id, error));
        self.complete = false;
    }

    /// Check if there were any failures.
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Summary for display.
    pub fn summary(&self) -> String {
        if self.complete {
            format!("rolled back {} write(s)", self.rolled_back.len())
        } else {
            format!(
                "partial rollback: {} reverted, {} failed",
                self.rolled_back.len(),
                self.failed.len()
            )
        }
    }
}

/// A write that reached the store during a commit.
#[derive(Debug, Clone)]
pub enum AppliedWrite {
    /// A new resource was stored at `version`.
    Created { id: Identifier, version: Version },
    /// An existing resource was overwritten; `version` is the new one.
    Updated { previous: Resource, version: Version },
    /// A resource was deleted; `previous` is what was removed.
    Deleted { previous: Resource },
}

impl AppliedWrite {
    /// The resource the write touched.
    pub fn id(&self) -> &Identifier {
        match self {
            AppliedWrite::Created { id, .. } => id,
            AppliedWrite::Updated { previous, .. } | AppliedWrite::Deleted { previous } => {
                &previous.id
            }
        }
    }

    async fn revert(&self, backends: &Backends) -> Result<(), BackendError> {
        match self {
            AppliedWrite::Created { id, version } => backends.delete(id, *version).await,
            AppliedWrite::Updated { previous, version } => {
                backends.put(previous, Some(*version)).await.map(|_| ())
            }
            AppliedWrite::Deleted { previous } => backends.put(previous, None).await.map(|_| ()),
        }
    }
}

/// Revert applied writes, newest first.
pub async fn rollback(backends: &Backends, applied: &[AppliedWrite]) -> RollbackReport {
    let mut report = RollbackReport::new();

    for write in applied.iter().rev() {
        match write.revert(backends).await {
            Ok(()) => report.record_success(write.id().clone()),
            Err(e) => {
                warn!(id = %write.id(), error = %e, "rollback write failed");
                report.record_failure(write.id().clone(), e);
            }
        }
    }

    report
}
