//! engine
//!
//! Orchestrates relationship edits, duplicate checks and ingestion.
//!
//! # Architecture
//!
//! Every mutating call follows one lifecycle:
//!
//! ```text
//! load -> validate -> mutate -> persist -> reindex
//! ```
//!
//! 1. **Load**: Read affected resources into a [`Transaction`] with their versions
//! 2. **Validate**: Check cardinality, kinds and checksums before any write
//! 3. **Mutate**: Apply forward and inverse predicate changes in memory
//! 4. **Persist**: Commit all changed resources with compare-and-swap
//! 5. **Reindex**: Refresh changed resources and enqueue ancestor rollups
//!
//! # Invariants
//!
//! - A call touching N resources persists all N or none
//! - Calls that change nothing write nothing
//! - Partial persistence failures are rolled back in reverse order

pub mod duplicates;
pub mod ingest;
pub mod manager;
pub mod rollback;
pub mod transaction;

pub use duplicates::{DuplicateCheck, DuplicateDetector};
pub use ingest::{Attachment, Ingestor};
pub use manager::{ChangeSet, RelationshipManager};
pub use rollback::{AppliedWrite, RollbackReport};
pub use transaction::{Committed, Transaction};
