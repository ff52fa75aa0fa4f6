//! Lakeshore - identity and relationship consistency for a digital-asset repository
//!
//! Lakeshore mints stable, seed-derived identifiers, detects duplicate
//! uploaded content before it is persisted, and keeps cross-resource
//! relations consistent in a link-based store where any client may add,
//! remove or replace any relation.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Operator command-line interface
//! - [`engine`] - Transactions, relationship manager, duplicate detector, ingestion
//! - [`backend`] - Store, index and queue traits with an in-memory implementation
//! - [`core`] - Domain types, minting, relation registry, configuration
//! - [`error`] - The error taxonomy shared by all layers
//!
//! # Correctness Invariants
//!
//! 1. `mint(prefix, seed)` is deterministic and requires a prefix
//! 2. A minted identifier is re-verified against its seed on every persist
//! 3. An exclusive target is held by at most one source at a time
//! 4. The preferred relation holds at most one value
//! 5. Inverse predicates mirror every forward mutation
//!
//! # Example
//!
//! ```
//! use lakeshore::core::minter::mint;
//!
//! let id = mint("SI", "SI-101010").unwrap();
//! assert_eq!(id.as_str(), "233b76a6-193d-8deb-7346-593a3857f05e");
//! ```

pub mod backend;
pub mod cli;
pub mod core;
pub mod engine;
pub mod error;

pub use error::{Error, Result};
