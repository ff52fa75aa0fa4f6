//! core
//!
//! Core domain types, schemas, and pure operations for Lakeshore.
//!
//! # Modules
//!
//! - [`types`] - Strong types: Identifier, Prefix, ContentDigest, Version
//! - [`minter`] - Seed-derived identifier minting and verification
//! - [`relations`] - The closed relation registry
//! - [`resource`] - Resources, identities and upload candidates
//! - [`targets`] - Normalization of caller-supplied relation targets
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Nothing here performs I/O except config loading

pub mod config;
pub mod minter;
pub mod relations;
pub mod resource;
pub mod targets;
pub mod types;
