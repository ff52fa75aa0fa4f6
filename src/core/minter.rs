//! core::minter
//!
//! Content-derived identifier minting.
//!
//! # Algorithm
//!
//! The identifier of a primary asset is the MD5 hash of its seed (the
//! human-facing UID such as `SI-101010`), formatted as 8-4-4-4-12 hex
//! groups. This is the layout the repository already stores resources
//! under, so existing identifiers keep resolving.
//!
//! # Invariants
//!
//! - Minting is pure: the same prefix and seed always give the same
//!   identifier
//! - A missing prefix is rejected; a seed alone never yields an identifier
//! - An identifier override is accepted only if it equals the minted value
//!
//! # Example
//!
//! ```
//! use lakeshore::core::minter::{mint, verify_identifier};
//!
//! let id = mint("SI", "SI-101010").unwrap();
//! assert_eq!(id.as_str(), "233b76a6-193d-8deb-7346-593a3857f05e");
//!
//! assert!(mint("", "SI-101010").is_err());
//! assert!(verify_identifier("SI", "SI-101010", &id).is_ok());
//! ```

use md5::{Digest, Md5};

use crate::core::types::{Identifier, Prefix};
use crate::error::{Error, Result};

/// Mint the canonical identifier for `seed` within `prefix`'s namespace.
///
/// # Errors
///
/// - [`Error::InvalidArgument`] if `prefix` is empty or malformed
/// - [`Error::InvalidArgument`] if `seed` is empty
pub fn mint(prefix: &str, seed: &str) -> Result<Identifier> {
    Minter::new(prefix)?.mint(seed)
}

/// Check that `candidate` is the identifier minted from `prefix` and `seed`.
///
/// # Errors
///
/// - [`Error::ChecksumMismatch`] if the identifiers differ
/// - Any error [`mint`] returns
pub fn verify_identifier(prefix: &str, seed: &str, candidate: &Identifier) -> Result<()> {
    Minter::new(prefix)?.verify(seed, candidate)
}

/// A minter bound to one namespace prefix.
///
/// # Example
///
/// ```
/// use lakeshore::core::minter::Minter;
///
/// let minter = Minter::new("SI").unwrap();
/// let a = minter.mint("SI-1").unwrap();
/// let b = minter.mint("SI-1").unwrap();
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone)]
pub struct Minter {
    prefix: Prefix,
}

impl Minter {
    /// Create a minter for a namespace prefix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the prefix is empty.
    pub fn new(prefix: &str) -> Result<Self> {
        Ok(Self {
            prefix: Prefix::new(prefix)?,
        })
    }

    /// The namespace prefix.
    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    /// Mint the identifier for a seed.
    pub fn mint(&self, seed: &str) -> Result<Identifier> {
        if seed.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "can't mint a UID in namespace {} from an empty seed",
                self.prefix
            )));
        }

        let hash = Md5::digest(seed.as_bytes());
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash);
        Ok(Identifier::from_bytes(bytes))
    }

    /// Recompute the identifier for `seed` and compare with `candidate`.
    pub fn verify(&self, seed: &str, candidate: &Identifier) -> Result<()> {
        let expected = self.mint(seed)?;
        if &expected != candidate {
            return Err(Error::ChecksumMismatch {
                expected: expected.to_string(),
                actual: candidate.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_value() {
        let id = mint("SI", "SI-101010").unwrap();
        assert_eq!(id.as_str(), "233b76a6-193d-8deb-7346-593a3857f05e");
    }

    #[test]
    fn deterministic() {
        let first = mint("SI", "seed").unwrap();
        for _ in 0..10 {
            assert_eq!(mint("SI", "seed").unwrap(), first);
        }
        assert_eq!(first.as_str(), "fe4c0f30-aa35-9c41-d9f9-a5f69c8c4192");
    }

    #[test]
    fn missing_prefix_fails() {
        let err = mint("", "seed").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(err.to_string().contains("without a prefix"));
    }

    #[test]
    fn empty_seed_fails() {
        assert!(matches!(
            mint("SI", "").unwrap_err(),
            Error::InvalidArgument(_)
        ));
    }

    #[test]
    fn different_seeds_differ() {
        assert_ne!(mint("SI", "SI-1").unwrap(), mint("SI", "SI-2").unwrap());
    }

    #[test]
    fn verify_accepts_matching_override() {
        let id = Identifier::new("81b41633-a935-37eb-0127-208c30b59758").unwrap();
        assert!(verify_identifier("SI", "SI-1", &id).is_ok());
    }

    #[test]
    fn verify_rejects_mismatch() {
        let wrong = mint("SI", "SI-2").unwrap();
        let err = verify_identifier("SI", "SI-1", &wrong).unwrap_err();
        match err {
            Error::ChecksumMismatch { expected, actual } => {
                assert_eq!(expected, "81b41633-a935-37eb-0127-208c30b59758");
                assert_eq!(actual, wrong.to_string());
            }
            other => panic!("expected ChecksumMismatch, got {other:?}"),
        }
    }
}
