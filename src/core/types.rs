//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`Identifier`] - Canonical 8-4-4-4-12 resource identifier
//! - [`Prefix`] - Validated identifier namespace prefix
//! - [`ContentDigest`] - Algorithm-tagged content hash
//! - [`Version`] - Store-assigned compare-and-swap token
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use lakeshore::core::types::{ContentDigest, Identifier, Prefix};
//!
//! let id = Identifier::new("233B76A6-193D-8DEB-7346-593A3857F05E").unwrap();
//! assert_eq!(id.as_str(), "233b76a6-193d-8deb-7346-593a3857f05e");
//!
//! let digest = ContentDigest::sha256(b"hello world");
//! assert_eq!(digest.algorithm(), "sha256");
//!
//! assert!(Prefix::new("").is_err());
//! assert!(Identifier::new("not-an-id").is_err());
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),

    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("unknown relation: {0}")]
    UnknownRelation(String),

    #[error("expected a list of targets, got {0}")]
    ExpectedList(String),
}

/// A canonical resource identifier.
///
/// Identifiers are 36 characters of lowercase hex grouped 8-4-4-4-12.
/// Minted identifiers and randomly assigned ones share this shape, so
/// the store can treat every key the same way.
///
/// # Example
///
/// ```
/// use lakeshore::core::types::Identifier;
///
/// let id = Identifier::new("fe4c0f30-aa35-9c41-d9f9-a5f69c8c4192").unwrap();
/// assert_eq!(id.pair_tree(), "fe/4c/0f/30/fe4c0f30-aa35-9c41-d9f9-a5f69c8c4192");
///
/// assert!(Identifier::new("").is_err());
/// assert!(Identifier::new("fe4c0f30aa359c41d9f9a5f69c8c4192").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Byte offsets of the group separators.
    const HYPHENS: [usize; 4] = [8, 13, 18, 23];

    /// Create a new validated identifier.
    ///
    /// The identifier is normalized to lowercase.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidIdentifier` if the string is not in
    /// canonical 8-4-4-4-12 hex form.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into().to_ascii_lowercase();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    fn validate(id: &str) -> Result<(), TypeError> {
        if id.len() != 36 {
            return Err(TypeError::InvalidIdentifier(format!(
                "'{}' must be 36 characters",
                id
            )));
        }

        for (i, c) in id.char_indices() {
            let ok = if Self::HYPHENS.contains(&i) {
                c == '-'
            } else {
                c.is_ascii_hexdigit()
            };
            if !ok {
                return Err(TypeError::InvalidIdentifier(format!(
                    "'{}' is not in 8-4-4-4-12 hex form",
                    id
                )));
            }
        }

        Ok(())
    }

    /// Build an identifier from raw 128-bit hash output.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self::from_uuid(Uuid::from_bytes(bytes))
    }

    /// Build an identifier from a UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid.hyphenated().to_string())
    }

    /// Generate a random identifier for resources without a seed.
    pub fn random() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The pair-tree path the repository stores this identifier under.
    ///
    /// Four two-character directories followed by the full identifier.
    pub fn pair_tree(&self) -> String {
        let id = &self.0;
        format!(
            "{}/{}/{}/{}/{}",
            &id[0..2],
            &id[2..4],
            &id[4..6],
            &id[6..8],
            id
        )
    }

    /// The full URI of this identifier under a repository base URI.
    ///
    /// # Example
    ///
    /// ```
    /// use lakeshore::core::types::Identifier;
    ///
    /// let id = Identifier::new("fe4c0f30-aa35-9c41-d9f9-a5f69c8c4192").unwrap();
    /// assert_eq!(
    ///     id.to_uri("http://fedora.local/rest/prod/"),
    ///     "http://fedora.local/rest/prod/fe/4c/0f/30/fe4c0f30-aa35-9c41-d9f9-a5f69c8c4192"
    /// );
    /// ```
    pub fn to_uri(&self, base_uri: &str) -> String {
        format!("{}/{}", base_uri.trim_end_matches('/'), self.pair_tree())
    }
}

impl TryFrom<String> for Identifier {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated identifier namespace prefix (e.g. `SI`).
///
/// Prefixes cannot be empty or contain whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Prefix(String);

impl Prefix {
    /// Create a new validated prefix.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidPrefix` if the prefix is empty or
    /// contains whitespace.
    pub fn new(prefix: impl Into<String>) -> Result<Self, TypeError> {
        let prefix = prefix.into();
        if prefix.trim().is_empty() {
            return Err(TypeError::InvalidPrefix(
                "can't mint a UID without a prefix".into(),
            ));
        }
        if prefix.chars().any(char::is_whitespace) {
            return Err(TypeError::InvalidPrefix(format!(
                "'{}' cannot contain whitespace",
                prefix
            )));
        }
        Ok(Self(prefix))
    }

    /// Get the prefix as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Prefix {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Prefix> for String {
    fn from(prefix: Prefix) -> Self {
        prefix.0
    }
}

impl std::fmt::Display for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A content hash tagged with its algorithm, stored as `urn:<alg>:<hex>`.
///
/// Digests reported by characterization are usually SHA-1 URNs, uploads
/// computed locally are SHA-256. Bare 64-character hex is read as SHA-256.
///
/// # Example
///
/// ```
/// use lakeshore::core::types::ContentDigest;
///
/// let a = ContentDigest::parse("urn:sha1:2AAE6C35C94FCFB415DBE95F408B9CE91EE846ED").unwrap();
/// assert_eq!(a.as_str(), "urn:sha1:2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
///
/// let b = ContentDigest::sha256(b"hello world");
/// let c = ContentDigest::parse(b.hex()).unwrap();
/// assert_eq!(b, c);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Supported algorithms with their hex lengths.
    const ALGORITHMS: [(&'static str, usize); 4] =
        [("md5", 32), ("sha1", 40), ("sha256", 64), ("sha512", 128)];

    /// Parse a digest URN or bare SHA-256 hex string.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidDigest` for unknown algorithms or hex
    /// of the wrong length.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, TypeError> {
        let raw = raw.as_ref().trim().to_ascii_lowercase();

        let (algorithm, hex_part) = match raw.strip_prefix("urn:") {
            Some(rest) => rest.split_once(':').ok_or_else(|| {
                TypeError::InvalidDigest(format!("'{}' is missing an algorithm", raw))
            })?,
            None => ("sha256", raw.as_str()),
        };

        let expected_len = Self::ALGORITHMS
            .iter()
            .find(|(name, _)| *name == algorithm)
            .map(|(_, len)| *len)
            .ok_or_else(|| {
                TypeError::InvalidDigest(format!("unsupported algorithm '{}'", algorithm))
            })?;

        if hex_part.len() != expected_len || hex::decode(hex_part).is_err() {
            return Err(TypeError::InvalidDigest(format!(
                "'{}' is not {} hex characters",
                hex_part, expected_len
            )));
        }

        Ok(Self(format!("urn:{}:{}", algorithm, hex_part)))
    }

    /// Compute the SHA-256 digest of uploaded bytes.
    pub fn sha256(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Self(format!("urn:sha256:{}", hex::encode(hasher.finalize())))
    }

    /// The algorithm name (`sha1`, `sha256`, ...).
    pub fn algorithm(&self) -> &str {
        self.0
            .split(':')
            .nth(1)
            .unwrap_or_default()
    }

    /// The hex portion of the digest.
    pub fn hex(&self) -> &str {
        self.0.rsplit(':').next().unwrap_or_default()
    }

    /// Get the full URN as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<ContentDigest> for String {
    fn from(digest: ContentDigest) -> Self {
        digest.0
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned version of a persisted resource.
///
/// Every successful write produces a new version; writers pass the version
/// they loaded so the store can reject stale writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// The version assigned on first write.
    pub const INITIAL: Version = Version(1);

    /// Wrap a raw version number.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The version following this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// The raw version number.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}
