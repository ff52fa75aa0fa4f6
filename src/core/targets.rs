//! core::targets
//!
//! Normalization of caller-supplied relation targets.
//!
//! Forms submit targets as bare identifiers or as repository URIs, mixed
//! with blank entries from empty inputs. This module turns that into an
//! ordered, duplicate-free list of [`Identifier`]s. Order is kept because
//! single-valued updates take the first entry as the primary value.
//!
//! # Accepted forms
//!
//! - `233b76a6-193d-8deb-7346-593a3857f05e`
//! - `<base>/233b76a6-193d-8deb-7346-593a3857f05e`
//! - `<base>/23/3b/76/a6/233b76a6-193d-8deb-7346-593a3857f05e`
//! - `""` (ignored)
//!
//! # Example
//!
//! ```
//! use lakeshore::core::targets::TargetList;
//!
//! let base = "http://fedora.local/rest/prod";
//! let list = TargetList::parse(
//!     [
//!         "",
//!         "233b76a6-193d-8deb-7346-593a3857f05e",
//!         "http://fedora.local/rest/prod/23/3b/76/a6/233b76a6-193d-8deb-7346-593a3857f05e",
//!     ],
//!     Some(base),
//! )
//! .unwrap();
//! assert_eq!(list.len(), 1);
//! ```

use serde_json::Value;

use super::types::{Identifier, TypeError};

/// An ordered, duplicate-free list of relation targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetList(Vec<Identifier>);

impl TargetList {
    /// Normalize raw target strings.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidIdentifier` if an entry is neither an
    /// identifier nor a URI under `base_uri`.
    pub fn parse<I, S>(raw: I, base_uri: Option<&str>) -> Result<Self, TypeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids = Vec::new();
        for entry in raw {
            if let Some(id) = parse_target(entry.as_ref(), base_uri)? {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        Ok(Self(ids))
    }

    /// Normalize a JSON form value.
    ///
    /// `null` clears. A scalar where a list is required is rejected rather
    /// than silently wrapped.
    ///
    /// # Errors
    ///
    /// - `TypeError::ExpectedList` for a string, number, boolean or object
    /// - `TypeError::InvalidIdentifier` for a malformed element
    ///
    /// # Example
    ///
    /// ```
    /// use lakeshore::core::targets::TargetList;
    /// use serde_json::json;
    ///
    /// assert!(TargetList::from_json(&json!(null), None).unwrap().is_empty());
    /// assert!(TargetList::from_json(&json!("233b76a6-193d-8deb-7346-593a3857f05e"), None).is_err());
    /// ```
    pub fn from_json(value: &Value, base_uri: Option<&str>) -> Result<Self, TypeError> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Array(items) => {
                let mut raw = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => raw.push(s.as_str()),
                        Value::Null => {}
                        other => {
                            return Err(TypeError::InvalidIdentifier(format!(
                                "list element {} is not a string",
                                other
                            )))
                        }
                    }
                }
                Self::parse(raw, base_uri)
            }
            Value::String(_) => Err(TypeError::ExpectedList("a single string".into())),
            Value::Bool(_) => Err(TypeError::ExpectedList("a boolean".into())),
            Value::Number(_) => Err(TypeError::ExpectedList("a number".into())),
            Value::Object(_) => Err(TypeError::ExpectedList("an object".into())),
        }
    }

    /// The normalized identifiers.
    pub fn as_slice(&self) -> &[Identifier] {
        &self.0
    }

    /// The first (primary) target.
    pub fn primary(&self) -> Option<&Identifier> {
        self.0.first()
    }

    /// Number of targets.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Identifier>> for TargetList {
    fn from(ids: Vec<Identifier>) -> Self {
        let mut list = Vec::with_capacity(ids.len());
        for id in ids {
            if !list.contains(&id) {
                list.push(id);
            }
        }
        Self(list)
    }
}

/// Normalize one raw target. Blank input yields `None`.
pub fn parse_target(raw: &str, base_uri: Option<&str>) -> Result<Option<Identifier>, TypeError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    if !(raw.starts_with("http://") || raw.starts_with("https://")) {
        return Identifier::new(raw).map(Some);
    }

    let path = match base_uri {
        Some(base) => {
            let base = base.trim_end_matches('/');
            raw.strip_prefix(base)
                .and_then(|rest| rest.strip_prefix('/'))
                .ok_or_else(|| {
                    TypeError::InvalidIdentifier(format!(
                        "'{}' is not under repository base {}",
                        raw, base
                    ))
                })?
        }
        None => raw,
    };

    let id_part = path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
    let id = Identifier::new(id_part)?;

    // Pair-tree segments, when present, must agree with the identifier.
    let segments: Vec<&str> = path.trim_end_matches('/').split('/').collect();
    if base_uri.is_some() && segments.len() == 5 {
        let expected = id.pair_tree();
        if segments.join("/") != expected {
            return Err(TypeError::InvalidIdentifier(format!(
                "'{}' does not match pair-tree path {}",
                raw, expected
            )));
        }
    }

    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE: &str = "http://fedora.local/rest/prod";
    const ID: &str = "233b76a6-193d-8deb-7346-593a3857f05e";

    #[test]
    fn bare_identifier() {
        let id = parse_target(ID, None).unwrap().unwrap();
        assert_eq!(id.as_str(), ID);
    }

    #[test]
    fn blank_is_ignored() {
        assert_eq!(parse_target("   ", Some(BASE)).unwrap(), None);
    }

    #[test]
    fn flat_uri_under_base() {
        let uri = format!("{}/{}", BASE, ID);
        assert_eq!(parse_target(&uri, Some(BASE)).unwrap().unwrap().as_str(), ID);
    }

    #[test]
    fn pair_tree_uri_under_base() {
        let id = Identifier::new(ID).unwrap();
        let uri = id.to_uri(BASE);
        assert_eq!(parse_target(&uri, Some(BASE)).unwrap(), Some(id));
    }

    #[test]
    fn pair_tree_mismatch_rejected() {
        let uri = format!("{}/aa/bb/cc/dd/{}", BASE, ID);
        assert!(parse_target(&uri, Some(BASE)).is_err());
    }

    #[test]
    fn uri_outside_base_rejected() {
        let uri = format!("http://elsewhere.example/{}", ID);
        assert!(parse_target(&uri, Some(BASE)).is_err());
    }

    #[test]
    fn uri_without_base_takes_last_segment() {
        let uri = format!("http://anywhere.example/x/{}", ID);
        assert_eq!(parse_target(&uri, None).unwrap().unwrap().as_str(), ID);
    }

    #[test]
    fn list_deduplicates_preserving_order() {
        let other = "fe4c0f30-aa35-9c41-d9f9-a5f69c8c4192";
        let list = TargetList::parse([other, ID, other, ""], None).unwrap();
        let ids: Vec<_> = list.as_slice().iter().map(Identifier::as_str).collect();
        assert_eq!(ids, vec![other, ID]);
        assert_eq!(list.primary().unwrap().as_str(), other);
    }

    #[test]
    fn json_scalar_rejected() {
        let err = TargetList::from_json(&json!(ID), None).unwrap_err();
        assert!(matches!(err, TypeError::ExpectedList(_)));
    }

    #[test]
    fn json_empty_strings_clear() {
        let list = TargetList::from_json(&json!([""]), None).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn json_non_string_element_rejected() {
        assert!(TargetList::from_json(&json!([1]), None).is_err());
    }
}
