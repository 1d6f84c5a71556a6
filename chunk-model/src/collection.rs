//! Collection identity and the naming invariant from the data model.

use std::fmt;

/// Stable integer id of a collection row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct CollectionId(pub i64);

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CollectionNameError {
    #[error("collection name must be 3-63 characters, start and end with a letter or digit, and otherwise contain only letters, digits, '-' or '_'")]
    InvalidShape,
}

/// Validate a collection name against `^[A-Za-z0-9][A-Za-z0-9_-]{1,61}[A-Za-z0-9]$`.
///
/// The allowed character set never includes `.`, so IPv4-shaped names and
/// names with consecutive dots are rejected by construction rather than by a
/// separate check.
pub fn validate_collection_name(name: &str) -> Result<(), CollectionNameError> {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() < 3 || chars.len() > 63 {
        return Err(CollectionNameError::InvalidShape);
    }
    let is_alnum = |c: char| c.is_ascii_alphanumeric();
    let is_middle = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';

    if !is_alnum(chars[0]) || !is_alnum(*chars.last().unwrap()) {
        return Err(CollectionNameError::InvalidShape);
    }
    if chars[1..chars.len() - 1].iter().any(|&c| !is_middle(c)) {
        return Err(CollectionNameError::InvalidShape);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_minimal_valid_name() {
        assert!(validate_collection_name("abc").is_ok());
    }

    #[test]
    fn rejects_too_short() {
        assert_eq!(validate_collection_name("a"), Err(CollectionNameError::InvalidShape));
        assert_eq!(validate_collection_name("ab"), Err(CollectionNameError::InvalidShape));
    }

    #[test]
    fn rejects_consecutive_dots_and_ipv4_shape() {
        assert!(validate_collection_name("..abc").is_err());
        assert!(validate_collection_name("192.168.1.1").is_err());
    }

    #[test]
    fn rejects_bad_edges_and_punctuation() {
        assert!(validate_collection_name("abc!").is_err());
        assert!(validate_collection_name("-abc").is_err());
    }

    #[test]
    fn accepts_hyphen_and_underscore_in_middle() {
        assert!(validate_collection_name("proj-a").is_ok());
        assert!(validate_collection_name("proj_a_1").is_ok());
    }
}
