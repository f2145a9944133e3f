//! Stream key type and format contract
//!
//! A stream key is the opaque credential a broadcaster publishes with. Every
//! key entering the core is checked here before it can reach the registry.

use std::borrow::Borrow;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Literal prefix every stream key must start with
pub const KEY_PREFIX: &str = "nf_";

/// Keys must be strictly longer than this many characters
pub const MIN_KEY_LEN_EXCLUSIVE: usize = 10;

/// Reason a stream key was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// Key does not start with `nf_`
    #[error("stream key must start with \"nf_\"")]
    MissingPrefix,

    /// Key is too short
    #[error("stream key must be longer than 10 characters (got {len})")]
    TooShort { len: usize },

    /// Key contains a character that is not safe in a URL path or file name
    #[error("stream key contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Validated stream key
///
/// Keys appear in URL paths (`/live/{key}`) and storage directories, so besides
/// the prefix and length rules only ASCII alphanumerics, `_` and `-` are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamKey(String);

impl StreamKey {
    /// Validate and wrap a raw key
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        validate(raw)?;
        Ok(Self(raw.to_owned()))
    }

    /// Borrow the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key and return the inner string
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Check a raw key against the format contract without allocating
pub fn validate(raw: &str) -> Result<(), KeyError> {
    if !raw.starts_with(KEY_PREFIX) {
        return Err(KeyError::MissingPrefix);
    }

    let len = raw.chars().count();
    if len <= MIN_KEY_LEN_EXCLUSIVE {
        return Err(KeyError::TooShort { len });
    }

    if let Some(bad) = raw
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(KeyError::InvalidCharacter(bad));
    }

    Ok(())
}

impl FromStr for StreamKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StreamKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate(&value)?;
        Ok(Self(value))
    }
}

impl AsRef<str> for StreamKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for StreamKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for StreamKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
