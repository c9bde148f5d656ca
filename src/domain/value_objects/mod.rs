//! Value Objects for the per-user stores

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of the signed-in shopper.
///
/// Issued by the auth collaborator (a phone number in practice) and used as
/// the sharding key of every remote document, so it must be safe to embed in
/// a document key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn parse(value: impl Into<String>) -> Result<Self, UserIdError> {
        let value = value.into().trim().to_string();
        if value.is_empty() { return Err(UserIdError::Empty); }
        if value.len() > 64 { return Err(UserIdError::TooLong); }
        if let Some(c) = value.chars().find(|c| c.is_whitespace() || matches!(c, '.' | '*' | '>' | '/')) {
            return Err(UserIdError::InvalidChar(c));
        }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserIdError {
    #[error("user id is empty")]
    Empty,
    #[error("user id is too long")]
    TooLong,
    #[error("user id contains invalid character {0:?}")]
    InvalidChar(char),
}

/// Catalog product identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self { Self::new(value) }
}

/// Cart line quantity, always within `[MIN, MAX]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 99;

    /// Maps any requested integer onto the allowed range.
    pub fn clamped(requested: i64) -> Self {
        Self(requested.clamp(i64::from(Self::MIN), i64::from(Self::MAX)) as u32)
    }
    pub fn value(&self) -> u32 { self.0 }
    pub fn saturating_add(&self, other: Quantity) -> Self {
        Self::clamped(i64::from(self.0) + i64::from(other.0))
    }
}

impl Default for Quantity { fn default() -> Self { Self(Self::MIN) } }

// Documents written by other clients may carry anything; clamp on the way in.
impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i64::deserialize(deserializer).map(Self::clamped)
    }
}
