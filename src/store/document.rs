//! Remote document store contract.
//!
//! One document per `(collection, user)` pair, always read and written whole.
//! Backends assign a strictly increasing [`Version`] to every committed write
//! and push each committed document to live subscribers of that key.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::UserId;

/// Monotonic per-document revision assigned by the backend.
pub type Version = u64;

/// Push feed of committed documents for one key. Dropping it unsubscribes.
pub type DocumentFeed = mpsc::UnboundedReceiver<VersionedDocument>;

/// A committed document payload together with its revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedDocument {
    pub version: Version,
    pub payload: serde_json::Value,
}

/// Guard a write must satisfy against the currently stored revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionPrecondition {
    /// Unconditional replace (last write wins).
    Any,
    /// Only succeeds if no document exists yet.
    Absent,
    /// Only succeeds if the stored revision equals this one.
    Exact(Version),
}

impl VersionPrecondition {
    pub(crate) fn check(self, current: Option<Version>) -> Result<(), DocumentStoreError> {
        match (self, current) {
            (Self::Any, _) | (Self::Absent, None) => Ok(()),
            (Self::Exact(expected), Some(actual)) if expected == actual => Ok(()),
            (Self::Absent, Some(actual)) => Err(DocumentStoreError::VersionConflict { expected: None, actual: Some(actual) }),
            (Self::Exact(expected), actual) => Err(DocumentStoreError::VersionConflict { expected: Some(expected), actual }),
        }
    }
}

#[derive(Debug, Error)]
pub enum DocumentStoreError {
    /// The stored revision did not match the write's precondition.
    #[error("version conflict: expected {expected:?}, found {actual:?}")]
    VersionConflict { expected: Option<Version>, actual: Option<Version> },

    /// Network failure or backend outage.
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid document payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// The remote collaborator every scoped store talks to.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read the current document. A missing document is `Ok(None)`.
    async fn get(&self, collection: &str, user: &UserId) -> Result<Option<VersionedDocument>, DocumentStoreError>;

    /// Replace the whole document, returning the committed revision.
    async fn set(
        &self,
        collection: &str,
        user: &UserId,
        payload: serde_json::Value,
        precondition: VersionPrecondition,
    ) -> Result<Version, DocumentStoreError>;

    /// Start receiving every document committed for this key from now on.
    async fn subscribe(&self, collection: &str, user: &UserId) -> Result<DocumentFeed, DocumentStoreError>;
}

/// Key of a document inside a backend: `{collection}.{user}`.
pub(crate) fn document_key(collection: &str, user: &UserId) -> String {
    format!("{collection}.{user}")
}
