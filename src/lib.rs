//! Storefront per-user data layer
//!
//! Cart, wishlist, address book and order history for a signed-in shopper,
//! each mirrored from one remote document and kept in sync by subscription.
//!
//! ## Features
//! - Whole-document writes with compare-and-swap versioning
//! - Live projections fed by the remote store's change feed
//! - Cart pricing (subtotal, tiered shipping, per-item tax, total)
//! - Per-session store sets, torn down on sign-out
//! - Checkout against a payment collaborator
//! - In-memory and NATS key-value document backends

use thiserror::Error;

pub mod checkout;
pub mod config;
pub mod domain;
pub mod http;
pub mod session;
pub mod store;

pub use config::Config;
pub use domain::{ProductId, Quantity, UserId};
pub use session::{Session, SessionRegistry};
pub use store::{DocumentStore, MemoryDocumentStore, ScopedStore, StoreOptions, Subscription, WritePolicy};

use store::document::{DocumentStoreError, Version};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store is not initialised for a signed-in user")]
    NotInitialized,

    #[error("store belongs to user {bound}, not {requested}")]
    UserMismatch { bound: UserId, requested: UserId },

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid input: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// Another write landed first; the in-memory projection is unchanged.
    #[error("document changed concurrently (expected version {expected:?}, found {actual:?})")]
    Conflict { expected: Option<Version>, actual: Option<Version> },

    #[error("remote store error: {0}")]
    Remote(DocumentStoreError),

    #[error("malformed document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Pricing(#[from] domain::PricingError),
}

impl From<DocumentStoreError> for StoreError {
    fn from(err: DocumentStoreError) -> Self {
        match err {
            DocumentStoreError::VersionConflict { expected, actual } => Self::Conflict { expected, actual },
            DocumentStoreError::Payload(err) => Self::Serialization(err),
            other => Self::Remote(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
