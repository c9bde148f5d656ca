//! Domain model: value objects, persisted documents and pricing.
pub mod aggregates;
pub mod pricing;
pub mod value_objects;

pub use aggregates::*;
pub use pricing::{compute_totals, PricingError, StaticCatalog, TaxLookup, Totals};
pub use value_objects::{ProductId, Quantity, UserId, UserIdError};
