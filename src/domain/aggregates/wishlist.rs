//! Wishlist Aggregate

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::ProductId;

/// Persisted as `wishlists/{user}`. A set, so duplicates cannot exist.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistDocument {
    #[serde(default)]
    pub product_ids: BTreeSet<ProductId>,
}

impl WishlistDocument {
    pub fn contains(&self, id: &ProductId) -> bool { self.product_ids.contains(id) }

    /// Returns the next document and whether `id` is now present.
    pub fn toggled(&self, id: &ProductId) -> (Self, bool) {
        let mut next = self.clone();
        let added = if next.product_ids.remove(id) { false } else { next.product_ids.insert(id.clone()) };
        (next, added)
    }
}
