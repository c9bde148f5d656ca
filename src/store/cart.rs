//! Cart store: line items plus the derived price breakdown.

use std::sync::Arc;

use serde::Serialize;
use validator::Validate;

use super::{Carts, DocumentStore, ScopedStore, StoreOptions, Subscription, SyncStatus};
use crate::domain::{compute_totals, CartItem, ProductId, TaxLookup, Totals, UserId};
use crate::Result;

/// Read model handed to the presentation layer.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub status: SyncStatus,
    pub items: Vec<CartItem>,
    pub totals: Totals,
}

pub struct CartStore {
    inner: ScopedStore<Carts>,
    catalog: Arc<dyn TaxLookup>,
}

impl CartStore {
    pub fn new(backend: Arc<dyn DocumentStore>, options: StoreOptions, catalog: Arc<dyn TaxLookup>) -> Self {
        Self { inner: ScopedStore::new(backend, options), catalog }
    }

    pub fn scoped(&self) -> &ScopedStore<Carts> { &self.inner }

    pub async fn init(&self, user: &UserId) -> Result<Subscription> { self.inner.init(user).await }

    /// Local reset; the remote cart is untouched.
    pub fn clear(&self) { self.inner.clear() }

    /// Adds a line, or raises the quantity of the existing line for the same product.
    /// Lines with a blank id or a price outside `[0, MAX_UNIT_PRICE]` are rejected
    /// before anything is written.
    #[tracing::instrument(skip(self, item), fields(user = %user, product = %item.id))]
    pub async fn add(&self, user: &UserId, item: CartItem) -> Result<()> {
        item.validate()?;
        self.inner.commit(user, |cart| Ok((cart.with_added(item), ()))).await
    }

    /// Sets a line's quantity, clamped to `[1, 99]`. Zero does not remove the line.
    #[tracing::instrument(skip(self), fields(user = %user))]
    pub async fn set_qty(&self, user: &UserId, id: &ProductId, qty: i64) -> Result<()> {
        self.inner.commit(user, |cart| Ok((cart.with_quantity(id, qty)?, ()))).await
    }

    #[tracing::instrument(skip(self), fields(user = %user))]
    pub async fn remove(&self, user: &UserId, id: &ProductId) -> Result<()> {
        self.inner.commit(user, |cart| Ok((cart.without(id)?, ()))).await
    }

    /// Writes an empty cart to the remote document.
    #[tracing::instrument(skip(self), fields(user = %user))]
    pub async fn empty(&self, user: &UserId) -> Result<()> {
        self.inner.commit(user, |cart| Ok((cart.emptied(), ()))).await
    }

    /// Removes the lines of a placed order, leaving anything added since.
    #[tracing::instrument(skip(self, ordered), fields(user = %user, lines = ordered.len()))]
    pub async fn remove_ordered(&self, user: &UserId, ordered: &[CartItem]) -> Result<()> {
        self.inner.commit(user, |cart| Ok((cart.without_ordered(ordered), ()))).await
    }

    pub fn items(&self) -> Vec<CartItem> { self.inner.read(|cart| cart.items.clone()) }

    /// Fails only if a line's amounts overflow, e.g. a price written by another client.
    pub fn totals(&self) -> Result<Totals> {
        Ok(self.inner.read(|cart| compute_totals(&cart.items, self.catalog.as_ref()))?)
    }

    pub fn summary(&self) -> Result<CartSummary> {
        let projection = self.inner.snapshot();
        let totals = compute_totals(&projection.document.items, self.catalog.as_ref())?;
        Ok(CartSummary { status: projection.status, items: projection.document.items, totals })
    }
}
