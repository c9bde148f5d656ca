//! Wishlist store.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{DocumentStore, ScopedStore, StoreOptions, Subscription, Wishlists};
use crate::domain::{ProductId, UserId};
use crate::Result;

pub struct WishlistStore {
    inner: ScopedStore<Wishlists>,
    // Session-local "unseen addition" badge; never persisted.
    has_new_item: AtomicBool,
}

impl WishlistStore {
    pub fn new(backend: Arc<dyn DocumentStore>, options: StoreOptions) -> Self {
        Self { inner: ScopedStore::new(backend, options), has_new_item: AtomicBool::new(false) }
    }

    pub fn scoped(&self) -> &ScopedStore<Wishlists> { &self.inner }

    pub async fn init(&self, user: &UserId) -> Result<Subscription> { self.inner.init(user).await }

    pub fn clear(&self) {
        self.inner.clear();
        self.has_new_item.store(false, Ordering::SeqCst);
    }

    /// Adds the product if absent, removes it if present. Returns whether it is now wished.
    #[tracing::instrument(skip(self), fields(user = %user))]
    pub async fn toggle(&self, user: &UserId, id: &ProductId) -> Result<bool> {
        let added = self.inner.commit(user, |list| Ok(list.toggled(id))).await?;
        if added {
            self.has_new_item.store(true, Ordering::SeqCst);
        }
        Ok(added)
    }

    pub fn has(&self, id: &ProductId) -> bool { self.inner.read(|list| list.contains(id)) }

    pub fn product_ids(&self) -> BTreeSet<ProductId> { self.inner.read(|list| list.product_ids.clone()) }

    pub fn has_new_item(&self) -> bool { self.has_new_item.load(Ordering::SeqCst) }

    pub fn acknowledge_new_item(&self) { self.has_new_item.store(false, Ordering::SeqCst); }
}
