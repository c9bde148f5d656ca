//! Address book store.
//!
//! Addresses arrive already validated (see [`AddressDraft`](crate::domain::AddressDraft));
//! this store only keeps the single-default rule.

use std::sync::Arc;

use uuid::Uuid;

use super::{Addresses, DocumentStore, ScopedStore, StoreOptions, Subscription};
use crate::domain::{Address, UserId};
use crate::Result;

pub struct AddressBookStore {
    inner: ScopedStore<Addresses>,
}

impl AddressBookStore {
    pub fn new(backend: Arc<dyn DocumentStore>, options: StoreOptions) -> Self {
        Self { inner: ScopedStore::new(backend, options) }
    }

    pub fn scoped(&self) -> &ScopedStore<Addresses> { &self.inner }

    pub async fn init(&self, user: &UserId) -> Result<Subscription> { self.inner.init(user).await }

    pub fn clear(&self) { self.inner.clear() }

    /// Inserts or replaces an address and returns it as stored (id assigned,
    /// default flag resolved).
    #[tracing::instrument(skip(self, address), fields(user = %user, address = %address.id))]
    pub async fn save(&self, user: &UserId, address: Address) -> Result<Address> {
        self.inner
            .commit(user, |book| Ok(book.with_saved(address, || Uuid::new_v4().to_string())))
            .await
    }

    #[tracing::instrument(skip(self), fields(user = %user))]
    pub async fn set_default(&self, user: &UserId, id: &str) -> Result<()> {
        self.inner.commit(user, |book| Ok((book.with_default(id)?, ()))).await
    }

    #[tracing::instrument(skip(self), fields(user = %user))]
    pub async fn remove(&self, user: &UserId, id: &str) -> Result<()> {
        self.inner.commit(user, |book| Ok((book.without(id)?, ()))).await
    }

    pub fn list(&self) -> Vec<Address> { self.inner.read(|book| book.list.clone()) }

    pub fn get(&self, id: &str) -> Option<Address> { self.inner.read(|book| book.get(id).cloned()) }

    pub fn default_address(&self) -> Option<Address> { self.inner.read(|book| book.default_address().cloned()) }
}
