//! Order history store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use super::{DocumentStore, Orders, ScopedStore, StoreOptions, Subscription};
use crate::domain::{Address, CartItem, Order, PaymentMethod, UserId};
use crate::Result;

pub struct OrderHistoryStore {
    inner: ScopedStore<Orders>,
    // Badge for an order placed in this session; kept out of the document.
    has_new_order: AtomicBool,
}

impl OrderHistoryStore {
    pub fn new(backend: Arc<dyn DocumentStore>, options: StoreOptions) -> Self {
        Self { inner: ScopedStore::new(backend, options), has_new_order: AtomicBool::new(false) }
    }

    pub fn scoped(&self) -> &ScopedStore<Orders> { &self.inner }

    pub async fn init(&self, user: &UserId) -> Result<Subscription> { self.inner.init(user).await }

    pub fn clear(&self) {
        self.inner.clear();
        self.has_new_order.store(false, Ordering::SeqCst);
    }

    /// Snapshots the lines and address into a new `Pending` order at the head of the history.
    #[tracing::instrument(skip(self, items, address), fields(user = %user, lines = items.len()))]
    pub async fn place_order(
        &self,
        user: &UserId,
        items: &[CartItem],
        address: &Address,
        total: Decimal,
        payment: PaymentMethod,
    ) -> Result<Order> {
        let order = Order::snapshot(Utc::now(), items, address, total, payment);
        let placed = self.inner.commit(user, |history| Ok((history.with_placed(order.clone()), order))).await?;
        self.has_new_order.store(true, Ordering::SeqCst);
        tracing::info!(order = %placed.id, %total, "order placed");
        Ok(placed)
    }

    pub fn list(&self) -> Vec<Order> { self.inner.read(|history| history.list.clone()) }

    pub fn has_new_order(&self) -> bool { self.has_new_order.load(Ordering::SeqCst) }

    /// Acknowledge the new-order badge for `user`. Local only.
    pub fn clear_new_order_status(&self, user: &UserId) -> Result<()> {
        self.inner.ensure_owner(user)?;
        self.has_new_order.store(false, Ordering::SeqCst);
        Ok(())
    }
}
