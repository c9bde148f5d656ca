//! Checkout: charge the payment collaborator, record the order, clear the ordered lines.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::{Order, PaymentMethod, UserId};
use crate::session::Session;
use crate::StoreError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub reference: String,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment declined: {0}")]
    Declined(String),
    #[error("payment provider unavailable: {0}")]
    Unavailable(String),
}

/// Payment gateway collaborator for online payments.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, user: &UserId, total: Decimal) -> Result<PaymentReceipt, PaymentError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentChoice {
    Online,
    CashOnDelivery,
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("unknown address {0}")]
    UnknownAddress(String),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The order is recorded; only clearing its lines from the remote cart failed.
    #[error("order {} placed but the cart could not be emptied: {source}", .order.id)]
    CartNotCleared { order: Box<Order>, source: StoreError },
}

/// Places an order for everything in the session's cart.
///
/// Nothing changes if the payment fails. The ordered lines leave the remote
/// cart only after the order write has succeeded; lines added meanwhile stay.
#[tracing::instrument(skip(session, gateway), fields(user = %user))]
pub async fn checkout(
    session: &Session,
    user: &UserId,
    address_id: &str,
    choice: PaymentChoice,
    gateway: &dyn PaymentGateway,
) -> Result<Order, CheckoutError> {
    session.cart.scoped().ensure_owner(user)?;
    let items = session.cart.items();
    if items.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    let address = session
        .addresses
        .get(address_id)
        .ok_or_else(|| CheckoutError::UnknownAddress(address_id.to_string()))?;
    let total = session.cart.totals()?.total;

    let payment = match choice {
        PaymentChoice::CashOnDelivery => PaymentMethod::CashOnDelivery,
        PaymentChoice::Online => {
            let receipt = gateway.charge(user, total).await.map_err(|err| {
                tracing::warn!(error = %err, %total, "payment failed");
                err
            })?;
            PaymentMethod::Online { reference: receipt.reference }
        }
    };

    let order = session.orders.place_order(user, &items, &address, total, payment).await?;
    if let Err(source) = session.cart.remove_ordered(user, &items).await {
        tracing::warn!(order = %order.id, error = %source, "order placed but cart not emptied");
        return Err(CheckoutError::CartNotCleared { order: Box::new(order), source });
    }
    Ok(order)
}

/// Gateway stand-in that approves or declines every charge.
#[derive(Debug, Default)]
pub struct FakeGateway {
    decline: AtomicBool,
    charges: AtomicUsize,
}

impl FakeGateway {
    pub fn approving() -> Self { Self::default() }

    pub fn declining() -> Self {
        Self { decline: AtomicBool::new(true), ..Self::default() }
    }

    pub fn set_declining(&self, decline: bool) { self.decline.store(decline, Ordering::SeqCst); }

    pub fn charges(&self) -> usize { self.charges.load(Ordering::SeqCst) }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn charge(&self, user: &UserId, total: Decimal) -> Result<PaymentReceipt, PaymentError> {
        if self.decline.load(Ordering::SeqCst) {
            return Err(PaymentError::Declined(format!("charge of {total} for {user} refused")));
        }
        let n = self.charges.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PaymentReceipt { reference: format!("pay_{}_{n}", uuid::Uuid::new_v4().simple()) })
    }
}
