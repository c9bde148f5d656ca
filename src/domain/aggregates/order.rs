//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::address::Address;
use super::cart::CartItem;
use crate::domain::value_objects::ProductId;

/// Persisted as `orders/{user}`, newest first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderHistoryDocument {
    #[serde(default)]
    pub list: Vec<Order>,
}

impl OrderHistoryDocument {
    pub fn with_placed(&self, order: Order) -> Self {
        let mut list = Vec::with_capacity(self.list.len() + 1);
        list.push(order);
        list.extend(self.list.iter().cloned());
        Self { list }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderLine>,
    pub total: Decimal,
    pub address: Address,
    pub payment: PaymentMethod,
    pub status: OrderStatus,
}

/// Copy of a cart line at placement time; never re-read from the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub qty: u32,
    pub price: Decimal,
    pub name: String,
    pub image: String,
}

impl From<&CartItem> for OrderLine {
    fn from(item: &CartItem) -> Self {
        Self { product_id: item.id.clone(), qty: item.qty.value(), price: item.price, name: item.name.clone(), image: item.image.clone() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum PaymentMethod {
    Online { reference: String },
    CashOnDelivery,
}

/// Only `Pending` is ever written here; later transitions belong to the admin side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus { #[default] Pending, Processing, Shipped, Delivered, Cancelled }

impl Order {
    pub fn snapshot(
        created_at: DateTime<Utc>,
        items: &[CartItem],
        address: &Address,
        total: Decimal,
        payment: PaymentMethod,
    ) -> Self {
        Self {
            id: order_code(created_at, Uuid::new_v4()),
            created_at,
            items: items.iter().map(OrderLine::from).collect(),
            total,
            address: address.clone(),
            payment,
            status: OrderStatus::Pending,
        }
    }

    pub fn total_items(&self) -> u32 { self.items.iter().map(|l| l.qty).sum() }
}

/// Short presentable code: `OD` + base-36 creation millis + 4 random base-36 chars.
pub fn order_code(created_at: DateTime<Utc>, entropy: Uuid) -> String {
    let millis = u128::try_from(created_at.timestamp_millis()).unwrap_or_default();
    let suffix = entropy.as_u128() % 36u128.pow(4);
    format!("OD{}{:0>4}", base36(millis), base36(suffix))
}

fn base36(mut n: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 { return "0".into(); }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
