//! Cart Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::domain::value_objects::{ProductId, Quantity};
use crate::StoreError;

/// Persisted as `carts/{user}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartDocument {
    #[serde(default)]
    pub items: Vec<CartItem>,
}

/// Highest unit price a new cart line may carry.
pub const MAX_UNIT_PRICE: i64 = 10_000_000;

/// A cart line. `price` is the unit price captured when the line was added.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[validate(custom = "non_blank_id")]
    pub id: ProductId,
    #[validate(length(max = 200))]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[validate(custom = "unit_price")]
    pub price: Decimal,
    pub qty: Quantity,
}

impl CartItem {
    /// `None` if the product does not fit in a `Decimal`.
    pub fn line_total(&self) -> Option<Decimal> { self.price.checked_mul(Decimal::from(self.qty.value())) }
}

fn non_blank_id(id: &ProductId) -> Result<(), ValidationError> {
    if id.as_str().trim().is_empty() { Err(ValidationError::new("required")) } else { Ok(()) }
}

fn unit_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price < Decimal::ZERO || *price > Decimal::from(MAX_UNIT_PRICE) {
        return Err(ValidationError::new("price"));
    }
    Ok(())
}

impl CartDocument {
    pub fn item(&self, id: &ProductId) -> Option<&CartItem> { self.items.iter().find(|i| &i.id == id) }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn total_items(&self) -> u32 { self.items.iter().map(|i| i.qty.value()).sum() }

    /// Merges into an existing line (keeping its price snapshot) or appends.
    pub fn with_added(&self, item: CartItem) -> Self {
        let mut next = self.clone();
        match next.items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => existing.qty = existing.qty.saturating_add(item.qty),
            None => next.items.push(item),
        }
        next
    }

    pub fn with_quantity(&self, id: &ProductId, requested: i64) -> Result<Self, StoreError> {
        let mut next = self.clone();
        let line = next
            .items
            .iter_mut()
            .find(|i| &i.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("cart item {id}")))?;
        line.qty = Quantity::clamped(requested);
        Ok(next)
    }

    pub fn without(&self, id: &ProductId) -> Result<Self, StoreError> {
        if self.item(id).is_none() {
            return Err(StoreError::NotFound(format!("cart item {id}")));
        }
        Ok(Self { items: self.items.iter().filter(|i| &i.id != id).cloned().collect() })
    }

    pub fn emptied(&self) -> Self { Self::default() }

    /// Takes checked-out lines out of the cart. Lines added or raised since the
    /// snapshot keep whatever was not part of it.
    pub fn without_ordered(&self, ordered: &[CartItem]) -> Self {
        let items = self
            .items
            .iter()
            .filter_map(|line| match ordered.iter().find(|o| o.id == line.id) {
                None => Some(line.clone()),
                Some(o) if line.qty > o.qty => {
                    let left = i64::from(line.qty.value()) - i64::from(o.qty.value());
                    Some(CartItem { qty: Quantity::clamped(left), ..line.clone() })
                }
                Some(_) => None,
            })
            .collect();
        Self { items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, price: i64, qty: i64) -> CartItem {
        CartItem { id: id.into(), name: format!("Product {id}"), image: String::new(), price: Decimal::from(price), qty: Quantity::clamped(qty) }
    }

    #[test]
    fn test_cart_operations() {
        let cart = CartDocument::default().with_added(item("p1", 100, 2));
        assert_eq!(cart.items.len(), 1);
        let cart = cart.with_added(item("p1", 100, 1)).with_added(item("p2", 250, 1));
        assert_eq!(cart.items[0].qty.value(), 3); // Merged
        assert_eq!(cart.total_items(), 4);
        assert_eq!(cart.items[1].line_total(), Some(Decimal::from(250)));
    }

    #[test]
    fn test_merge_keeps_first_price_and_clamps() {
        let cart = CartDocument::default().with_added(item("p1", 100, 90)).with_added(item("p1", 80, 50));
        assert_eq!(cart.items[0].qty.value(), 99);
        assert_eq!(cart.items[0].price, Decimal::from(100));
    }

    #[test]
    fn test_set_quantity_never_removes() {
        let cart = CartDocument::default().with_added(item("p1", 100, 5));
        let cart = cart.with_quantity(&"p1".into(), 0).unwrap();
        assert_eq!(cart.items[0].qty.value(), 1);
        let cart = cart.with_quantity(&"p1".into(), 1_000).unwrap();
        assert_eq!(cart.items[0].qty.value(), 99);
        assert!(matches!(cart.with_quantity(&"nope".into(), 2), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_remove_line() {
        let cart = CartDocument::default().with_added(item("p1", 100, 1)).with_added(item("p2", 10, 1));
        let cart = cart.without(&"p1".into()).unwrap();
        assert_eq!(cart.items.len(), 1);
        assert!(cart.item(&"p1".into()).is_none());
        assert!(cart.without(&"p1".into()).is_err());
        assert!(cart.emptied().is_empty());
    }

    #[test]
    fn test_without_ordered_keeps_later_additions() {
        let ordered = [item("p1", 100, 2), item("p2", 10, 1)];
        let cart = CartDocument { items: ordered.to_vec() }
            .with_added(item("p3", 5, 1))
            .with_added(item("p1", 100, 3));
        let left = cart.without_ordered(&ordered);
        let lines: Vec<_> = left.items.iter().map(|i| (i.id.as_str(), i.qty.value())).collect();
        assert_eq!(lines, vec![("p1", 3), ("p3", 1)]);
        assert!(CartDocument { items: ordered.to_vec() }.without_ordered(&ordered).is_empty());
    }

    #[test]
    fn test_price_bounds() {
        assert!(item("p1", 0, 1).validate().is_ok());
        assert!(item("p1", MAX_UNIT_PRICE, 1).validate().is_ok());
        assert!(item("p1", -1, 1).validate().unwrap_err().field_errors().contains_key("price"));
        assert!(item("p1", MAX_UNIT_PRICE + 1, 1).validate().is_err());
        assert!(item(" ", 10, 1).validate().unwrap_err().field_errors().contains_key("id"));

        let huge = CartItem { price: Decimal::MAX, ..item("p1", 0, 2) };
        assert!(huge.validate().is_err());
        assert_eq!(huge.line_total(), None);
    }

    #[test]
    fn test_document_layout() {
        let cart = CartDocument::default().with_added(item("p1", 100, 2));
        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(json["items"][0]["id"], "p1");
        assert_eq!(json["items"][0]["qty"], 2);
        let back: CartDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back, cart);
    }
}
