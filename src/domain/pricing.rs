//! Cart pricing: subtotal, tiered shipping, per-item tax and grand total.
//!
//! Everything here is a pure function of the cart lines and a tax lookup
//! supplied by the caller. No rounding happens in this module; use
//! [`Totals::rounded`] when presenting amounts.

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use super::aggregates::CartItem;
use super::value_objects::ProductId;

const SHIPPING_SMALL: i64 = 45;
const SHIPPING_MEDIUM: i64 = 65;
const SHIPPING_LARGE_BASE: i64 = 100;
const SHIPPING_LARGE_STEP: i64 = 35;
const LARGE_THRESHOLD: u32 = 8;
const ITEMS_PER_STEP: u32 = 5;

/// Product catalog collaborator: tax percentage per product.
pub trait TaxLookup: Send + Sync {
    fn tax_percent(&self, id: &ProductId) -> Option<Decimal>;
}

impl<F> TaxLookup for F
where
    F: Fn(&ProductId) -> Option<Decimal> + Send + Sync,
{
    fn tax_percent(&self, id: &ProductId) -> Option<Decimal> { self(id) }
}

/// In-process catalog tax table.
#[derive(Clone, Debug, Default)]
pub struct StaticCatalog {
    tax: HashMap<ProductId, Decimal>,
}

impl StaticCatalog {
    pub fn new() -> Self { Self::default() }

    pub fn with_tax(mut self, id: impl Into<ProductId>, percent: Decimal) -> Self {
        self.tax.insert(id.into(), percent);
        self
    }

    /// Reads a JSON object of `{ "<productId>": <taxPercent> }`.
    pub fn from_json_file(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        let tax: HashMap<ProductId, Decimal> = serde_json::from_str(&raw)?;
        Ok(Self { tax })
    }

    pub fn len(&self) -> usize { self.tax.len() }
    pub fn is_empty(&self) -> bool { self.tax.is_empty() }
}

impl TaxLookup for StaticCatalog {
    fn tax_percent(&self, id: &ProductId) -> Option<Decimal> { self.tax.get(id).copied() }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("cannot read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub subtotal: Decimal,
    pub total_items: u32,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl Totals {
    /// Display copy rounded to two decimal places.
    pub fn rounded(&self) -> Self {
        let round = |d: Decimal| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        Self {
            subtotal: round(self.subtotal),
            total_items: self.total_items,
            shipping: round(self.shipping),
            tax: round(self.tax),
            total: round(self.total),
        }
    }
}

/// Shipping charge for a number of units.
pub fn shipping_for(total_items: u32) -> Decimal {
    match total_items {
        0 => Decimal::ZERO,
        1..=2 => Decimal::from(SHIPPING_SMALL),
        3..=LARGE_THRESHOLD => Decimal::from(SHIPPING_MEDIUM),
        n => {
            // At most ~8.6e8 steps, far inside Decimal's range.
            let steps = (n - LARGE_THRESHOLD).div_ceil(ITEMS_PER_STEP);
            Decimal::from(SHIPPING_LARGE_BASE) + Decimal::from(steps) * Decimal::from(SHIPPING_LARGE_STEP)
        }
    }
}

/// The amounts did not fit in a `Decimal`; only reachable with corrupt prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cart amounts overflow")]
pub struct PricingError;

pub fn compute_totals(items: &[CartItem], catalog: &(impl TaxLookup + ?Sized)) -> Result<Totals, PricingError> {
    let mut totals = Totals::default();
    for item in items {
        let line = item.line_total().ok_or(PricingError)?;
        totals.subtotal = totals.subtotal.checked_add(line).ok_or(PricingError)?;
        totals.total_items = totals.total_items.checked_add(item.qty.value()).ok_or(PricingError)?;
        if let Some(percent) = catalog.tax_percent(&item.id) {
            let tax = line.checked_mul(percent).and_then(|t| t.checked_div(Decimal::ONE_HUNDRED)).ok_or(PricingError)?;
            totals.tax = totals.tax.checked_add(tax).ok_or(PricingError)?;
        }
    }
    totals.shipping = shipping_for(totals.total_items);
    totals.total = totals
        .subtotal
        .checked_add(totals.shipping)
        .and_then(|t| t.checked_add(totals.tax))
        .ok_or(PricingError)?;
    Ok(totals)
}
