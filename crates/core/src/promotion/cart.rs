//! Priced cart snapshots that promotions are evaluated against.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::EligibleItems;
use crate::{CategoryId, CurrencyCode, ProductId, round_to_cents};

/// Maximum quantity of a single product in a cart.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// Maximum number of distinct lines in a cart.
pub const MAX_CART_LINES: usize = 100;

/// Largest price or shipping amount a cart may carry (`NUMERIC(12,2)`).
fn max_amount() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}

/// Check that an amount is non-negative, in range and at most cents.
fn check_amount(amount: Decimal, what: &str) -> Result<(), String> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(format!("{what} cannot be negative"));
    }
    if amount > max_amount() {
        return Err(format!("{what} is too large"));
    }
    if amount.normalize().scale() > 2 {
        return Err(format!("{what} has more than two decimal places"));
    }
    Ok(())
}

/// A single priced line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl CartLine {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// The cart as seen by the promotion rules.
///
/// The storefront builds this from the session cart and catalog prices; the
/// JSON validation endpoint accepts it directly from the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
    #[serde(default)]
    pub shipping: Decimal,
    #[serde(default)]
    pub currency: CurrencyCode,
}

impl CartSnapshot {
    #[must_use]
    pub const fn new(lines: Vec<CartLine>, shipping: Decimal, currency: CurrencyCode) -> Self {
        Self {
            lines,
            shipping,
            currency,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|line| line.quantity == 0)
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// Merchandise subtotal before discounts and shipping.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        round_to_cents(self.lines.iter().map(CartLine::line_total).sum())
    }

    /// Lines a promotion with the given item restrictions applies to.
    pub fn eligible_lines<'a>(
        &'a self,
        items: &'a EligibleItems,
    ) -> impl Iterator<Item = &'a CartLine> + 'a {
        self.lines
            .iter()
            .filter(move |line| line.quantity > 0 && items.matches(line))
    }

    #[must_use]
    pub fn eligible_subtotal(&self, items: &EligibleItems) -> Decimal {
        round_to_cents(self.eligible_lines(items).map(CartLine::line_total).sum())
    }

    /// Reject snapshots no real cart could produce.
    ///
    /// Bounds every line and amount so cart arithmetic cannot overflow.
    ///
    /// # Errors
    ///
    /// Returns a description of the first line count, quantity, price or
    /// shipping amount that is out of range.
    pub fn validate(&self) -> Result<(), String> {
        if self.lines.len() > MAX_CART_LINES {
            return Err(format!("cart cannot have more than {MAX_CART_LINES} lines"));
        }
        check_amount(self.shipping, "shipping")?;
        for line in &self.lines {
            if line.quantity > MAX_LINE_QUANTITY {
                return Err(format!(
                    "quantity for product {} cannot exceed {MAX_LINE_QUANTITY}",
                    line.product_id
                ));
            }
            check_amount(line.unit_price, &format!("unit price for product {}", line.product_id))?;
        }
        Ok(())
    }
}
