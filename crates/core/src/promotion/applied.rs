//! Promotions applied to a cart.
//!
//! The storefront keeps an [`AppliedPromotions`] in the session and
//! re-evaluates it whenever the cart changes, so the discounts stored here are
//! always those of the last evaluation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CartSnapshot, Discount, Evaluation, PromotionCode, PromotionRejection};
use crate::{Money, PromotionKind, round_to_cents};

/// One promotion applied to the cart, with its current contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedPromotion {
    pub code: PromotionCode,
    pub name: String,
    pub kind: PromotionKind,
    pub stackable: bool,
    pub discount: Discount,
}

impl From<Evaluation> for AppliedPromotion {
    fn from(eval: Evaluation) -> Self {
        Self {
            code: eval.code,
            name: eval.name,
            kind: eval.kind,
            stackable: eval.stackable,
            discount: eval.discount,
        }
    }
}

/// Cart totals after applied promotions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub merchandise_discount: Decimal,
    pub shipping: Decimal,
    pub shipping_discount: Decimal,
    pub total: Decimal,
}

impl CartTotals {
    #[must_use]
    pub fn discount(&self) -> Decimal {
        self.merchandise_discount + self.shipping_discount
    }
}

/// The set of promotions applied to one cart, in the order they were applied.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppliedPromotions {
    entries: Vec<AppliedPromotion>,
}

impl AppliedPromotions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a promotion, or refresh it if the code is already applied.
    ///
    /// # Errors
    ///
    /// Returns [`PromotionRejection::NotStackable`] when another code is
    /// already applied and either that code or the new one does not stack.
    pub fn apply(&mut self, entry: AppliedPromotion) -> Result<(), PromotionRejection> {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.code == entry.code) {
            *existing = entry;
            return Ok(());
        }

        if !entry.stackable && !self.entries.is_empty() {
            return Err(PromotionRejection::NotStackable { code: entry.code });
        }
        if let Some(blocking) = self.entries.iter().find(|e| !e.stackable) {
            return Err(PromotionRejection::NotStackable {
                code: blocking.code.clone(),
            });
        }

        self.entries.push(entry);
        Ok(())
    }

    /// Remove a code. Returns whether it was applied.
    pub fn remove(&mut self, code: &PromotionCode) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.code != code);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn contains(&self, code: &PromotionCode) -> bool {
        self.entries.iter().any(|e| &e.code == code)
    }

    #[must_use]
    pub fn codes(&self) -> Vec<PromotionCode> {
        self.entries.iter().map(|e| e.code.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AppliedPromotion> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Totals for `cart` with every applied discount.
    ///
    /// Combined merchandise discounts are capped at the subtotal and combined
    /// shipping discounts at the shipping charge.
    #[must_use]
    pub fn totals(&self, cart: &CartSnapshot) -> CartTotals {
        let subtotal = cart.subtotal();
        let shipping = round_to_cents(cart.shipping.max(Decimal::ZERO));

        let merchandise_discount = self
            .entries
            .iter()
            .map(|e| e.discount.merchandise)
            .sum::<Decimal>()
            .min(subtotal);
        let shipping_discount = self
            .entries
            .iter()
            .map(|e| e.discount.shipping)
            .sum::<Decimal>()
            .min(shipping);

        let total = Money::new(subtotal + shipping, cart.currency)
            .saturating_sub(merchandise_discount + shipping_discount)
            .amount();

        CartTotals {
            subtotal,
            merchandise_discount,
            shipping,
            shipping_discount,
            total,
        }
    }
}

impl<'a> IntoIterator for &'a AppliedPromotions {
    type Item = &'a AppliedPromotion;
    type IntoIter = std::slice::Iter<'a, AppliedPromotion>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<AppliedPromotion> for AppliedPromotions {
    fn from_iter<T: IntoIterator<Item = AppliedPromotion>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::promotion::CartLine;
    use crate::{CurrencyCode, ProductId};

    fn applied(code: &str, stackable: bool, merchandise: i64, shipping: i64) -> AppliedPromotion {
        AppliedPromotion {
            code: PromotionCode::parse(code).unwrap(),
            name: code.to_string(),
            kind: PromotionKind::FixedAmount,
            stackable,
            discount: Discount {
                merchandise: Decimal::new(merchandise, 2),
                shipping: Decimal::new(shipping, 2),
            },
        }
    }

    fn cart(cents: i64, shipping_cents: i64) -> CartSnapshot {
        CartSnapshot::new(
            vec![CartLine {
                product_id: ProductId::new(1),
                category_id: None,
                name: "Mug".to_string(),
                quantity: 1,
                unit_price: Decimal::new(cents, 2),
            }],
            Decimal::new(shipping_cents, 2),
            CurrencyCode::USD,
        )
    }

    #[test]
    fn test_apply_replaces_same_code() {
        let mut promos = AppliedPromotions::new();
        promos.apply(applied("SAVE5", true, 500, 0)).unwrap();
        promos.apply(applied("SAVE5", true, 300, 0)).unwrap();
        assert_eq!(promos.len(), 1);
        assert_eq!(
            promos.iter().next().unwrap().discount.merchandise,
            Decimal::new(300, 2)
        );
    }

    #[test]
    fn test_stackable_codes_combine() {
        let mut promos = AppliedPromotions::new();
        promos.apply(applied("SAVE5", true, 500, 0)).unwrap();
        promos.apply(applied("SHIPFREE", true, 0, 500)).unwrap();
        assert_eq!(promos.codes().len(), 2);
    }

    #[test]
    fn test_non_stackable_code_is_exclusive() {
        let mut promos = AppliedPromotions::new();
        promos.apply(applied("SAVE5", true, 500, 0)).unwrap();
        assert_eq!(
            promos.apply(applied("BIGSALE", false, 1000, 0)),
            Err(PromotionRejection::NotStackable {
                code: PromotionCode::parse("BIGSALE").unwrap()
            })
        );

        let mut promos = AppliedPromotions::new();
        promos.apply(applied("BIGSALE", false, 1000, 0)).unwrap();
        assert_eq!(
            promos.apply(applied("SAVE5", true, 500, 0)),
            Err(PromotionRejection::NotStackable {
                code: PromotionCode::parse("BIGSALE").unwrap()
            })
        );
        // Refreshing the exclusive code itself is fine.
        promos.apply(applied("BIGSALE", false, 900, 0)).unwrap();
        assert_eq!(promos.len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut promos = AppliedPromotions::new();
        promos.apply(applied("SAVE5", true, 500, 0)).unwrap();
        promos.apply(applied("SAVE10", true, 1000, 0)).unwrap();

        assert!(promos.remove(&PromotionCode::parse("save5").unwrap()));
        assert!(!promos.remove(&PromotionCode::parse("SAVE5").unwrap()));
        assert_eq!(promos.len(), 1);

        promos.clear();
        assert!(promos.is_empty());
    }

    #[test]
    fn test_totals_cap_discounts() {
        let mut promos = AppliedPromotions::new();
        promos.apply(applied("SAVE20", true, 2000, 0)).unwrap();
        promos.apply(applied("SAVE15", true, 1500, 0)).unwrap();
        promos.apply(applied("SHIPFREE", true, 0, 900)).unwrap();

        let totals = promos.totals(&cart(3000, 500));
        assert_eq!(totals.subtotal, Decimal::new(3000, 2));
        assert_eq!(totals.merchandise_discount, Decimal::new(3000, 2));
        assert_eq!(totals.shipping_discount, Decimal::new(500, 2));
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn test_totals_without_promotions() {
        let totals = AppliedPromotions::new().totals(&cart(1999, 500));
        assert_eq!(totals.total, Decimal::new(2499, 2));
        assert_eq!(totals.discount(), Decimal::ZERO);
    }

    #[test]
    fn test_session_round_trip_shape() {
        let mut promos = AppliedPromotions::new();
        promos.apply(applied("SAVE5", true, 500, 0)).unwrap();
        let json = serde_json::to_value(&promos).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["code"], "SAVE5");
    }
}
