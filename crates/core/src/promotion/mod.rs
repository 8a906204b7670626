//! Promotion rules.
//!
//! A [`Promotion`] is a stored discount redeemable by a [`PromotionCode`]. The
//! storefront loads one from the database, builds a [`CartSnapshot`], and calls
//! [`evaluate`] to decide whether the code applies and how much it is worth.
//!
//! Evaluation is split in two steps:
//!
//! 1. [`check_eligibility`] - active flag, date window, usage limit, minimum
//!    order, per-customer limit, eligible items. The first failing check wins.
//! 2. [`compute_discount`] - per-kind discount math on the eligible lines.
//!
//! [`AppliedPromotions`] aggregates several evaluated promotions for one cart.

pub mod applied;
pub mod cart;
pub mod code;
pub mod rejection;
pub mod rules;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CategoryId, ProductId, PromotionId, PromotionKind};

pub use applied::{AppliedPromotion, AppliedPromotions, CartTotals};
pub use cart::{CartLine, CartSnapshot, MAX_CART_LINES, MAX_LINE_QUANTITY};
pub use code::{PromotionCode, PromotionCodeError};
pub use rejection::PromotionRejection;
pub use rules::{Discount, Evaluation, EvaluationContext, check_eligibility, compute_discount, evaluate};

/// Error building a [`DiscountRule`] from stored columns.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidRule {
    #[error("percentage must be greater than 0 and at most 100 (got {0})")]
    Percentage(Decimal),
    #[error("amount must be greater than zero (got {0})")]
    Amount(Decimal),
    #[error("max discount must be greater than zero (got {0})")]
    MaxDiscount(Decimal),
    #[error("buy_x_get_y requires buy and get quantities of at least 1")]
    Quantities,
    #[error("{kind} promotions require a value")]
    MissingValue { kind: PromotionKind },
}

/// The discount a promotion grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscountRule {
    Percentage {
        percent: Decimal,
        max_discount: Option<Decimal>,
    },
    FixedAmount {
        amount: Decimal,
    },
    FreeShipping,
    BuyXGetY {
        buy: u32,
        get: u32,
    },
}

impl DiscountRule {
    /// Build a rule from the columns of a `promotion` row.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRule`] if the columns required by `kind` are missing
    /// or out of range.
    pub fn from_parts(
        kind: PromotionKind,
        value: Option<Decimal>,
        max_discount: Option<Decimal>,
        buy_quantity: Option<i32>,
        get_quantity: Option<i32>,
    ) -> Result<Self, InvalidRule> {
        match kind {
            PromotionKind::Percentage => {
                let percent = value.ok_or(InvalidRule::MissingValue { kind })?;
                if percent <= Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
                    return Err(InvalidRule::Percentage(percent));
                }
                if let Some(cap) = max_discount
                    && cap <= Decimal::ZERO
                {
                    return Err(InvalidRule::MaxDiscount(cap));
                }
                Ok(Self::Percentage {
                    percent,
                    max_discount,
                })
            }
            PromotionKind::FixedAmount => {
                let amount = value.ok_or(InvalidRule::MissingValue { kind })?;
                if amount <= Decimal::ZERO {
                    return Err(InvalidRule::Amount(amount));
                }
                Ok(Self::FixedAmount { amount })
            }
            PromotionKind::FreeShipping => Ok(Self::FreeShipping),
            PromotionKind::BuyXGetY => {
                let buy = buy_quantity.and_then(|q| u32::try_from(q).ok());
                let get = get_quantity.and_then(|q| u32::try_from(q).ok());
                match (buy, get) {
                    (Some(buy), Some(get)) if buy >= 1 && get >= 1 => {
                        Ok(Self::BuyXGetY { buy, get })
                    }
                    _ => Err(InvalidRule::Quantities),
                }
            }
        }
    }

    #[must_use]
    pub const fn kind(&self) -> PromotionKind {
        match self {
            Self::Percentage { .. } => PromotionKind::Percentage,
            Self::FixedAmount { .. } => PromotionKind::FixedAmount,
            Self::FreeShipping => PromotionKind::FreeShipping,
            Self::BuyXGetY { .. } => PromotionKind::BuyXGetY,
        }
    }

    /// Short description for the cart summary (e.g., "15% off").
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Percentage {
                percent,
                max_discount: None,
            } => format!("{}% off", percent.normalize()),
            Self::Percentage {
                percent,
                max_discount: Some(cap),
            } => format!("{}% off (up to {cap:.2})", percent.normalize()),
            Self::FixedAmount { amount } => format!("{amount:.2} off"),
            Self::FreeShipping => "Free shipping".to_string(),
            Self::BuyXGetY { buy, get } => format!("Buy {buy}, get {get} free"),
        }
    }
}

/// Products and categories a promotion is restricted to.
///
/// Both sets empty means the promotion applies to every line.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EligibleItems {
    product_ids: HashSet<ProductId>,
    category_ids: HashSet<CategoryId>,
}

impl EligibleItems {
    #[must_use]
    pub fn new(
        product_ids: impl IntoIterator<Item = ProductId>,
        category_ids: impl IntoIterator<Item = CategoryId>,
    ) -> Self {
        Self {
            product_ids: product_ids.into_iter().collect(),
            category_ids: category_ids.into_iter().collect(),
        }
    }

    /// Whether the promotion applies to the whole cart.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.product_ids.is_empty() && self.category_ids.is_empty()
    }

    #[must_use]
    pub fn matches(&self, line: &CartLine) -> bool {
        self.is_unrestricted()
            || self.product_ids.contains(&line.product_id)
            || line
                .category_id
                .is_some_and(|category| self.category_ids.contains(&category))
    }

    pub fn product_ids(&self) -> impl Iterator<Item = ProductId> + '_ {
        self.product_ids.iter().copied()
    }

    pub fn category_ids(&self) -> impl Iterator<Item = CategoryId> + '_ {
        self.category_ids.iter().copied()
    }
}

/// A stored promotion, ready for evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: PromotionId,
    pub code: PromotionCode,
    pub name: String,
    pub description: Option<String>,
    pub rule: DiscountRule,
    /// Cart subtotal required before the code applies.
    pub min_order_amount: Option<Decimal>,
    /// Total redemptions allowed across all customers.
    pub usage_limit: Option<u32>,
    /// Redemptions recorded so far.
    pub usage_count: u32,
    /// Redemptions allowed per customer email.
    pub per_customer_limit: Option<u32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    /// Whether the code may be combined with other applied codes.
    pub stackable: bool,
    pub eligible_items: EligibleItems,
}

impl Promotion {
    #[must_use]
    pub const fn kind(&self) -> PromotionKind {
        self.rule.kind()
    }

    /// Redemptions left before the usage limit, if there is one.
    #[must_use]
    pub fn remaining_uses(&self) -> Option<u32> {
        self.usage_limit
            .map(|limit| limit.saturating_sub(self.usage_count))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_from_parts_percentage() {
        let rule = DiscountRule::from_parts(
            PromotionKind::Percentage,
            Some(Decimal::new(15, 0)),
            Some(Decimal::new(20, 0)),
            None,
            None,
        )
        .unwrap();
        assert_eq!(rule.kind(), PromotionKind::Percentage);
        assert_eq!(rule.describe(), "15% off (up to 20.00)");

        assert_eq!(
            DiscountRule::from_parts(
                PromotionKind::Percentage,
                Some(Decimal::new(150, 0)),
                None,
                None,
                None
            ),
            Err(InvalidRule::Percentage(Decimal::new(150, 0)))
        );
        assert_eq!(
            DiscountRule::from_parts(PromotionKind::Percentage, None, None, None, None),
            Err(InvalidRule::MissingValue {
                kind: PromotionKind::Percentage
            })
        );
    }

    #[test]
    fn test_rule_from_parts_buy_x_get_y() {
        assert_eq!(
            DiscountRule::from_parts(PromotionKind::BuyXGetY, None, None, Some(2), Some(1)),
            Ok(DiscountRule::BuyXGetY { buy: 2, get: 1 })
        );
        assert_eq!(
            DiscountRule::from_parts(PromotionKind::BuyXGetY, None, None, Some(0), Some(1)),
            Err(InvalidRule::Quantities)
        );
        assert_eq!(
            DiscountRule::from_parts(PromotionKind::BuyXGetY, None, None, Some(-1), None),
            Err(InvalidRule::Quantities)
        );
    }

    #[test]
    fn test_rule_from_parts_fixed_amount_must_be_positive() {
        assert!(
            DiscountRule::from_parts(
                PromotionKind::FixedAmount,
                Some(Decimal::ZERO),
                None,
                None,
                None
            )
            .is_err()
        );
    }

    #[test]
    fn test_eligible_items_matching() {
        let items = EligibleItems::new(vec![ProductId::new(1)], vec![CategoryId::new(5)]);
        let mut line = CartLine {
            product_id: ProductId::new(1),
            category_id: None,
            name: String::new(),
            quantity: 1,
            unit_price: Decimal::ONE,
        };
        assert!(items.matches(&line));

        line.product_id = ProductId::new(2);
        assert!(!items.matches(&line));

        line.category_id = Some(CategoryId::new(5));
        assert!(items.matches(&line));

        assert!(EligibleItems::default().matches(&line));
    }
}
