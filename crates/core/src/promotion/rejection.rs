//! Reasons a promotion does not apply.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::PromotionCode;

/// Why a promotion was rejected for a cart.
///
/// These are expected outcomes of customer input, not failures of the
/// service; the storefront reports them back to the customer.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PromotionRejection {
    #[error("promotion is not active")]
    Inactive,

    #[error("promotion starts at {starts_at}")]
    NotStarted { starts_at: DateTime<Utc> },

    #[error("promotion ended at {ended_at}")]
    Expired { ended_at: DateTime<Utc> },

    #[error("promotion usage limit of {limit} reached")]
    UsageLimitReached { limit: u32 },

    #[error("cart is empty")]
    EmptyCart,

    #[error("order subtotal {subtotal} is below the minimum of {minimum}")]
    MinimumOrderNotMet { minimum: Decimal, subtotal: Decimal },

    #[error("customer has already used this promotion {limit} time(s)")]
    CustomerLimitReached { limit: u32 },

    #[error("no items in the cart are eligible")]
    NoEligibleItems,

    #[error("at least {required} eligible items are required")]
    BuyQuantityNotMet { required: u32 },

    #[error("nothing to discount")]
    NothingToDiscount,

    #[error("promotion {code} cannot be combined with other promotions")]
    NotStackable { code: PromotionCode },
}

impl PromotionRejection {
    /// Stable machine-readable key for API responses and logs.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::NotStarted { .. } => "not_started",
            Self::Expired { .. } => "expired",
            Self::UsageLimitReached { .. } => "usage_limit_reached",
            Self::EmptyCart => "empty_cart",
            Self::MinimumOrderNotMet { .. } => "minimum_order_not_met",
            Self::CustomerLimitReached { .. } => "customer_limit_reached",
            Self::NoEligibleItems => "no_eligible_items",
            Self::BuyQuantityNotMet { .. } => "buy_quantity_not_met",
            Self::NothingToDiscount => "nothing_to_discount",
            Self::NotStackable { .. } => "not_stackable",
        }
    }

    /// Whether the rejection is caused by redemptions already recorded.
    ///
    /// The HTTP layer reports these as conflicts rather than bad input.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(
            self,
            Self::UsageLimitReached { .. } | Self::CustomerLimitReached { .. }
        )
    }

    /// Customer-facing explanation.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Inactive => "This code is no longer valid.".to_string(),
            Self::NotStarted { starts_at } => format!(
                "This code is not active yet. It starts on {}.",
                starts_at.format("%B %-d, %Y")
            ),
            Self::Expired { ended_at } => {
                format!("This code expired on {}.", ended_at.format("%B %-d, %Y"))
            }
            Self::UsageLimitReached { .. } => {
                "This code has been fully redeemed.".to_string()
            }
            Self::EmptyCart => "Add something to your cart before applying a code.".to_string(),
            Self::MinimumOrderNotMet { minimum, .. } => {
                format!("This code requires an order of at least {minimum:.2}.")
            }
            Self::CustomerLimitReached { .. } => {
                "You have already used this code.".to_string()
            }
            Self::NoEligibleItems => {
                "None of the items in your cart qualify for this code.".to_string()
            }
            Self::BuyQuantityNotMet { required } => {
                format!("Add at least {required} qualifying items to use this code.")
            }
            Self::NothingToDiscount => "This code has nothing to discount on this order.".to_string(),
            Self::NotStackable { code } => {
                format!("{code} can't be combined with other codes.")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_reason_keys() {
        assert_eq!(PromotionRejection::Inactive.reason(), "inactive");
        assert_eq!(
            PromotionRejection::UsageLimitReached { limit: 3 }.reason(),
            "usage_limit_reached"
        );
        assert!(PromotionRejection::CustomerLimitReached { limit: 1 }.is_exhausted());
        assert!(!PromotionRejection::NoEligibleItems.is_exhausted());
    }

    #[test]
    fn test_user_message_formats_dates() {
        let ended_at = Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).single();
        let Some(ended_at) = ended_at else {
            panic!("valid date");
        };
        assert_eq!(
            PromotionRejection::Expired { ended_at }.user_message(),
            "This code expired on January 5, 2026."
        );
    }

    #[test]
    fn test_serializes_with_reason_tag() {
        let json = serde_json::to_value(PromotionRejection::BuyQuantityNotMet { required: 3 })
            .unwrap_or_default();
        assert_eq!(json["reason"], "buy_quantity_not_met");
        assert_eq!(json["required"], 3);
    }
}
