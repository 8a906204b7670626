//! Status and kind enums stored as Postgres enums.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a promotion computes its discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.promotion_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PromotionKind {
    /// A percentage off eligible items, optionally capped.
    Percentage,
    /// A fixed amount off eligible items.
    FixedAmount,
    /// Shipping is waived.
    FreeShipping,
    /// Buy N eligible units, get M of the cheapest free.
    BuyXGetY,
}

impl PromotionKind {
    /// Human-readable label for templates.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Percentage => "Percentage off",
            Self::FixedAmount => "Amount off",
            Self::FreeShipping => "Free shipping",
            Self::BuyXGetY => "Buy X get Y",
        }
    }
}

impl fmt::Display for PromotionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percentage => write!(f, "percentage"),
            Self::FixedAmount => write!(f, "fixed_amount"),
            Self::FreeShipping => write!(f, "free_shipping"),
            Self::BuyXGetY => write!(f, "buy_x_get_y"),
        }
    }
}

impl FromStr for PromotionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(Self::Percentage),
            "fixed_amount" => Ok(Self::FixedAmount),
            "free_shipping" => Ok(Self::FreeShipping),
            "buy_x_get_y" => Ok(Self::BuyXGetY),
            _ => Err(format!("invalid promotion kind: {s}")),
        }
    }
}

/// Lifecycle of a storefront order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created at checkout, awaiting payment.
    #[default]
    Pending,
    /// Payment confirmed; promotion usage has been recorded.
    Paid,
    /// Abandoned or voided before payment.
    Cancelled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Paid => write!(f, "paid"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}
