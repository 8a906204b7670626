//! Promotion service error types.

use thiserror::Error;

use marigold_core::OrderId;
use marigold_core::promotion::{PromotionCode, PromotionCodeError, PromotionRejection};

use crate::db::RepositoryError;

/// Errors that can occur while validating or redeeming promotions.
#[derive(Debug, Error)]
pub enum PromotionError {
    /// The submitted code is not a well-formed promotion code.
    #[error("invalid promotion code: {0}")]
    InvalidCode(#[from] PromotionCodeError),

    /// No promotion has this code.
    #[error("unknown promotion code: {0}")]
    UnknownCode(PromotionCode),

    /// The promotion exists but does not apply.
    #[error("promotion rejected: {0}")]
    Rejected(#[from] PromotionRejection),

    /// The submitted cart could not have come from a real checkout.
    #[error("invalid cart: {0}")]
    InvalidCart(String),

    /// Order not found.
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// Order was cancelled and can no longer be completed.
    #[error("order {0} is cancelled")]
    OrderCancelled(OrderId),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for PromotionError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

impl PromotionError {
    /// Stable machine-readable key for API responses.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidCode(_) => "invalid_code",
            Self::UnknownCode(_) => "unknown_code",
            Self::Rejected(rejection) => rejection.reason(),
            Self::InvalidCart(_) => "invalid_cart",
            Self::OrderNotFound(_) => "order_not_found",
            Self::OrderCancelled(_) => "order_cancelled",
            Self::Repository(_) => "internal_error",
        }
    }

    /// Customer-facing explanation.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCode(_) | Self::UnknownCode(_) => {
                "That code doesn't match any current promotion.".to_string()
            }
            Self::Rejected(rejection) => rejection.user_message(),
            Self::InvalidCart(_) => "Your cart could not be read. Please refresh and try again.".to_string(),
            Self::OrderNotFound(_) => "Order not found.".to_string(),
            Self::OrderCancelled(_) => "This order has been cancelled.".to_string(),
            Self::Repository(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}
