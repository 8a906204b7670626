//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::PromotionError;
use crate::services::webhook::WebhookError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Promotion validation or redemption failed.
    #[error("Promotion error: {0}")]
    Promotion(#[from] PromotionError),

    /// Webhook signature verification failed.
    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),

    /// Session store operation failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// HTTP status for a promotion error.
///
/// Unknown codes and orders are `404`. Codes used up by earlier redemptions
/// and cancelled orders are `409`. Every other rejection is `400`.
#[must_use]
pub const fn promotion_status(err: &PromotionError) -> StatusCode {
    match err {
        PromotionError::UnknownCode(_) | PromotionError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        PromotionError::Rejected(rejection) if rejection.is_exhausted() => StatusCode::CONFLICT,
        PromotionError::OrderCancelled(_) => StatusCode::CONFLICT,
        PromotionError::InvalidCode(_)
        | PromotionError::Rejected(_)
        | PromotionError::InvalidCart(_) => StatusCode::BAD_REQUEST,
        PromotionError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl AppError {
    /// HTTP status this error responds with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Promotion(err) => promotion_status(err),
            Self::Webhook(_) | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Promotion(err) => err.user_message(),
            Self::Webhook(_) => "Invalid webhook signature".to_string(),
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use marigold_core::OrderId;
    use marigold_core::promotion::{PromotionCode, PromotionRejection};
    use rust_decimal::Decimal;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order 12".to_string());
        assert_eq!(err.to_string(), "Not found: order 12");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Webhook(WebhookError::SignatureMismatch)),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_promotion_status_codes() {
        let code = PromotionCode::parse("SPRING10").unwrap();

        assert_eq!(
            promotion_status(&PromotionError::UnknownCode(code.clone())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            promotion_status(&PromotionError::Rejected(
                PromotionRejection::UsageLimitReached { limit: 100 }
            )),
            StatusCode::CONFLICT
        );
        assert_eq!(
            promotion_status(&PromotionError::Rejected(
                PromotionRejection::CustomerLimitReached { limit: 1 }
            )),
            StatusCode::CONFLICT
        );
        assert_eq!(
            promotion_status(&PromotionError::Rejected(
                PromotionRejection::MinimumOrderNotMet {
                    minimum: Decimal::new(5000, 2),
                    subtotal: Decimal::new(1000, 2),
                }
            )),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            promotion_status(&PromotionError::Rejected(PromotionRejection::NotStackable {
                code
            })),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            promotion_status(&PromotionError::OrderCancelled(OrderId::new(3))),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let response = AppError::Database(RepositoryError::DataCorruption(
            "bad rule on promotion 4".to_string(),
        ))
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
