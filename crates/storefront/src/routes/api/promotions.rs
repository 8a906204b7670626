//! Coupon validation API.
//!
//! `POST /api/promotions/validate` takes a code and a priced cart and answers
//! whether the code applies and how much it takes off. It never records usage.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use marigold_core::promotion::{CartSnapshot, Evaluation, PromotionCode};
use marigold_core::{CurrencyCode, CustomerEmail, Money, PromotionKind};

use crate::error::{AppError, promotion_status};
use crate::services::{PromotionError, PromotionService};
use crate::state::AppState;

/// Validation request body.
#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub code: String,
    pub cart: CartSnapshot,
    /// Enables the per-customer limit check when present.
    #[serde(default)]
    pub email: Option<String>,
}

/// Discount breakdown in a successful response.
#[derive(Debug, Serialize)]
pub struct DiscountBody {
    pub merchandise: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

/// Response for a code that applies.
#[derive(Debug, Serialize)]
pub struct ValidResponse {
    pub valid: bool,
    pub code: PromotionCode,
    pub name: String,
    pub kind: PromotionKind,
    pub summary: String,
    pub discount: DiscountBody,
    pub eligible_subtotal: Decimal,
    pub message: String,
}

/// Response for a code that does not apply.
#[derive(Debug, Serialize)]
pub struct InvalidResponse {
    pub valid: bool,
    pub reason: &'static str,
    pub message: String,
}

impl InvalidResponse {
    fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl ValidResponse {
    fn new(eval: Evaluation, currency: CurrencyCode) -> Self {
        let total = eval.discount.total();

        Self {
            valid: true,
            message: format!("{} applied. You save {}.", eval.code, Money::new(total, currency)),
            code: eval.code,
            name: eval.name,
            kind: eval.kind,
            summary: eval.summary,
            discount: DiscountBody {
                merchandise: eval.discount.merchandise,
                shipping: eval.discount.shipping,
                total,
            },
            eligible_subtotal: eval.eligible_subtotal,
        }
    }
}

/// Validate a coupon code against a cart.
///
/// Unknown codes are `404`, codes exhausted by earlier redemptions are `409`,
/// and every other rejection is `400`. Database failures are `500`.
#[instrument(skip(state, request), fields(code = %request.code, lines = request.cart.lines.len()))]
pub async fn validate(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> Result<Response, AppError> {
    let email = match request.email.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match CustomerEmail::parse(raw) {
            Ok(email) => Some(email),
            Err(e) => {
                return Ok(InvalidResponse {
                    valid: false,
                    reason: "invalid_email",
                    message: format!("Invalid email address: {e}"),
                }
                .into_response_with(StatusCode::BAD_REQUEST));
            }
        },
    };

    let store_currency = state.config().currency;
    let outcome = if request.cart.currency == store_currency {
        PromotionService::new(state.pool())
            .validate(&request.code, &request.cart, email.as_ref(), Utc::now())
            .await
    } else {
        Err(PromotionError::InvalidCart(format!(
            "cart currency {} does not match store currency {store_currency}",
            request.cart.currency
        )))
    };

    match outcome {
        Ok(evaluation) => Ok(Json(ValidResponse::new(evaluation, store_currency)).into_response()),
        Err(err) => {
            let status = promotion_status(&err);
            if status.is_server_error() {
                return Err(err.into());
            }
            Ok(InvalidResponse {
                valid: false,
                reason: err.reason(),
                message: err.user_message(),
            }
            .into_response_with(status))
        }
    }
}
