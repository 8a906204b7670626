//! Order-completion webhook.
//!
//! `POST /api/orders/{id}/complete` is called by the payment side once an
//! order is paid. The body is a JSON [`PaymentDetails`]; the request must be
//! signed as described in [`crate::services::webhook`].

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument};

use marigold_core::{OrderId, OrderStatus};

use crate::db::{OrderPromotion, PaymentDetails};
use crate::error::{AppError, Result};
use crate::services::PromotionService;
use crate::services::webhook::{
    SIGNATURE_HEADER, TIMESTAMP_HEADER, WebhookError, verify_signature,
};
use crate::state::AppState;

/// Webhook response body.
#[derive(Debug, Serialize)]
pub struct CompletionResponse {
    pub order_id: OrderId,
    pub status: OrderStatus,
    /// The order was already paid before this request.
    pub already_completed: bool,
    pub total: Decimal,
    pub paid_at: Option<DateTime<Utc>>,
    pub promotions: Vec<OrderPromotion>,
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> std::result::Result<&'a str, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingHeader(name))
}

/// Complete a paid order and redeem its promotions.
#[instrument(skip(state, headers, body), fields(order_id = id))]
pub async fn complete(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CompletionResponse>> {
    let timestamp = header(&headers, TIMESTAMP_HEADER)?;
    let signature = header(&headers, SIGNATURE_HEADER)?;

    verify_signature(
        &state.config().webhook_secret,
        timestamp,
        &body,
        signature,
        Utc::now().timestamp(),
    )
    .inspect_err(|e| tracing::warn!(error = %e, "Rejected order-completion webhook"))?;

    let payment: PaymentDetails = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid payment details: {e}")))?;
    if payment.payment_provider.trim().is_empty() || payment.payment_reference.trim().is_empty() {
        return Err(AppError::BadRequest(
            "payment_provider and payment_reference are required".to_string(),
        ));
    }

    let completed = PromotionService::new(state.pool())
        .complete_order(OrderId::new(id), &payment, Utc::now())
        .await?;

    info!(
        already_completed = completed.already_completed,
        "Order-completion webhook handled"
    );

    let order = completed.order;
    Ok(Json(CompletionResponse {
        order_id: order.id,
        status: order.status,
        already_completed: completed.already_completed,
        total: order.total,
        paid_at: order.paid_at,
        promotions: order.promotions,
    }))
}
