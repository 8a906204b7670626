//! Checkout route handler.
//!
//! Checkout re-evaluates the applied promotions with the customer's email,
//! so per-customer limits are enforced before the order is stored. The order
//! is created `pending`; it is completed by the signed webhook once paid.

use askama::Template;
use askama_web::WebTemplate;
use axum::{Form, extract::State};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument};

use marigold_core::CustomerEmail;

use crate::db::{NewOrder, OrderPromotion, OrderRepository};
use crate::error::{AppError, Result};
use crate::services::PromotionService;
use crate::services::cart::price_cart;
use crate::state::AppState;

use super::cart::{AppliedPromotionView, clear_cart, format_amount, load_applied, load_cart};

/// Checkout form data.
#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    pub email: String,
}

/// Order placed page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/pending.html")]
pub struct CheckoutPendingTemplate {
    pub order_id: i32,
    pub email: String,
    pub subtotal: String,
    pub discount: String,
    pub has_discount: bool,
    pub shipping: String,
    pub total: String,
    pub promotions: Vec<AppliedPromotionView>,
    pub notices: Vec<String>,
}

/// Create a pending order from the session cart.
#[instrument(skip(state, session, form))]
pub async fn checkout(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CheckoutForm>,
) -> Result<CheckoutPendingTemplate> {
    let email = CustomerEmail::parse(&form.email)
        .map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))?;

    let cart = load_cart(&session).await?;
    let snapshot = price_cart(state.pool(), &cart, state.config()).await?;
    if snapshot.is_empty() {
        return Err(AppError::BadRequest("cart is empty".to_string()));
    }

    let applied = load_applied(&session).await?;
    let revalidation = PromotionService::new(state.pool())
        .revalidate_applied(&applied, &snapshot, Some(&email), Utc::now())
        .await?;

    let kept = revalidation.kept;
    let totals = kept.totals(&snapshot);
    let currency = snapshot.currency;

    let order = OrderRepository::new(state.pool())
        .create_pending(&NewOrder {
            customer_email: email,
            currency,
            lines: snapshot.lines,
            totals,
            promotions: kept.iter().map(OrderPromotion::from).collect(),
        })
        .await?;

    clear_cart(&session).await?;

    info!(
        order_id = %order.id,
        promotions = order.promotions.len(),
        dropped = revalidation.dropped.len(),
        total = %order.total,
        "Pending order created"
    );

    Ok(CheckoutPendingTemplate {
        order_id: order.id.as_i32(),
        email: order.customer_email.to_string(),
        subtotal: format_amount(order.subtotal, currency),
        discount: format_amount(order.discount_total, currency),
        has_discount: !order.discount_total.is_zero(),
        shipping: format_amount(order.shipping, currency),
        total: format_amount(order.total, currency),
        promotions: order
            .promotions
            .iter()
            .map(|p| AppliedPromotionView {
                code: p.code.to_string(),
                name: p.name.clone(),
                kind: p.kind.label().to_string(),
                discount: format_amount(p.discount.total(), currency),
            })
            .collect(),
        notices: revalidation
            .dropped
            .iter()
            .map(|(code, rejection)| format!("{code} was removed: {}", rejection.user_message()))
            .collect(),
    })
}
