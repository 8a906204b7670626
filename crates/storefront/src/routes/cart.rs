//! Cart route handlers.
//!
//! The cart lives in the session. Every time it is shown, prices are taken
//! from the catalog and applied promotions are re-evaluated; promotions that
//! no longer apply are dropped with a notice. Coupon entry uses HTMX and
//! swaps in the cart summary fragment.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument};

use marigold_core::promotion::{AppliedPromotions, CartSnapshot, PromotionCode};
use marigold_core::{CurrencyCode, Money, ProductId};

use crate::db::ProductRepository;
use crate::error::{AppError, Result, promotion_status};
use crate::models::SessionCart;
use crate::models::session::keys;
use crate::services::PromotionService;
use crate::services::cart::price_cart;
use crate::state::AppState;

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartLineView {
    pub product_id: i32,
    pub name: String,
    pub quantity: u32,
    pub unit_price: String,
    pub line_total: String,
}

/// Applied promotion display data for templates.
#[derive(Clone)]
pub struct AppliedPromotionView {
    pub code: String,
    pub name: String,
    pub kind: String,
    pub discount: String,
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub promotions: Vec<AppliedPromotionView>,
    pub item_count: u32,
    pub subtotal: String,
    pub discount: String,
    pub has_discount: bool,
    pub shipping: String,
    pub total: String,
}

impl CartView {
    /// Build the view of a priced cart and its applied promotions.
    #[must_use]
    pub fn new(snapshot: &CartSnapshot, applied: &AppliedPromotions) -> Self {
        let currency = snapshot.currency;
        let totals = applied.totals(snapshot);

        Self {
            items: snapshot
                .lines
                .iter()
                .map(|line| CartLineView {
                    product_id: line.product_id.as_i32(),
                    name: line.name.clone(),
                    quantity: line.quantity,
                    unit_price: format_amount(line.unit_price, currency),
                    line_total: format_amount(line.line_total(), currency),
                })
                .collect(),
            promotions: applied
                .iter()
                .map(|entry| AppliedPromotionView {
                    code: entry.code.to_string(),
                    name: entry.name.clone(),
                    kind: entry.kind.label().to_string(),
                    discount: format_amount(entry.discount.total(), currency),
                })
                .collect(),
            item_count: snapshot.item_count(),
            subtotal: format_amount(totals.subtotal, currency),
            discount: format_amount(totals.discount(), currency),
            has_discount: !totals.discount().is_zero(),
            shipping: format_amount(totals.shipping, currency),
            total: format_amount(totals.total, currency),
        }
    }
}

/// Format an amount in the store currency (e.g., "$19.99").
pub(crate) fn format_amount(amount: rust_decimal::Decimal, currency: CurrencyCode) -> String {
    Money::new(amount, currency).display()
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Load the cart from the session.
pub(crate) async fn load_cart(session: &Session) -> Result<SessionCart> {
    Ok(session
        .get::<SessionCart>(keys::CART)
        .await?
        .unwrap_or_default())
}

async fn save_cart(session: &Session, cart: &SessionCart) -> Result<()> {
    Ok(session.insert(keys::CART, cart).await?)
}

/// Load the promotions applied to the session cart.
pub(crate) async fn load_applied(session: &Session) -> Result<AppliedPromotions> {
    Ok(session
        .get::<AppliedPromotions>(keys::APPLIED_PROMOTIONS)
        .await?
        .unwrap_or_default())
}

async fn save_applied(session: &Session, applied: &AppliedPromotions) -> Result<()> {
    Ok(session.insert(keys::APPLIED_PROMOTIONS, applied).await?)
}

/// Clear the cart and its promotions after an order is placed.
pub(crate) async fn clear_cart(session: &Session) -> Result<()> {
    session.remove::<SessionCart>(keys::CART).await?;
    session
        .remove::<AppliedPromotions>(keys::APPLIED_PROMOTIONS)
        .await?;
    Ok(())
}

/// The session cart priced and with its promotions re-evaluated.
struct CurrentCart {
    snapshot: CartSnapshot,
    applied: AppliedPromotions,
    notices: Vec<String>,
}

/// Price the session cart and drop promotions that no longer apply.
///
/// Products that left the catalog are removed from the session cart.
async fn current_cart(state: &AppState, session: &Session) -> Result<CurrentCart> {
    let mut cart = load_cart(session).await?;
    let snapshot = price_cart(state.pool(), &cart, state.config()).await?;

    if snapshot.lines.len() < cart.items().len() {
        let available: Vec<ProductId> = snapshot.lines.iter().map(|l| l.product_id).collect();
        cart.retain_products(&available);
        save_cart(session, &cart).await?;
    }

    let applied = load_applied(session).await?;
    if applied.is_empty() {
        return Ok(CurrentCart {
            snapshot,
            applied,
            notices: Vec::new(),
        });
    }

    let revalidation = PromotionService::new(state.pool())
        .revalidate_applied(&applied, &snapshot, None, Utc::now())
        .await?;

    if revalidation.kept != applied {
        save_applied(session, &revalidation.kept).await?;
    }

    let notices = revalidation
        .dropped
        .iter()
        .map(|(code, rejection)| format!("{code} was removed: {}", rejection.user_message()))
        .collect();

    Ok(CurrentCart {
        snapshot,
        applied: revalidation.kept,
        notices,
    })
}

// =============================================================================
// Forms and Templates
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: i32,
    pub quantity: Option<u32>,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: i32,
}

/// Coupon form data.
#[derive(Debug, Deserialize)]
pub struct PromotionForm {
    pub code: String,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub cart: CartView,
    pub notices: Vec<String>,
    pub error: Option<String>,
}

/// Cart summary fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_summary.html")]
pub struct CartSummaryTemplate {
    pub cart: CartView,
    pub notices: Vec<String>,
    pub error: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display cart page.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<CartShowTemplate> {
    let current = current_cart(&state, &session).await?;

    Ok(CartShowTemplate {
        cart: CartView::new(&current.snapshot, &current.applied),
        notices: current.notices,
        error: None,
    })
}

/// Add a product to the cart.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AddToCartForm>,
) -> Result<Redirect> {
    let product_id = ProductId::new(form.product_id);
    let found = ProductRepository::new(state.pool())
        .get_many(&[product_id])
        .await?;
    if found.is_empty() {
        return Err(AppError::NotFound(format!("product {product_id}")));
    }

    let mut cart = load_cart(&session).await?;
    cart.add(product_id, form.quantity.unwrap_or(1));
    save_cart(&session, &cart).await?;

    Ok(Redirect::to("/cart"))
}

/// Remove a product from the cart.
#[instrument(skip(session))]
pub async fn remove(session: Session, Form(form): Form<RemoveFromCartForm>) -> Result<Redirect> {
    let mut cart = load_cart(&session).await?;
    if cart.remove(ProductId::new(form.product_id)) {
        save_cart(&session, &cart).await?;
    }

    Ok(Redirect::to("/cart"))
}

/// Apply a coupon code to the cart (HTMX).
///
/// Rejections are shown in the fragment rather than as an error status so
/// HTMX swaps them in.
#[instrument(skip(state, session, form), fields(code = %form.code))]
pub async fn apply_promotion(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<PromotionForm>,
) -> Result<Response> {
    let CurrentCart {
        snapshot,
        mut applied,
        notices,
    } = current_cart(&state, &session).await?;

    let outcome = PromotionService::new(state.pool())
        .validate(&form.code, &snapshot, None, Utc::now())
        .await;

    let error = match outcome {
        Ok(evaluation) => {
            let code = evaluation.code.clone();
            match applied.apply(evaluation.into()) {
                Ok(()) => {
                    save_applied(&session, &applied).await?;
                    info!(code = %code, "Promotion applied to cart");
                    None
                }
                Err(rejection) => Some(rejection.user_message()),
            }
        }
        Err(err) if promotion_status(&err).is_server_error() => return Err(err.into()),
        Err(err) => Some(err.user_message()),
    };

    Ok((
        AppendHeaders([("HX-Trigger", "cart-updated")]),
        CartSummaryTemplate {
            cart: CartView::new(&snapshot, &applied),
            notices,
            error,
        },
    )
        .into_response())
}

/// Remove an applied coupon code (HTMX).
#[instrument(skip(state, session, form), fields(code = %form.code))]
pub async fn remove_promotion(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<PromotionForm>,
) -> Result<Response> {
    let CurrentCart {
        snapshot,
        mut applied,
        notices,
    } = current_cart(&state, &session).await?;

    if let Ok(code) = PromotionCode::parse(&form.code)
        && applied.remove(&code)
    {
        save_applied(&session, &applied).await?;
        info!(code = %code, "Promotion removed from cart");
    }

    Ok((
        AppendHeaders([("HX-Trigger", "cart-updated")]),
        CartSummaryTemplate {
            cart: CartView::new(&snapshot, &applied),
            notices,
            error: None,
        },
    )
        .into_response())
}
