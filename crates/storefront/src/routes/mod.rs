//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                    - Liveness check
//! GET  /health/ready              - Readiness check (database ping)
//! GET  /                          - Redirect to /products
//!
//! # Products
//! GET  /products                  - Product listing
//!
//! # Cart
//! GET  /cart                      - Cart page with coupon form
//! POST /cart/add                  - Add product (redirects to /cart)
//! POST /cart/remove               - Remove product (redirects to /cart)
//! POST /cart/promotions           - Apply coupon (returns cart_summary fragment)
//! POST /cart/promotions/remove    - Remove coupon (returns cart_summary fragment)
//!
//! # Checkout
//! POST /checkout                  - Create pending order
//!
//! # JSON API
//! POST /api/promotions/validate   - Validate a coupon against a cart
//! POST /api/orders/{id}/complete  - Signed order-completion webhook
//! ```

pub mod api;
pub mod cart;
pub mod checkout;
pub mod products;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
};

use crate::config::StorefrontConfig;
use crate::middleware::{api_rate_limiter, promotion_rate_limiter};
use crate::state::AppState;

/// Create the cart routes router.
///
/// Coupon entry gets the strict rate limiter.
pub fn cart_routes(config: &StorefrontConfig) -> Router<AppState> {
    let promotions = Router::new()
        .route("/", post(cart::apply_promotion))
        .route("/remove", post(cart::remove_promotion))
        .layer(promotion_rate_limiter(config.trust_proxy));

    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/remove", post(cart::remove))
        .nest("/promotions", promotions)
}

/// Create the JSON API routes router.
pub fn api_routes(config: &StorefrontConfig) -> Router<AppState> {
    let validation = Router::new()
        .route("/promotions/validate", post(api::promotions::validate))
        .layer(promotion_rate_limiter(config.trust_proxy));

    Router::new()
        .route("/orders/{id}/complete", post(api::orders::complete))
        .merge(validation)
        .layer(api_rate_limiter(config.trust_proxy))
}

/// Create all routes for the storefront.
pub fn routes(config: &StorefrontConfig) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/", get(home))
        .route("/products", get(products::index))
        .nest("/cart", cart_routes(config))
        .route("/checkout", post(checkout::checkout))
        .nest("/api", api_routes(config))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK.
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn home() -> Redirect {
    Redirect::to("/products")
}
