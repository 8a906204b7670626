//! Marigold Storefront library.
//!
//! Catalog, session cart and the promotions engine's HTTP surface: coupon
//! entry on the cart page, a JSON validation endpoint and the signed
//! order-completion webhook that redeems promotions.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::state::AppState;

/// Build the storefront application with its middleware stack.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()` so the
/// rate limiters can fall back to the peer address.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.pool(), state.config());

    Router::new()
        .merge(routes::routes(state.config()))
        .layer(session_layer)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use secrecy::ExposeSecret;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use crate::config::StorefrontConfig;
    use crate::services::webhook::{SIGNATURE_HEADER, TIMESTAMP_HEADER};

    /// App backed by a pool that never connects; only routes that fail before
    /// touching the database can be exercised.
    fn test_app() -> Router {
        let config = StorefrontConfig::for_tests();
        let pool = PgPoolOptions::new()
            .connect_lazy(config.database_url.expose_secret())
            .unwrap();
        app(AppState::new(config, pool))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_home_redirects_to_products() {
        let response = test_app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get("location").unwrap(), "/products");
    }

    #[tokio::test]
    async fn test_validate_rejects_malformed_code() {
        let body = serde_json::json!({
            "code": "!",
            "cart": {
                "lines": [{"product_id": 1, "quantity": 1, "unit_price": "20.00"}],
                "shipping": "5.00",
                "currency": "USD"
            }
        });

        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/promotions/validate")
                    .header("content-type", "application/json")
                    .header("x-forwarded-for", "203.0.113.10")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["valid"], false);
        assert_eq!(json["reason"], "invalid_code");
    }

    #[tokio::test]
    async fn test_validate_rejects_invalid_email() {
        let body = serde_json::json!({
            "code": "SPRING10",
            "cart": {"lines": [], "currency": "USD"},
            "email": "not-an-email"
        });

        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/promotions/validate")
                    .header("content-type", "application/json")
                    .header("x-forwarded-for", "203.0.113.11")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["reason"], "invalid_email");
    }

    #[tokio::test]
    async fn test_validate_rejects_foreign_currency() {
        let body = serde_json::json!({
            "code": "SPRING10",
            "cart": {
                "lines": [{"product_id": 1, "quantity": 1, "unit_price": "20.00"}],
                "currency": "EUR"
            }
        });

        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/promotions/validate")
                    .header("content-type", "application/json")
                    .header("x-forwarded-for", "203.0.113.12")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["reason"], "invalid_cart");
    }

    #[tokio::test]
    async fn test_validate_rejects_oversized_price() {
        let body = serde_json::json!({
            "code": "SPRING10",
            "cart": {
                "lines": [{"product_id": 1, "quantity": 2, "unit_price": "79228162514264337593543950335"}],
                "currency": "USD"
            }
        });

        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/promotions/validate")
                    .header("content-type", "application/json")
                    .header("x-forwarded-for", "203.0.113.13")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["reason"], "invalid_cart");
    }

    #[tokio::test]
    async fn test_validate_rejects_excess_quantity() {
        let body = serde_json::json!({
            "code": "B2G1",
            "cart": {
                "lines": [{"product_id": 1, "quantity": 4_294_967_295_u32, "unit_price": "1.00"}],
                "currency": "USD"
            }
        });

        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/promotions/validate")
                    .header("content-type", "application/json")
                    .header("x-forwarded-for", "203.0.113.14")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["reason"], "invalid_cart");
    }

    #[tokio::test]
    async fn test_webhook_requires_signature() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/orders/1/complete")
                    .header("content-type", "application/json")
                    .header("x-forwarded-for", "203.0.113.13")
                    .body(Body::from(r#"{"payment_provider":"stripe","payment_reference":"pi_1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_webhook_rejects_bad_signature() {
        let timestamp = chrono::Utc::now().timestamp().to_string();

        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/orders/1/complete")
                    .header("content-type", "application/json")
                    .header("x-forwarded-for", "203.0.113.14")
                    .header(TIMESTAMP_HEADER, timestamp)
                    .header(SIGNATURE_HEADER, "v1=deadbeef")
                    .body(Body::from(r#"{"payment_provider":"stripe","payment_reference":"pi_1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
