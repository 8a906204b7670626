//! Integration tests for Marigold.
//!
//! # Running Tests
//!
//! ```bash
//! # Migrate the database and start the storefront
//! cargo run -p marigold-cli -- migrate
//! cargo run -p marigold-storefront
//!
//! # Run integration tests
//! cargo test -p marigold-integration-tests -- --ignored
//! ```
//!
//! Tests create their own products and promotions with unique codes, so they
//! can run against a shared development database.
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - Same database the server uses (falls back to `DATABASE_URL`)
//! - `STOREFRONT_WEBHOOK_SECRET` - Same secret the server uses
//! - `STOREFRONT_BASE_URL` - Server URL (default: `http://localhost:3000`)

use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::PgPool;
use uuid::Uuid;

use marigold_core::promotion::{DiscountRule, Promotion, PromotionCode};
use marigold_core::{CategoryId, OrderId, ProductId};
use marigold_storefront::db::{NewPromotion, PromotionRepository};
use marigold_storefront::services::webhook::{SIGNATURE_HEADER, TIMESTAMP_HEADER, sign};

/// Shared state for an integration test.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
    pub pool: PgPool,
    pub webhook_secret: SecretString,
}

impl TestContext {
    /// Connect to the database and build a cookie-keeping HTTP client.
    ///
    /// # Panics
    ///
    /// Panics if the environment is incomplete or the database is unreachable.
    pub async fn new() -> Self {
        let database_url = std::env::var("STOREFRONT_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .expect("STOREFRONT_DATABASE_URL must be set");
        let webhook_secret = std::env::var("STOREFRONT_WEBHOOK_SECRET")
            .expect("STOREFRONT_WEBHOOK_SECRET must be set");

        Self {
            client: Self::new_client(),
            base_url: std::env::var("STOREFRONT_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            pool: PgPool::connect(&database_url)
                .await
                .expect("Failed to connect to database"),
            webhook_secret: SecretString::from(webhook_secret),
        }
    }

    /// A client with its own cookie jar, i.e. a separate shopper.
    ///
    /// # Panics
    ///
    /// Panics if the client cannot be built.
    #[must_use]
    pub fn new_client() -> Client {
        Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client")
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    /// Insert an active product in a fresh category.
    ///
    /// # Panics
    ///
    /// Panics if the insert fails.
    pub async fn create_product(&self, name: &str, price: Decimal) -> (ProductId, CategoryId) {
        let slug = unique("it");
        let category_id: CategoryId = sqlx::query_scalar(
            "INSERT INTO storefront.category (name, slug) VALUES ($1, $2) RETURNING id",
        )
        .bind(format!("{name} category"))
        .bind(&slug)
        .fetch_one(&self.pool)
        .await
        .expect("Failed to insert category");

        let product_id: ProductId = sqlx::query_scalar(
            r"
            INSERT INTO storefront.product (category_id, name, slug, price)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(category_id)
        .bind(name)
        .bind(&slug)
        .bind(price)
        .fetch_one(&self.pool)
        .await
        .expect("Failed to insert product");

        (product_id, category_id)
    }

    /// Insert a promotion.
    ///
    /// # Panics
    ///
    /// Panics if the insert fails.
    pub async fn create_promotion(&self, new: &NewPromotion) -> Promotion {
        PromotionRepository::new(&self.pool)
            .create(new)
            .await
            .expect("Failed to create promotion")
    }

    /// Current usage count of a promotion.
    ///
    /// # Panics
    ///
    /// Panics if the query fails.
    pub async fn usage_count(&self, code: &PromotionCode) -> i32 {
        sqlx::query_scalar("SELECT usage_count FROM storefront.promotion WHERE code = $1")
            .bind(code.as_str())
            .fetch_one(&self.pool)
            .await
            .expect("Failed to read usage count")
    }

    /// Post a signed order-completion webhook.
    ///
    /// # Panics
    ///
    /// Panics if signing or the request fails.
    pub async fn complete_order(&self, order_id: OrderId, reference: &str) -> reqwest::Response {
        let body = serde_json::json!({
            "payment_provider": "test",
            "payment_reference": reference,
        })
        .to_string();
        let timestamp = Utc::now().timestamp().to_string();
        let signature =
            sign(&self.webhook_secret, &timestamp, body.as_bytes()).expect("Failed to sign");

        self.client
            .post(self.url(&format!("/api/orders/{order_id}/complete")))
            .header("content-type", "application/json")
            .header(TIMESTAMP_HEADER, timestamp)
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .expect("Failed to send webhook")
    }
}

/// A promotion with no limits or restrictions for the given rule.
///
/// # Panics
///
/// Panics if `code` is not a valid promotion code.
#[must_use]
pub fn promotion(code: &str, rule: DiscountRule) -> NewPromotion {
    NewPromotion {
        code: PromotionCode::parse(code).expect("valid test code"),
        name: format!("Test {code}"),
        description: None,
        rule,
        min_order_amount: None,
        usage_limit: None,
        per_customer_limit: None,
        starts_at: None,
        ends_at: None,
        stackable: false,
        product_ids: Vec::new(),
        category_ids: Vec::new(),
    }
}

/// A code unique to this test run.
#[must_use]
pub fn unique(prefix: &str) -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(12).collect();
    format!("{prefix}-{suffix}").to_ascii_uppercase()
}

/// Pull the order ID out of the order-placed page.
#[must_use]
pub fn order_id_from_page(html: &str) -> Option<OrderId> {
    let start = html.find("Order #")? + "Order #".len();
    let digits: String = html
        .get(start..)?
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok().map(OrderId::new)
}
