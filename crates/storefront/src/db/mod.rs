//! Database operations for storefront `PostgreSQL`.
//!
//! # Schema: `storefront`
//!
//! ## Tables
//!
//! - `category`, `product` - Catalog
//! - `promotion` - Coupon codes and their discount rules
//! - `promotion_product`, `promotion_category` - Item restrictions
//! - `promotion_usage` - One row per (promotion, order) redemption
//! - `order` - Checkout snapshots, stamped with applied promotions when paid
//! - `tower_sessions.session` - Tower-sessions storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p marigold-cli -- migrate
//! ```

pub mod orders;
pub mod products;
pub mod promotions;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use orders::{NewOrder, Order, OrderPromotion, OrderRepository, PaymentDetails};
pub use products::{Product, ProductRepository};
pub use promotions::{NewPromotion, PromotionRepository, PromotionUsage};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate promotion code).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Convert a non-negative database integer to `u32`.
pub(crate) fn to_u32(value: i32, column: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative {column}: {value}")))
}

/// Convert a count to the `INTEGER` column type.
pub(crate) fn to_i32(value: u32, column: &str) -> Result<i32, RepositoryError> {
    i32::try_from(value)
        .map_err(|_| RepositoryError::Conflict(format!("{column} out of range: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_u32_rejects_negative() {
        assert!(matches!(to_u32(5, "usage_count"), Ok(5)));
        assert!(matches!(
            to_u32(-1, "usage_count"),
            Err(RepositoryError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_to_i32_rejects_overflow() {
        assert!(matches!(to_i32(10, "usage_limit"), Ok(10)));
        assert!(matches!(
            to_i32(u32::MAX, "usage_limit"),
            Err(RepositoryError::Conflict(_))
        ));
    }
}
