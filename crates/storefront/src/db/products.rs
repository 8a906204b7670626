//! Catalog lookups.

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use marigold_core::{CategoryId, ProductId};

use super::RepositoryError;

/// A product as sold on the storefront.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub category_name: Option<String>,
}

/// Repository for catalog queries.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List active products, grouped by category name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_active(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(
            r"
            SELECT p.id, p.category_id, p.name, p.slug, p.description, p.price,
                   c.name AS category_name
            FROM storefront.product p
            LEFT JOIN storefront.category c ON c.id = p.category_id
            WHERE p.is_active
            ORDER BY c.name NULLS LAST, p.name
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// Load active products by ID. Unknown or inactive IDs are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self), fields(count = ids.len()))]
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let products = sqlx::query_as::<_, Product>(
            r"
            SELECT p.id, p.category_id, p.name, p.slug, p.description, p.price,
                   c.name AS category_name
            FROM storefront.product p
            LEFT JOIN storefront.category c ON c.id = p.category_id
            WHERE p.is_active AND p.id = ANY($1)
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }
}
