//! Pricing the session cart.
//!
//! Turns the product IDs and quantities held in the session into a
//! [`CartSnapshot`] using current catalog prices.

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{instrument, warn};

use marigold_core::CurrencyCode;
use marigold_core::promotion::{CartLine, CartSnapshot};

use crate::config::StorefrontConfig;
use crate::db::{Product, ProductRepository, RepositoryError};
use crate::models::SessionCart;

/// Price a session cart against the catalog.
///
/// Products that are no longer for sale are left out of the snapshot.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the catalog lookup fails.
#[instrument(skip_all, fields(items = cart.items().len()))]
pub async fn price_cart(
    pool: &PgPool,
    cart: &SessionCart,
    config: &StorefrontConfig,
) -> Result<CartSnapshot, RepositoryError> {
    let products = ProductRepository::new(pool)
        .get_many(&cart.product_ids())
        .await?;

    if products.len() < cart.items().len() {
        warn!(
            requested = cart.items().len(),
            found = products.len(),
            "Cart contains products that are no longer available"
        );
    }

    Ok(build_snapshot(
        cart,
        &products,
        config.currency,
        config.flat_shipping,
    ))
}

/// Build a snapshot from already loaded products.
///
/// Shipping is the flat rate for a non-empty cart and zero otherwise.
#[must_use]
pub fn build_snapshot(
    cart: &SessionCart,
    products: &[Product],
    currency: CurrencyCode,
    flat_shipping: Decimal,
) -> CartSnapshot {
    let lines: Vec<CartLine> = cart
        .items()
        .iter()
        .filter_map(|item| {
            products
                .iter()
                .find(|p| p.id == item.product_id)
                .map(|product| CartLine {
                    product_id: product.id,
                    category_id: product.category_id,
                    name: product.name.clone(),
                    quantity: item.quantity,
                    unit_price: product.price,
                })
        })
        .collect();

    let shipping = if lines.is_empty() {
        Decimal::ZERO
    } else {
        flat_shipping
    };

    CartSnapshot::new(lines, shipping, currency)
}

#[cfg(test)]
mod tests {
    use super::*;
    use marigold_core::{CategoryId, ProductId};

    fn product(id: i32, cents: i64) -> Product {
        Product {
            id: ProductId::new(id),
            category_id: Some(CategoryId::new(1)),
            name: format!("Product {id}"),
            slug: format!("product-{id}"),
            description: None,
            price: Decimal::new(cents, 2),
            category_name: Some("Candles".to_string()),
        }
    }

    #[test]
    fn test_build_snapshot_uses_catalog_prices() {
        let mut cart = SessionCart::default();
        cart.add(ProductId::new(1), 2);
        cart.add(ProductId::new(2), 1);

        let snapshot = build_snapshot(
            &cart,
            &[product(1, 1250), product(2, 800)],
            CurrencyCode::USD,
            Decimal::new(500, 2),
        );

        assert_eq!(snapshot.lines.len(), 2);
        assert_eq!(snapshot.subtotal(), Decimal::new(3300, 2));
        assert_eq!(snapshot.shipping, Decimal::new(500, 2));
        assert_eq!(snapshot.lines[0].category_id, Some(CategoryId::new(1)));
    }

    #[test]
    fn test_build_snapshot_skips_unavailable_products() {
        let mut cart = SessionCart::default();
        cart.add(ProductId::new(1), 1);
        cart.add(ProductId::new(9), 1);

        let snapshot = build_snapshot(
            &cart,
            &[product(1, 1000)],
            CurrencyCode::USD,
            Decimal::new(500, 2),
        );

        assert_eq!(snapshot.lines.len(), 1);
        assert_eq!(snapshot.lines[0].product_id, ProductId::new(1));
    }

    #[test]
    fn test_empty_cart_has_no_shipping() {
        let snapshot = build_snapshot(
            &SessionCart::default(),
            &[],
            CurrencyCode::USD,
            Decimal::new(500, 2),
        );
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.shipping, Decimal::ZERO);
    }
}
