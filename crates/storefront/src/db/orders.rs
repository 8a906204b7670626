//! Order repository.
//!
//! Orders are created `pending` at checkout with a snapshot of the cart and
//! its applied promotions. The order-completion webhook later locks the row,
//! records promotion usage and stamps it `paid` in the same transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use marigold_core::promotion::{AppliedPromotion, CartLine, CartTotals, Discount, PromotionCode};
use marigold_core::{
    CurrencyCode, CustomerEmail, OrderId, OrderStatus, PromotionId, PromotionKind,
};

use super::RepositoryError;

const ORDER_COLUMNS: &str = r"
    id, customer_email, status, currency, lines, subtotal, discount_total,
    shipping, total, applied_promotions, payment_provider, payment_reference,
    paid_at, created_at
";

/// A promotion as recorded on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPromotion {
    pub code: PromotionCode,
    pub name: String,
    pub kind: PromotionKind,
    pub discount: Discount,
    /// Set when the order is paid and the promotion row was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion_id: Option<PromotionId>,
    /// Whether a usage record was written for this order.
    #[serde(default)]
    pub redeemed: bool,
    /// Whether the promotion was already at its usage limit when redeemed.
    #[serde(default)]
    pub over_limit: bool,
}

impl From<&AppliedPromotion> for OrderPromotion {
    fn from(applied: &AppliedPromotion) -> Self {
        Self {
            code: applied.code.clone(),
            name: applied.name.clone(),
            kind: applied.kind,
            discount: applied.discount,
            promotion_id: None,
            redeemed: false,
            over_limit: false,
        }
    }
}

/// A storefront order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_email: CustomerEmail,
    pub status: OrderStatus,
    pub currency: CurrencyCode,
    pub lines: Vec<CartLine>,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub promotions: Vec<OrderPromotion>,
    pub payment_provider: Option<String>,
    pub payment_reference: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Internal row type for order queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    customer_email: CustomerEmail,
    status: OrderStatus,
    currency: String,
    lines: Json<Vec<CartLine>>,
    subtotal: Decimal,
    discount_total: Decimal,
    shipping: Decimal,
    total: Decimal,
    applied_promotions: Json<Vec<OrderPromotion>>,
    payment_provider: Option<String>,
    payment_reference: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let currency = row.currency.parse::<CurrencyCode>().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid currency on order {}: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            customer_email: row.customer_email,
            status: row.status,
            currency,
            lines: row.lines.0,
            subtotal: row.subtotal,
            discount_total: row.discount_total,
            shipping: row.shipping,
            total: row.total,
            promotions: row.applied_promotions.0,
            payment_provider: row.payment_provider,
            payment_reference: row.payment_reference,
            paid_at: row.paid_at,
            created_at: row.created_at,
        })
    }
}

/// Input for creating a pending order at checkout.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_email: CustomerEmail,
    pub currency: CurrencyCode,
    pub lines: Vec<CartLine>,
    pub totals: CartTotals,
    pub promotions: Vec<OrderPromotion>,
}

/// Payment details delivered with the order-completion webhook.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentDetails {
    pub payment_provider: String,
    pub payment_reference: String,
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a pending order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    #[instrument(skip(self, new), fields(lines = new.lines.len()))]
    pub async fn create_pending(&self, new: &NewOrder) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO storefront.\"order\"
                (customer_email, currency, lines, subtotal, discount_total, shipping,
                 total, applied_promotions)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(&new.customer_email)
        .bind(new.currency.code())
        .bind(Json(&new.lines))
        .bind(new.totals.subtotal)
        .bind(new.totals.discount())
        .bind(new.totals.shipping)
        .bind(new.totals.total)
        .bind(Json(&new.promotions))
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.\"order\" WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }
}

/// Load an order and lock its row until the transaction ends.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_for_update(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM storefront.\"order\" WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    row.map(Order::try_from).transpose()
}

/// Stamp an order as paid with its payment details and redeemed promotions.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order vanished.
/// Returns `RepositoryError::Database` if the update fails.
pub async fn mark_paid(
    conn: &mut PgConnection,
    id: OrderId,
    payment: &PaymentDetails,
    promotions: &[OrderPromotion],
    paid_at: DateTime<Utc>,
) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "UPDATE storefront.\"order\"
         SET status = 'paid', paid_at = $2, payment_provider = $3,
             payment_reference = $4, applied_promotions = $5, updated_at = NOW()
         WHERE id = $1
         RETURNING {ORDER_COLUMNS}"
    ))
    .bind(id)
    .bind(paid_at)
    .bind(&payment.payment_provider)
    .bind(&payment.payment_reference)
    .bind(Json(promotions))
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    row.try_into()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_promotion_from_applied() {
        let applied = AppliedPromotion {
            code: PromotionCode::parse("SHIPFREE").unwrap(),
            name: "Free shipping".to_string(),
            kind: PromotionKind::FreeShipping,
            stackable: true,
            discount: Discount {
                merchandise: Decimal::ZERO,
                shipping: Decimal::new(500, 2),
            },
        };
        let recorded = OrderPromotion::from(&applied);
        assert_eq!(recorded.code, applied.code);
        assert!(!recorded.redeemed);
        assert!(recorded.promotion_id.is_none());
    }

    #[test]
    fn test_order_promotion_reads_checkout_snapshot() {
        // Snapshots written at checkout carry no redemption fields.
        let json = r#"{"code":"SAVE10","name":"Save 10","kind":"fixed_amount",
                       "discount":{"merchandise":"10.00","shipping":"0"}}"#;
        let recorded: OrderPromotion = serde_json::from_str(json).unwrap();
        assert_eq!(recorded.discount.merchandise, Decimal::new(1000, 2));
        assert!(!recorded.over_limit);
    }
}
