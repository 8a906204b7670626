//! Promotion repository.
//!
//! Promotions are stored flat in `storefront.promotion`; the discount rule is
//! rebuilt from its columns with [`DiscountRule::from_parts`] on every read, so
//! a row that no longer forms a valid rule surfaces as
//! [`RepositoryError::DataCorruption`] instead of a wrong discount.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use marigold_core::promotion::{DiscountRule, EligibleItems, Promotion, PromotionCode};
use marigold_core::{
    CategoryId, CustomerEmail, OrderId, ProductId, PromotionId, PromotionKind, PromotionUsageId,
};

use super::{RepositoryError, to_i32, to_u32};

const PROMOTION_COLUMNS: &str = r"
    p.id, p.code, p.name, p.description, p.kind, p.value, p.max_discount,
    p.buy_quantity, p.get_quantity, p.min_order_amount, p.usage_limit,
    p.usage_count, p.per_customer_limit, p.starts_at, p.ends_at, p.is_active,
    p.stackable,
    ARRAY(SELECT pp.product_id FROM storefront.promotion_product pp
          WHERE pp.promotion_id = p.id ORDER BY pp.product_id) AS product_ids,
    ARRAY(SELECT pc.category_id FROM storefront.promotion_category pc
          WHERE pc.promotion_id = p.id ORDER BY pc.category_id) AS category_ids
";

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for promotion queries.
#[derive(Debug, sqlx::FromRow)]
struct PromotionRow {
    id: PromotionId,
    code: String,
    name: String,
    description: Option<String>,
    kind: PromotionKind,
    value: Option<Decimal>,
    max_discount: Option<Decimal>,
    buy_quantity: Option<i32>,
    get_quantity: Option<i32>,
    min_order_amount: Option<Decimal>,
    usage_limit: Option<i32>,
    usage_count: i32,
    per_customer_limit: Option<i32>,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    is_active: bool,
    stackable: bool,
    product_ids: Vec<ProductId>,
    category_ids: Vec<CategoryId>,
}

impl TryFrom<PromotionRow> for Promotion {
    type Error = RepositoryError;

    fn try_from(row: PromotionRow) -> Result<Self, Self::Error> {
        let code = PromotionCode::parse(&row.code).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid promotion code in database: {e}"))
        })?;
        let rule = DiscountRule::from_parts(
            row.kind,
            row.value,
            row.max_discount,
            row.buy_quantity,
            row.get_quantity,
        )
        .map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid rule for promotion {code}: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            code,
            name: row.name,
            description: row.description,
            rule,
            min_order_amount: row.min_order_amount,
            usage_limit: row
                .usage_limit
                .map(|v| to_u32(v, "usage_limit"))
                .transpose()?,
            usage_count: to_u32(row.usage_count, "usage_count")?,
            per_customer_limit: row
                .per_customer_limit
                .map(|v| to_u32(v, "per_customer_limit"))
                .transpose()?,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            is_active: row.is_active,
            stackable: row.stackable,
            eligible_items: EligibleItems::new(row.product_ids, row.category_ids),
        })
    }
}

/// A recorded redemption of a promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct PromotionUsage {
    pub id: PromotionUsageId,
    pub promotion_id: PromotionId,
    pub order_id: OrderId,
    pub customer_email: CustomerEmail,
    pub discount_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a promotion.
#[derive(Debug, Clone)]
pub struct NewPromotion {
    pub code: PromotionCode,
    pub name: String,
    pub description: Option<String>,
    pub rule: DiscountRule,
    pub min_order_amount: Option<Decimal>,
    pub usage_limit: Option<u32>,
    pub per_customer_limit: Option<u32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub stackable: bool,
    pub product_ids: Vec<ProductId>,
    pub category_ids: Vec<CategoryId>,
}

impl NewPromotion {
    /// The `(value, max_discount, buy_quantity, get_quantity)` columns for the rule.
    fn rule_columns(&self) -> (Option<Decimal>, Option<Decimal>, Option<i32>, Option<i32>) {
        match self.rule {
            DiscountRule::Percentage {
                percent,
                max_discount,
            } => (Some(percent), max_discount, None, None),
            DiscountRule::FixedAmount { amount } => (Some(amount), None, None, None),
            DiscountRule::FreeShipping => (None, None, None, None),
            DiscountRule::BuyXGetY { buy, get } => (
                None,
                None,
                i32::try_from(buy).ok(),
                i32::try_from(get).ok(),
            ),
        }
    }
}

/// Repository for promotion database operations.
pub struct PromotionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PromotionRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find a promotion by its normalized code, with its item restrictions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is not a valid promotion.
    #[instrument(skip(self, code), fields(code = %code))]
    pub async fn find_by_code(
        &self,
        code: &PromotionCode,
    ) -> Result<Option<Promotion>, RepositoryError> {
        let row = sqlx::query_as::<_, PromotionRow>(&format!(
            "SELECT {PROMOTION_COLUMNS} FROM storefront.promotion p WHERE p.code = $1"
        ))
        .bind(code.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(Promotion::try_from).transpose()
    }

    /// Count how many times a customer has redeemed a promotion.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self, email), fields(promotion_id = %id))]
    pub async fn count_customer_usage(
        &self,
        id: PromotionId,
        email: &CustomerEmail,
    ) -> Result<u32, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM storefront.promotion_usage
            WHERE promotion_id = $1 AND customer_email = $2
            ",
        )
        .bind(id)
        .bind(email)
        .fetch_one(self.pool)
        .await?;

        u32::try_from(count)
            .map_err(|_| RepositoryError::DataCorruption(format!("usage count out of range: {count}")))
    }

    /// List promotions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if any stored row is not a valid promotion.
    #[instrument(skip(self))]
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Promotion>, RepositoryError> {
        let rows = sqlx::query_as::<_, PromotionRow>(&format!(
            "SELECT {PROMOTION_COLUMNS} FROM storefront.promotion p
             WHERE p.is_active OR $1
             ORDER BY p.created_at DESC, p.id DESC"
        ))
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Promotion::try_from).collect()
    }

    /// Create a promotion together with its product and category restrictions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code already exists or a
    /// restriction references an unknown product or category.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, new), fields(code = %new.code))]
    pub async fn create(&self, new: &NewPromotion) -> Result<Promotion, RepositoryError> {
        let (value, max_discount, buy_quantity, get_quantity) = new.rule_columns();
        let usage_limit = new
            .usage_limit
            .map(|v| to_i32(v, "usage_limit"))
            .transpose()?;
        let per_customer_limit = new
            .per_customer_limit
            .map(|v| to_i32(v, "per_customer_limit"))
            .transpose()?;

        let mut tx = self.pool.begin().await?;

        let id: PromotionId = sqlx::query_scalar(
            r"
            INSERT INTO storefront.promotion
                (code, name, description, kind, value, max_discount, buy_quantity,
                 get_quantity, min_order_amount, usage_limit, per_customer_limit,
                 starts_at, ends_at, stackable)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id
            ",
        )
        .bind(new.code.as_str())
        .bind(&new.name)
        .bind(new.description.as_deref())
        .bind(new.rule.kind())
        .bind(value)
        .bind(max_discount)
        .bind(buy_quantity)
        .bind(get_quantity)
        .bind(new.min_order_amount)
        .bind(usage_limit)
        .bind(per_customer_limit)
        .bind(new.starts_at)
        .bind(new.ends_at)
        .bind(new.stackable)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict(format!("promotion code {} already exists", new.code));
            }
            RepositoryError::Database(e)
        })?;

        if !new.product_ids.is_empty() {
            sqlx::query(
                r"
                INSERT INTO storefront.promotion_product (promotion_id, product_id)
                SELECT $1, UNNEST($2::INTEGER[])
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(id)
            .bind(&new.product_ids)
            .execute(&mut *tx)
            .await
            .map_err(map_foreign_key("product"))?;
        }

        if !new.category_ids.is_empty() {
            sqlx::query(
                r"
                INSERT INTO storefront.promotion_category (promotion_id, category_id)
                SELECT $1, UNNEST($2::INTEGER[])
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(id)
            .bind(&new.category_ids)
            .execute(&mut *tx)
            .await
            .map_err(map_foreign_key("category"))?;
        }

        let row = sqlx::query_as::<_, PromotionRow>(&format!(
            "SELECT {PROMOTION_COLUMNS} FROM storefront.promotion p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        row.try_into()
    }

    /// Enable or disable a promotion.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no promotion has this code.
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self, code), fields(code = %code))]
    pub async fn set_active(
        &self,
        code: &PromotionCode,
        is_active: bool,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.promotion
            SET is_active = $2, updated_at = NOW()
            WHERE code = $1
            ",
        )
        .bind(code.as_str())
        .bind(is_active)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Recorded redemptions of a promotion, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self), fields(promotion_id = %id))]
    pub async fn usage_for(&self, id: PromotionId) -> Result<Vec<PromotionUsage>, RepositoryError> {
        let usage = sqlx::query_as::<_, PromotionUsage>(
            r"
            SELECT id, promotion_id, order_id, customer_email, discount_amount, created_at
            FROM storefront.promotion_usage
            WHERE promotion_id = $1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(usage)
    }
}

// =============================================================================
// Transaction-scoped operations (order completion)
// =============================================================================

/// Load a promotion by code and lock its row until the transaction ends.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
/// Returns `RepositoryError::DataCorruption` if the stored row is not a valid promotion.
pub async fn lock_by_code(
    conn: &mut PgConnection,
    code: &PromotionCode,
) -> Result<Option<Promotion>, RepositoryError> {
    let row = sqlx::query_as::<_, PromotionRow>(&format!(
        "SELECT {PROMOTION_COLUMNS} FROM storefront.promotion p WHERE p.code = $1 FOR UPDATE"
    ))
    .bind(code.as_str())
    .fetch_optional(conn)
    .await?;

    row.map(Promotion::try_from).transpose()
}

/// Record one redemption and bump the promotion's counter.
///
/// Returns `false` without touching the counter if this order already
/// redeemed the promotion.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if either statement fails.
pub async fn record_usage(
    conn: &mut PgConnection,
    promotion_id: PromotionId,
    order_id: OrderId,
    email: &CustomerEmail,
    discount_amount: Decimal,
) -> Result<bool, RepositoryError> {
    let inserted = sqlx::query(
        r"
        INSERT INTO storefront.promotion_usage
            (promotion_id, order_id, customer_email, discount_amount)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (promotion_id, order_id) DO NOTHING
        ",
    )
    .bind(promotion_id)
    .bind(order_id)
    .bind(email)
    .bind(discount_amount)
    .execute(&mut *conn)
    .await?
    .rows_affected()
        > 0;

    if inserted {
        sqlx::query(
            r"
            UPDATE storefront.promotion
            SET usage_count = usage_count + 1, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(promotion_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(inserted)
}

/// Map a foreign-key violation on a restriction insert to `Conflict`.
fn map_foreign_key(entity: &'static str) -> impl Fn(sqlx::Error) -> RepositoryError {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_foreign_key_violation()
        {
            return RepositoryError::Conflict(format!("unknown {entity} in restrictions"));
        }
        RepositoryError::Database(e)
    }
}
