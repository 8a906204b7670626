//! Promotion management commands.
//!
//! # Usage
//!
//! ```bash
//! # 15% off candles, at most $20, first 500 orders
//! mg-cli promo create SPRING15 -n "Spring sale" -k percentage -v 15 \
//!     --max-discount 20 --usage-limit 500 --category 3
//!
//! # Buy two, get one free, once per customer
//! mg-cli promo create B2G1 -n "Buy two get one" -k buy_x_get_y --buy 2 --get 1 \
//!     --per-customer-limit 1
//!
//! mg-cli promo list --all
//! mg-cli promo deactivate SPRING15
//! mg-cli promo usage SPRING15
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

use chrono::{DateTime, Utc};
use clap::Args;
use rust_decimal::Decimal;
use thiserror::Error;

use marigold_core::promotion::{DiscountRule, InvalidRule, Promotion, PromotionCode, PromotionCodeError};
use marigold_core::{CategoryId, ProductId, PromotionKind};
use marigold_storefront::db::{self, NewPromotion, PromotionRepository, RepositoryError};

/// Errors that can occur during promotion management.
#[derive(Debug, Error)]
pub enum PromoError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Repository(#[from] RepositoryError),

    #[error("Invalid code: {0}")]
    InvalidCode(#[from] PromotionCodeError),

    #[error("Invalid rule: {0}")]
    InvalidRule(#[from] InvalidRule),

    #[error("Invalid promotion: {0}")]
    Invalid(String),

    #[error("No promotion with code {0}")]
    NotFound(PromotionCode),
}

/// Arguments for `promo create`.
#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Code customers enter (3-32 letters, digits, `-` or `_`)
    pub code: String,

    /// Display name
    #[arg(short, long)]
    pub name: String,

    /// Longer description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Discount kind (`percentage`, `fixed_amount`, `free_shipping`, `buy_x_get_y`)
    #[arg(short, long)]
    pub kind: PromotionKind,

    /// Percent off or amount off
    #[arg(short, long)]
    pub value: Option<Decimal>,

    /// Cap for percentage discounts
    #[arg(long)]
    pub max_discount: Option<Decimal>,

    /// Units to buy for `buy_x_get_y`
    #[arg(long)]
    pub buy: Option<i32>,

    /// Units free for `buy_x_get_y`
    #[arg(long)]
    pub get: Option<i32>,

    /// Minimum cart subtotal
    #[arg(long)]
    pub min_order: Option<Decimal>,

    /// Total redemptions allowed
    #[arg(long)]
    pub usage_limit: Option<u32>,

    /// Redemptions allowed per customer email
    #[arg(long)]
    pub per_customer_limit: Option<u32>,

    /// Start time (RFC 3339)
    #[arg(long)]
    pub starts_at: Option<DateTime<Utc>>,

    /// End time (RFC 3339)
    #[arg(long)]
    pub ends_at: Option<DateTime<Utc>>,

    /// Allow combining with other codes
    #[arg(long)]
    pub stackable: bool,

    /// Restrict to a product (repeatable)
    #[arg(long = "product")]
    pub products: Vec<i32>,

    /// Restrict to a category (repeatable)
    #[arg(long = "category")]
    pub categories: Vec<i32>,
}

impl CreateArgs {
    /// Validate the arguments into a promotion ready to insert.
    ///
    /// # Errors
    ///
    /// Returns `PromoError` if the code, rule, limits or dates are invalid.
    pub fn into_new_promotion(self) -> Result<NewPromotion, PromoError> {
        let code = PromotionCode::parse(&self.code)?;
        let rule = DiscountRule::from_parts(
            self.kind,
            self.value,
            self.max_discount,
            self.buy,
            self.get,
        )?;

        if let (Some(starts), Some(ends)) = (self.starts_at, self.ends_at)
            && starts >= ends
        {
            return Err(PromoError::Invalid(
                "starts_at must be before ends_at".to_string(),
            ));
        }
        if self.usage_limit == Some(0) || self.per_customer_limit == Some(0) {
            return Err(PromoError::Invalid(
                "limits must be at least 1".to_string(),
            ));
        }
        if let Some(min) = self.min_order
            && min.is_sign_negative()
        {
            return Err(PromoError::Invalid(
                "min_order cannot be negative".to_string(),
            ));
        }

        Ok(NewPromotion {
            code,
            name: self.name,
            description: self.description,
            rule,
            min_order_amount: self.min_order,
            usage_limit: self.usage_limit,
            per_customer_limit: self.per_customer_limit,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            stackable: self.stackable,
            product_ids: self.products.into_iter().map(ProductId::new).collect(),
            category_ids: self.categories.into_iter().map(CategoryId::new).collect(),
        })
    }
}

async fn connect() -> Result<sqlx::PgPool, PromoError> {
    let database_url = super::database_url().map_err(PromoError::MissingEnvVar)?;
    tracing::info!("Connecting to storefront database...");
    Ok(db::create_pool(&database_url).await?)
}

/// Create a promotion.
///
/// # Errors
///
/// Returns `PromoError` if the arguments are invalid, the code already
/// exists, or a restricted product/category does not exist.
pub async fn create(args: CreateArgs) -> Result<Promotion, PromoError> {
    let new = args.into_new_promotion()?;
    let pool = connect().await?;

    let promotion = PromotionRepository::new(&pool).create(&new).await?;

    tracing::info!(
        "Promotion created! ID: {}, Code: {}, Rule: {}",
        promotion.id,
        promotion.code,
        promotion.rule.describe()
    );
    Ok(promotion)
}

/// List promotions.
///
/// # Errors
///
/// Returns `PromoError` if the database cannot be queried.
pub async fn list(include_inactive: bool) -> Result<(), PromoError> {
    let pool = connect().await?;
    let promotions = PromotionRepository::new(&pool).list(include_inactive).await?;

    #[allow(clippy::print_stdout)]
    {
        if promotions.is_empty() {
            println!("No promotions found");
        }
        for p in &promotions {
            let uses = p.usage_limit.map_or_else(
                || format!("{}", p.usage_count),
                |limit| format!("{}/{limit}", p.usage_count),
            );
            println!(
                "{:<16} {:<28} {:<24} uses {:<10} {}{}",
                p.code,
                p.name,
                p.rule.describe(),
                uses,
                if p.is_active { "active" } else { "inactive" },
                if p.stackable { ", stackable" } else { "" },
            );
        }
    }
    Ok(())
}

/// Activate or deactivate a promotion.
///
/// # Errors
///
/// Returns `PromoError::NotFound` if no promotion has the code.
pub async fn set_active(code: &str, is_active: bool) -> Result<(), PromoError> {
    let code = PromotionCode::parse(code)?;
    let pool = connect().await?;

    match PromotionRepository::new(&pool).set_active(&code, is_active).await {
        Ok(()) => {
            tracing::info!(
                "Promotion {} {}",
                code,
                if is_active { "activated" } else { "deactivated" }
            );
            Ok(())
        }
        Err(RepositoryError::NotFound) => Err(PromoError::NotFound(code)),
        Err(e) => Err(e.into()),
    }
}

/// Show recorded redemptions of a promotion.
///
/// # Errors
///
/// Returns `PromoError::NotFound` if no promotion has the code.
pub async fn usage(code: &str) -> Result<(), PromoError> {
    let code = PromotionCode::parse(code)?;
    let pool = connect().await?;
    let repo = PromotionRepository::new(&pool);

    let promotion = repo
        .find_by_code(&code)
        .await?
        .ok_or_else(|| PromoError::NotFound(code.clone()))?;
    let usage = repo.usage_for(promotion.id).await?;

    #[allow(clippy::print_stdout)]
    {
        println!(
            "{} ({}): {} redemption(s)",
            promotion.code,
            promotion.name,
            promotion.usage_count
        );
        for u in &usage {
            println!(
                "  {}  order {:<8} {:<32} -{}",
                u.created_at.format("%Y-%m-%d %H:%M"),
                u.order_id,
                u.customer_email,
                u.discount_amount
            );
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn args(kind: PromotionKind) -> CreateArgs {
        CreateArgs {
            code: "spring15".to_string(),
            name: "Spring sale".to_string(),
            description: None,
            kind,
            value: None,
            max_discount: None,
            buy: None,
            get: None,
            min_order: None,
            usage_limit: None,
            per_customer_limit: None,
            starts_at: None,
            ends_at: None,
            stackable: false,
            products: vec![],
            categories: vec![],
        }
    }

    #[test]
    fn test_percentage_promotion() {
        let mut a = args(PromotionKind::Percentage);
        a.value = Some(Decimal::from(15));
        a.categories = vec![3];

        let new = a.into_new_promotion().unwrap();
        assert_eq!(new.code.as_str(), "SPRING15");
        assert_eq!(new.category_ids, vec![CategoryId::new(3)]);
        assert!(matches!(new.rule, DiscountRule::Percentage { .. }));
    }

    #[test]
    fn test_missing_value_is_rejected() {
        let err = args(PromotionKind::FixedAmount).into_new_promotion().unwrap_err();
        assert!(matches!(err, PromoError::InvalidRule(_)));
    }

    #[test]
    fn test_buy_x_get_y_requires_quantities() {
        let mut a = args(PromotionKind::BuyXGetY);
        a.buy = Some(2);
        assert!(a.into_new_promotion().is_err());

        let mut a = args(PromotionKind::BuyXGetY);
        a.buy = Some(2);
        a.get = Some(1);
        assert!(a.into_new_promotion().is_ok());
    }

    #[test]
    fn test_dates_must_be_ordered() {
        let mut a = args(PromotionKind::FreeShipping);
        a.starts_at = Some("2026-11-01T00:00:00Z".parse().unwrap());
        a.ends_at = Some("2026-10-01T00:00:00Z".parse().unwrap());
        assert!(matches!(
            a.into_new_promotion().unwrap_err(),
            PromoError::Invalid(_)
        ));
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        let mut a = args(PromotionKind::FreeShipping);
        a.usage_limit = Some(0);
        assert!(a.into_new_promotion().is_err());
    }
}
