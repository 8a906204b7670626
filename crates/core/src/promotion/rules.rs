//! Eligibility checks and discount computation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CartSnapshot, DiscountRule, Promotion, PromotionCode, PromotionRejection};
use crate::{PromotionKind, round_to_cents};

/// Facts about the request that are not part of the promotion or the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationContext {
    pub now: DateTime<Utc>,
    /// Prior redemptions by this customer, or `None` for an anonymous cart.
    pub customer_usage: Option<u32>,
}

impl EvaluationContext {
    #[must_use]
    pub const fn anonymous(now: DateTime<Utc>) -> Self {
        Self {
            now,
            customer_usage: None,
        }
    }

    #[must_use]
    pub const fn for_customer(now: DateTime<Utc>, customer_usage: u32) -> Self {
        Self {
            now,
            customer_usage: Some(customer_usage),
        }
    }
}

/// Money taken off an order by one promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Discount {
    /// Taken off the merchandise subtotal.
    pub merchandise: Decimal,
    /// Taken off shipping.
    pub shipping: Decimal,
}

impl Discount {
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.merchandise + self.shipping
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.merchandise.is_zero() && self.shipping.is_zero()
    }
}

/// A promotion that applies to a cart, with what it is worth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub code: PromotionCode,
    pub name: String,
    pub kind: PromotionKind,
    pub stackable: bool,
    pub summary: String,
    pub discount: Discount,
    pub eligible_subtotal: Decimal,
}

/// Check whether a promotion may be applied to a cart.
///
/// Checks run in a fixed order and the first failure is returned: active
/// flag, start date, end date, usage limit, empty cart, minimum order,
/// per-customer limit, eligible items.
///
/// # Errors
///
/// Returns the [`PromotionRejection`] for the first failing check.
pub fn check_eligibility(
    promotion: &Promotion,
    cart: &CartSnapshot,
    ctx: &EvaluationContext,
) -> Result<(), PromotionRejection> {
    if !promotion.is_active {
        return Err(PromotionRejection::Inactive);
    }

    if let Some(starts_at) = promotion.starts_at
        && ctx.now < starts_at
    {
        return Err(PromotionRejection::NotStarted { starts_at });
    }

    if let Some(ended_at) = promotion.ends_at
        && ctx.now >= ended_at
    {
        return Err(PromotionRejection::Expired { ended_at });
    }

    if let Some(limit) = promotion.usage_limit
        && promotion.usage_count >= limit
    {
        return Err(PromotionRejection::UsageLimitReached { limit });
    }

    if cart.is_empty() {
        return Err(PromotionRejection::EmptyCart);
    }

    if let Some(minimum) = promotion.min_order_amount {
        let subtotal = cart.subtotal();
        if subtotal < minimum {
            return Err(PromotionRejection::MinimumOrderNotMet { minimum, subtotal });
        }
    }

    if let (Some(limit), Some(used)) = (promotion.per_customer_limit, ctx.customer_usage)
        && used >= limit
    {
        return Err(PromotionRejection::CustomerLimitReached { limit });
    }

    if cart.eligible_lines(&promotion.eligible_items).next().is_none() {
        return Err(PromotionRejection::NoEligibleItems);
    }

    Ok(())
}

/// Compute the discount a promotion grants on a cart.
///
/// Assumes [`check_eligibility`] passed. Merchandise discounts never exceed
/// the eligible subtotal and shipping discounts never exceed the cart's
/// shipping.
///
/// # Errors
///
/// Returns [`PromotionRejection::BuyQuantityNotMet`] when a buy-x-get-y cart
/// has too few eligible units, and [`PromotionRejection::NothingToDiscount`]
/// when the promotion would be worth nothing.
pub fn compute_discount(
    promotion: &Promotion,
    cart: &CartSnapshot,
) -> Result<Discount, PromotionRejection> {
    let eligible_subtotal = cart.eligible_subtotal(&promotion.eligible_items);

    let discount = match promotion.rule {
        DiscountRule::Percentage {
            percent,
            max_discount,
        } => {
            let mut amount = round_to_cents(eligible_subtotal * percent / Decimal::ONE_HUNDRED);
            if let Some(cap) = max_discount {
                amount = amount.min(cap);
            }
            Discount {
                merchandise: amount.min(eligible_subtotal),
                shipping: Decimal::ZERO,
            }
        }
        DiscountRule::FixedAmount { amount } => Discount {
            merchandise: amount.min(eligible_subtotal),
            shipping: Decimal::ZERO,
        },
        DiscountRule::FreeShipping => Discount {
            merchandise: Decimal::ZERO,
            shipping: cart.shipping.max(Decimal::ZERO),
        },
        DiscountRule::BuyXGetY { buy, get } => Discount {
            merchandise: buy_x_get_y_discount(promotion, cart, buy, get)?,
            shipping: Decimal::ZERO,
        },
    };

    if discount.is_zero() {
        return Err(PromotionRejection::NothingToDiscount);
    }

    Ok(discount)
}

/// Value of the free units in a buy-x-get-y promotion.
///
/// Every complete group of `buy + get` eligible units earns `get` free units,
/// and the free units are always the cheapest ones in the cart.
fn buy_x_get_y_discount(
    promotion: &Promotion,
    cart: &CartSnapshot,
    buy: u32,
    get: u32,
) -> Result<Decimal, PromotionRejection> {
    let group = buy.saturating_add(get);

    let mut lines: Vec<(Decimal, u64)> = cart
        .eligible_lines(&promotion.eligible_items)
        .map(|line| (line.unit_price, u64::from(line.quantity)))
        .collect();

    let units: u64 = lines.iter().map(|&(_, quantity)| quantity).sum();
    let free_units = (units / u64::from(group)) * u64::from(get);
    if free_units == 0 {
        return Err(PromotionRejection::BuyQuantityNotMet { required: group });
    }

    lines.sort_unstable_by(|a, b| a.0.cmp(&b.0));

    let mut remaining = free_units;
    let mut free = Decimal::ZERO;
    for (unit_price, quantity) in lines {
        if remaining == 0 {
            break;
        }
        let taken = remaining.min(quantity);
        free += unit_price * Decimal::from(taken);
        remaining -= taken;
    }

    Ok(round_to_cents(free))
}

/// Check eligibility and compute the discount in one step.
///
/// # Errors
///
/// Returns the first [`PromotionRejection`] from either step.
pub fn evaluate(
    promotion: &Promotion,
    cart: &CartSnapshot,
    ctx: &EvaluationContext,
) -> Result<Evaluation, PromotionRejection> {
    check_eligibility(promotion, cart, ctx)?;
    let discount = compute_discount(promotion, cart)?;

    Ok(Evaluation {
        code: promotion.code.clone(),
        name: promotion.name.clone(),
        kind: promotion.kind(),
        stackable: promotion.stackable,
        summary: promotion.rule.describe(),
        discount,
        eligible_subtotal: cart.eligible_subtotal(&promotion.eligible_items),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::promotion::{CartLine, EligibleItems};
    use crate::{CategoryId, CurrencyCode, ProductId, PromotionId};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn dollars(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    fn promotion(rule: DiscountRule) -> Promotion {
        Promotion {
            id: PromotionId::new(1),
            code: PromotionCode::parse("TEST").unwrap(),
            name: "Test promotion".to_string(),
            description: None,
            rule,
            min_order_amount: None,
            usage_limit: None,
            usage_count: 0,
            per_customer_limit: None,
            starts_at: None,
            ends_at: None,
            is_active: true,
            stackable: true,
            eligible_items: EligibleItems::default(),
        }
    }

    fn line(product: i32, category: i32, quantity: u32, cents: i64) -> CartLine {
        CartLine {
            product_id: ProductId::new(product),
            category_id: Some(CategoryId::new(category)),
            name: format!("Product {product}"),
            quantity,
            unit_price: dollars(cents),
        }
    }

    fn cart(lines: Vec<CartLine>) -> CartSnapshot {
        CartSnapshot::new(lines, dollars(500), CurrencyCode::USD)
    }

    fn ten_percent() -> DiscountRule {
        DiscountRule::Percentage {
            percent: Decimal::new(10, 0),
            max_discount: None,
        }
    }

    #[test]
    fn test_percentage_discount() {
        let promo = promotion(ten_percent());
        let cart = cart(vec![line(1, 1, 2, 1999)]);
        let eval = evaluate(&promo, &cart, &EvaluationContext::anonymous(now())).unwrap();
        // 10% of 39.98 = 3.998 -> 4.00
        assert_eq!(eval.discount.merchandise, dollars(400));
        assert_eq!(eval.discount.shipping, Decimal::ZERO);
        assert_eq!(eval.eligible_subtotal, dollars(3998));
    }

    #[test]
    fn test_percentage_discount_is_capped() {
        let promo = promotion(DiscountRule::Percentage {
            percent: Decimal::new(50, 0),
            max_discount: Some(dollars(1000)),
        });
        let cart = cart(vec![line(1, 1, 1, 10000)]);
        let discount = compute_discount(&promo, &cart).unwrap();
        assert_eq!(discount.merchandise, dollars(1000));
    }

    #[test]
    fn test_fixed_amount_never_exceeds_eligible_subtotal() {
        let mut promo = promotion(DiscountRule::FixedAmount {
            amount: dollars(2500),
        });
        promo.eligible_items = EligibleItems::new(vec![ProductId::new(2)], Vec::new());
        let cart = cart(vec![line(1, 1, 1, 5000), line(2, 1, 1, 1200)]);
        let discount = compute_discount(&promo, &cart).unwrap();
        assert_eq!(discount.merchandise, dollars(1200));
    }

    #[test]
    fn test_free_shipping() {
        let promo = promotion(DiscountRule::FreeShipping);
        let discount = compute_discount(&promo, &cart(vec![line(1, 1, 1, 1000)])).unwrap();
        assert_eq!(discount.shipping, dollars(500));
        assert_eq!(discount.merchandise, Decimal::ZERO);

        let no_shipping = CartSnapshot::new(vec![line(1, 1, 1, 1000)], Decimal::ZERO, CurrencyCode::USD);
        assert_eq!(
            compute_discount(&promo, &no_shipping),
            Err(PromotionRejection::NothingToDiscount)
        );
    }

    #[test]
    fn test_buy_two_get_one_takes_cheapest_units() {
        let promo = promotion(DiscountRule::BuyXGetY { buy: 2, get: 1 });
        // Units: 30, 30, 20, 10, 10, 10 -> two groups of three -> two cheapest free
        let cart = cart(vec![line(1, 1, 2, 3000), line(2, 1, 1, 2000), line(3, 1, 3, 1000)]);
        let discount = compute_discount(&promo, &cart).unwrap();
        assert_eq!(discount.merchandise, dollars(2000));
    }

    #[test]
    fn test_buy_x_get_y_requires_full_group() {
        let promo = promotion(DiscountRule::BuyXGetY { buy: 2, get: 1 });
        let cart = cart(vec![line(1, 1, 2, 3000)]);
        assert_eq!(
            compute_discount(&promo, &cart),
            Err(PromotionRejection::BuyQuantityNotMet { required: 3 })
        );
    }

    #[test]
    fn test_buy_x_get_y_with_huge_quantity() {
        let promo = promotion(DiscountRule::BuyXGetY { buy: 1, get: 1 });
        let cart = cart(vec![line(1, 1, u32::MAX, 100)]);
        let discount = compute_discount(&promo, &cart).unwrap();
        assert_eq!(discount.merchandise, Decimal::from(u32::MAX / 2));
    }

    #[test]
    fn test_buy_x_get_y_splits_free_units_across_lines() {
        let promo = promotion(DiscountRule::BuyXGetY { buy: 1, get: 1 });
        // Eight units -> four free: three at 5.00, then one at 8.00
        let cart = cart(vec![line(1, 1, 4, 1200), line(2, 1, 3, 500), line(3, 1, 1, 800)]);
        let discount = compute_discount(&promo, &cart).unwrap();
        assert_eq!(discount.merchandise, dollars(2300));
    }

    #[test]
    fn test_buy_x_get_y_only_counts_eligible_units() {
        let mut promo = promotion(DiscountRule::BuyXGetY { buy: 1, get: 1 });
        promo.eligible_items = EligibleItems::new(Vec::new(), vec![CategoryId::new(7)]);
        let cart = cart(vec![line(1, 7, 1, 4000), line(2, 8, 5, 100), line(3, 7, 1, 2500)]);
        let discount = compute_discount(&promo, &cart).unwrap();
        assert_eq!(discount.merchandise, dollars(2500));
    }

    #[test]
    fn test_inactive_is_checked_first() {
        let mut promo = promotion(ten_percent());
        promo.is_active = false;
        promo.ends_at = Some(now() - Duration::days(1));
        let result = check_eligibility(&promo, &CartSnapshot::default(), &EvaluationContext::anonymous(now()));
        assert_eq!(result, Err(PromotionRejection::Inactive));
    }

    #[test]
    fn test_date_window() {
        let mut promo = promotion(ten_percent());
        let cart = cart(vec![line(1, 1, 1, 1000)]);
        let ctx = EvaluationContext::anonymous(now());

        promo.starts_at = Some(now() + Duration::hours(1));
        assert!(matches!(
            check_eligibility(&promo, &cart, &ctx),
            Err(PromotionRejection::NotStarted { .. })
        ));

        promo.starts_at = Some(now());
        assert!(check_eligibility(&promo, &cart, &ctx).is_ok());

        promo.ends_at = Some(now());
        assert!(matches!(
            check_eligibility(&promo, &cart, &ctx),
            Err(PromotionRejection::Expired { .. })
        ));
    }

    #[test]
    fn test_usage_limit() {
        let mut promo = promotion(ten_percent());
        promo.usage_limit = Some(5);
        promo.usage_count = 4;
        let cart = cart(vec![line(1, 1, 1, 1000)]);
        let ctx = EvaluationContext::anonymous(now());
        assert!(check_eligibility(&promo, &cart, &ctx).is_ok());

        promo.usage_count = 5;
        assert_eq!(
            check_eligibility(&promo, &cart, &ctx),
            Err(PromotionRejection::UsageLimitReached { limit: 5 })
        );
    }

    #[test]
    fn test_minimum_order_uses_whole_cart_subtotal() {
        let mut promo = promotion(ten_percent());
        promo.min_order_amount = Some(dollars(5000));
        let ctx = EvaluationContext::anonymous(now());

        let small = cart(vec![line(1, 1, 1, 4999)]);
        assert_eq!(
            check_eligibility(&promo, &small, &ctx),
            Err(PromotionRejection::MinimumOrderNotMet {
                minimum: dollars(5000),
                subtotal: dollars(4999),
            })
        );

        let enough = cart(vec![line(1, 1, 1, 4999), line(2, 1, 1, 1)]);
        assert!(check_eligibility(&promo, &enough, &ctx).is_ok());
    }

    #[test]
    fn test_per_customer_limit_skipped_for_anonymous() {
        let mut promo = promotion(ten_percent());
        promo.per_customer_limit = Some(1);
        let cart = cart(vec![line(1, 1, 1, 1000)]);

        assert!(check_eligibility(&promo, &cart, &EvaluationContext::anonymous(now())).is_ok());
        assert!(check_eligibility(&promo, &cart, &EvaluationContext::for_customer(now(), 0)).is_ok());
        assert_eq!(
            check_eligibility(&promo, &cart, &EvaluationContext::for_customer(now(), 1)),
            Err(PromotionRejection::CustomerLimitReached { limit: 1 })
        );
    }

    #[test]
    fn test_no_eligible_items() {
        let mut promo = promotion(ten_percent());
        promo.eligible_items = EligibleItems::new(vec![ProductId::new(99)], Vec::new());
        let cart = cart(vec![line(1, 1, 1, 1000)]);
        assert_eq!(
            check_eligibility(&promo, &cart, &EvaluationContext::anonymous(now())),
            Err(PromotionRejection::NoEligibleItems)
        );
    }

    #[test]
    fn test_empty_cart_before_minimum() {
        let mut promo = promotion(ten_percent());
        promo.min_order_amount = Some(dollars(100));
        assert_eq!(
            check_eligibility(&promo, &cart(Vec::new()), &EvaluationContext::anonymous(now())),
            Err(PromotionRejection::EmptyCart)
        );
    }
}
