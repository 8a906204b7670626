//! Promotion service.
//!
//! Validates coupon codes against carts, keeps the promotions applied to a
//! session cart current, and redeems them when an order is paid.

mod error;

pub use error::PromotionError;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};

use marigold_core::promotion::{
    AppliedPromotion, AppliedPromotions, CartSnapshot, Evaluation, EvaluationContext, Promotion,
    PromotionCode, PromotionRejection, evaluate,
};
use marigold_core::{CustomerEmail, OrderId, OrderStatus};

use crate::db::orders::{self, Order, OrderPromotion, PaymentDetails};
use crate::db::promotions::{self, PromotionRepository};

/// Result of re-evaluating a cart's applied promotions.
#[derive(Debug, Clone, Default)]
pub struct Revalidation {
    /// Promotions that still apply, with refreshed discounts.
    pub kept: AppliedPromotions,
    /// Promotions that no longer apply and why.
    pub dropped: Vec<(PromotionCode, PromotionRejection)>,
}

/// Outcome of the order-completion webhook.
#[derive(Debug, Clone)]
pub struct CompletedOrder {
    pub order: Order,
    /// The order was already paid; nothing was recorded this time.
    pub already_completed: bool,
}

/// Promotion service.
pub struct PromotionService<'a> {
    pool: &'a PgPool,
    promotions: PromotionRepository<'a>,
}

impl<'a> PromotionService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            promotions: PromotionRepository::new(pool),
        }
    }

    /// Validate a code against a cart and compute its discount.
    ///
    /// The per-customer limit is only checked when `email` is known.
    ///
    /// # Errors
    ///
    /// Returns `PromotionError::InvalidCode` if the code is malformed.
    /// Returns `PromotionError::InvalidCart` if the cart has out-of-range quantities or amounts.
    /// Returns `PromotionError::UnknownCode` if no promotion has the code.
    /// Returns `PromotionError::Rejected` if the promotion does not apply.
    /// Returns `PromotionError::Repository` if a query fails.
    #[instrument(skip(self, cart, email), fields(lines = cart.lines.len(), has_email = email.is_some()))]
    pub async fn validate(
        &self,
        raw_code: &str,
        cart: &CartSnapshot,
        email: Option<&CustomerEmail>,
        now: DateTime<Utc>,
    ) -> Result<Evaluation, PromotionError> {
        let code = PromotionCode::parse(raw_code)?;
        cart.validate().map_err(PromotionError::InvalidCart)?;

        let promotion = self
            .promotions
            .find_by_code(&code)
            .await?
            .ok_or_else(|| PromotionError::UnknownCode(code.clone()))?;

        self.evaluate(&promotion, cart, email, now).await
    }

    /// Re-evaluate every applied promotion against the current cart.
    ///
    /// Promotions that still apply are kept with their new discounts. The rest
    /// are dropped together with the reason. A promotion that was deleted since
    /// it was applied is dropped as inactive.
    ///
    /// # Errors
    ///
    /// Returns `PromotionError::Repository` if a query fails.
    #[instrument(skip_all, fields(applied = applied.len()))]
    pub async fn revalidate_applied(
        &self,
        applied: &AppliedPromotions,
        cart: &CartSnapshot,
        email: Option<&CustomerEmail>,
        now: DateTime<Utc>,
    ) -> Result<Revalidation, PromotionError> {
        let mut result = Revalidation::default();

        for entry in applied {
            let Some(promotion) = self.promotions.find_by_code(&entry.code).await? else {
                result
                    .dropped
                    .push((entry.code.clone(), PromotionRejection::Inactive));
                continue;
            };

            let outcome = match self.evaluate(&promotion, cart, email, now).await {
                Ok(evaluation) => result.kept.apply(AppliedPromotion::from(evaluation)),
                Err(PromotionError::Rejected(rejection)) => Err(rejection),
                Err(err) => return Err(err),
            };

            if let Err(rejection) = outcome {
                debug!(code = %entry.code, reason = rejection.reason(), "Dropping applied promotion");
                result.dropped.push((entry.code.clone(), rejection));
            }
        }

        Ok(result)
    }

    /// Redeem an order's promotions and mark it paid, in one transaction.
    ///
    /// Completing an order that is already paid returns the stored order
    /// without recording anything, so webhook retries are harmless. Promotion
    /// rows are locked in code order. A promotion that reached its usage limit
    /// between checkout and payment is still redeemed and flagged `over_limit`.
    ///
    /// # Errors
    ///
    /// Returns `PromotionError::OrderNotFound` if the order doesn't exist.
    /// Returns `PromotionError::OrderCancelled` if the order was cancelled.
    /// Returns `PromotionError::Repository` if any statement fails; nothing is
    /// written in that case.
    #[instrument(skip(self, payment), fields(order_id = %order_id, provider = %payment.payment_provider))]
    pub async fn complete_order(
        &self,
        order_id: OrderId,
        payment: &PaymentDetails,
        now: DateTime<Utc>,
    ) -> Result<CompletedOrder, PromotionError> {
        let mut tx = self.pool.begin().await?;

        let order = orders::lock_for_update(&mut *tx, order_id)
            .await?
            .ok_or(PromotionError::OrderNotFound(order_id))?;

        match order.status {
            OrderStatus::Paid => {
                info!("Order already completed");
                return Ok(CompletedOrder {
                    order,
                    already_completed: true,
                });
            }
            OrderStatus::Cancelled => return Err(PromotionError::OrderCancelled(order_id)),
            OrderStatus::Pending => {}
        }

        let mut pending: Vec<&OrderPromotion> = order.promotions.iter().collect();
        pending.sort_by(|a, b| a.code.cmp(&b.code));

        let mut stamped = Vec::with_capacity(pending.len());
        for recorded in pending {
            let mut entry = recorded.clone();

            match promotions::lock_by_code(&mut *tx, &recorded.code).await? {
                None => {
                    warn!(code = %recorded.code, "Promotion no longer exists; usage not recorded");
                }
                Some(promotion) => {
                    let at_limit = promotion.remaining_uses() == Some(0);
                    let inserted = promotions::record_usage(
                        &mut *tx,
                        promotion.id,
                        order_id,
                        &order.customer_email,
                        recorded.discount.total(),
                    )
                    .await?;

                    if inserted && at_limit {
                        warn!(
                            code = %recorded.code,
                            promotion_id = %promotion.id,
                            over_limit = true,
                            "Promotion redeemed past its usage limit"
                        );
                    }

                    entry.promotion_id = Some(promotion.id);
                    entry.redeemed = inserted;
                    entry.over_limit = inserted && at_limit;
                }
            }

            stamped.push(entry);
        }

        let order = orders::mark_paid(&mut *tx, order_id, payment, &stamped, now).await?;
        tx.commit().await?;

        info!(
            redeemed = stamped.iter().filter(|p| p.redeemed).count(),
            total = %order.total,
            "Order completed"
        );

        Ok(CompletedOrder {
            order,
            already_completed: false,
        })
    }

    /// Evaluate a loaded promotion, counting the customer's prior redemptions
    /// only when the promotion has a per-customer limit.
    async fn evaluate(
        &self,
        promotion: &Promotion,
        cart: &CartSnapshot,
        email: Option<&CustomerEmail>,
        now: DateTime<Utc>,
    ) -> Result<Evaluation, PromotionError> {
        let customer_usage = match email {
            Some(email) if promotion.per_customer_limit.is_some() => Some(
                self.promotions
                    .count_customer_usage(promotion.id, email)
                    .await?,
            ),
            _ => None,
        };

        let ctx = EvaluationContext { now, customer_usage };
        evaluate(promotion, cart, &ctx).map_err(|rejection| {
            info!(code = %promotion.code, reason = rejection.reason(), "Promotion rejected");
            PromotionError::Rejected(rejection)
        })
    }
}
