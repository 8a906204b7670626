//! Business logic services for storefront.
//!
//! # Services
//!
//! - `cart` - Price the session cart against the catalog
//! - `promotions` - Coupon validation, revalidation and redemption
//! - `webhook` - Order-completion webhook signatures

pub mod cart;
pub mod promotions;
pub mod webhook;

pub use promotions::{CompletedOrder, PromotionError, PromotionService, Revalidation};
