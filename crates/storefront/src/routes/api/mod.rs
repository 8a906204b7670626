//! JSON API routes.
//!
//! - `promotions` - Coupon validation for headless clients
//! - `orders` - Signed order-completion webhook

pub mod orders;
pub mod promotions;
