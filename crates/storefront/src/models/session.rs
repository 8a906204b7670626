//! Session-related types.
//!
//! The cart lives in the session as product IDs and quantities only. Prices
//! are looked up from the catalog each time the cart is shown, so a price
//! change is never hidden by a stale session.

use serde::{Deserialize, Serialize};

use marigold_core::ProductId;
pub use marigold_core::promotion::MAX_LINE_QUANTITY;

/// Session keys for cart data.
pub mod keys {
    /// Key for the session cart.
    pub const CART: &str = "cart";

    /// Key for promotions applied to the session cart.
    pub const APPLIED_PROMOTIONS: &str = "applied_promotions";
}

/// One product in the session cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Session-stored cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCart {
    items: Vec<SessionCartItem>,
}

impl SessionCart {
    /// Add `quantity` of a product, merging with an existing line.
    ///
    /// Quantities are capped at [`MAX_LINE_QUANTITY`]. Adding zero is a no-op.
    pub fn add(&mut self, product_id: ProductId, quantity: u32) {
        if quantity == 0 {
            return;
        }

        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            item.quantity = item.quantity.saturating_add(quantity).min(MAX_LINE_QUANTITY);
        } else {
            self.items.push(SessionCartItem {
                product_id,
                quantity: quantity.min(MAX_LINE_QUANTITY),
            });
        }
    }

    /// Remove a product. Returns whether it was in the cart.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        self.items.len() != before
    }

    /// Keep only items whose product is still for sale.
    pub fn retain_products(&mut self, available: &[ProductId]) {
        self.items.retain(|i| available.contains(&i.product_id));
    }

    #[must_use]
    pub fn items(&self) -> &[SessionCartItem] {
        &self.items
    }

    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.items.iter().map(|i| i.product_id).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}
