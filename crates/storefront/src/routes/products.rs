//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tower_sessions::Session;
use tracing::instrument;

use marigold_core::{CurrencyCode, Money};

use crate::db::{Product, ProductRepository};
use crate::error::Result;
use crate::state::AppState;

use super::cart::load_cart;

/// Product display data for templates.
#[derive(Clone)]
pub struct ProductView {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: String,
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub products: Vec<ProductView>,
    pub cart_count: u32,
}

impl ProductView {
    fn new(product: Product, currency: CurrencyCode) -> Self {
        Self {
            id: product.id.as_i32(),
            price: Money::new(product.price, currency).display(),
            name: product.name,
            description: product.description.unwrap_or_default(),
            category: product.category_name.unwrap_or_default(),
        }
    }
}

/// Display product listing page.
#[instrument(skip(state, session))]
pub async fn index(State(state): State<AppState>, session: Session) -> Result<ProductsIndexTemplate> {
    let currency = state.config().currency;
    let products = ProductRepository::new(state.pool())
        .list_active()
        .await?
        .into_iter()
        .map(|p| ProductView::new(p, currency))
        .collect();

    let cart_count = load_cart(&session).await?.item_count();

    Ok(ProductsIndexTemplate {
        products,
        cart_count,
    })
}
