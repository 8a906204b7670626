//! CLI command implementations.

pub mod migrate;
pub mod promo;

use secrecy::SecretString;

/// Read the storefront database URL, falling back to `DATABASE_URL`.
///
/// Returns the name of the variable that should be set when neither is.
pub(crate) fn database_url() -> Result<SecretString, &'static str> {
    dotenvy::dotenv().ok();

    std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| "STOREFRONT_DATABASE_URL")
}
