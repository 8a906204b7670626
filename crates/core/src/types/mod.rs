//! Core types for Marigold.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod status;

pub use email::{CustomerEmail, CustomerEmailError};
pub use id::*;
pub use money::{CurrencyCode, Money, round_to_cents};
pub use status::*;
