//! Marigold Core - Shared types and promotion rules.
//!
//! This crate provides the domain types used across all Marigold components:
//! - `storefront` - Public-facing e-commerce site and promotion API
//! - `cli` - Command-line tools for migrations and promotion management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Promotion evaluation lives here so that every rule
//! can be exercised without a database.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, and statuses
//! - [`promotion`] - Coupon codes, eligibility checks, and discount computation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod promotion;
pub mod types;

pub use types::*;
