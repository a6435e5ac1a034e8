//! Core types for Larder.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod pagination;
pub mod price;
pub mod status;

pub use email::{Email, EmailError};
pub use pagination::Pagination;
pub use price::{CurrencyCode, Price, PriceError};
pub use status::SubscriptionStatus;
