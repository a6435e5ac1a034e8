//! Larder Core - Shared types library.
//!
//! This crate provides the types shared by the Larder storefront and its
//! integration tests:
//! - `storefront` - Public-facing e-commerce site
//! - `integration-tests` - Black-box tests against mocked vendor APIs
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. Every vendor entity is owned by its vendor; the types here cover
//! the few things the storefront computes itself (money arithmetic, paging,
//! subscription state rules).
//!
//! # Modules
//!
//! - [`types`] - Prices, emails, pagination, and subscription statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
