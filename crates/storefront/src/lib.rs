//! Larder storefront library.
//!
//! Server-rendered storefront over four vendors: a commerce backend
//! (products, carts, customers), a headless CMS (blog), a reviews service,
//! and a subscription billing service. The binary in `main.rs` wires this
//! library to a listener; integration tests drive [`routes::app`] directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod config;
pub mod content;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod shopify;
pub mod state;
