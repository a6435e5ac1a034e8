//! Session-held models.

pub mod session;

pub use session::{CurrentCustomer, Flash};
