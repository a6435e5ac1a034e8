//! Shopping cart.
//!
//! - [`store`]: the cart held in the visitor's session
//! - [`sync`]: debounced mirroring of that cart to the commerce backend

pub mod store;
pub mod sync;

pub use store::{LocalCart, LocalCartLine, MAX_LINE_QUANTITY};
pub use sync::{CartBackend, CartDiff, CartSyncer, SyncState, diff_lines};
