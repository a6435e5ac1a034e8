//! Session layer.
//!
//! Sessions are held in memory: they carry the cart and the signed-in
//! customer's access token, both of which can be rebuilt (the cart from the
//! backend mirror is lost, the customer signs in again) after a restart.

use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::StorefrontConfig;

pub const SESSION_COOKIE_NAME: &str = "larder_session";

/// 7 days of inactivity.
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

#[must_use]
pub fn create_session_layer(config: &StorefrontConfig) -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
