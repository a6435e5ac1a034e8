//! Session-stored state.

use serde::{Deserialize, Serialize};

/// Signed-in customer, as kept in the session.
#[derive(Clone, Serialize, Deserialize)]
pub struct CurrentCustomer {
    /// Storefront API customer access token.
    pub access_token: String,
    /// Token expiry (RFC 3339).
    pub expires_at: String,
    /// Email the customer signed in with; scopes subscription lookups.
    pub email: String,
}

impl std::fmt::Debug for CurrentCustomer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentCustomer")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("email", &self.email)
            .finish()
    }
}

/// Session keys.
pub mod keys {
    /// The visitor's cart.
    pub const CART: &str = "cart";

    /// The signed-in customer.
    pub const CUSTOMER: &str = "customer";

    /// Flash message shown once on the next page.
    pub const FLASH: &str = "flash";
}

/// One-shot notice shown after a redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    /// `success` or `error`; used as a CSS modifier.
    pub kind: String,
    pub message: String,
}

impl Flash {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: "success".to_string(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: "error".to_string(),
            message: message.into(),
        }
    }

    /// Queue for the next page render. Failures are logged and dropped.
    pub async fn set(self, session: &tower_sessions::Session) {
        if let Err(e) = session.insert(keys::FLASH, self).await {
            tracing::warn!(error = %e, "Failed to store flash message");
        }
    }

    /// Take the queued notice, if any.
    pub async fn take(session: &tower_sessions::Session) -> Option<Self> {
        session.remove::<Self>(keys::FLASH).await.ok().flatten()
    }
}
