//! Per-request CSP nonce.
//!
//! Templates put the nonce on inline `<script>` tags;
//! `security_headers_middleware` puts the same value in the CSP header.

use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;

/// 128 random bits, base64-encoded.
#[derive(Clone, Debug)]
pub struct CspNonce(pub String);

impl CspNonce {
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        Self(STANDARD.encode(bytes))
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }
}

pub async fn csp_nonce_middleware(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(CspNonce::generate());
    next.run(request).await
}

impl<S> FromRequestParts<S> for CspNonce
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_else(|| {
            tracing::warn!("CSP nonce missing from request extensions");
            Self(String::new())
        }))
    }
}
