//! Security headers for every response.

use axum::{
    extract::Request,
    http::{
        HeaderName, HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};

use super::csp::CspNonce;

/// Build the CSP, allowing inline scripts that carry `nonce`.
///
/// Product and blog images come from vendor CDNs, so `img-src` allows any
/// HTTPS origin.
fn content_security_policy(nonce: Option<&CspNonce>) -> String {
    let script_src = nonce.map_or_else(
        || "'self'".to_string(),
        |n| format!("'self' 'nonce-{}'", n.value()),
    );

    format!(
        "default-src 'none'; \
         script-src {script_src}; \
         style-src 'self'; \
         font-src 'self'; \
         img-src 'self' https: data:; \
         connect-src 'self'; \
         frame-src 'none'; \
         object-src 'none'; \
         base-uri 'self'; \
         form-action 'self' https:; \
         frame-ancestors 'none'; \
         upgrade-insecure-requests"
    )
}

/// Add security headers to all responses.
///
/// Must run inside `csp_nonce_middleware` so the nonce is in the request
/// extensions. `form-action` allows HTTPS targets because checkout redirects
/// to the commerce backend.
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let nonce = request.extensions().get::<CspNonce>().cloned();
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(
        REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    if let Ok(csp) = HeaderValue::from_str(&content_security_policy(nonce.as_ref())) {
        headers.insert(CONTENT_SECURITY_POLICY, csp);
    }

    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(
            "camera=(), geolocation=(), microphone=(), payment=(), usb=(), \
             interest-cohort=(), browsing-topics=()",
        ),
    );

    // Pages carry cart and account state.
    if !headers.contains_key(CACHE_CONTROL) {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store, max-age=0"));
    }

    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-embedder-policy"),
        HeaderValue::from_static("credentialless"),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csp_includes_nonce() {
        let nonce = CspNonce("abc123".to_string());
        let csp = content_security_policy(Some(&nonce));
        assert!(csp.contains("script-src 'self' 'nonce-abc123';"));
        assert!(csp.contains("frame-ancestors 'none'"));
    }

    #[test]
    fn test_csp_without_nonce() {
        let csp = content_security_policy(None);
        assert!(csp.contains("script-src 'self';"));
    }
}
