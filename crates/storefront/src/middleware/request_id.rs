//! Request ID propagation.
//!
//! Reuses an upstream `x-request-id` when it looks sane, otherwise mints a
//! UUID v4. The ID is recorded on the tracing span, tagged on the Sentry
//! scope, and echoed in the response.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream ID accepted as-is.
const MAX_REQUEST_ID_LEN: usize = 128;

fn accept_upstream_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_REQUEST_ID_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|id| accept_upstream_id(id))
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    Span::current().record("request_id", &request_id);

    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_upstream_id() {
        assert!(accept_upstream_id("cf-7f3a9c2e1b"));
        assert!(accept_upstream_id(&Uuid::new_v4().to_string()));
        assert!(!accept_upstream_id(""));
        assert!(!accept_upstream_id("has space"));
        assert!(!accept_upstream_id(&"a".repeat(129)));
    }
}
