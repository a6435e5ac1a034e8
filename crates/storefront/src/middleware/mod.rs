//! HTTP middleware.
//!
//! # Order (outermost first)
//!
//! 1. Sentry layers
//! 2. `TraceLayer`
//! 3. Request ID
//! 4. CSP nonce
//! 5. Security headers
//! 6. Session layer
//! 7. Rate limiting (login and account mutation routes only)

pub mod csp;
pub mod customer;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use csp::{CspNonce, csp_nonce_middleware};
pub use customer::{OptionalCustomer, RequireCustomer, clear_current_customer, set_current_customer};
pub use rate_limit::{account_rate_limiter, login_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
