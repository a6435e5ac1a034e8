//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                               - Home page
//! GET  /health, /health/ready          - Liveness / readiness
//!
//! # Catalog
//! GET  /products?after&q               - Product listing (cursor pages) and search
//! GET  /products/{handle}              - Product detail
//! GET  /products/{handle}/reviews      - Reviews fragment (HTMX)
//! POST /products/{handle}/reviews      - Submit a review
//! GET  /collections                    - Collection listing
//! GET  /collections/{handle}?after     - Collection detail
//!
//! # Cart (HTMX fragments, plain redirects without JS)
//! GET  /cart                           - Cart page
//! POST /cart/add                       - Add to cart (count badge, triggers cart-updated)
//! POST /cart/update                    - Set quantity (cart items fragment)
//! POST /cart/remove                    - Remove line (cart items fragment)
//! GET  /cart/count                     - Cart count badge
//! GET  /checkout                       - Push cart, redirect to hosted checkout
//!
//! # JSON
//! GET  /api/cart                       - Cart and sync state
//! GET  /api/inventory/{variant_id}     - Stock for one variant
//!
//! # Content
//! GET  /blog?page&tag                  - Blog index
//! GET  /blog/{slug}                    - Blog post with related products
//! GET  /pages/{slug}                   - Static page
//!
//! # Account
//! GET  /account/login, POST /account/login
//! POST /account/logout
//! GET  /account                        - Profile, addresses, orders
//! GET  /account/subscriptions          - Subscriptions
//! POST /account/subscriptions/{id}/suspend|resume
//! ```

pub mod account;
pub mod api;
pub mod blog;
pub mod cart;
pub mod collections;
pub mod home;
pub mod pages;
pub mod products;
pub mod subscriptions;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    extract::{FromRequestParts, State},
    handler::Handler,
    http::{StatusCode, request::Parts},
    middleware::from_fn,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::Session;

use crate::cart::LocalCart;
use crate::filters;
use crate::middleware::{
    CspNonce, account_rate_limiter, create_session_layer, csp_nonce_middleware,
    login_rate_limiter, request_id_middleware, security_headers_middleware,
};
use crate::models::session::keys;
use crate::models::{CurrentCustomer, Flash};
use crate::state::AppState;

/// Static assets, relative to the workspace root.
pub const STATIC_DIR: &str = "crates/storefront/static";

// =============================================================================
// Page chrome
// =============================================================================

/// Values the page layout needs on every full page.
///
/// Extracting it consumes the pending flash message, so fragment handlers
/// should not use it.
#[derive(Debug, Clone, Default)]
pub struct PageChrome {
    pub nonce: String,
    pub cart_count: u32,
    pub signed_in: bool,
    pub flash: Option<Flash>,
}

impl<S> FromRequestParts<S> for PageChrome
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CspNonce(nonce) = CspNonce::from_request_parts(parts, state).await?;
        let Some(session) = parts.extensions.get::<Session>().cloned() else {
            return Ok(Self {
                nonce,
                ..Self::default()
            });
        };

        let cart = LocalCart::load(&session).await;
        let signed_in = session
            .get::<CurrentCustomer>(keys::CUSTOMER)
            .await
            .ok()
            .flatten()
            .is_some();

        Ok(Self {
            nonce,
            cart_count: cart.total_quantity(),
            signed_in,
            flash: Flash::take(&session).await,
        })
    }
}

/// Whether the request came from HTMX rather than a plain form post.
#[must_use]
pub fn is_htmx(headers: &axum::http::HeaderMap) -> bool {
    headers.contains_key("hx-request")
}

// =============================================================================
// Routers
// =============================================================================

fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{handle}", get(products::show))
        .route(
            "/{handle}/reviews",
            get(products::reviews).post(products::submit_review.layer(account_rate_limiter())),
        )
}

fn collection_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(collections::index))
        .route("/{handle}", get(collections::show))
}

fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(api::cart))
        .route("/inventory/{variant_id}", get(api::inventory))
}

fn blog_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(blog::index))
        .route("/{slug}", get(blog::show))
}

fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index))
        .route(
            "/login",
            get(account::login_page).post(account::login.layer(login_rate_limiter())),
        )
        .route("/logout", post(account::logout))
        .route("/subscriptions", get(subscriptions::index))
        .route(
            "/subscriptions/{id}/suspend",
            post(subscriptions::suspend.layer(account_rate_limiter())),
        )
        .route(
            "/subscriptions/{id}/resume",
            post(subscriptions::resume.layer(account_rate_limiter())),
        )
}

/// All storefront page and API routes, without middleware.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/products", product_routes())
        .nest("/collections", collection_routes())
        .nest("/cart", cart_routes())
        .route("/checkout", get(cart::checkout))
        .nest("/api", api_routes())
        .nest("/blog", blog_routes())
        .route("/pages/{slug}", get(pages::show))
        .nest("/account", account_routes())
        .fallback(not_found)
}

/// The full application: routes, static files and middleware.
///
/// Sentry layers are added by the binary so tests can run without a client.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config());

    routes()
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .layer(session_layer)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(csp_nonce_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Fallback
// =============================================================================

/// Not found page template.
#[derive(Template, WebTemplate)]
#[template(path = "error/404.html")]
pub struct NotFoundTemplate {
    pub chrome: PageChrome,
}

/// Render the not found page for unknown paths.
async fn not_found(chrome: PageChrome) -> impl IntoResponse {
    (StatusCode::NOT_FOUND, NotFoundTemplate { chrome })
}

// =============================================================================
// Health
// =============================================================================

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Ready once the commerce backend answers; every page depends on it.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.storefront().get_collections(1, None).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
