//! Customer account route handlers.
//!
//! Sign-in exchanges email and password for a commerce backend customer
//! access token; the token lives in the session and is the only credential
//! the storefront keeps.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::DateTime;
use larder_core::Email;
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use super::PageChrome;
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{
    OptionalCustomer, RequireCustomer, clear_current_customer, set_current_customer,
};
use crate::models::{CurrentCustomer, Flash};
use crate::shopify::{Customer, Order, ShopifyError};
use crate::state::AppState;

/// Orders shown on the account page.
const RECENT_ORDERS: usize = 10;

// =============================================================================
// Views
// =============================================================================

#[derive(Debug, Clone)]
pub struct OrderView {
    pub name: String,
    /// "March 4, 2026"
    pub date: String,
    pub status: String,
    pub total: String,
    pub status_url: String,
    pub item_count: i64,
}

fn format_order_date(processed_at: &str) -> String {
    DateTime::parse_from_rfc3339(processed_at).map_or_else(
        |_| processed_at.to_string(),
        |dt| dt.format("%B %-d, %Y").to_string(),
    )
}

/// "PARTIALLY_FULFILLED" -> "Partially fulfilled"
fn humanize_status(status: &str) -> String {
    let lower = status.replace('_', " ").to_lowercase();
    let mut chars = lower.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            name: order.name.clone(),
            date: format_order_date(&order.processed_at),
            status: humanize_status(&order.fulfillment_status),
            total: order.total_price.display(),
            status_url: order.status_url.clone(),
            item_count: order.line_items.iter().map(|l| l.quantity).sum(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccountView {
    pub name: String,
    pub email: String,
    pub default_address: Vec<String>,
    /// Other saved addresses, one line list each.
    pub addresses: Vec<Vec<String>>,
    pub orders: Vec<OrderView>,
}

impl AccountView {
    fn new(customer: &Customer, email: &str) -> Self {
        let default_id = customer.default_address.as_ref().map(|a| a.id.as_str());
        Self {
            name: customer.display_name(),
            email: customer.email.clone().unwrap_or_else(|| email.to_string()),
            default_address: customer
                .default_address
                .as_ref()
                .map(crate::shopify::Address::lines)
                .unwrap_or_default(),
            addresses: customer
                .addresses
                .iter()
                .filter(|a| Some(a.id.as_str()) != default_id)
                .map(crate::shopify::Address::lines)
                .collect(),
            orders: customer
                .orders
                .iter()
                .take(RECENT_ORDERS)
                .map(OrderView::from)
                .collect(),
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "account/login.html")]
pub struct LoginTemplate {
    pub chrome: PageChrome,
    pub email: String,
    pub error: Option<String>,
}

/// Account overview page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountIndexTemplate {
    pub chrome: PageChrome,
    /// `None` when the backend could not be reached.
    pub account: Option<AccountView>,
    pub email: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the sign-in form.
pub async fn login_page(
    chrome: PageChrome,
    OptionalCustomer(customer): OptionalCustomer,
) -> Response {
    if customer.is_some() {
        return Redirect::to("/account").into_response();
    }

    LoginTemplate {
        chrome,
        email: String::new(),
        error: None,
    }
    .into_response()
}

/// Sign in with email and password.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    chrome: PageChrome,
    Form(form): Form<LoginForm>,
) -> Response {
    let render = |chrome: PageChrome, status: StatusCode, message: &str| {
        (
            status,
            LoginTemplate {
                chrome,
                email: form.email.trim().to_string(),
                error: Some(message.to_string()),
            },
        )
            .into_response()
    };

    let Ok(email) = Email::parse(&form.email) else {
        return render(chrome, StatusCode::BAD_REQUEST, "Enter a valid email address");
    };
    let password = SecretString::from(form.password.clone());

    let token = match state
        .storefront()
        .customer_access_token_create(email.as_str(), &password)
        .await
    {
        Ok(token) => token,
        Err(ShopifyError::UserError(_)) => {
            info!("Sign-in rejected");
            return render(chrome, StatusCode::UNAUTHORIZED, "Incorrect email or password");
        }
        Err(e) => {
            warn!(error = %e, "Sign-in unavailable");
            return render(
                chrome,
                StatusCode::BAD_GATEWAY,
                "Sign-in is unavailable right now. Please try again shortly.",
            );
        }
    };

    let customer = CurrentCustomer {
        access_token: token.access_token,
        expires_at: token.expires_at,
        email: email.as_str().to_string(),
    };
    if let Err(e) = set_current_customer(&session, &customer).await {
        tracing::error!(error = %e, "Failed to store customer in session");
        return render(
            chrome,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Sign-in failed. Please try again.",
        );
    }

    set_sentry_user(email.as_str());
    Flash::success("Welcome back!").set(&session).await;
    Redirect::to("/account").into_response()
}

/// Sign out. The backend token is revoked on a best-effort basis.
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, session: Session) -> Response {
    match clear_current_customer(&session).await {
        Ok(Some(customer)) => {
            if let Err(e) = state
                .storefront()
                .customer_access_token_delete(&customer.access_token)
                .await
            {
                warn!(error = %e, "Failed to revoke customer token");
            }
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Failed to clear customer from session"),
    }

    clear_sentry_user();
    Redirect::to("/").into_response()
}

/// Display the account overview: profile, addresses, recent orders.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    chrome: PageChrome,
    RequireCustomer(customer): RequireCustomer,
) -> Response {
    let account = match state.storefront().get_customer(&customer.access_token).await {
        Ok(found) => Some(AccountView::new(&found, &customer.email)),
        Err(ShopifyError::NotFound(_)) => {
            // Token expired or revoked.
            let _ = clear_current_customer(&session).await;
            Flash::error("Your session has expired. Please sign in again.")
                .set(&session)
                .await;
            return Redirect::to("/account/login").into_response();
        }
        Err(e) => {
            warn!(error = %e, "Failed to load customer");
            None
        }
    };

    AccountIndexTemplate {
        chrome,
        account,
        email: customer.email,
    }
    .into_response()
}
