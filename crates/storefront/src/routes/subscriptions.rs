//! Subscription management for signed-in customers.
//!
//! Subscriptions are looked up by the email the customer signed in with;
//! the billing client refuses to touch subscriptions registered to anyone
//! else.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use larder_core::Email;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use super::PageChrome;
use crate::error::add_breadcrumb;
use crate::filters;
use crate::middleware::RequireCustomer;
use crate::models::Flash;
use crate::services::{BillingError, Subscription};
use crate::state::AppState;

const SUBSCRIPTIONS_PATH: &str = "/account/subscriptions";

#[derive(Debug, Clone)]
pub struct SubscriptionView {
    pub id: String,
    pub title: String,
    pub plan_name: String,
    /// "$18.00 every 2 weeks"
    pub price: String,
    pub status: String,
    /// Lowercase status, used as a CSS modifier.
    pub status_class: String,
    pub next_billing: Option<String>,
    pub can_suspend: bool,
    pub can_resume: bool,
}

impl From<&Subscription> for SubscriptionView {
    fn from(sub: &Subscription) -> Self {
        let price = match (&sub.price, &sub.interval) {
            (Some(price), Some(interval)) => format!("{price} {interval}"),
            (Some(price), None) => price.display(),
            (None, Some(interval)) => interval.clone(),
            (None, None) => String::new(),
        };

        Self {
            id: sub.id.clone(),
            title: sub
                .product_title
                .clone()
                .unwrap_or_else(|| sub.plan_name.clone()),
            plan_name: sub.plan_name.clone(),
            price,
            status: sub.status.label().to_string(),
            status_class: sub.status.label().to_lowercase(),
            next_billing: sub
                .next_billing_at
                .filter(|_| sub.can_suspend())
                .map(|at| at.format("%B %-d, %Y").to_string()),
            can_suspend: sub.can_suspend(),
            can_resume: sub.can_resume(),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "account/subscriptions.html")]
pub struct SubscriptionsTemplate {
    pub chrome: PageChrome,
    pub subscriptions: Vec<SubscriptionView>,
    pub unavailable: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuspendForm {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Customer-facing message for a failed pause or resume.
fn failure_message(err: &BillingError) -> String {
    match err {
        BillingError::NotFound => "We couldn't find that subscription.".to_string(),
        BillingError::InvalidTransition { .. } => err.to_string(),
        _ => "We couldn't update your subscription right now. Please try again shortly."
            .to_string(),
    }
}

/// Email of the signed-in customer, as the billing service knows it.
fn customer_email(raw: &str) -> Option<Email> {
    Email::parse(raw).ok()
}

/// List the customer's subscriptions.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    chrome: PageChrome,
    RequireCustomer(customer): RequireCustomer,
) -> impl IntoResponse {
    let (subscriptions, unavailable) = match customer_email(&customer.email) {
        Some(email) => match state.billing().find_subscriptions(&email).await {
            Ok(subs) => (subs.iter().map(SubscriptionView::from).collect(), false),
            Err(e) => {
                warn!(error = %e, "Failed to load subscriptions");
                (Vec::new(), true)
            }
        },
        None => (Vec::new(), false),
    };

    SubscriptionsTemplate {
        chrome,
        subscriptions,
        unavailable,
    }
}

/// Pause a subscription.
#[instrument(skip(state, session, customer, form))]
pub async fn suspend(
    State(state): State<AppState>,
    session: Session,
    RequireCustomer(customer): RequireCustomer,
    Path(id): Path<String>,
    Form(form): Form<SuspendForm>,
) -> Response {
    let flash = match customer_email(&customer.email) {
        Some(email) => match state
            .billing()
            .suspend(&email, &id, form.reason.as_deref())
            .await
        {
            Ok(sub) => {
                info!(subscription_id = %sub.id, "Subscription paused");
                add_breadcrumb("subscription", "Paused", Some(&[("id", sub.id.as_str())]));
                Flash::success(format!("{} is paused.", SubscriptionView::from(&sub).title))
            }
            Err(e) => {
                warn!(error = %e, "Failed to pause subscription");
                Flash::error(failure_message(&e))
            }
        },
        None => Flash::error(failure_message(&BillingError::NotFound)),
    };

    flash.set(&session).await;
    Redirect::to(SUBSCRIPTIONS_PATH).into_response()
}

/// Resume a paused subscription.
#[instrument(skip(state, session, customer))]
pub async fn resume(
    State(state): State<AppState>,
    session: Session,
    RequireCustomer(customer): RequireCustomer,
    Path(id): Path<String>,
) -> Response {
    let flash = match customer_email(&customer.email) {
        Some(email) => match state.billing().resume(&email, &id).await {
            Ok(sub) => {
                info!(subscription_id = %sub.id, "Subscription resumed");
                add_breadcrumb("subscription", "Resumed", Some(&[("id", sub.id.as_str())]));
                Flash::success(format!("{} is active again.", SubscriptionView::from(&sub).title))
            }
            Err(e) => {
                warn!(error = %e, "Failed to resume subscription");
                Flash::error(failure_message(&e))
            }
        },
        None => Flash::error(failure_message(&BillingError::NotFound)),
    };

    flash.set(&session).await;
    Redirect::to(SUBSCRIPTIONS_PATH).into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use larder_core::{Price, SubscriptionStatus};

    use super::*;

    fn subscription(status: SubscriptionStatus) -> Subscription {
        Subscription {
            id: "42".to_string(),
            customer_email: "pat@example.com".to_string(),
            status,
            plan_name: "Fortnightly".to_string(),
            product_title: Some("House Coffee".to_string()),
            price: Some(Price::parse("18.00", "USD").unwrap()),
            interval: Some("every 2 weeks".to_string()),
            next_billing_at: Some(Utc.with_ymd_and_hms(2026, 11, 2, 0, 0, 0).unwrap()),
            created_at: None,
        }
    }

    #[test]
    fn test_active_view() {
        let view = SubscriptionView::from(&subscription(SubscriptionStatus::Active));
        assert_eq!(view.title, "House Coffee");
        assert_eq!(view.price, "$18.00 every 2 weeks");
        assert_eq!(view.next_billing.as_deref(), Some("November 2, 2026"));
        assert!(view.can_suspend);
        assert!(!view.can_resume);
    }

    #[test]
    fn test_paused_view_hides_next_billing() {
        let view = SubscriptionView::from(&subscription(SubscriptionStatus::Suspended));
        assert!(view.next_billing.is_none());
        assert!(view.can_resume);
    }

    #[test]
    fn test_failure_messages() {
        let err = BillingError::InvalidTransition {
            status: SubscriptionStatus::Cancelled,
            action: "pause",
        };
        assert_eq!(
            failure_message(&err),
            "Cannot pause a subscription that is Cancelled"
        );
        assert!(failure_message(&BillingError::Parse("x".to_string())).contains("right now"));
    }
}
