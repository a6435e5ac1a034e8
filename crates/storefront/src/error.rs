//! Unified error handling with Sentry integration.
//!
//! Handlers that can fail return `Result<T, AppError>`. Vendor failures on
//! display paths are usually caught and replaced by defaults before they get
//! here; what reaches `AppError` is a missing resource, bad input, or a vendor
//! failure on an action the customer explicitly asked for.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::services::{BillingError, CmsError, ReviewsError};
use crate::shopify::ShopifyError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Commerce backend operation failed.
    #[error("Shopify error: {0}")]
    Shopify(#[from] ShopifyError),

    #[error("Reviews error: {0}")]
    Reviews(#[from] ReviewsError),

    #[error("Billing error: {0}")]
    Billing(#[from] BillingError),

    #[error("CMS error: {0}")]
    Cms(#[from] CmsError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Customer is not logged in.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Shopify(ShopifyError::NotFound(_)) | Self::Billing(BillingError::NotFound) => {
                StatusCode::NOT_FOUND
            }
            Self::Shopify(ShopifyError::UserError(_))
            | Self::Reviews(ReviewsError::Invalid(_))
            | Self::Billing(BillingError::InvalidTransition { .. }) => StatusCode::BAD_REQUEST,
            Self::Shopify(ShopifyError::RateLimited(_)) | Self::RateLimited => {
                StatusCode::TOO_MANY_REQUESTS
            }
            Self::Shopify(_) | Self::Reviews(_) | Self::Billing(_) | Self::Cms(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a customer.
    fn public_message(&self) -> String {
        match self {
            Self::Shopify(ShopifyError::UserError(msg))
            | Self::Reviews(ReviewsError::Invalid(msg)) => msg.clone(),
            Self::Billing(err @ BillingError::InvalidTransition { .. }) => err.to_string(),
            Self::Shopify(ShopifyError::NotFound(_)) | Self::Billing(BillingError::NotFound) => {
                "Not found".to_string()
            }
            Self::Shopify(ShopifyError::RateLimited(_)) | Self::RateLimited => {
                "Too many requests, please try again shortly".to_string()
            }
            Self::Shopify(_) | Self::Reviews(_) | Self::Billing(_) | Self::Cms(_) => {
                "External service error".to_string()
            }
            Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, self.public_message()).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Associate Sentry events with the logged-in customer.
pub fn set_sentry_user(email: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            email: Some(email.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the customer.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for customer actions.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("variant_id", "gid://...")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use larder_core::SubscriptionStatus;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_vendor_errors_map_to_gateway_or_client_errors() {
        assert_eq!(
            get_status(AppError::Cms(CmsError::Parse("bad".to_string()))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Billing(BillingError::Auth("no".to_string()))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Billing(BillingError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Billing(BillingError::InvalidTransition {
                status: SubscriptionStatus::Cancelled,
                action: "pause",
            })),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Shopify(ShopifyError::RateLimited(30))),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Reviews(ReviewsError::Invalid("x".to_string()))),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_vendor_details_are_hidden() {
        let err = AppError::Billing(BillingError::Api {
            status: 500,
            message: "stack trace from vendor".to_string(),
        });
        assert_eq!(err.public_message(), "External service error");
    }
}
