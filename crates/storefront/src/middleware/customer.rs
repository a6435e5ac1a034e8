//! Customer session extractors.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{CurrentCustomer, session::keys};

/// Extractor for routes that need a signed-in customer.
///
/// Page requests without a customer are redirected to the login form;
/// `/api/` requests get a bare 401.
///
/// ```rust,ignore
/// async fn account(RequireCustomer(customer): RequireCustomer) -> impl IntoResponse {
///     format!("Signed in as {}", customer.email)
/// }
/// ```
pub struct RequireCustomer(pub CurrentCustomer);

pub enum CustomerRejection {
    RedirectToLogin,
    Unauthorized,
}

impl IntoResponse for CustomerRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/account/login").into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireCustomer
where
    S: Send + Sync,
{
    type Rejection = CustomerRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let rejection = || {
            if parts.uri.path().starts_with("/api/") {
                CustomerRejection::Unauthorized
            } else {
                CustomerRejection::RedirectToLogin
            }
        };

        let session = parts.extensions.get::<Session>().ok_or_else(rejection)?;

        session
            .get::<CurrentCustomer>(keys::CUSTOMER)
            .await
            .ok()
            .flatten()
            .map(Self)
            .ok_or_else(rejection)
    }
}

/// Extractor that yields the customer when one is signed in.
pub struct OptionalCustomer(pub Option<CurrentCustomer>);

impl<S> FromRequestParts<S> for OptionalCustomer
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let customer = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentCustomer>(keys::CUSTOMER)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        Ok(Self(customer))
    }
}

/// Store the signed-in customer, cycling the session ID.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_customer(
    session: &Session,
    customer: &CurrentCustomer,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(keys::CUSTOMER, customer).await
}

/// Forget the signed-in customer; the cart survives sign-out.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_customer(
    session: &Session,
) -> Result<Option<CurrentCustomer>, tower_sessions::session::Error> {
    session.remove::<CurrentCustomer>(keys::CUSTOMER).await
}
