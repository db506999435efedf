use crate::{AppState, Error};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use domain::error::{AuthErrorKind, Error as DomainError};
use domain::users;
use log::*;

const BEARER: &str = "bearer";

/// The user behind the bearer access token of the current request.
pub(crate) struct AuthenticatedUser(pub users::Model);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = Error;

    // Reads `Authorization: Bearer <token>`, verifies it as an access token and loads
    // the active user it names. Anything else is rejected with a 401.
    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            trace!("Request without a bearer token to {}", parts.uri.path());
            DomainError::with_message(
                domain::error::DomainErrorKind::Auth(AuthErrorKind::Unauthenticated),
                "Missing bearer token",
            )
        })?;

        let user = state.sessions.authenticate(token).await?;
        Ok(AuthenticatedUser(user))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    if scheme.eq_ignore_ascii_case(BEARER) && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}
