use crate::cookies::{clear_refresh_cookie, refresh_cookie, REFRESH_COOKIE};
use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::{AppState, Error};
use axum::{extract::State, response::IntoResponse, Json};
use axum_extra::extract::cookie::CookieJar;
use domain::error::{AuthErrorKind, DomainErrorKind, Error as DomainError};
use domain::jwt::TokenPair;
use domain::user::Credentials;
use log::*;
use serde_json::json;

/// Logs the user in and returns a fresh access/refresh token pair.
///
/// The refresh token is also set as an HTTP-only `refresh_token` cookie. Any refresh
/// token issued to this user before stops working.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = Credentials,
    responses(
        (status = 200, description = "Logged in, sets the refresh token cookie", body = TokenPair),
        (status = 401, description = "Invalid email or password"),
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Json(credentials): Json<Credentials>,
) -> Result<impl IntoResponse, Error> {
    debug!("Login attempt for {}", credentials.email);

    let tokens = app_state.sessions.login(&credentials).await?;
    let jar = jar.add(session_cookie(&app_state, &tokens));

    Ok((jar, Json(tokens)))
}

/// Exchanges the refresh token cookie for a new token pair.
///
/// The presented token is consumed: replaying it afterwards fails with 401.
#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    responses(
        (status = 200, description = "Rotated the session, sets the new refresh token cookie", body = TokenPair),
        (status = 401, description = "Missing, invalid, expired or superseded refresh token"),
    )
)]
pub async fn refresh(
    State(app_state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, Error> {
    let presented = jar
        .get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            debug!("Refresh requested without a refresh token cookie");
            DomainError::with_message(
                DomainErrorKind::Auth(AuthErrorKind::Unauthenticated),
                "Missing refresh token",
            )
        })?;

    let tokens = app_state.sessions.refresh(&presented).await?;
    let jar = jar.add(session_cookie(&app_state, &tokens));

    Ok((jar, Json(tokens)))
}

/// Logs the user out by revoking their refresh token and clearing the cookie.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 200, description = "Successfully logged out"),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout(
    AuthenticatedUser(user): AuthenticatedUser,
    State(app_state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, Error> {
    app_state.sessions.logout(&user.id).await?;

    let jar = jar.add(clear_refresh_cookie(!app_state.config.is_development()));

    Ok((jar, Json(json!({"message": "Successfully logged out"}))))
}

fn session_cookie(
    app_state: &AppState,
    tokens: &TokenPair,
) -> axum_extra::extract::cookie::Cookie<'static> {
    refresh_cookie(
        &tokens.refresh_token,
        app_state.sessions.refresh_ttl_secs(),
        !app_state.config.is_development(),
    )
}
