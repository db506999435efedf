use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::{AppState, Error};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use domain::user::NewUser;
use domain::{user as UserApi, users};

use log::*;

/// CREATE a new User
#[utoipa::path(
    post,
    path = "/v1/auth/signup",
    request_body = NewUser,
    responses(
        (status = 201, description = "Successfully created a new User", body = users::Model),
        (status = 409, description = "Email or username already registered"),
        (status = 422, description = "Unprocessable Entity"),
    )
)]
pub async fn signup(
    State(app_state): State<AppState>,
    Json(new_user): Json<NewUser>,
) -> Result<impl IntoResponse, Error> {
    debug!("CREATE new User with email: {}", new_user.email);

    let user: users::Model = UserApi::create(app_state.db(), new_user).await?;

    info!("Signed up new User {}", user.id);

    Ok((StatusCode::CREATED, Json(user)))
}

/// GET the currently authenticated User
#[utoipa::path(
    get,
    path = "/v1/auth/me",
    responses(
        (status = 200, description = "The User the access token was issued to", body = users::Model),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me(AuthenticatedUser(user): AuthenticatedUser) -> Result<impl IntoResponse, Error> {
    Ok(Json(user))
}
