use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use domain::error::{
    AuthErrorKind, DomainErrorKind, EntityErrorKind, Error as DomainError, ExternalErrorKind,
    InternalErrorKind,
};

use log::*;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(DomainError);

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl Error {
    /// Status, machine readable code and default message for the wrapped domain error.
    fn classify(&self) -> (StatusCode, &'static str, &'static str) {
        match &self.0.error_kind {
            DomainErrorKind::Auth(auth_error_kind) => match auth_error_kind {
                AuthErrorKind::TokenInvalid => (
                    StatusCode::UNAUTHORIZED,
                    "TOKEN_INVALID",
                    "Invalid token",
                ),
                AuthErrorKind::TokenExpired => (
                    StatusCode::UNAUTHORIZED,
                    "TOKEN_EXPIRED",
                    "Token has expired",
                ),
                AuthErrorKind::Unauthenticated => (
                    StatusCode::UNAUTHORIZED,
                    "AUTHENTICATION_ERROR",
                    "Authentication required",
                ),
                AuthErrorKind::InvalidCredentials => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_CREDENTIALS",
                    "Invalid email or password",
                ),
                AuthErrorKind::AccessDenied => (
                    StatusCode::FORBIDDEN,
                    "ACCESS_DENIED",
                    "Access denied",
                ),
            },
            DomainErrorKind::Internal(internal_error_kind) => match internal_error_kind {
                InternalErrorKind::Entity(entity_error_kind) => match entity_error_kind {
                    EntityErrorKind::NotFound => {
                        (StatusCode::NOT_FOUND, "NOT_FOUND", "Resource not found")
                    }
                    EntityErrorKind::Invalid => (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "VALIDATION_ERROR",
                        "Validation failed",
                    ),
                    EntityErrorKind::Conflict => {
                        (StatusCode::CONFLICT, "CONFLICT", "Resource already exists")
                    }
                    EntityErrorKind::Other(_) => internal_error(),
                },
                InternalErrorKind::Config | InternalErrorKind::Other(_) => internal_error(),
            },
            DomainErrorKind::External(external_error_kind) => match external_error_kind {
                // Fail closed: an unreachable token store looks like a lost session.
                ExternalErrorKind::StoreUnavailable => (
                    StatusCode::UNAUTHORIZED,
                    "AUTHENTICATION_ERROR",
                    "Authentication required",
                ),
                ExternalErrorKind::DataUnavailable => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable",
                ),
                ExternalErrorKind::Other(_) => internal_error(),
            },
        }
    }
}

fn internal_error() -> (StatusCode, &'static str, &'static str) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "Internal server error",
    )
}

// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html#associatedconstant.UNPROCESSABLE_ENTITY
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code, default_message) = self.classify();

        match &self.0.error_kind {
            DomainErrorKind::External(ExternalErrorKind::StoreUnavailable) => {
                error!("Refresh token store unavailable, rejecting request: {:?}", self.0);
            }
            DomainErrorKind::Auth(_) => debug!("Request rejected ({code}): {:?}", self.0),
            _ if status.is_server_error() => error!("Request failed ({code}): {:?}", self.0),
            _ => debug!("Request rejected ({code}): {:?}", self.0),
        }

        // Internal details never reach the client.
        let message = if status.is_client_error() {
            self.0.message().unwrap_or(default_message)
        } else {
            default_message
        };

        let body = json!({
            "error": {
                "code": code,
                "message": message,
            }
        });

        (status, Json(body)).into_response()
    }
}

impl<E> From<E> for Error
where
    E: Into<DomainError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
