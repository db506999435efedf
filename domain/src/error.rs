//! Error types for the `domain` layer.
use entity_api::error::{EntityApiErrorKind, Error as EntityApiError};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree structure
/// with `domain::error::Error` as the root type holding a tree of `error_kind`
/// enums that represent the kinds of errors that can occur in the domain layer or
/// in lower layers. The `source` field is used to hold the original error that caused
/// the domain error. The intent is to translate errors between layers while maintaining
/// layer boundaries. Ex. `domain` is dependent on `entity_api`, and `web` is dependent on `domain`,
/// but `web` should not be dependent, directly, on `entity_api`. Ultimately the various
/// `error_kind`s are used by `web` to return appropriate HTTP status codes and messages to the client.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Auth(AuthErrorKind),
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
}

/// Credential and authorization failures. All but `AccessDenied` are reported as 401.
#[derive(Debug, PartialEq)]
pub enum AuthErrorKind {
    /// Bad signature, missing subject or the wrong token kind.
    TokenInvalid,
    TokenExpired,
    /// The token looked fine but the session behind it is gone: revoked, superseded by a
    /// rotation, or the account no longer exists or is inactive.
    Unauthenticated,
    /// Wrong email or password at login.
    InvalidCredentials,
    /// Authenticated but not allowed to touch the target resource.
    AccessDenied,
}

/// Enum representing the various kinds of internal errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Entity(EntityErrorKind),
    Config,
    Other(String),
}

/// Enum representing the various kinds of entity errors that can bubble up from the "Entity" layer (`entity_api` and `entity`).
/// These errors are translated from the `entity_api` layer to the `domain` layer and reduced to a subset of error kinds
/// that are relevant to the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum EntityErrorKind {
    NotFound,
    Invalid,
    Conflict,
    Other(String),
}

/// Failures of collaborators outside this process.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    /// The refresh token store could not be reached. Callers fail closed.
    StoreUnavailable,
    /// The data layer could not serve the request.
    DataUnavailable,
    Other(String),
}

impl Error {
    pub fn new(error_kind: DomainErrorKind) -> Self {
        Self {
            source: None,
            error_kind,
        }
    }

    pub fn auth(kind: AuthErrorKind) -> Self {
        Self::new(DomainErrorKind::Auth(kind))
    }

    pub fn entity(kind: EntityErrorKind) -> Self {
        Self::new(DomainErrorKind::Internal(InternalErrorKind::Entity(kind)))
    }

    /// An error whose `source` is a human readable explanation, surfaced to clients
    /// for 4xx responses.
    pub fn with_message(error_kind: DomainErrorKind, message: impl Into<String>) -> Self {
        Self {
            source: Some(Box::new(Message(message.into()))),
            error_kind,
        }
    }

    /// The client-facing explanation, if one was attached with `with_message`.
    pub fn message(&self) -> Option<&str> {
        self.source
            .as_ref()?
            .downcast_ref::<Message>()
            .map(|message| message.0.as_str())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::with_message(
            DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::Invalid)),
            message,
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_message(
            DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::NotFound)),
            message,
        )
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::with_message(
            DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::Conflict)),
            message,
        )
    }

    pub fn store_unavailable(source: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            source: Some(Box::new(source)),
            error_kind: DomainErrorKind::External(ExternalErrorKind::StoreUnavailable),
        }
    }
}

/// Human readable explanation carried as the `source` of client errors.
#[derive(Debug)]
pub struct Message(pub String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for Message {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Domain Error: {self:?}")
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// This is where we translate errors from the `entity_api` layer to the `domain` layer.
impl From<EntityApiError> for Error {
    fn from(err: EntityApiError) -> Self {
        let error_kind = match err.error_kind {
            EntityApiErrorKind::RecordNotFound => {
                DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::NotFound))
            }
            EntityApiErrorKind::RecordAlreadyExists => {
                DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::Conflict))
            }
            EntityApiErrorKind::ValidationError => {
                DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::Invalid))
            }
            EntityApiErrorKind::RecordUnauthenticated => {
                DomainErrorKind::Auth(AuthErrorKind::InvalidCredentials)
            }
            EntityApiErrorKind::SystemError => {
                DomainErrorKind::External(ExternalErrorKind::DataUnavailable)
            }
            EntityApiErrorKind::Other => DomainErrorKind::Internal(InternalErrorKind::Entity(
                EntityErrorKind::Other("EntityErrorKind".to_string()),
            )),
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        let auth_kind = match err.kind() {
            JwtErrorKind::ExpiredSignature => AuthErrorKind::TokenExpired,
            _ => AuthErrorKind::TokenInvalid,
        };

        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Auth(auth_kind),
        }
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::store_unavailable(err)
    }
}
