use serde::Serialize;
use utoipa::ToSchema;

/// Represents the pair of tokens handed to a client on login or refresh.
/// Note: This struct does not have a corresponding entity in the database.
///
/// - `access_token`: short-lived bearer credential for individual API calls.
/// - `refresh_token`: longer-lived credential exchanged for a new pair. It is also
///   delivered as an HTTP-only cookie.
/// - `token_type`: always `bearer`.
#[derive(Clone, Serialize, Debug, ToSchema)]
#[schema(as = jwt::TokenPair)] // OpenAPI schema
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl TokenPair {
    pub fn bearer(access_token: String, refresh_token: String) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
        }
    }
}
