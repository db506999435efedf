//! Signing and verification of access and refresh tokens.
//!
//! `TokenCodec` is a pure function of the process secret and the clock: it keeps no
//! state beyond its keys, so one instance is shared by every request.

use crate::error::{AuthErrorKind, DomainErrorKind, Error, InternalErrorKind};
use claims::{Claims, TokenKind};
use entity::{new_id, Id};
use jsonwebtoken::{
    decode, encode, get_current_timestamp, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use log::*;
use service::config::Config;
use std::str::FromStr;

// re-export the TokenPair struct from the entity module
pub use entity::jwt::TokenPair;

pub mod claims;

pub struct TokenCodec {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
}

impl TokenCodec {
    pub fn new(
        secret: &str,
        algorithm: Algorithm,
        access_ttl_secs: u64,
        refresh_ttl_secs: u64,
    ) -> Self {
        Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    /// Builds the codec from the signing secret, algorithm and lifetimes in `config`.
    /// A missing secret is a configuration error.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let secret = config.jwt_secret_key().ok_or_else(|| {
            error!("No JWT secret key configured");
            Error::with_message(
                DomainErrorKind::Internal(InternalErrorKind::Config),
                "JWT_SECRET_KEY is required",
            )
        })?;

        let algorithm = Algorithm::from_str(config.jwt_algorithm()).map_err(|err| Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
        })?;

        Ok(Self::new(
            secret,
            algorithm,
            config.access_token_ttl_secs(),
            config.refresh_token_ttl_secs(),
        ))
    }

    pub fn refresh_ttl_secs(&self) -> u64 {
        self.refresh_ttl_secs
    }

    pub fn issue_access(&self, subject: &Id) -> Result<String, Error> {
        self.issue(subject, TokenKind::Access, self.access_ttl_secs)
    }

    pub fn issue_refresh(&self, subject: &Id) -> Result<String, Error> {
        self.issue(subject, TokenKind::Refresh, self.refresh_ttl_secs)
    }

    fn issue(&self, subject: &Id, kind: TokenKind, ttl_secs: u64) -> Result<String, Error> {
        let now = get_current_timestamp();
        let claims = Claims {
            sub: subject.clone(),
            exp: now + ttl_secs,
            iat: now,
            jti: new_id(),
            kind,
        };

        Ok(encode(&Header::new(self.algorithm), &claims, &self.encoding_key)?)
    }

    /// Returns the subject of `token` if its signature, expiry and kind all check out.
    ///
    /// Fails with `TokenExpired` past expiry and with `TokenInvalid` for everything else,
    /// including a token of the other kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Id, Error> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|err| {
                debug!("Rejected {expected} token: {err}");
                Error::from(err)
            })?
            .claims;

        if claims.kind != expected {
            debug!("Expected {expected} token but got {}", claims.kind);
            return Err(Error::auth(AuthErrorKind::TokenInvalid));
        }

        if claims.sub.is_empty() {
            return Err(Error::auth(AuthErrorKind::TokenInvalid));
        }

        Ok(claims.sub)
    }
}
