//! Login, refresh-token rotation and logout.
//!
//! Per user a session moves `NoSession -> Active -> (Rotated -> Active)* -> Revoked`.
//! Only the newest refresh token issued to a user is ever accepted: `login` and
//! `refresh` overwrite the stored record and `logout` deletes it.

use crate::error::{AuthErrorKind, Error};
use crate::jwt::{claims::TokenKind, TokenCodec, TokenPair};
use crate::refresh_token_store::RefreshTokenStore;
use entity_api::user::{authenticate, Credentials};
use entity_api::{users, Database, Id, UserRepository};
use log::*;
use std::sync::Arc;

pub struct SessionManager {
    codec: TokenCodec,
    store: Arc<dyn RefreshTokenStore>,
    database: Arc<dyn Database>,
}

impl SessionManager {
    pub fn new(
        codec: TokenCodec,
        store: Arc<dyn RefreshTokenStore>,
        database: Arc<dyn Database>,
    ) -> Self {
        Self {
            codec,
            store,
            database,
        }
    }

    pub fn refresh_ttl_secs(&self) -> u64 {
        self.codec.refresh_ttl_secs()
    }

    /// Checks `credentials` and starts a new session, replacing any refresh token the
    /// user already had.
    pub async fn login(&self, credentials: &Credentials) -> Result<TokenPair, Error> {
        let user = match authenticate(self.database.as_ref(), credentials).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!("Login failed: no account for {}", credentials.email);
                return Err(Error::auth(AuthErrorKind::InvalidCredentials));
            }
            Err(err) => {
                warn!("Login failed for {}", credentials.email);
                return Err(err.into());
            }
        };

        if !user.is_active {
            warn!("Login refused for inactive user {}", user.id);
            return Err(Error::auth(AuthErrorKind::Unauthenticated));
        }

        let pair = self.issue_pair(&user.id)?;
        self.store.store(&user.id, &pair.refresh_token).await?;

        info!("User {} logged in", user.id);
        Ok(pair)
    }

    /// Exchanges the current refresh token for a new pair. The presented token stops
    /// working as soon as this succeeds, and a token that was already rotated away,
    /// revoked or expired is rejected.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, Error> {
        let subject = self.codec.verify(refresh_token, TokenKind::Refresh)?;
        self.active_user(&subject).await?;

        let pair = self.issue_pair(&subject)?;

        if !self
            .store
            .rotate(&subject, refresh_token, &pair.refresh_token)
            .await?
        {
            warn!("Rejected superseded or revoked refresh token for user {subject}");
            return Err(Error::auth(AuthErrorKind::Unauthenticated));
        }

        debug!("Rotated refresh token for user {subject}");
        Ok(pair)
    }

    /// Revokes the user's refresh token. Access tokens already issued stay valid until
    /// they expire.
    pub async fn logout(&self, subject: &Id) -> Result<(), Error> {
        self.store.revoke(subject).await?;
        info!("User {subject} logged out");
        Ok(())
    }

    /// Resolves an access token to its active account.
    pub async fn authenticate(&self, access_token: &str) -> Result<users::Model, Error> {
        let subject = self.codec.verify(access_token, TokenKind::Access)?;
        self.active_user(&subject).await
    }

    fn issue_pair(&self, subject: &Id) -> Result<TokenPair, Error> {
        Ok(TokenPair::bearer(
            self.codec.issue_access(subject)?,
            self.codec.issue_refresh(subject)?,
        ))
    }

    async fn active_user(&self, subject: &Id) -> Result<users::Model, Error> {
        match self.database.find_user_by_id(subject).await? {
            Some(user) if user.is_active => Ok(user),
            Some(_) => {
                warn!("Token presented for inactive user {subject}");
                Err(Error::auth(AuthErrorKind::Unauthenticated))
            }
            None => {
                warn!("Token presented for unknown user {subject}");
                Err(Error::auth(AuthErrorKind::Unauthenticated))
            }
        }
    }
}
