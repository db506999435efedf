//! The authoritative record of each user's single valid refresh token.
//!
//! Two interchangeable backends sit behind [`RefreshTokenStore`]: [`memory`] for a
//! single process and [`redis`] for a shared key-value store. The backend is picked by
//! `Config::refresh_token_backend`. Backend I/O failures surface as
//! `ExternalErrorKind::StoreUnavailable` and callers must treat them as an
//! authentication failure.

use crate::error::Error;
use async_trait::async_trait;
use entity::Id;
use log::*;
use service::config::{Config, RefreshTokenBackend};
use std::sync::Arc;
use std::time::Duration;

pub mod memory;
pub mod redis;

pub use memory::MemoryRefreshTokenStore;
pub use self::redis::RedisRefreshTokenStore;

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Overwrites the subject's record and resets its TTL.
    async fn store(&self, subject: &Id, token: &str) -> Result<(), Error>;

    /// The current token, or `None` if never stored, revoked or expired.
    async fn get(&self, subject: &Id) -> Result<Option<String>, Error>;

    /// Removes the record. Revoking an absent subject is not an error.
    async fn revoke(&self, subject: &Id) -> Result<(), Error>;

    async fn is_valid(&self, subject: &Id, token: &str) -> Result<bool, Error> {
        Ok(self.get(subject).await?.as_deref() == Some(token))
    }

    /// Atomically replaces the record with `replacement` (resetting the TTL) only if it
    /// currently equals `expected`. Returns whether the swap happened.
    async fn rotate(&self, subject: &Id, expected: &str, replacement: &str)
        -> Result<bool, Error>;
}

pub fn from_config(config: &Config) -> Result<Arc<dyn RefreshTokenStore>, Error> {
    let ttl_secs = config.refresh_token_ttl_secs();

    info!(
        "Using {} refresh token store",
        config.refresh_token_backend
    );

    match config.refresh_token_backend {
        RefreshTokenBackend::Memory => Ok(Arc::new(MemoryRefreshTokenStore::new(
            Duration::from_secs(ttl_secs),
        ))),
        RefreshTokenBackend::Redis => Ok(Arc::new(RedisRefreshTokenStore::new(
            config.redis_url(),
            ttl_secs,
        )?)),
    }
}
