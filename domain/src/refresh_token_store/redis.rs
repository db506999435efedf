use super::RefreshTokenStore;
use crate::error::{DomainErrorKind, Error, InternalErrorKind};
use ::redis::aio::MultiplexedConnection;
use ::redis::{Client, RedisError, Script};
use async_trait::async_trait;
use entity::Id;
use log::*;

const KEY_PREFIX: &str = "refresh_token";

// Compare-and-set: replace the token only if it is still the expected one.
const ROTATE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[2], 'EX', ARGV[3])
    return 1
end
return 0
"#;

/// Refresh token store backed by Redis. Each record is a string key with a TTL equal
/// to the refresh token lifetime, so expiry is enforced by the server.
pub struct RedisRefreshTokenStore {
    client: Client,
    ttl_secs: u64,
    rotate_script: Script,
}

impl RedisRefreshTokenStore {
    /// Parses `url` without connecting. Connections are opened per operation.
    pub fn new(url: &str, ttl_secs: u64) -> Result<Self, Error> {
        let client = Client::open(url).map_err(|err| {
            error!("Invalid Redis URL for refresh token store: {err}");
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
            }
        })?;

        Ok(Self {
            client,
            ttl_secs,
            rotate_script: Script::new(ROTATE_SCRIPT),
        })
    }

    fn key(subject: &Id) -> String {
        format!("{KEY_PREFIX}:{subject}")
    }

    async fn connection(&self) -> Result<MultiplexedConnection, Error> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|err| unavailable("connect", err))
    }
}

fn unavailable(operation: &str, err: RedisError) -> Error {
    error!("Refresh token store unavailable during {operation}: {err}");
    Error::from(err)
}

#[async_trait]
impl RefreshTokenStore for RedisRefreshTokenStore {
    async fn store(&self, subject: &Id, token: &str) -> Result<(), Error> {
        let mut conn = self.connection().await?;
        let _: () = ::redis::cmd("SET")
            .arg(Self::key(subject))
            .arg(token)
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(|err| unavailable("store", err))?;
        Ok(())
    }

    async fn get(&self, subject: &Id) -> Result<Option<String>, Error> {
        let mut conn = self.connection().await?;
        let token: Option<String> = ::redis::cmd("GET")
            .arg(Self::key(subject))
            .query_async(&mut conn)
            .await
            .map_err(|err| unavailable("get", err))?;
        Ok(token)
    }

    async fn revoke(&self, subject: &Id) -> Result<(), Error> {
        let mut conn = self.connection().await?;
        let _: () = ::redis::cmd("DEL")
            .arg(Self::key(subject))
            .query_async(&mut conn)
            .await
            .map_err(|err| unavailable("revoke", err))?;
        Ok(())
    }

    async fn rotate(
        &self,
        subject: &Id,
        expected: &str,
        replacement: &str,
    ) -> Result<bool, Error> {
        let mut conn = self.connection().await?;
        let rotated: i64 = self
            .rotate_script
            .key(Self::key(subject))
            .arg(expected)
            .arg(replacement)
            .arg(self.ttl_secs)
            .invoke_async(&mut conn)
            .await
            .map_err(|err| unavailable("rotate", err))?;
        Ok(rotated == 1)
    }
}
