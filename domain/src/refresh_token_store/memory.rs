use super::RefreshTokenStore;
use crate::error::Error;
use async_trait::async_trait;
use dashmap::DashMap;
use entity::Id;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Record {
    token: String,
    expires_at: Instant,
}

impl Record {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-process refresh token store. Records are lost on restart, which logs every
/// user out. Each operation holds the map entry lock for its whole read-modify-write,
/// so operations on one subject are linearizable.
pub struct MemoryRefreshTokenStore {
    records: DashMap<Id, Record>,
    ttl: Duration,
}

impl MemoryRefreshTokenStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: DashMap::new(),
            ttl,
        }
    }

    fn record(&self, token: &str) -> Record {
        Record {
            token: token.to_string(),
            expires_at: Instant::now() + self.ttl,
        }
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn store(&self, subject: &Id, token: &str) -> Result<(), Error> {
        self.records.insert(subject.clone(), self.record(token));
        Ok(())
    }

    async fn get(&self, subject: &Id) -> Result<Option<String>, Error> {
        if let Some(record) = self.records.get(subject) {
            if !record.is_expired() {
                return Ok(Some(record.token.clone()));
            }
        }

        // Expired records are removed lazily.
        self.records.remove_if(subject, |_, record| record.is_expired());
        Ok(None)
    }

    async fn revoke(&self, subject: &Id) -> Result<(), Error> {
        self.records.remove(subject);
        Ok(())
    }

    async fn rotate(
        &self,
        subject: &Id,
        expected: &str,
        replacement: &str,
    ) -> Result<bool, Error> {
        let Some(mut record) = self.records.get_mut(subject) else {
            return Ok(false);
        };

        if record.is_expired() || record.token != expected {
            return Ok(false);
        }

        *record = self.record(replacement);
        Ok(true)
    }
}
