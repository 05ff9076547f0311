//! Process-local replay store
use crate::{DuplicateSubmission, ReplayError, ReplayStore};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use ecofare_core::Fingerprint;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Fingerprint set guarded by one lock.
///
/// Expired entries are purged on every insert; there is no background task.
#[derive(Debug)]
pub struct InMemoryReplayStore {
    window: Duration,
    seen: Mutex<HashMap<Fingerprint, DateTime<Utc>>>,
}

impl InMemoryReplayStore {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_window_hours(hours: i64) -> Self {
        Self::new(Duration::hours(hours))
    }

    fn is_live(&self, accepted_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - accepted_at < self.window
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Fingerprint, DateTime<Utc>>> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryReplayStore {
    fn default() -> Self {
        Self::with_window_hours(24)
    }
}

#[async_trait]
impl ReplayStore for InMemoryReplayStore {
    async fn check_and_insert(
        &self,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Result<(), ReplayError> {
        let mut seen = self.lock();
        seen.retain(|_, accepted_at| self.is_live(*accepted_at, now));

        if let Some(first_accepted_at) = seen.get(fingerprint) {
            return Err(DuplicateSubmission {
                fingerprint: fingerprint.clone(),
                first_accepted_at: *first_accepted_at,
            }
            .into());
        }

        seen.insert(fingerprint.clone(), now);
        Ok(())
    }

    async fn release(&self, fingerprint: &Fingerprint) -> Result<(), ReplayError> {
        self.lock().remove(fingerprint);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, ReplayError> {
        let mut seen = self.lock();
        let before = seen.len();
        seen.retain(|_, accepted_at| self.is_live(*accepted_at, now));
        Ok(before - seen.len())
    }

    async fn len(&self) -> Result<usize, ReplayError> {
        Ok(self.lock().len())
    }
}
