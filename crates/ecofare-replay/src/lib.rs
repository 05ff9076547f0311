//! Ecofare Replay: duplicate ticket detection
//!
//! Every accepted ticket fingerprint is registered in a [`ReplayStore`] for a
//! rolling window. A second submission inside the window is rejected with the
//! time of the first acceptance.
//!
//! The store must perform check-and-insert atomically: two concurrent
//! submissions of one fingerprint must never both pass. [`InMemoryReplayStore`]
//! does this under a single lock and is only correct within one process; a
//! multi-instance deployment needs a shared store implementing the same trait
//! with an atomic set-if-absent.

mod memory;

pub use memory::InMemoryReplayStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ecofare_core::{Fingerprint, JourneyDraft};
use std::sync::Arc;
use thiserror::Error;

/// A fingerprint already accepted inside the window
#[derive(Debug, Clone, PartialEq, Error)]
#[error("REPLAY/DUPLICATE: ticket {fingerprint} already accepted at {first_accepted_at}")]
pub struct DuplicateSubmission {
    pub fingerprint: Fingerprint,
    pub first_accepted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReplayError {
    #[error(transparent)]
    Duplicate(#[from] DuplicateSubmission),

    #[error("REPLAY/STORE: {0}")]
    Unavailable(String),
}

/// TTL-indexed set of accepted fingerprints
#[async_trait]
pub trait ReplayStore: Send + Sync {
    /// Register `fingerprint` at `now` unless a live registration exists.
    ///
    /// Must be atomic with respect to concurrent callers.
    async fn check_and_insert(
        &self,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Result<(), ReplayError>;

    /// Drop a registration so the ticket can be submitted again
    async fn release(&self, fingerprint: &Fingerprint) -> Result<(), ReplayError>;

    /// Remove registrations older than the window, returning how many went
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, ReplayError>;

    /// Number of registrations currently held (live or not yet purged)
    async fn len(&self) -> Result<usize, ReplayError>;
}

/// Pipeline-facing replay check
#[derive(Clone)]
pub struct ReplayDetector {
    store: Arc<dyn ReplayStore>,
}

impl ReplayDetector {
    pub fn new(store: Arc<dyn ReplayStore>) -> Self {
        Self { store }
    }

    /// Reject the draft if its ticket was already accepted, else register it
    pub async fn check(&self, draft: &JourneyDraft, now: DateTime<Utc>) -> Result<(), ReplayError> {
        let fingerprint = &draft.raw_encoding_fingerprint;
        match self.store.check_and_insert(fingerprint, now).await {
            Ok(()) => {
                tracing::debug!(fingerprint = fingerprint.short(), "fingerprint registered");
                Ok(())
            }
            Err(ReplayError::Duplicate(dup)) => {
                tracing::warn!(
                    fingerprint = fingerprint.short(),
                    first_accepted_at = %dup.first_accepted_at,
                    "duplicate ticket submission"
                );
                Err(ReplayError::Duplicate(dup))
            }
            Err(err) => Err(err),
        }
    }

    /// Forget the draft's fingerprint
    pub async fn release(&self, draft: &JourneyDraft) -> Result<(), ReplayError> {
        self.store.release(&draft.raw_encoding_fingerprint).await
    }
}
