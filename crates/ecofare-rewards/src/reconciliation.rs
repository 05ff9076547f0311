//! Reconciliation of undelivered rewards
//!
//! When the ledger record exists but the mint failed, the reward is queued
//! here. A host calls [`Reconciler::sweep`] on its own schedule; the
//! pipeline never spawns it. `NOT_ASSOCIATED` failures stay in the queue
//! because the rider may opt in later. Entries that exhaust their attempts
//! move to the dead-letter list for manual handling.

use crate::collaborators::{TokenIssuer, TokenMintError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// A verified journey whose tokens were not delivered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingReward {
    pub journey_id: String,
    pub rider: String,
    pub token_ref: String,
    pub amount: u64,
    /// Ledger transaction the reward is owed against
    pub ledger_transaction_ref: String,
    pub last_error: TokenMintError,
    /// Mint attempts so far, including the one made during distribution
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ReconciliationQueue {
    pending: Mutex<VecDeque<PendingReward>>,
    dead_letters: Mutex<Vec<PendingReward>>,
}

impl ReconciliationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, reward: PendingReward) {
        tracing::info!(
            journey_id = %reward.journey_id,
            rider = %reward.rider,
            amount = reward.amount,
            "reward queued for reconciliation"
        );
        self.lock_pending().push_back(reward);
    }

    pub fn pending(&self) -> Vec<PendingReward> {
        self.lock_pending().iter().cloned().collect()
    }

    pub fn dead_letters(&self) -> Vec<PendingReward> {
        self.dead_letters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Hand the dead letters to the caller and forget them
    pub fn take_dead_letters(&self) -> Vec<PendingReward> {
        std::mem::take(
            &mut *self
                .dead_letters
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    pub fn len(&self) -> usize {
        self.lock_pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_pending().is_empty()
    }

    fn take_all(&self) -> Vec<PendingReward> {
        self.lock_pending().drain(..).collect()
    }

    fn dead_letter(&self, reward: PendingReward) {
        tracing::error!(
            journey_id = %reward.journey_id,
            rider = %reward.rider,
            attempts = reward.attempts,
            error = %reward.last_error,
            "reward moved to dead letters"
        );
        self.dead_letters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(reward);
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, VecDeque<PendingReward>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub attempted: usize,
    pub delivered: usize,
    pub requeued: usize,
    pub dead_lettered: usize,
}

/// Retries queued mints against the token issuer
pub struct Reconciler {
    issuer: Arc<dyn TokenIssuer>,
    queue: Arc<ReconciliationQueue>,
    max_attempts: u32,
    step_timeout: Duration,
}

impl Reconciler {
    pub fn new(
        issuer: Arc<dyn TokenIssuer>,
        queue: Arc<ReconciliationQueue>,
        max_attempts: u32,
        step_timeout: Duration,
    ) -> Self {
        Self {
            issuer,
            queue,
            max_attempts,
            step_timeout,
        }
    }

    /// One pass over everything queued at call time
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        for mut reward in self.queue.take_all() {
            if reward.attempts >= self.max_attempts {
                report.dead_lettered += 1;
                self.queue.dead_letter(reward);
                continue;
            }

            report.attempted += 1;
            reward.attempts += 1;

            let attempt = tokio::time::timeout(
                self.step_timeout,
                self.issuer
                    .mint_and_transfer(&reward.token_ref, &reward.rider, reward.amount),
            )
            .await
            .unwrap_or_else(|_| {
                Err(TokenMintError::other(format!(
                    "no answer within {}ms",
                    self.step_timeout.as_millis()
                )))
            });

            match attempt {
                Ok(receipt) => {
                    report.delivered += 1;
                    tracing::info!(
                        journey_id = %reward.journey_id,
                        transfer_ref = %receipt.transfer_ref,
                        attempts = reward.attempts,
                        "reconciled reward delivered"
                    );
                }
                Err(err) => {
                    reward.last_error = err;
                    if reward.attempts >= self.max_attempts {
                        report.dead_lettered += 1;
                        self.queue.dead_letter(reward);
                    } else {
                        report.requeued += 1;
                        self.queue.lock_pending().push_back(reward);
                    }
                }
            }
        }

        report
    }
}
