//! Reward distributor
//!
//! Writes a verified journey to three systems in a fixed order:
//!
//! 1. ledger append: fatal on failure, nothing else runs
//! 2. contract invocation: failure recorded, distribution continues
//! 3. token mint+transfer: failure recorded and queued for reconciliation
//!
//! Every call is bounded by `rewards.step_timeout_ms`; an elapsed deadline
//! takes the step's ordinary failure path.

use crate::collaborators::{
    ContractExecutionError, ContractExecutor, LedgerAppender, LedgerRecordError, TokenIssuer,
    TokenMintError,
};
use crate::outcome::{
    ContractInvocationResult, ContractStatus, DistributionStep, LedgerRecord,
    RewardDistributionOutcome, RewardStatus, StepOutcome, StepRecord, TokenMintResult,
};
use crate::reconciliation::{PendingReward, ReconciliationQueue};
use crate::state::{DistributionState, StateMachine};
use chrono::{DateTime, Utc};
use ecofare_core::{CarbonAnalysis, Fingerprint, JourneyDraft, RewardsConfig, SourceFormat, StationId};
use ecofare_fraud::FraudAnalysis;
use rand::Rng;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// `floor(saved_grams / 1000 × multiplier)`, never negative
pub fn calculate_tokens(carbon_saved_grams: f64, multiplier: f64) -> u64 {
    let tokens = (carbon_saved_grams / 1000.0 * multiplier).floor();
    if tokens.is_finite() && tokens > 0.0 {
        tokens as u64
    } else {
        0
    }
}

/// Timestamp, station pair and a random suffix, e.g.
/// `JRN-20260512T090000123-CAI-ORI-9f3a61c2`
pub fn generate_journey_id(at: DateTime<Utc>, from: &StationId, to: &StationId) -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!(
        "JRN-{}-{}-{}-{:08x}",
        at.format("%Y%m%dT%H%M%S%3f"),
        id_segment(from),
        id_segment(to),
        suffix
    )
}

fn id_segment(station: &StationId) -> String {
    station
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

/// What the distributor needs for one journey
#[derive(Debug, Clone)]
pub struct DistributionRequest<'a> {
    pub rider: &'a str,
    pub draft: &'a JourneyDraft,
    pub carbon: CarbonAnalysis,
    pub fraud: FraudAnalysis,
    pub now: DateTime<Utc>,
}

/// Immutable journey record written to the ledger
#[derive(Debug, Serialize)]
pub struct JourneyRecord<'a> {
    pub journey_id: &'a str,
    pub rider: &'a str,
    pub from_station: &'a StationId,
    pub to_station: &'a StationId,
    pub distance_meters: u32,
    pub observed_at: DateTime<Utc>,
    pub source_format: SourceFormat,
    pub fingerprint: &'a Fingerprint,
    pub carbon_saved_grams: f64,
    pub tokens_earned: u64,
    pub fraud_score: u32,
    pub recorded_at: DateTime<Utc>,
}

pub struct RewardDistributor {
    ledger: Arc<dyn LedgerAppender>,
    contract: Arc<dyn ContractExecutor>,
    issuer: Arc<dyn TokenIssuer>,
    queue: Arc<ReconciliationQueue>,
    config: RewardsConfig,
}

impl RewardDistributor {
    pub fn new(
        ledger: Arc<dyn LedgerAppender>,
        contract: Arc<dyn ContractExecutor>,
        issuer: Arc<dyn TokenIssuer>,
        queue: Arc<ReconciliationQueue>,
        config: RewardsConfig,
    ) -> Self {
        Self {
            ledger,
            contract,
            issuer,
            queue,
            config,
        }
    }

    pub fn queue(&self) -> &Arc<ReconciliationQueue> {
        &self.queue
    }

    /// Run the distribution. Only a ledger failure returns `Err`.
    pub async fn distribute(
        &self,
        request: DistributionRequest<'_>,
    ) -> Result<RewardDistributionOutcome, LedgerRecordError> {
        let DistributionRequest {
            rider,
            draft,
            carbon,
            fraud,
            now,
        } = request;

        let mut machine = StateMachine::new();
        let mut steps = Vec::with_capacity(3);
        let journey_id = generate_journey_id(now, &draft.from_station, &draft.to_station);
        let tokens_earned = calculate_tokens(carbon.carbon_saved_grams, self.config.multiplier);

        // 1. ledger
        let record = JourneyRecord {
            journey_id: &journey_id,
            rider,
            from_station: &draft.from_station,
            to_station: &draft.to_station,
            distance_meters: draft.distance_meters,
            observed_at: draft.observed_at,
            source_format: draft.source_format,
            fingerprint: &draft.raw_encoding_fingerprint,
            carbon_saved_grams: carbon.carbon_saved_grams,
            tokens_earned,
            fraud_score: fraud.score,
            recorded_at: now,
        };
        let ledger_record = match self.record_on_ledger(&record).await {
            Ok((ledger_record, latency_ms)) => {
                steps.push(StepRecord {
                    step: DistributionStep::LedgerAppend,
                    outcome: StepOutcome::Succeeded,
                    latency_ms,
                });
                advance(&mut machine, DistributionState::LedgerRecorded);
                ledger_record
            }
            Err(err) => {
                advance(&mut machine, DistributionState::Aborted);
                tracing::error!(journey_id = %journey_id, error = %err, "ledger append failed, distribution aborted");
                return Err(err);
            }
        };

        // 2. contract
        let contract_invocation = self
            .invoke_contract(&journey_id, rider, draft, &carbon, tokens_earned, &mut steps)
            .await;
        advance(&mut machine, DistributionState::ContractAttempted);

        // 3. mint
        let (token_mint, reward_status) = self
            .mint_reward(&journey_id, rider, tokens_earned, &ledger_record, now, &mut steps)
            .await;
        advance(&mut machine, DistributionState::MintAttempted);
        advance(&mut machine, DistributionState::Complete);

        tracing::info!(
            journey_id = %journey_id,
            tokens_earned,
            reward_status = ?reward_status,
            contract_ok = contract_invocation.is_success(),
            "journey distributed"
        );

        Ok(RewardDistributionOutcome {
            journey_id,
            rider: rider.to_string(),
            ledger_record,
            contract_invocation,
            token_mint,
            tokens_earned,
            reward_status,
            state: machine.state(),
            steps,
            carbon,
            fraud,
            proofs: Vec::new(),
            processed_at: now,
        })
    }

    async fn record_on_ledger(
        &self,
        record: &JourneyRecord<'_>,
    ) -> Result<(LedgerRecord, u64), LedgerRecordError> {
        let payload = serde_json::to_vec(record)
            .map_err(|e| LedgerRecordError::Rejected(format!("journey record not serializable: {}", e)))?;

        let start = Instant::now();
        let receipt = self
            .bounded(
                self.ledger.append(&self.config.topic_ref, &payload),
                LedgerRecordError::TimedOut,
            )
            .await?;

        Ok((
            LedgerRecord {
                topic_ref: self.config.topic_ref.clone(),
                sequence_ref: receipt.sequence_ref,
                transaction_ref: receipt.transaction_ref,
            },
            elapsed_ms(start),
        ))
    }

    async fn invoke_contract(
        &self,
        journey_id: &str,
        rider: &str,
        draft: &JourneyDraft,
        carbon: &CarbonAnalysis,
        tokens_earned: u64,
        steps: &mut Vec<StepRecord>,
    ) -> ContractInvocationResult {
        let args = [
            serde_json::json!(journey_id),
            serde_json::json!(rider),
            serde_json::json!(draft.from_station),
            serde_json::json!(draft.to_station),
            serde_json::json!(draft.distance_meters),
            serde_json::json!(carbon.carbon_saved_grams.round() as u64),
            serde_json::json!(tokens_earned),
        ];

        let start = Instant::now();
        let result = self
            .bounded(
                self.contract
                    .invoke(&self.config.contract_ref, &self.config.function_name, &args),
                ContractExecutionError::TimedOut,
            )
            .await;
        let latency_ms = elapsed_ms(start);

        match result {
            Ok(receipt) => {
                steps.push(StepRecord {
                    step: DistributionStep::ContractInvoke,
                    outcome: StepOutcome::Succeeded,
                    latency_ms,
                });
                ContractInvocationResult {
                    status: ContractStatus::Success,
                    transaction_ref: Some(receipt.transaction_ref),
                    contract_status: Some(receipt.status),
                    error: None,
                }
            }
            Err(err) => {
                tracing::warn!(journey_id, error = %err, "contract invocation failed, continuing");
                steps.push(StepRecord {
                    step: DistributionStep::ContractInvoke,
                    outcome: StepOutcome::Failed {
                        reason: err.to_string(),
                    },
                    latency_ms,
                });
                ContractInvocationResult::failed(err)
            }
        }
    }

    async fn mint_reward(
        &self,
        journey_id: &str,
        rider: &str,
        amount: u64,
        ledger_record: &LedgerRecord,
        now: DateTime<Utc>,
        steps: &mut Vec<StepRecord>,
    ) -> (Option<TokenMintResult>, RewardStatus) {
        if amount == 0 {
            steps.push(StepRecord {
                step: DistributionStep::TokenMint,
                outcome: StepOutcome::Skipped {
                    reason: "journey earned no tokens".to_string(),
                },
                latency_ms: 0,
            });
            return (None, RewardStatus::NoReward);
        }

        let start = Instant::now();
        let result = self
            .bounded(
                self.issuer
                    .mint_and_transfer(&self.config.token_ref, rider, amount),
                |ms| TokenMintError::other(format!("no answer within {}ms", ms)),
            )
            .await;
        let latency_ms = elapsed_ms(start);

        match result {
            Ok(receipt) => {
                steps.push(StepRecord {
                    step: DistributionStep::TokenMint,
                    outcome: StepOutcome::Succeeded,
                    latency_ms,
                });
                let mint = TokenMintResult {
                    amount,
                    mint_ref: Some(receipt.mint_ref),
                    transfer_ref: Some(receipt.transfer_ref),
                    error: None,
                };
                (Some(mint), RewardStatus::Delivered)
            }
            Err(err) => {
                if err.is_not_associated() {
                    tracing::warn!(journey_id, rider, error = %err, "rider has not opted in to the reward token");
                } else {
                    tracing::warn!(journey_id, rider, error = %err, "token mint failed");
                }
                steps.push(StepRecord {
                    step: DistributionStep::TokenMint,
                    outcome: StepOutcome::Failed {
                        reason: err.to_string(),
                    },
                    latency_ms,
                });

                self.queue.enqueue(PendingReward {
                    journey_id: journey_id.to_string(),
                    rider: rider.to_string(),
                    token_ref: self.config.token_ref.clone(),
                    amount,
                    ledger_transaction_ref: ledger_record.transaction_ref.clone(),
                    last_error: err.clone(),
                    attempts: 1,
                    enqueued_at: now,
                });

                let mint = TokenMintResult {
                    amount,
                    mint_ref: None,
                    transfer_ref: None,
                    error: Some(err),
                };
                (Some(mint), RewardStatus::Pending)
            }
        }
    }

    /// Await `call` under the step deadline
    async fn bounded<T, E>(
        &self,
        call: impl Future<Output = Result<T, E>>,
        on_timeout: impl FnOnce(u64) -> E,
    ) -> Result<T, E> {
        let ms = self.config.step_timeout_ms;
        match tokio::time::timeout(Duration::from_millis(ms), call).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout(ms)),
        }
    }
}

fn advance(machine: &mut StateMachine, to: DistributionState) {
    if let Err(err) = machine.advance(to) {
        tracing::error!(error = %err, "distribution state machine violated");
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
