//! Distribution results
use crate::collaborators::{ContractExecutionError, TokenMintError};
use crate::state::DistributionState;
use chrono::{DateTime, Utc};
use ecofare_core::{CarbonAnalysis, StageProof};
use ecofare_fraud::FraudAnalysis;
use serde::{Deserialize, Serialize};

/// Proof the journey was written to the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Topic the journey record was appended to
    pub topic_ref: String,
    /// Position of the record within the topic
    pub sequence_ref: String,
    /// Ledger transaction that carried the append
    pub transaction_ref: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractInvocationResult {
    pub status: ContractStatus,
    /// Contract transaction, when the invocation went through
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_ref: Option<String>,
    /// Status string reported by the contract service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_status: Option<String>,
    /// Why the invocation failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ContractExecutionError>,
}

impl ContractInvocationResult {
    pub fn failed(error: ContractExecutionError) -> Self {
        Self {
            status: ContractStatus::Failed,
            transaction_ref: None,
            contract_status: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ContractStatus::Success
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMintResult {
    /// Tokens the journey earned
    pub amount: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint_ref: Option<String>,
    /// Transfer to the rider's account
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_ref: Option<String>,
    /// Issuer error, surfaced verbatim (including `NOT_ASSOCIATED`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TokenMintError>,
}

impl TokenMintResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Whether the rider actually holds the reward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RewardStatus {
    /// Tokens minted and transferred
    Delivered,
    /// Journey verified, mint failed; queued for reconciliation
    Pending,
    /// Journey earned zero tokens, nothing to mint
    NoReward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionStep {
    LedgerAppend,
    ContractInvoke,
    TokenMint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed { reason: String },
    Skipped { reason: String },
}

/// One external call made by the distributor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: DistributionStep,
    /// Succeeded, failed or skipped, with the reason
    #[serde(flatten)]
    pub outcome: StepOutcome,
    pub latency_ms: u64,
}

/// Everything the caller gets back for a processed journey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardDistributionOutcome {
    /// `JRN-<timestamp>-<from>-<to>-<suffix>`
    pub journey_id: String,
    /// Rider account the reward is owed to
    pub rider: String,
    /// Proof the journey was recorded; always present on success
    pub ledger_record: LedgerRecord,
    pub contract_invocation: ContractInvocationResult,
    /// Absent when the journey earned no tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_mint: Option<TokenMintResult>,
    pub tokens_earned: u64,
    pub reward_status: RewardStatus,
    /// Last state reached by the distribution state machine
    pub state: DistributionState,
    /// External calls in the order they were made
    pub steps: Vec<StepRecord>,
    pub carbon: CarbonAnalysis,
    pub fraud: FraudAnalysis,
    /// Filled in by the pipeline, one per stage
    #[serde(default)]
    pub proofs: Vec<StageProof>,
    pub processed_at: DateTime<Utc>,
}

impl RewardDistributionOutcome {
    /// The mint error, if the primary reward channel failed
    pub fn mint_error(&self) -> Option<&TokenMintError> {
        self.token_mint.as_ref().and_then(|m| m.error.as_ref())
    }

    pub fn is_fully_delivered(&self) -> bool {
        self.reward_status == RewardStatus::Delivered && self.contract_invocation.is_success()
    }
}
