//! Distributor failure policy against the in-memory collaborators

use chrono::{DateTime, TimeZone, Utc};
use ecofare_core::{
    CarbonAnalysis, Fingerprint, FraudConfig, JourneyDraft, RewardsConfig, SourceFormat, StationId,
};
use ecofare_fraud::FraudAnalysis;
use ecofare_rewards::{
    DistributionRequest, DistributionState, DistributionStep, InMemoryContractExecutor,
    InMemoryLedger, InMemoryTokenIssuer, LedgerRecordError, MintErrorKind, ReconciliationQueue,
    RewardDistributor, RewardStatus, StepOutcome,
};
use std::sync::Arc;
use std::time::Duration;

const RIDER: &str = "0.0.4242";

struct Harness {
    ledger: Arc<InMemoryLedger>,
    contract: Arc<InMemoryContractExecutor>,
    issuer: Arc<InMemoryTokenIssuer>,
    queue: Arc<ReconciliationQueue>,
    distributor: RewardDistributor,
}

fn harness(config: RewardsConfig) -> Harness {
    let ledger = Arc::new(InMemoryLedger::new());
    let contract = Arc::new(InMemoryContractExecutor::new());
    let issuer = Arc::new(InMemoryTokenIssuer::new());
    let queue = Arc::new(ReconciliationQueue::new());
    let distributor = RewardDistributor::new(
        ledger.clone(),
        contract.clone(),
        issuer.clone(),
        queue.clone(),
        config,
    );
    Harness {
        ledger,
        contract,
        issuer,
        queue,
        distributor,
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 12, 9, 30, 0).unwrap()
}

fn draft() -> JourneyDraft {
    JourneyDraft {
        from_station: StationId::new("CAI"),
        to_station: StationId::new("ORI"),
        distance_meters: 16_556,
        observed_at: Utc.with_ymd_and_hms(2026, 5, 12, 9, 0, 0).unwrap(),
        raw_encoding_fingerprint: Fingerprint::of(b"TRANSIT:CAI:ORI:1778576400"),
        source_format: SourceFormat::ColonDelimited,
        duration_seconds: None,
    }
}

fn carbon(saved: f64) -> CarbonAnalysis {
    CarbonAnalysis {
        distance_km: 16.556,
        reference_mode: "transit".into(),
        alternative_mode: "car".into(),
        reference_emission_grams: 678.8,
        alternative_emission_grams: 678.8 + saved,
        carbon_saved_grams: saved,
    }
}

fn request(draft: &JourneyDraft, saved: f64) -> DistributionRequest<'_> {
    DistributionRequest {
        rider: RIDER,
        draft,
        carbon: carbon(saved),
        fraud: FraudAnalysis::from_factors(Vec::new(), &FraudConfig::default()),
        now: now(),
    }
}

#[tokio::test]
async fn test_happy_path_delivers_tokens() {
    let h = harness(RewardsConfig::default());
    let d = draft();
    let outcome = h.distributor.distribute(request(&d, 2_500.0)).await.unwrap();

    assert_eq!(outcome.tokens_earned, 25);
    assert_eq!(outcome.reward_status, RewardStatus::Delivered);
    assert_eq!(outcome.state, DistributionState::Complete);
    assert!(outcome.is_fully_delivered());
    assert_eq!(h.issuer.balance(RIDER), 25);
    assert_eq!(outcome.ledger_record.topic_ref, "0.0.1001");
    assert_eq!(outcome.steps.len(), 3);
    assert!(outcome.steps.iter().all(|s| s.outcome == StepOutcome::Succeeded));
}

#[tokio::test]
async fn test_ledger_payload_is_full_journey() {
    let h = harness(RewardsConfig::default());
    let d = draft();
    let outcome = h.distributor.distribute(request(&d, 2_500.0)).await.unwrap();

    let records = h.ledger.records();
    assert_eq!(records.len(), 1);
    let payload: serde_json::Value = serde_json::from_slice(&records[0].payload).unwrap();
    assert_eq!(payload["journey_id"], outcome.journey_id.as_str());
    assert_eq!(payload["from_station"], "CAI");
    assert_eq!(payload["distance_meters"], 16_556);
    assert_eq!(payload["tokens_earned"], 25);
    assert_eq!(payload["fingerprint"], d.raw_encoding_fingerprint.as_str());

    let invocation = &h.contract.invocations()[0];
    assert_eq!(invocation.function_name, "recordJourney");
    assert_eq!(invocation.args[0], outcome.journey_id.as_str());
}

#[tokio::test]
async fn test_ledger_failure_stops_everything() {
    let h = harness(RewardsConfig::default());
    h.ledger.fail_appends(true);
    let d = draft();

    let err = h.distributor.distribute(request(&d, 2_500.0)).await.unwrap_err();
    assert!(matches!(err, LedgerRecordError::Rejected(_)));
    assert_eq!(h.ledger.call_count(), 1);
    assert_eq!(h.contract.call_count(), 0);
    assert_eq!(h.issuer.call_count(), 0);
    assert!(h.queue.is_empty());
}

#[tokio::test]
async fn test_ledger_timeout_is_ledger_failure() {
    let h = harness(RewardsConfig {
        step_timeout_ms: 20,
        ..RewardsConfig::default()
    });
    h.ledger.set_delay(Some(Duration::from_millis(500)));
    let d = draft();

    let err = h.distributor.distribute(request(&d, 2_500.0)).await.unwrap_err();
    assert_eq!(err, LedgerRecordError::TimedOut(20));
    assert_eq!(h.contract.call_count(), 0);
}

#[tokio::test]
async fn test_contract_failure_is_not_fatal() {
    let h = harness(RewardsConfig::default());
    h.contract.fail_invocations(true);
    let d = draft();

    let outcome = h.distributor.distribute(request(&d, 2_500.0)).await.unwrap();
    assert!(!outcome.contract_invocation.is_success());
    assert!(outcome.contract_invocation.error.is_some());
    assert_eq!(outcome.reward_status, RewardStatus::Delivered);
    assert_eq!(h.issuer.call_count(), 1);
    assert!(!outcome.is_fully_delivered());
}

#[tokio::test]
async fn test_not_associated_is_success_shaped_and_queued() {
    let h = harness(RewardsConfig::default());
    h.issuer.force_failure(Some(MintErrorKind::NotAssociated));
    let d = draft();

    let outcome = h.distributor.distribute(request(&d, 2_500.0)).await.unwrap();
    let mint_error = outcome.mint_error().unwrap();
    assert_eq!(mint_error.kind, MintErrorKind::NotAssociated);
    assert_eq!(mint_error.message, "TOKEN_NOT_ASSOCIATED_TO_ACCOUNT");
    assert!(!outcome.ledger_record.transaction_ref.is_empty());
    assert_eq!(outcome.reward_status, RewardStatus::Pending);
    assert_eq!(outcome.state, DistributionState::Complete);

    let pending = h.queue.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].journey_id, outcome.journey_id);
    assert_eq!(pending[0].amount, 25);
    assert_eq!(pending[0].ledger_transaction_ref, outcome.ledger_record.transaction_ref);
}

#[tokio::test]
async fn test_everything_but_ledger_fails() {
    let h = harness(RewardsConfig::default());
    h.contract.fail_invocations(true);
    h.issuer.force_failure(Some(MintErrorKind::Other));
    let d = draft();

    let outcome = h.distributor.distribute(request(&d, 2_500.0)).await.unwrap();
    assert_eq!(outcome.reward_status, RewardStatus::Pending);
    let failed: Vec<DistributionStep> = outcome
        .steps
        .iter()
        .filter(|s| matches!(s.outcome, StepOutcome::Failed { .. }))
        .map(|s| s.step)
        .collect();
    assert_eq!(failed, vec![DistributionStep::ContractInvoke, DistributionStep::TokenMint]);
    assert_eq!(h.queue.len(), 1);
}

#[tokio::test]
async fn test_zero_tokens_skips_mint() {
    let h = harness(RewardsConfig::default());
    let d = draft();

    let outcome = h.distributor.distribute(request(&d, 50.0)).await.unwrap();
    assert_eq!(outcome.tokens_earned, 0);
    assert_eq!(outcome.reward_status, RewardStatus::NoReward);
    assert!(outcome.token_mint.is_none());
    assert_eq!(h.issuer.call_count(), 0);
    assert_eq!(h.contract.call_count(), 1);
}

#[tokio::test]
async fn test_outcome_serializes_for_callers() {
    let h = harness(RewardsConfig::default());
    h.issuer.force_failure(Some(MintErrorKind::NotAssociated));
    let d = draft();

    let outcome = h.distributor.distribute(request(&d, 2_500.0)).await.unwrap();
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["reward_status"], "PENDING");
    assert_eq!(json["state"], "COMPLETE");
    assert_eq!(json["token_mint"]["error"]["kind"], "NOT_ASSOCIATED");
    assert_eq!(json["steps"][2]["result"], "failed");
}
