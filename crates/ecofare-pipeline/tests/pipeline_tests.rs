//! End-to-end pipeline behavior with in-memory collaborators and a fixed clock

use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use ecofare_core::{FixedClock, InvariantViolation, PipelineConfig};
use ecofare_fraud::{AccountSnapshot, InMemoryAccountHistory, RiskLevel};
use ecofare_pipeline::{JourneyPipeline, PipelineError, BUILTIN_STATIONS};
use ecofare_rewards::{
    ContractStatus, DistributionState, InMemoryContractExecutor, InMemoryLedger,
    InMemoryTokenIssuer, MintErrorKind, RewardStatus,
};
use ecofare_ticket::{RawTicket, StationCatalog, TicketError};
use std::sync::Arc;

const RIDER: &str = "0.0.4242";
const TICKET: &str = "TRANSIT:CAI:ORI:1778576400";

/// 2026-05-12T09:30:00Z, thirty minutes after TICKET was issued
fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 12, 9, 30, 0).unwrap()
}

struct Harness {
    clock: Arc<FixedClock>,
    accounts: Arc<InMemoryAccountHistory>,
    ledger: Arc<InMemoryLedger>,
    contract: Arc<InMemoryContractExecutor>,
    issuer: Arc<InMemoryTokenIssuer>,
    pipeline: Arc<JourneyPipeline>,
}

fn harness() -> Harness {
    harness_with(InMemoryTokenIssuer::new())
}

fn harness_with(issuer: InMemoryTokenIssuer) -> Harness {
    let clock = Arc::new(FixedClock::new(t0()));
    let accounts = Arc::new(
        InMemoryAccountHistory::new().with_account(RIDER, AccountSnapshot::new(365, 25.0, 3)),
    );
    let ledger = Arc::new(InMemoryLedger::new());
    let contract = Arc::new(InMemoryContractExecutor::new());
    let issuer = Arc::new(issuer);

    let pipeline = JourneyPipeline::builder()
        .config(PipelineConfig::default())
        .stations(Arc::new(StationCatalog::from_yaml_str(BUILTIN_STATIONS).unwrap()))
        .accounts(accounts.clone())
        .ledger(ledger.clone())
        .contract(contract.clone())
        .token_issuer(issuer.clone())
        .clock(clock.clone())
        .build()
        .unwrap();

    Harness {
        clock,
        accounts,
        ledger,
        contract,
        issuer,
        pipeline: Arc::new(pipeline),
    }
}

async fn submit(h: &Harness, ticket: &str) -> Result<ecofare_rewards::RewardDistributionOutcome, PipelineError> {
    h.pipeline.process_journey(&RawTicket::from(ticket), RIDER).await
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn test_processes_a_valid_ticket() {
    let h = harness();
    let outcome = submit(&h, TICKET).await.unwrap();

    assert_eq!(outcome.rider, RIDER);
    assert_eq!(outcome.state, DistributionState::Complete);
    assert_eq!(outcome.reward_status, RewardStatus::Delivered);
    assert_eq!(outcome.contract_invocation.status, ContractStatus::Success);
    // 7.933 km × (192 − 41) g/km = 1197.9 g → floor(11.98)
    assert_eq!(outcome.tokens_earned, 11);
    assert_eq!(h.issuer.balance(RIDER), 11);
    assert_eq!(outcome.fraud.risk_level, RiskLevel::Low);
    assert_eq!(h.ledger.records().len(), 1);

    let stages: Vec<&str> = outcome.proofs.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(
        stages,
        vec!["ticket.parse", "replay.check", "carbon.calculate", "fraud.score", "rewards.distribute"]
    );
    assert!(outcome.proofs.iter().all(|p| p.out_hash.starts_with("blake3:")));
}

#[tokio::test]
async fn test_every_decision_is_audited() {
    let h = harness();
    submit(&h, TICKET).await.unwrap();

    let stats = h.pipeline.audit_stats();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.approved, 1);
    h.pipeline.with_audit(|log| {
        let entry = &log.entries()[0];
        assert_eq!(entry.rider, RIDER);
        assert!(entry.trace_id.is_some());
    });
}

// =============================================================================
// Replay
// =============================================================================

#[tokio::test]
async fn test_duplicate_within_window_then_allowed_after() {
    let h = harness();
    // no timestamp, so observed_at is synthesized and the ticket never goes stale
    let ticket = r#"{"from":"CAI","to":"ORI"}"#;

    submit(&h, ticket).await.unwrap();

    h.clock.advance(Duration::hours(23));
    let err = submit(&h, ticket).await.unwrap_err();
    match &err {
        PipelineError::Duplicate(dup) => assert_eq!(dup.first_accepted_at, t0()),
        other => panic!("expected duplicate, got {:?}", other),
    }
    assert_eq!(err.code(), "REPLAY/DUPLICATE");
    assert!(err.is_client_error());

    h.clock.advance(Duration::hours(1));
    assert!(submit(&h, ticket).await.is_ok());
    assert_eq!(h.ledger.call_count(), 2);
}

#[tokio::test]
async fn test_base64_wrapper_does_not_evade_replay() {
    let h = harness();
    submit(&h, TICKET).await.unwrap();

    let wrapped = base64::engine::general_purpose::STANDARD.encode(TICKET);
    let err = submit(&h, &wrapped).await.unwrap_err();
    assert!(matches!(err, PipelineError::Duplicate(_)));
}

#[tokio::test]
async fn test_concurrent_duplicates_only_one_passes() {
    let h = harness();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let pipeline = h.pipeline.clone();
            tokio::spawn(async move {
                pipeline
                    .process_journey(&RawTicket::from(TICKET), RIDER)
                    .await
                    .is_ok()
            })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(h.ledger.call_count(), 1);
}

// =============================================================================
// Parser rejections
// =============================================================================

#[tokio::test]
async fn test_ticket_25_hours_old_rejected() {
    let h = harness();
    let stale = (t0() - Duration::hours(25)).timestamp();
    let err = submit(&h, &format!("TRANSIT:CAI:ORI:{}", stale)).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Ticket(TicketError::InvalidJourney(InvariantViolation::Expired { .. }))
    ));
    assert_eq!(err.code(), "TICKET/INVALID_JOURNEY");
    assert_eq!(err.to_json()["rule"], "within_freshness_window");
    assert_eq!(h.ledger.call_count(), 0);
    assert_eq!(h.accounts.lookup_count(), 0);
}

#[tokio::test]
async fn test_same_station_rejected() {
    let h = harness();
    let err = submit(&h, "TRANSIT:ORI:Gare do Oriente:1778576400").await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Ticket(TicketError::InvalidJourney(InvariantViolation::SameStation { .. }))
    ));
}

#[tokio::test]
async fn test_unsafe_payload_rejected() {
    let h = harness();
    let err = submit(&h, r#"{"from":"CAI","to":"<script>x</script>"}"#)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "TICKET/UNSAFE");
}

// =============================================================================
// Fraud
// =============================================================================

#[tokio::test]
async fn test_fifty_meter_ride_scores_medium_and_earns_nothing() {
    let h = harness();
    let outcome = submit(&h, "TRANSIT:CAI:BXC:1778576400:50").await.unwrap();

    assert!(outcome.fraud.score >= 30);
    assert!(outcome.fraud.risk_level >= RiskLevel::Medium);
    assert_eq!(outcome.tokens_earned, 0);
    assert_eq!(outcome.reward_status, RewardStatus::NoReward);
    assert_eq!(h.issuer.call_count(), 0);
}

#[tokio::test]
async fn test_fraud_rejection_keeps_fingerprint() {
    let h = harness();
    // unknown rider +30, 80 m +30, 80 m in one second +25
    let ticket = "TRANSIT:CAI:BXC:1778576400:80:1";
    let err = h
        .pipeline
        .process_journey(&RawTicket::from(ticket), "0.0.9999")
        .await
        .unwrap_err();

    match &err {
        PipelineError::FraudRejected(rejection) => {
            assert_eq!(rejection.score, 85);
            assert_eq!(rejection.risk_level, RiskLevel::Critical);
            assert_eq!(
                rejection.factors,
                vec!["account not found", "suspiciously short", "implausible transit speed"]
            );
        }
        other => panic!("expected fraud rejection, got {:?}", other),
    }
    assert_eq!(h.ledger.call_count(), 0);
    assert_eq!(h.pipeline.audit_stats().rejected, 1);

    let again = h
        .pipeline
        .process_journey(&RawTicket::from(ticket), "0.0.9999")
        .await
        .unwrap_err();
    assert!(matches!(again, PipelineError::Duplicate(_)));
}

#[tokio::test]
async fn test_account_lookup_failure_still_processes() {
    let h = harness();
    h.accounts.fail_lookups(true);

    let outcome = submit(&h, TICKET).await.unwrap();
    assert_eq!(outcome.fraud.score, 40);
    assert_eq!(outcome.fraud.factors, vec!["account analysis failed"]);
    assert!(outcome.fraud.approved);
}

// =============================================================================
// Distribution failures
// =============================================================================

#[tokio::test]
async fn test_ledger_failure_is_fatal_and_releases_ticket() {
    let h = harness();
    h.ledger.fail_appends(true);

    let err = submit(&h, TICKET).await.unwrap_err();
    assert!(matches!(err, PipelineError::Ledger(_)));
    assert!(!err.is_client_error());
    assert_eq!(h.contract.call_count(), 0);
    assert_eq!(h.issuer.call_count(), 0);

    h.ledger.fail_appends(false);
    let outcome = submit(&h, TICKET).await.unwrap();
    assert_eq!(outcome.state, DistributionState::Complete);
}

#[tokio::test]
async fn test_contract_failure_still_rewards() {
    let h = harness();
    h.contract.fail_invocations(true);

    let outcome = submit(&h, TICKET).await.unwrap();
    assert_eq!(outcome.contract_invocation.status, ContractStatus::Failed);
    assert_eq!(outcome.reward_status, RewardStatus::Delivered);
    assert_eq!(h.issuer.balance(RIDER), outcome.tokens_earned);
}

#[tokio::test]
async fn test_not_associated_then_reconciled() {
    let h = harness_with(InMemoryTokenIssuer::requiring_association());

    let outcome = submit(&h, TICKET).await.unwrap();
    let mint_error = outcome.mint_error().unwrap();
    assert_eq!(mint_error.kind, MintErrorKind::NotAssociated);
    assert!(!outcome.ledger_record.sequence_ref.is_empty());
    assert_eq!(outcome.reward_status, RewardStatus::Pending);
    assert_eq!(h.pipeline.reconciliation_queue().len(), 1);

    let reconciler = h.pipeline.reconciler();
    assert_eq!(reconciler.sweep().await.requeued, 1);

    h.issuer.associate(RIDER);
    let report = reconciler.sweep().await;
    assert_eq!(report.delivered, 1);
    assert_eq!(h.issuer.balance(RIDER), outcome.tokens_earned);
    assert!(h.pipeline.reconciliation_queue().is_empty());
}

// =============================================================================
// Builder
// =============================================================================

#[test]
fn test_builder_requires_collaborators() {
    let result = JourneyPipeline::builder()
        .stations(Arc::new(StationCatalog::from_yaml_str(BUILTIN_STATIONS).unwrap()))
        .accounts(Arc::new(InMemoryAccountHistory::new()))
        .build();
    assert!(matches!(result, Err(PipelineError::Incomplete("ledger"))));
}

#[test]
fn test_builder_validates_config() {
    let mut config = PipelineConfig::default();
    config.rewards.multiplier = 0.0;
    let result = JourneyPipeline::builder().config(config).build();
    assert!(matches!(result, Err(PipelineError::Config(_))));
}
