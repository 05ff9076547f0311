//! Journey pipeline: chains the stages and records a proof per stage
use crate::error::PipelineError;
use ecofare_carbon::CarbonCalculator;
use ecofare_core::{
    Clock, ExecutionContext, JourneyDraft, PipelineConfig, StageProof, SystemClock,
};
use ecofare_fraud::{AccountHistory, AuditStats, FraudAuditLog, FraudScorer};
use ecofare_replay::{InMemoryReplayStore, ReplayDetector, ReplayStore};
use ecofare_rewards::{
    ContractExecutor, DistributionRequest, LedgerAppender, ReconciliationQueue, Reconciler,
    RewardDistributionOutcome, RewardDistributor, TokenIssuer,
};
use ecofare_ticket::{RawTicket, StationDirectory, TicketParser};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::Instrument;

pub struct JourneyPipeline {
    parser: TicketParser,
    replay: ReplayDetector,
    carbon: CarbonCalculator,
    fraud: FraudScorer,
    distributor: RewardDistributor,
    issuer: Arc<dyn TokenIssuer>,
    audit: Mutex<FraudAuditLog>,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
}

impl JourneyPipeline {
    pub fn builder() -> JourneyPipelineBuilder {
        JourneyPipelineBuilder::default()
    }

    /// Parse, de-duplicate, score and reward one ticket for `rider`.
    ///
    /// Returns the outcome, possibly carrying contract or mint failures, or
    /// the first rejection raised by a stage.
    pub async fn process_journey(
        &self,
        raw: &RawTicket,
        rider: &str,
    ) -> Result<RewardDistributionOutcome, PipelineError> {
        let ctx = ExecutionContext::new(rider, self.clock.now());
        let span = tracing::info_span!("process_journey", trace_id = %ctx.trace_id, rider);

        async {
            let result = self.run(raw, &ctx).await;
            match &result {
                Ok(outcome) => tracing::info!(
                    journey_id = %outcome.journey_id,
                    tokens_earned = outcome.tokens_earned,
                    "journey processed"
                ),
                Err(err) if err.is_client_error() => {
                    tracing::info!(code = err.code(), error = %err, "journey rejected")
                }
                Err(err) => tracing::error!(code = err.code(), error = %err, "journey failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        raw: &RawTicket,
        ctx: &ExecutionContext,
    ) -> Result<RewardDistributionOutcome, PipelineError> {
        let now = ctx.received_at;
        let mut proofs = Vec::with_capacity(5);

        // Parse
        let start = Instant::now();
        let raw_hash = match raw {
            RawTicket::Text(text) => StageProof::hash_value(text.as_str()),
            RawTicket::Bytes(bytes) => StageProof::hash_value(bytes.as_slice()),
        };
        let draft = self.parser.parse(raw, now)?;
        proofs.push(stage_proof("ticket.parse", raw_hash, &draft, start));

        // Replay
        let start = Instant::now();
        self.replay.check(&draft, now).await?;
        proofs.push(stage_proof(
            "replay.check",
            StageProof::hash_value(&draft.raw_encoding_fingerprint),
            &draft.raw_encoding_fingerprint,
            start,
        ));

        // Carbon
        let start = Instant::now();
        let carbon = match self.carbon.analyze(&draft) {
            Ok(carbon) => carbon,
            Err(err) => {
                self.release(&draft).await;
                return Err(err.into());
            }
        };
        proofs.push(stage_proof("carbon.calculate", StageProof::hash_value(&draft), &carbon, start));

        // Fraud
        let start = Instant::now();
        let fraud = self.fraud.score(&ctx.rider, &draft, &carbon).await;
        self.lock_audit().log(
            ecofare_fraud::AuditEntry::from_analysis(
                &fraud,
                ctx.rider.as_str(),
                draft.raw_encoding_fingerprint.clone(),
                now,
            )
            .with_trace(ctx.trace_id.as_str()),
        );
        proofs.push(stage_proof(
            "fraud.score",
            StageProof::hash_value(&(&draft, &carbon)),
            &fraud,
            start,
        ));
        if let Some(rejection) = fraud.rejection() {
            return Err(rejection.into());
        }

        // Distribute
        let start = Instant::now();
        let in_hash = StageProof::hash_value(&fraud);
        let request = DistributionRequest {
            rider: &ctx.rider,
            draft: &draft,
            carbon,
            fraud,
            now,
        };
        let mut outcome = match self.distributor.distribute(request).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.release(&draft).await;
                return Err(err.into());
            }
        };
        proofs.push(stage_proof("rewards.distribute", in_hash, &outcome, start));

        outcome.proofs = proofs;
        Ok(outcome)
    }

    /// Forget the fingerprint of a journey that did not happen
    async fn release(&self, draft: &JourneyDraft) {
        if let Err(err) = self.replay.release(draft).await {
            tracing::warn!(
                fingerprint = draft.raw_encoding_fingerprint.short(),
                error = %err,
                "failed to release ticket fingerprint"
            );
        }
    }

    fn lock_audit(&self) -> std::sync::MutexGuard<'_, FraudAuditLog> {
        self.audit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read access to the fraud decision log
    pub fn with_audit<R>(&self, f: impl FnOnce(&FraudAuditLog) -> R) -> R {
        f(&self.lock_audit())
    }

    pub fn audit_stats(&self) -> AuditStats {
        self.lock_audit().stats()
    }

    pub fn reconciliation_queue(&self) -> &Arc<ReconciliationQueue> {
        self.distributor.queue()
    }

    /// A reconciler over this pipeline's queue and token issuer
    pub fn reconciler(&self) -> Reconciler {
        let rewards = &self.config.rewards;
        Reconciler::new(
            self.issuer.clone(),
            self.distributor.queue().clone(),
            rewards.max_reconciliation_attempts,
            Duration::from_millis(rewards.step_timeout_ms),
        )
    }
}

fn stage_proof<T: Serialize + ?Sized>(id: &str, in_hash: String, output: &T, start: Instant) -> StageProof {
    let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    tracing::debug!(stage = id, latency_ms, "stage complete");
    StageProof::new(id, in_hash, StageProof::hash_value(output), latency_ms)
}

// =============================================================================
// Builder
// =============================================================================

/// Collects collaborators; stations, accounts, ledger, contract and token
/// issuer are required
#[derive(Default)]
pub struct JourneyPipelineBuilder {
    config: PipelineConfig,
    stations: Option<Arc<dyn StationDirectory>>,
    replay_store: Option<Arc<dyn ReplayStore>>,
    accounts: Option<Arc<dyn AccountHistory>>,
    ledger: Option<Arc<dyn LedgerAppender>>,
    contract: Option<Arc<dyn ContractExecutor>>,
    issuer: Option<Arc<dyn TokenIssuer>>,
    queue: Option<Arc<ReconciliationQueue>>,
    clock: Option<Arc<dyn Clock>>,
    audit_capacity: Option<usize>,
}

impl JourneyPipelineBuilder {
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn stations(mut self, stations: Arc<dyn StationDirectory>) -> Self {
        self.stations = Some(stations);
        self
    }

    /// Defaults to a process-local store with the configured window
    pub fn replay_store(mut self, store: Arc<dyn ReplayStore>) -> Self {
        self.replay_store = Some(store);
        self
    }

    pub fn accounts(mut self, accounts: Arc<dyn AccountHistory>) -> Self {
        self.accounts = Some(accounts);
        self
    }

    pub fn ledger(mut self, ledger: Arc<dyn LedgerAppender>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn contract(mut self, contract: Arc<dyn ContractExecutor>) -> Self {
        self.contract = Some(contract);
        self
    }

    pub fn token_issuer(mut self, issuer: Arc<dyn TokenIssuer>) -> Self {
        self.issuer = Some(issuer);
        self
    }

    pub fn reconciliation_queue(mut self, queue: Arc<ReconciliationQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn audit_capacity(mut self, max_entries: usize) -> Self {
        self.audit_capacity = Some(max_entries);
        self
    }

    pub fn build(self) -> Result<JourneyPipeline, PipelineError> {
        self.config.validate()?;
        let config = self.config;

        let stations = self.stations.ok_or(PipelineError::Incomplete("station directory"))?;
        let accounts = self.accounts.ok_or(PipelineError::Incomplete("account history"))?;
        let ledger = self.ledger.ok_or(PipelineError::Incomplete("ledger"))?;
        let contract = self.contract.ok_or(PipelineError::Incomplete("contract executor"))?;
        let issuer = self.issuer.ok_or(PipelineError::Incomplete("token issuer"))?;

        let replay_store = self.replay_store.unwrap_or_else(|| {
            Arc::new(InMemoryReplayStore::with_window_hours(config.replay.window_hours))
        });
        let queue = self.queue.unwrap_or_default();
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let audit = match self.audit_capacity {
            Some(max) => FraudAuditLog::with_max_entries(max),
            None => FraudAuditLog::new(),
        };

        Ok(JourneyPipeline {
            parser: TicketParser::new(stations, config.ticket.clone()),
            replay: ReplayDetector::new(replay_store),
            carbon: CarbonCalculator::new(config.carbon.clone()),
            fraud: FraudScorer::new(accounts, config.fraud.clone()),
            distributor: RewardDistributor::new(
                ledger,
                contract,
                issuer.clone(),
                queue,
                config.rewards.clone(),
            ),
            issuer,
            audit: Mutex::new(audit),
            clock,
            config,
        })
    }
}
