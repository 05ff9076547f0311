//! Ecofare Fraud: risk scoring for journey rewards
//!
//! Two independent sub-scores are summed and clamped to `0..=100`:
//!
//! - **account**: signals from the [`AccountHistory`] collaborator. A lookup
//!   that fails or times out is itself a suspicious signal, never a
//!   pipeline error.
//! - **journey**: a pure function of the draft and its carbon analysis.
//!
//! The score maps to a [`RiskLevel`] and an approve/reject decision.

pub mod audit;
pub mod history;
pub mod memory;
pub mod risk;
pub mod rules;

pub use audit::{AuditEntry, AuditStats, FraudAuditLog};
pub use history::{AccountHistory, AccountLookupError, AccountSnapshot};
pub use memory::InMemoryAccountHistory;
pub use risk::{FraudAnalysis, RiskCategory, RiskFactor, RiskLevel};
pub use rules::{AccountSignal, FraudRule, JourneySignals};

use ecofare_core::{CarbonAnalysis, FraudConfig, JourneyDraft};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A journey that scored at or above the rejection threshold
#[derive(Debug, Clone, PartialEq, Error)]
#[error("FRAUD/REJECTED: score {score} ({risk_level}): {}", .factors.join(", "))]
pub struct FraudRejected {
    pub score: u32,
    pub risk_level: RiskLevel,
    pub factors: Vec<String>,
}

impl FraudAnalysis {
    /// The rejection to raise, if this analysis was not approved
    pub fn rejection(&self) -> Option<FraudRejected> {
        (!self.approved).then(|| FraudRejected {
            score: self.score,
            risk_level: self.risk_level,
            factors: self.factors.clone(),
        })
    }
}

/// Scores journeys against the account and journey rule tables
pub struct FraudScorer {
    /// Account-history collaborator, queried once per journey
    history: Arc<dyn AccountHistory>,
    /// Tier thresholds, rejection threshold and lookup deadline
    config: FraudConfig,
    /// Evaluated first, in table order
    account_rules: Vec<FraudRule<AccountSignal>>,
    /// Evaluated after the account rules
    journey_rules: Vec<FraudRule<JourneySignals>>,
}

impl FraudScorer {
    pub fn new(history: Arc<dyn AccountHistory>, config: FraudConfig) -> Self {
        Self {
            history,
            config,
            account_rules: rules::account_rules(),
            journey_rules: rules::journey_rules(),
        }
    }

    /// Score a journey for `rider`
    pub async fn score(
        &self,
        rider: &str,
        draft: &JourneyDraft,
        carbon: &CarbonAnalysis,
    ) -> FraudAnalysis {
        let account = self.account_signal(rider).await;

        let mut factors = self.score_account(&account);
        factors.extend(self.score_journey(draft, carbon));

        let analysis = FraudAnalysis::from_factors(factors, &self.config);
        tracing::debug!(
            rider,
            score = analysis.score,
            risk_level = %analysis.risk_level,
            approved = analysis.approved,
            "fraud scored"
        );
        analysis
    }

    /// Query the account collaborator under the lookup deadline
    pub async fn account_signal(&self, rider: &str) -> AccountSignal {
        let deadline = Duration::from_millis(self.config.lookup_timeout_ms);

        match tokio::time::timeout(deadline, self.history.lookup(rider)).await {
            Ok(Ok(Some(snapshot))) => AccountSignal::Found(snapshot),
            Ok(Ok(None)) => AccountSignal::NotFound,
            Ok(Err(err)) => {
                tracing::warn!(rider, error = %err, "account lookup failed");
                AccountSignal::LookupFailed(err.to_string())
            }
            Err(_) => {
                tracing::warn!(rider, timeout_ms = self.config.lookup_timeout_ms, "account lookup timed out");
                AccountSignal::LookupFailed(format!(
                    "lookup timed out after {}ms",
                    self.config.lookup_timeout_ms
                ))
            }
        }
    }

    pub fn score_account(&self, account: &AccountSignal) -> Vec<RiskFactor> {
        rules::evaluate_all(&self.account_rules, account, &self.config)
    }

    pub fn score_journey(&self, draft: &JourneyDraft, carbon: &CarbonAnalysis) -> Vec<RiskFactor> {
        let signals = JourneySignals::new(draft, carbon);
        rules::evaluate_all(&self.journey_rules, &signals, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ecofare_core::{Fingerprint, SourceFormat, StationId};

    fn draft(distance_meters: u32) -> JourneyDraft {
        JourneyDraft {
            from_station: StationId::new("CAI"),
            to_station: StationId::new("ORI"),
            distance_meters,
            observed_at: Utc::now(),
            raw_encoding_fingerprint: Fingerprint::of(b"ticket"),
            source_format: SourceFormat::ColonDelimited,
            duration_seconds: None,
        }
    }

    /// Transit vs car: 151 g saved per km
    fn carbon(distance_meters: u32) -> CarbonAnalysis {
        let km = f64::from(distance_meters) / 1000.0;
        CarbonAnalysis {
            distance_km: km,
            reference_mode: "transit".into(),
            alternative_mode: "car".into(),
            reference_emission_grams: km * 41.0,
            alternative_emission_grams: km * 192.0,
            carbon_saved_grams: km * 151.0,
        }
    }

    #[test]
    fn test_rejection_carries_details() {
        let analysis = FraudAnalysis::from_factors(
            vec![RiskFactor {
                rule: "same_station".into(),
                label: "same origin and destination".into(),
                impact: 90,
                category: RiskCategory::Journey,
            }],
            &FraudConfig::default(),
        );
        let rejection = analysis.rejection().unwrap();
        assert_eq!(rejection.score, 90);
        assert_eq!(rejection.risk_level, RiskLevel::Critical);
        assert!(rejection.to_string().starts_with("FRAUD/REJECTED: score 90 (CRITICAL)"));
    }

    #[tokio::test]
    async fn test_established_account_typical_ride() {
        let history = InMemoryAccountHistory::new()
            .with_account("0.0.42", AccountSnapshot::new(400, 25.0, 4));
        let scorer = FraudScorer::new(Arc::new(history), FraudConfig::default());

        let analysis = scorer.score("0.0.42", &draft(8_000), &carbon(8_000)).await;
        assert_eq!(analysis.score, 0);
        assert_eq!(analysis.risk_level, RiskLevel::Low);
        assert!(analysis.approved);
        assert!(analysis.rejection().is_none());
    }

    #[tokio::test]
    async fn test_same_station_scored_defensively() {
        let history = InMemoryAccountHistory::new()
            .with_account("0.0.42", AccountSnapshot::new(400, 25.0, 4));
        let scorer = FraudScorer::new(Arc::new(history), FraudConfig::default());

        let mut d = draft(8_000);
        d.to_station = d.from_station.clone();
        let analysis = scorer.score("0.0.42", &d, &carbon(8_000)).await;
        assert_eq!(analysis.score, 40);
        assert_eq!(analysis.factors, vec!["same origin and destination"]);
    }

    #[tokio::test]
    async fn test_factor_order_account_first() {
        let scorer = FraudScorer::new(Arc::new(InMemoryAccountHistory::new()), FraudConfig::default());
        let analysis = scorer.score("0.0.404", &draft(50), &carbon(50)).await;
        assert_eq!(analysis.factors, vec!["account not found", "suspiciously short"]);
        assert_eq!(analysis.score, 60);
        assert_eq!(analysis.sub_score(RiskCategory::Account), 30);
        assert_eq!(analysis.sub_score(RiskCategory::Journey), 30);
    }
}
