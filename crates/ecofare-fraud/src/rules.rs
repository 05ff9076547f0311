//! Fraud rule tables
//!
//! Each rule is an independent `(predicate, weight, label)` triple evaluated
//! against extracted signals. A score is the sum of the triggered weights;
//! rules never short-circuit each other.

use crate::history::AccountSnapshot;
use crate::risk::{RiskCategory, RiskFactor};
use ecofare_core::{CarbonAnalysis, FraudConfig, JourneyDraft};
use std::fmt;

/// Savings a typical car-to-transit switch yields per km
pub const EXPECTED_GRAMS_PER_KM: f64 = 150.0;

pub const SHORT_DISTANCE_METERS: u32 = 100;
pub const LONG_DISTANCE_METERS: u32 = 50_000;

/// Known abuse: the longest ride the long-distance rule lets through,
/// paired with an outsized saving
pub const ABUSE_DISTANCE_METERS: u32 = 50_000;
pub const ABUSE_CARBON_GRAMS: f64 = 7_000.0;

pub type Predicate<S> = fn(&S, &FraudConfig) -> bool;

/// One weighted rule over signals of type `S`
pub struct FraudRule<S> {
    pub id: &'static str,
    pub label: &'static str,
    pub weight: u32,
    pub category: RiskCategory,
    predicate: Predicate<S>,
}

impl<S> FraudRule<S> {
    pub const fn new(
        id: &'static str,
        label: &'static str,
        weight: u32,
        category: RiskCategory,
        predicate: Predicate<S>,
    ) -> Self {
        Self {
            id,
            label,
            weight,
            category,
            predicate,
        }
    }

    pub fn matches(&self, signals: &S, config: &FraudConfig) -> bool {
        (self.predicate)(signals, config)
    }

    /// The factor this rule contributes, if it fires
    pub fn evaluate(&self, signals: &S, config: &FraudConfig) -> Option<RiskFactor> {
        self.matches(signals, config).then(|| RiskFactor {
            rule: self.id.to_string(),
            label: self.label.to_string(),
            impact: self.weight,
            category: self.category,
        })
    }
}

impl<S> fmt::Debug for FraudRule<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FraudRule")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("weight", &self.weight)
            .finish()
    }
}

/// Evaluate every rule in order and collect the triggered factors
pub fn evaluate_all<S>(rules: &[FraudRule<S>], signals: &S, config: &FraudConfig) -> Vec<RiskFactor> {
    rules
        .iter()
        .filter_map(|rule| rule.evaluate(signals, config))
        .collect()
}

// =============================================================================
// Account rules
// =============================================================================

/// What the account-history lookup produced
#[derive(Debug, Clone, PartialEq)]
pub enum AccountSignal {
    Found(AccountSnapshot),
    NotFound,
    /// Lookup errored or timed out
    LookupFailed(String),
}

impl AccountSignal {
    fn snapshot(&self) -> Option<&AccountSnapshot> {
        match self {
            AccountSignal::Found(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

pub fn account_rules() -> Vec<FraudRule<AccountSignal>> {
    type Rule = FraudRule<AccountSignal>;
    use crate::risk::RiskCategory::Account;
    vec![
        Rule::new("account_not_found", "account not found", 30, Account, |s, _| {
            matches!(s, AccountSignal::NotFound)
        }),
        Rule::new("account_lookup_failed", "account analysis failed", 40, Account, |s, _| {
            matches!(s, AccountSignal::LookupFailed(_))
        }),
        Rule::new("account_age_week", "account younger than 7 days", 25, Account, |s, _| {
            s.snapshot().map_or(false, |a| a.age_in_days < 7)
        }),
        Rule::new("account_age_month", "account younger than 30 days", 15, Account, |s, _| {
            s.snapshot()
                .map_or(false, |a| (7..30).contains(&a.age_in_days))
        }),
        Rule::new("low_reserve", "reserve balance below minimum", 20, Account, |s, cfg| {
            s.snapshot()
                .map_or(false, |a| a.reserve_balance < cfg.min_reserve_balance)
        }),
        Rule::new("no_associations", "no prior asset associations", 15, Account, |s, _| {
            s.snapshot().map_or(false, |a| a.asset_association_count == 0)
        }),
    ]
}

// =============================================================================
// Journey rules
// =============================================================================

/// Features the journey rules look at
#[derive(Debug, Clone, PartialEq)]
pub struct JourneySignals {
    pub distance_meters: u32,
    pub carbon_saved_grams: f64,
    pub duration_seconds: Option<u32>,
    pub same_station: bool,
}

impl JourneySignals {
    pub fn new(draft: &JourneyDraft, carbon: &CarbonAnalysis) -> Self {
        Self {
            distance_meters: draft.distance_meters,
            carbon_saved_grams: carbon.carbon_saved_grams,
            duration_seconds: draft.duration_seconds,
            same_station: draft.from_station == draft.to_station,
        }
    }

    pub fn distance_km(&self) -> f64 {
        f64::from(self.distance_meters) / 1000.0
    }

    /// Saved grams relative to [`EXPECTED_GRAMS_PER_KM`]; None for zero distance
    pub fn carbon_ratio(&self) -> Option<f64> {
        let expected = self.distance_km() * EXPECTED_GRAMS_PER_KM;
        (expected > 0.0).then(|| self.carbon_saved_grams / expected)
    }

    /// Average speed when the ticket carries a duration
    pub fn speed_kmh(&self) -> Option<f64> {
        let seconds = self.duration_seconds?;
        if seconds == 0 {
            return Some(f64::INFINITY);
        }
        Some(self.distance_km() / (f64::from(seconds) / 3600.0))
    }
}

pub fn journey_rules() -> Vec<FraudRule<JourneySignals>> {
    type Rule = FraudRule<JourneySignals>;
    use crate::risk::RiskCategory::Journey;
    vec![
        Rule::new("short_distance", "suspiciously short", 30, Journey, |s, _| {
            s.distance_meters < SHORT_DISTANCE_METERS
        }),
        Rule::new("long_distance", "unusually long", 25, Journey, |s, _| {
            s.distance_meters > LONG_DISTANCE_METERS
        }),
        Rule::new("carbon_ratio_high", "carbon savings above expected", 20, Journey, |s, _| {
            s.carbon_ratio().map_or(false, |r| r > 2.0)
        }),
        Rule::new("carbon_ratio_low", "carbon savings below expected", 10, Journey, |s, _| {
            s.carbon_ratio().map_or(false, |r| r < 0.5)
        }),
        Rule::new("implausible_speed", "implausible transit speed", 25, Journey, |s, cfg| {
            s.distance_meters > 0 && s.speed_kmh().map_or(false, |v| v > cfg.max_transit_speed_kmh)
        }),
        Rule::new("same_station", "same origin and destination", 40, Journey, |s, _| {
            s.same_station
        }),
        Rule::new(
            "max_distance_high_carbon",
            "maximum distance with high carbon",
            35,
            Journey,
            |s, _| {
                s.distance_meters == ABUSE_DISTANCE_METERS
                    && s.carbon_saved_grams > ABUSE_CARBON_GRAMS
            },
        ),
    ]
}
