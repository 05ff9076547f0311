//! Pipeline configuration
//!
//! One section per stage. Every field has a default, so a partial YAML file
//! (or none at all) yields a working configuration:
//!
//! ```yaml
//! carbon:
//!   alternative_mode: taxi
//! rewards:
//!   multiplier: 12
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Upper bound for the freshness and replay windows (one year)
pub const MAX_WINDOW_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub ticket: TicketConfig,
    pub replay: ReplayConfig,
    pub carbon: CarbonConfig,
    pub fraud: FraudConfig,
    pub rewards: RewardsConfig,
}

impl PipelineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Reject values no stage can work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| -> Result<(), ConfigError> { Err(ConfigError::Invalid(msg)) };

        if self.ticket.min_length > self.ticket.max_length {
            return invalid(format!(
                "ticket.min_length ({}) exceeds ticket.max_length ({})",
                self.ticket.min_length, self.ticket.max_length
            ));
        }
        if self.ticket.max_distance_meters == 0 {
            return invalid("ticket.max_distance_meters must be positive".to_string());
        }
        for (name, hours) in [
            ("ticket.freshness_window_hours", self.ticket.freshness_window_hours),
            ("replay.window_hours", self.replay.window_hours),
        ] {
            if !(1..=MAX_WINDOW_HOURS).contains(&hours) {
                return invalid(format!(
                    "{} must be within 1..={} ({})",
                    name, MAX_WINDOW_HOURS, hours
                ));
            }
        }
        for mode in [&self.carbon.reference_mode, &self.carbon.alternative_mode] {
            let known = self
                .carbon
                .factors
                .keys()
                .any(|k| k.trim().to_lowercase() == mode.trim().to_lowercase());
            if !known {
                return invalid(format!("carbon.factors has no entry for mode '{}'", mode));
            }
        }
        if let Some((mode, factor)) = self
            .carbon
            .factors
            .iter()
            .find(|(_, f)| !f.is_finite() || **f < 0.0)
        {
            return invalid(format!(
                "carbon.factors['{}'] must be a finite non-negative number ({})",
                mode, factor
            ));
        }
        let f = &self.fraud;
        if !(f.medium_threshold < f.high_threshold && f.high_threshold < f.critical_threshold) {
            return invalid(format!(
                "fraud thresholds must increase: {}/{}/{}",
                f.medium_threshold, f.high_threshold, f.critical_threshold
            ));
        }
        if f.reject_threshold > 100 {
            return invalid("fraud.reject_threshold must be within 0..=100".to_string());
        }
        if !f.min_reserve_balance.is_finite() {
            return invalid("fraud.min_reserve_balance must be finite".to_string());
        }
        if !(f.max_transit_speed_kmh.is_finite() && f.max_transit_speed_kmh > 0.0) {
            return invalid("fraud.max_transit_speed_kmh must be positive".to_string());
        }
        if !(self.rewards.multiplier.is_finite() && self.rewards.multiplier > 0.0) {
            return invalid(format!(
                "rewards.multiplier must be positive ({})",
                self.rewards.multiplier
            ));
        }
        if self.rewards.max_reconciliation_attempts == 0 {
            return invalid("rewards.max_reconciliation_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Limits applied by the ticket parser
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketConfig {
    pub min_length: usize,
    pub max_length: usize,
    /// Network-extent bound
    pub max_distance_meters: u32,
    pub freshness_window_hours: i64,
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            min_length: 10,
            max_length: 500,
            max_distance_meters: 350_000,
            freshness_window_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub window_hours: i64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self { window_hours: 24 }
    }
}

/// Emission factors in grams CO₂ per kilometer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CarbonConfig {
    pub reference_mode: String,
    pub alternative_mode: String,
    pub factors: BTreeMap<String, f64>,
}

impl Default for CarbonConfig {
    fn default() -> Self {
        let factors = [
            ("transit", 41.0),
            ("bus", 89.0),
            ("train", 35.0),
            ("car", 192.0),
            ("motorcycle", 103.0),
            ("taxi", 210.0),
            ("bicycle", 0.0),
            ("walking", 0.0),
        ]
        .into_iter()
        .map(|(mode, grams)| (mode.to_string(), grams))
        .collect();

        Self {
            reference_mode: "transit".to_string(),
            alternative_mode: "car".to_string(),
            factors,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudConfig {
    /// Scores at or above this are MEDIUM
    pub medium_threshold: u32,
    /// Scores at or above this are HIGH
    pub high_threshold: u32,
    /// Scores at or above this are CRITICAL
    pub critical_threshold: u32,
    /// Journeys scoring at or above this are rejected
    pub reject_threshold: u32,
    pub min_reserve_balance: f64,
    pub max_transit_speed_kmh: f64,
    pub lookup_timeout_ms: u64,
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            medium_threshold: 25,
            high_threshold: 60,
            critical_threshold: 85,
            reject_threshold: 85,
            min_reserve_balance: 1.0,
            max_transit_speed_kmh: 160.0,
            lookup_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardsConfig {
    pub multiplier: f64,
    pub topic_ref: String,
    pub contract_ref: String,
    pub function_name: String,
    pub token_ref: String,
    pub step_timeout_ms: u64,
    pub max_reconciliation_attempts: u32,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            multiplier: 10.0,
            topic_ref: "0.0.1001".to_string(),
            contract_ref: "0.0.2002".to_string(),
            function_name: "recordJourney".to_string(),
            token_ref: "0.0.3003".to_string(),
            step_timeout_ms: 10_000,
            max_reconciliation_attempts: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ticket.max_distance_meters, 350_000);
        assert_eq!(config.fraud.reject_threshold, 85);
        assert_eq!(config.carbon.factors["transit"], 41.0);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
carbon:
  alternative_mode: taxi
rewards:
  multiplier: 12
"#;
        let config = PipelineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.carbon.alternative_mode, "taxi");
        assert_eq!(config.carbon.reference_mode, "transit");
        assert_eq!(config.rewards.multiplier, 12.0);
        assert_eq!(config.rewards.token_ref, "0.0.3003");
        assert_eq!(config.replay.window_hours, 24);
    }

    #[test]
    fn test_unknown_alternative_mode_rejected() {
        let yaml = "carbon:\n  alternative_mode: hovercraft\n";
        let err = PipelineConfig::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("hovercraft"));
    }

    #[test]
    fn test_thresholds_must_increase() {
        let yaml = "fraud:\n  medium_threshold: 70\n";
        assert!(matches!(
            PipelineConfig::from_yaml_str(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_bad_yaml() {
        assert!(matches!(
            PipelineConfig::from_yaml_str("ticket: [1, 2"),
            Err(ConfigError::Parse(_))
        ));
    }
}
