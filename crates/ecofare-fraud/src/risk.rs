//! Risk tiers and scored factors

use ecofare_core::FraudConfig;
use serde::{Deserialize, Serialize};

/// Risk tier derived from a fraud score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    #[default]
    Low = 0,
    Medium = 1,
    High = 2,
    Critical = 3,
}

impl RiskLevel {
    /// Map a score onto the configured tier thresholds
    pub fn from_score(score: u32, thresholds: &FraudConfig) -> Self {
        if score >= thresholds.critical_threshold {
            RiskLevel::Critical
        } else if score >= thresholds.high_threshold {
            RiskLevel::High
        } else if score >= thresholds.medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn all() -> [RiskLevel; 4] {
        [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High, RiskLevel::Critical]
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Which sub-score a factor belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Account,
    Journey,
}

/// A triggered rule and what it added to the score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    /// Rule id, stable across releases
    pub rule: String,
    /// Human-readable signal name
    pub label: String,
    pub impact: u32,
    pub category: RiskCategory,
}

/// Result of scoring one journey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudAnalysis {
    /// Sum of factor impacts, clamped to 0..=100
    pub score: u32,
    pub risk_level: RiskLevel,
    pub approved: bool,
    /// Labels of the triggered factors, account signals first
    pub factors: Vec<String>,
    pub breakdown: Vec<RiskFactor>,
}

impl FraudAnalysis {
    pub fn from_factors(breakdown: Vec<RiskFactor>, config: &FraudConfig) -> Self {
        let raw: u32 = breakdown.iter().map(|f| f.impact).sum();
        let score = raw.min(100);
        Self {
            score,
            risk_level: RiskLevel::from_score(score, config),
            approved: score < config.reject_threshold,
            factors: breakdown.iter().map(|f| f.label.clone()).collect(),
            breakdown,
        }
    }

    /// Impact summed per category, before clamping
    pub fn sub_score(&self, category: RiskCategory) -> u32 {
        self.breakdown
            .iter()
            .filter(|f| f.category == category)
            .map(|f| f.impact)
            .sum()
    }
}
