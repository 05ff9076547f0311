//! Fraud decision audit trail
//!
//! Every scoring decision is kept in a bounded log so rejections can be
//! explained after the fact. Oldest entries are dropped first.

use crate::risk::{FraudAnalysis, RiskLevel};
use chrono::{DateTime, Utc};
use ecofare_core::Fingerprint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One scoring decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub recorded_at: DateTime<Utc>,
    pub rider: String,
    pub fingerprint: Fingerprint,
    pub score: u32,
    pub risk_level: RiskLevel,
    pub approved: bool,
    #[serde(default)]
    pub factors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl AuditEntry {
    pub fn from_analysis(
        analysis: &FraudAnalysis,
        rider: impl Into<String>,
        fingerprint: Fingerprint,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: generate_audit_id(recorded_at),
            recorded_at,
            rider: rider.into(),
            fingerprint,
            score: analysis.score,
            risk_level: analysis.risk_level,
            approved: analysis.approved,
            factors: analysis.factors.clone(),
            trace_id: None,
        }
    }

    pub fn with_trace(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

pub struct FraudAuditLog {
    entries: Vec<AuditEntry>,
    max_entries: usize,
}

impl FraudAuditLog {
    pub fn new() -> Self {
        Self::with_max_entries(10_000)
    }

    pub fn with_max_entries(max: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries: max,
        }
    }

    pub fn log(&mut self, entry: AuditEntry) {
        self.entries.push(entry);

        if self.entries.len() > self.max_entries {
            let drain_count = self.entries.len() - self.max_entries;
            self.entries.drain(0..drain_count);
        }
    }

    /// Record a decision and return its entry id
    pub fn record(
        &mut self,
        analysis: &FraudAnalysis,
        rider: &str,
        fingerprint: &Fingerprint,
        recorded_at: DateTime<Utc>,
    ) -> String {
        let entry = AuditEntry::from_analysis(analysis, rider, fingerprint.clone(), recorded_at);
        let id = entry.id.clone();
        self.log(entry);
        id
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries_since(&self, since: DateTime<Utc>) -> Vec<&AuditEntry> {
        self.entries.iter().filter(|e| e.recorded_at >= since).collect()
    }

    pub fn entries_for_rider(&self, rider: &str) -> Vec<&AuditEntry> {
        self.entries.iter().filter(|e| e.rider == rider).collect()
    }

    pub fn rejected_entries(&self) -> Vec<&AuditEntry> {
        self.entries.iter().filter(|e| !e.approved).collect()
    }

    /// Export to JSON Lines
    pub fn to_jsonl(&self) -> String {
        self.entries
            .iter()
            .filter_map(|e| serde_json::to_string(e).ok())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn stats(&self) -> AuditStats {
        let total = self.entries.len();
        let approved = self.entries.iter().filter(|e| e.approved).count();
        let rejected = total - approved;

        let mut per_tier: BTreeMap<RiskLevel, usize> =
            RiskLevel::all().into_iter().map(|level| (level, 0)).collect();
        for entry in &self.entries {
            *per_tier.entry(entry.risk_level).or_default() += 1;
        }

        let rate = |n: usize| if total > 0 { n as f64 / total as f64 } else { 0.0 };

        AuditStats {
            total,
            approved,
            rejected,
            approval_rate: rate(approved),
            rejection_rate: rate(rejected),
            per_tier,
        }
    }
}

impl Default for FraudAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditStats {
    pub total: usize,
    pub approved: usize,
    pub rejected: usize,
    pub approval_rate: f64,
    pub rejection_rate: f64,
    pub per_tier: BTreeMap<RiskLevel, usize>,
}

fn generate_audit_id(at: DateTime<Utc>) -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("fra_{:x}_{:04x}", at.timestamp_millis(), counter % 0xFFFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::{RiskCategory, RiskFactor};
    use chrono::{Duration, TimeZone};
    use ecofare_core::FraudConfig;

    fn analysis(impacts: &[u32]) -> FraudAnalysis {
        let factors = impacts
            .iter()
            .map(|&impact| RiskFactor {
                rule: "r".to_string(),
                label: format!("factor {}", impact),
                impact,
                category: RiskCategory::Journey,
            })
            .collect();
        FraudAnalysis::from_factors(factors, &FraudConfig::default())
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 12, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_record_and_query() {
        let mut log = FraudAuditLog::new();
        let fp = Fingerprint::of(b"ticket");

        let id = log.record(&analysis(&[]), "0.0.1", &fp, t0());
        log.record(&analysis(&[40, 30, 15]), "0.0.2", &fp, t0() + Duration::minutes(1));

        assert!(id.starts_with("fra_"));
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries_for_rider("0.0.2").len(), 1);
        assert_eq!(log.rejected_entries()[0].rider, "0.0.2");
        assert_eq!(log.entries_since(t0() + Duration::seconds(30)).len(), 1);
    }

    #[test]
    fn test_stats() {
        let mut log = FraudAuditLog::new();
        let fp = Fingerprint::of(b"ticket");
        log.record(&analysis(&[]), "a", &fp, t0());
        log.record(&analysis(&[30]), "b", &fp, t0());
        log.record(&analysis(&[30]), "c", &fp, t0());
        log.record(&analysis(&[40, 40, 40]), "d", &fp, t0());

        let stats = log.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.approved, 3);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.rejection_rate, 0.25);
        assert_eq!(stats.per_tier[&RiskLevel::Medium], 2);
        assert_eq!(stats.per_tier[&RiskLevel::High], 0);
        assert_eq!(stats.per_tier[&RiskLevel::Critical], 1);
    }

    #[test]
    fn test_max_entries() {
        let mut log = FraudAuditLog::with_max_entries(3);
        let fp = Fingerprint::of(b"ticket");
        for i in 0..5 {
            log.record(&analysis(&[]), &format!("rider-{}", i), &fp, t0());
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.entries()[0].rider, "rider-2");
    }

    #[test]
    fn test_jsonl_export() {
        let mut log = FraudAuditLog::new();
        let fp = Fingerprint::of(b"ticket");
        log.log(AuditEntry::from_analysis(&analysis(&[30]), "a", fp.clone(), t0()).with_trace("t-1"));
        log.record(&analysis(&[]), "b", &fp, t0());

        let jsonl = log.to_jsonl();
        let lines: Vec<&str> = jsonl.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: AuditEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.trace_id.as_deref(), Some("t-1"));
        assert_eq!(first.risk_level, RiskLevel::Medium);
    }
}
