//! Data Model: JourneyDraft, CarbonAnalysis, StageProof
use crate::config::TicketConfig;
use crate::error::InvariantViolation;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque station identifier as published by the station directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationId(pub String);

impl StationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable hash of a raw ticket payload (`blake3:<hex>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(payload: &[u8]) -> Self {
        Self(format!("blake3:{}", blake3::hash(payload)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First hex characters, enough to correlate log lines
    pub fn short(&self) -> &str {
        let end = self.0.len().min("blake3:".len() + 12);
        &self.0[..end]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ticket encodings the parser understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// `PREFIX:from:to:timestamp[:distance[:duration]]`
    ColonDelimited,
    Json,
    /// base64 wrapper around one of the other encodings
    Base64,
    /// URL with query parameters
    Url,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SourceFormat::ColonDelimited => write!(f, "colon"),
            SourceFormat::Json => write!(f, "json"),
            SourceFormat::Base64 => write!(f, "base64"),
            SourceFormat::Url => write!(f, "url"),
        }
    }
}

/// WGS84 coordinates in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Canonical journey produced by the ticket parser.
///
/// Created once per pipeline invocation and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyDraft {
    pub from_station: StationId,
    pub to_station: StationId,
    pub distance_meters: u32,
    pub observed_at: DateTime<Utc>,
    pub raw_encoding_fingerprint: Fingerprint,
    pub source_format: SourceFormat,
    /// Ride duration when the ticket carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
}

impl JourneyDraft {
    pub fn distance_km(&self) -> f64 {
        f64::from(self.distance_meters) / 1000.0
    }

    /// Check the draft invariants against `now`.
    ///
    /// Rules are checked in a fixed order and the first violation is returned.
    pub fn validate(
        &self,
        now: DateTime<Utc>,
        limits: &TicketConfig,
    ) -> Result<(), InvariantViolation> {
        if self.from_station == self.to_station {
            return Err(InvariantViolation::SameStation {
                station: self.from_station.to_string(),
            });
        }
        if self.distance_meters == 0 {
            return Err(InvariantViolation::NonPositiveDistance);
        }
        if self.distance_meters > limits.max_distance_meters {
            return Err(InvariantViolation::DistanceExceedsNetwork {
                distance_meters: self.distance_meters,
                max_meters: limits.max_distance_meters,
            });
        }
        if self.observed_at > now {
            return Err(InvariantViolation::ObservedInFuture {
                observed_at: self.observed_at,
                now,
            });
        }
        if now - self.observed_at > Duration::hours(limits.freshness_window_hours) {
            return Err(InvariantViolation::Expired {
                observed_at: self.observed_at,
                max_age_hours: limits.freshness_window_hours,
            });
        }
        Ok(())
    }
}

/// Emissions delta between the transit ride and the alternative mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonAnalysis {
    pub distance_km: f64,
    pub reference_mode: String,
    pub alternative_mode: String,
    pub reference_emission_grams: f64,
    pub alternative_emission_grams: f64,
    /// `max(0, alternative - reference)`
    pub carbon_saved_grams: f64,
}

/// Provenance record for one pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageProof {
    pub id: String,
    pub in_hash: String,
    pub out_hash: String,
    pub latency_ms: u64,
}

impl StageProof {
    pub fn new(id: impl Into<String>, in_hash: String, out_hash: String, latency_ms: u64) -> Self {
        Self {
            id: id.into(),
            in_hash,
            out_hash,
            latency_ms,
        }
    }

    /// Hash any serializable stage value, `blake3:<hex>` over its JSON form
    pub fn hash_value<T: Serialize + ?Sized>(value: &T) -> String {
        let bytes = serde_json::to_vec(value).unwrap_or_default();
        format!("blake3:{}", blake3::hash(&bytes))
    }
}
