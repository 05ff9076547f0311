//! Invariant and configuration errors
use chrono::{DateTime, Utc};
use thiserror::Error;

/// A violated [`crate::JourneyDraft`] invariant
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvariantViolation {
    #[error("distance must be positive")]
    NonPositiveDistance,

    #[error("distance {distance_meters}m exceeds network extent of {max_meters}m")]
    DistanceExceedsNetwork { distance_meters: u32, max_meters: u32 },

    #[error("origin and destination are the same station ({station})")]
    SameStation { station: String },

    #[error("ticket observed at {observed_at} is in the future (now {now})")]
    ObservedInFuture {
        observed_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("ticket observed at {observed_at} is older than {max_age_hours}h")]
    Expired {
        observed_at: DateTime<Utc>,
        max_age_hours: i64,
    },
}

impl InvariantViolation {
    /// Stable rule name, used in error codes and logs
    pub fn rule(&self) -> &'static str {
        match self {
            Self::NonPositiveDistance => "distance_positive",
            Self::DistanceExceedsNetwork { .. } => "distance_within_network",
            Self::SameStation { .. } => "distinct_stations",
            Self::ObservedInFuture { .. } => "not_in_future",
            Self::Expired { .. } => "within_freshness_window",
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("CONFIG/IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("CONFIG/PARSE: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("CONFIG/INVALID: {0}")]
    Invalid(String),
}
