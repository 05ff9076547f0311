//! Ecofare Core: journey data model, configuration and execution context
//!
//! Shared types for every stage of the journey reward pipeline. Stages
//! receive an immutable [`JourneyDraft`], derive analyses from it, and record
//! a [`StageProof`] for provenance.

pub mod clock;
pub mod config;
pub mod context;
pub mod data_model;
pub mod error;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    CarbonConfig, FraudConfig, PipelineConfig, ReplayConfig, RewardsConfig, TicketConfig,
};
pub use context::ExecutionContext;
pub use data_model::{
    CarbonAnalysis, Coordinates, Fingerprint, JourneyDraft, SourceFormat, StageProof, StationId,
};
pub use error::{ConfigError, InvariantViolation};

/// Engine version, logged by the binary at startup
pub const ECOFARE_VERSION: &str = "1.0.0";
