//! Ecofare Pipeline: the journey reward entry point
//!
//! ```text
//! raw ticket → parse → replay check → carbon → fraud → distribute
//! ```
//!
//! Every stage can end the run with a typed [`PipelineError`]. Only the
//! distributor talks to the ledger, contract and token systems, and only a
//! ledger failure there is fatal.
//!
//! All collaborators are injected through [`JourneyPipeline::builder`]; the
//! `memory` modules of the stage crates provide in-process fakes.

pub mod error;
pub mod pipeline;

pub use error::PipelineError;
pub use pipeline::{JourneyPipeline, JourneyPipelineBuilder};

/// Station catalog compiled into the binary
pub const BUILTIN_STATIONS: &str = include_str!("../data/stations.yaml");

/// Rider used by the demo binary when none is given
pub const DEFAULT_RIDER: &str = "0.0.4242";
