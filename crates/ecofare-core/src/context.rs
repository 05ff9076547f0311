//! Execution Context: per-invocation state shared by the pipeline stages
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub trace_id: String,
    /// Account that receives the reward
    pub rider: String,
    /// Single "now" for every stage of one invocation
    pub received_at: DateTime<Utc>,
}

impl ExecutionContext {
    pub fn new(rider: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().to_string(),
            rider: rider.into(),
            received_at,
        }
    }
}
