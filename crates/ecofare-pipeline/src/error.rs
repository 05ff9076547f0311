//! Unified pipeline error
use ecofare_carbon::UnknownModeError;
use ecofare_core::ConfigError;
use ecofare_fraud::FraudRejected;
use ecofare_replay::{DuplicateSubmission, ReplayError};
use ecofare_rewards::LedgerRecordError;
use ecofare_ticket::TicketError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ticket(#[from] TicketError),

    #[error(transparent)]
    Duplicate(#[from] DuplicateSubmission),

    #[error("REPLAY/STORE: {0}")]
    ReplayStore(String),

    #[error(transparent)]
    Carbon(#[from] UnknownModeError),

    #[error(transparent)]
    FraudRejected(#[from] FraudRejected),

    #[error(transparent)]
    Ledger(#[from] LedgerRecordError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("PIPELINE/INCOMPLETE: no {0} configured")]
    Incomplete(&'static str),
}

impl From<ReplayError> for PipelineError {
    fn from(err: ReplayError) -> Self {
        match err {
            ReplayError::Duplicate(dup) => PipelineError::Duplicate(dup),
            ReplayError::Unavailable(msg) => PipelineError::ReplayStore(msg),
        }
    }
}

impl PipelineError {
    /// Stable machine code, `AREA/REASON`
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Ticket(err) => match err {
                TicketError::Malformed(_) => "TICKET/MALFORMED",
                TicketError::UnsafeContent { .. } => "TICKET/UNSAFE",
                TicketError::UnsupportedFormat => "TICKET/UNSUPPORTED_FORMAT",
                TicketError::UnknownStation(_) => "TICKET/UNKNOWN_STATION",
                TicketError::InvalidJourney(_) => "TICKET/INVALID_JOURNEY",
            },
            PipelineError::Duplicate(_) => "REPLAY/DUPLICATE",
            PipelineError::ReplayStore(_) => "REPLAY/STORE",
            PipelineError::Carbon(_) => "CARBON/UNKNOWN_MODE",
            PipelineError::FraudRejected(_) => "FRAUD/REJECTED",
            PipelineError::Ledger(_) => "LEDGER/RECORD",
            PipelineError::Config(err) => match err {
                ConfigError::Io(_) => "CONFIG/IO",
                ConfigError::Parse(_) => "CONFIG/PARSE",
                ConfigError::Invalid(_) => "CONFIG/INVALID",
            },
            PipelineError::Incomplete(_) => "PIPELINE/INCOMPLETE",
        }
    }

    /// Rejections the rider can act on; everything else is a server fault
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Ticket(_) | PipelineError::Duplicate(_) | PipelineError::FraudRejected(_)
        )
    }

    /// Caller-facing JSON body
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "code": self.code(),
            "message": self.to_string(),
            "client_error": self.is_client_error(),
        });
        match self {
            PipelineError::Duplicate(dup) => {
                body["first_accepted_at"] = serde_json::json!(dup.first_accepted_at);
            }
            PipelineError::FraudRejected(rejection) => {
                body["score"] = serde_json::json!(rejection.score);
                body["risk_level"] = serde_json::json!(rejection.risk_level);
                body["factors"] = serde_json::json!(rejection.factors);
            }
            PipelineError::Ticket(TicketError::InvalidJourney(violation)) => {
                body["rule"] = serde_json::json!(violation.rule());
            }
            _ => {}
        }
        body
    }
}
