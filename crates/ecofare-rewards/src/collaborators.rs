//! External systems the distributor writes to
//!
//! None of them share a transaction boundary. Implementations are expected
//! to be thin clients; the distributor applies its own deadlines.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Ledger
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    pub sequence_ref: String,
    pub transaction_ref: String,
}

/// The append-only ledger write failed; nothing was recorded
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum LedgerRecordError {
    #[error("LEDGER/RECORD: {0}")]
    Rejected(String),

    #[error("LEDGER/RECORD: no answer within {0}ms")]
    TimedOut(u64),
}

#[async_trait]
pub trait LedgerAppender: Send + Sync {
    async fn append(&self, topic_ref: &str, payload: &[u8]) -> Result<LedgerReceipt, LedgerRecordError>;
}

// =============================================================================
// Contract
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractReceipt {
    pub transaction_ref: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ContractExecutionError {
    #[error("CONTRACT/EXECUTION: {0}")]
    Reverted(String),

    #[error("CONTRACT/EXECUTION: no answer within {0}ms")]
    TimedOut(u64),
}

#[async_trait]
pub trait ContractExecutor: Send + Sync {
    async fn invoke(
        &self,
        contract_ref: &str,
        function_name: &str,
        args: &[serde_json::Value],
    ) -> Result<ContractReceipt, ContractExecutionError>;
}

// =============================================================================
// Token issuance
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MintReceipt {
    pub mint_ref: String,
    pub transfer_ref: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MintErrorKind {
    /// Recipient has not opted in to receive the token
    NotAssociated,
    Other,
}

impl MintErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            MintErrorKind::NotAssociated => "NOT_ASSOCIATED",
            MintErrorKind::Other => "MINT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("TOKEN/{}: {message}", .kind.code())]
pub struct TokenMintError {
    pub kind: MintErrorKind,
    /// Collaborator message, kept verbatim
    pub message: String,
}

impl TokenMintError {
    pub fn not_associated(message: impl Into<String>) -> Self {
        Self {
            kind: MintErrorKind::NotAssociated,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: MintErrorKind::Other,
            message: message.into(),
        }
    }

    pub fn is_not_associated(&self) -> bool {
        self.kind == MintErrorKind::NotAssociated
    }
}

#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Mint `amount` units of `token_ref` and transfer them to `recipient`
    async fn mint_and_transfer(
        &self,
        token_ref: &str,
        recipient: &str,
        amount: u64,
    ) -> Result<MintReceipt, TokenMintError>;
}
