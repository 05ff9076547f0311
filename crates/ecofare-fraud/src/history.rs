//! Account-history collaborator
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the account history knows about a rider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub age_in_days: u32,
    pub reserve_balance: f64,
    pub asset_association_count: u32,
}

impl AccountSnapshot {
    pub fn new(age_in_days: u32, reserve_balance: f64, asset_association_count: u32) -> Self {
        Self {
            age_in_days,
            reserve_balance,
            asset_association_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("ACCOUNT/LOOKUP: {0}")]
pub struct AccountLookupError(pub String);

#[async_trait]
pub trait AccountHistory: Send + Sync {
    /// `Ok(None)` when the account does not exist
    async fn lookup(&self, account_ref: &str) -> Result<Option<AccountSnapshot>, AccountLookupError>;
}
