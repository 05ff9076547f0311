//! In-memory collaborators with call counters and failure injection
//!
//! Used by tests and by the demo binary.

use crate::collaborators::{
    ContractExecutionError, ContractExecutor, ContractReceipt, LedgerAppender, LedgerReceipt,
    LedgerRecordError, MintErrorKind, MintReceipt, TokenIssuer, TokenMintError,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

fn locked<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn pause(delay: &Mutex<Option<Duration>>) {
    let delay = *locked(delay);
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

// =============================================================================
// Ledger
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct AppendedRecord {
    pub topic_ref: String,
    pub payload: Vec<u8>,
    pub receipt: LedgerReceipt,
}

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    records: Mutex<Vec<AppendedRecord>>,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_appends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *locked(&self.delay) = delay;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Vec<AppendedRecord> {
        locked(&self.records).clone()
    }
}

#[async_trait]
impl LedgerAppender for InMemoryLedger {
    async fn append(&self, topic_ref: &str, payload: &[u8]) -> Result<LedgerReceipt, LedgerRecordError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        pause(&self.delay).await;

        if self.failing.load(Ordering::SeqCst) {
            return Err(LedgerRecordError::Rejected("consensus service unavailable".to_string()));
        }

        let mut records = locked(&self.records);
        let sequence = records.len() + 1;
        let receipt = LedgerReceipt {
            sequence_ref: sequence.to_string(),
            transaction_ref: format!("{}@ledger-{:06}", topic_ref, sequence),
        };
        records.push(AppendedRecord {
            topic_ref: topic_ref.to_string(),
            payload: payload.to_vec(),
            receipt: receipt.clone(),
        });
        Ok(receipt)
    }
}

// =============================================================================
// Contract
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub contract_ref: String,
    pub function_name: String,
    pub args: Vec<serde_json::Value>,
}

#[derive(Debug, Default)]
pub struct InMemoryContractExecutor {
    invocations: Mutex<Vec<Invocation>>,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl InMemoryContractExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_invocations(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *locked(&self.delay) = delay;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        locked(&self.invocations).clone()
    }
}

#[async_trait]
impl ContractExecutor for InMemoryContractExecutor {
    async fn invoke(
        &self,
        contract_ref: &str,
        function_name: &str,
        args: &[serde_json::Value],
    ) -> Result<ContractReceipt, ContractExecutionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        pause(&self.delay).await;

        if self.failing.load(Ordering::SeqCst) {
            return Err(ContractExecutionError::Reverted(
                "CONTRACT_REVERT_EXECUTED".to_string(),
            ));
        }

        locked(&self.invocations).push(Invocation {
            contract_ref: contract_ref.to_string(),
            function_name: function_name.to_string(),
            args: args.to_vec(),
        });
        Ok(ContractReceipt {
            transaction_ref: format!("{}@contract-{:06}", contract_ref, call),
            status: "SUCCESS".to_string(),
        })
    }
}

// =============================================================================
// Token issuer
// =============================================================================

/// Token service keeping balances per account.
///
/// When association is required, transfers to accounts that never called
/// [`InMemoryTokenIssuer::associate`] fail with `NOT_ASSOCIATED`.
#[derive(Debug, Default)]
pub struct InMemoryTokenIssuer {
    balances: Mutex<HashMap<String, u64>>,
    associated: Mutex<HashSet<String>>,
    require_association: bool,
    forced_failure: Mutex<Option<MintErrorKind>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl InMemoryTokenIssuer {
    /// Issuer that delivers to any account
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requiring_association() -> Self {
        Self {
            require_association: true,
            ..Self::default()
        }
    }

    pub fn associate(&self, account: impl Into<String>) {
        locked(&self.associated).insert(account.into());
    }

    /// Fail every call with `kind` until cleared with `None`
    pub fn force_failure(&self, kind: Option<MintErrorKind>) {
        *locked(&self.forced_failure) = kind;
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *locked(&self.delay) = delay;
    }

    pub fn balance(&self, account: &str) -> u64 {
        locked(&self.balances).get(account).copied().unwrap_or(0)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenIssuer for InMemoryTokenIssuer {
    async fn mint_and_transfer(
        &self,
        token_ref: &str,
        recipient: &str,
        amount: u64,
    ) -> Result<MintReceipt, TokenMintError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        pause(&self.delay).await;

        let forced = *locked(&self.forced_failure);
        match forced {
            Some(MintErrorKind::NotAssociated) => {
                return Err(TokenMintError::not_associated("TOKEN_NOT_ASSOCIATED_TO_ACCOUNT"))
            }
            Some(MintErrorKind::Other) => {
                return Err(TokenMintError::other("token service unavailable"))
            }
            None => {}
        }

        if self.require_association && !locked(&self.associated).contains(recipient) {
            return Err(TokenMintError::not_associated("TOKEN_NOT_ASSOCIATED_TO_ACCOUNT"));
        }

        *locked(&self.balances).entry(recipient.to_string()).or_default() += amount;
        Ok(MintReceipt {
            mint_ref: format!("{}@mint-{:06}", token_ref, call),
            transfer_ref: format!("{}@transfer-{:06}", token_ref, call),
        })
    }
}
