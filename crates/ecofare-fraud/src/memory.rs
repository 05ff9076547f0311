//! In-memory account history with failure injection
use crate::history::{AccountHistory, AccountLookupError, AccountSnapshot};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct InMemoryAccountHistory {
    accounts: Mutex<HashMap<String, AccountSnapshot>>,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
    lookups: AtomicUsize,
}

impl InMemoryAccountHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, account_ref: impl Into<String>, snapshot: AccountSnapshot) -> Self {
        self.insert(account_ref, snapshot);
        self
    }

    pub fn insert(&self, account_ref: impl Into<String>, snapshot: AccountSnapshot) {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(account_ref.into(), snapshot);
    }

    /// Make every lookup return an error
    pub fn fail_lookups(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Sleep before answering, to exercise caller timeouts
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountHistory for InMemoryAccountHistory {
    async fn lookup(&self, account_ref: &str) -> Result<Option<AccountSnapshot>, AccountLookupError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(AccountLookupError("account service unavailable".to_string()));
        }

        Ok(self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(account_ref)
            .cloned())
    }
}
