//! Distribution state machine
//!
//! ```text
//! PENDING → LEDGER_RECORDED → CONTRACT_ATTEMPTED → MINT_ATTEMPTED → COMPLETE
//!    ↓
//! ABORTED
//! ```
//!
//! Only the ledger step can abort. Once the ledger record exists every later
//! step is attempted and the run always reaches COMPLETE.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistributionState {
    Pending,
    LedgerRecorded,
    ContractAttempted,
    MintAttempted,
    Complete,
    Aborted,
}

impl DistributionState {
    /// The single legal successor on the happy path
    pub fn next(self) -> Option<Self> {
        use DistributionState::*;
        match self {
            Pending => Some(LedgerRecorded),
            LedgerRecorded => Some(ContractAttempted),
            ContractAttempted => Some(MintAttempted),
            MintAttempted => Some(Complete),
            Complete | Aborted => None,
        }
    }

    pub fn can_transition_to(self, to: Self) -> bool {
        match to {
            DistributionState::Aborted => self == DistributionState::Pending,
            _ => self.next() == Some(to),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DistributionState::Complete | DistributionState::Aborted)
    }
}

impl fmt::Display for DistributionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            DistributionState::Pending => "PENDING",
            DistributionState::LedgerRecorded => "LEDGER_RECORDED",
            DistributionState::ContractAttempted => "CONTRACT_ATTEMPTED",
            DistributionState::MintAttempted => "MINT_ATTEMPTED",
            DistributionState::Complete => "COMPLETE",
            DistributionState::Aborted => "ABORTED",
        };
        f.write_str(name)
    }
}

/// Illegal state change; indicates a distributor bug
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("DISTRIBUTION/TRANSITION: {from} → {to} is not allowed")]
pub struct InvalidTransition {
    pub from: DistributionState,
    pub to: DistributionState,
}

/// Current state plus the checked transition helper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateMachine {
    state: DistributionState,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: DistributionState::Pending,
        }
    }

    pub fn state(&self) -> DistributionState {
        self.state
    }

    pub fn advance(&mut self, to: DistributionState) -> Result<DistributionState, InvalidTransition> {
        if !self.state.can_transition_to(to) {
            return Err(InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(to)
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::DistributionState::*;

    #[test]
    fn test_happy_path() {
        let mut sm = StateMachine::new();
        for to in [LedgerRecorded, ContractAttempted, MintAttempted, Complete] {
            sm.advance(to).unwrap();
        }
        assert!(sm.state().is_terminal());
    }

    #[test]
    fn test_abort_only_from_pending() {
        assert!(Pending.can_transition_to(Aborted));
        for from in [LedgerRecorded, ContractAttempted, MintAttempted, Complete, Aborted] {
            assert!(!from.can_transition_to(Aborted), "{} → ABORTED", from);
        }
    }

    #[test]
    fn test_no_skipping() {
        let mut sm = StateMachine::new();
        let err = sm.advance(MintAttempted).unwrap_err();
        assert_eq!(err.from, Pending);
        assert_eq!(sm.state(), Pending);
    }
}
