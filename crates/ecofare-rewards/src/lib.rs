//! Ecofare Rewards: multi-system reward distribution
//!
//! The ledger record is the single source of truth for a journey. The
//! contract call and the token mint are delivery channels whose failure must
//! not erase the fact that the journey was verified and recorded:
//!
//! | Step | On failure |
//! |------|-----------|
//! | ledger append | abort with [`LedgerRecordError`] |
//! | contract invoke | record, continue |
//! | mint + transfer | record, queue for [`Reconciler`], continue |

pub mod collaborators;
pub mod distributor;
pub mod memory;
pub mod outcome;
pub mod reconciliation;
pub mod state;

pub use collaborators::{
    ContractExecutionError, ContractExecutor, ContractReceipt, LedgerAppender, LedgerReceipt,
    LedgerRecordError, MintErrorKind, MintReceipt, TokenIssuer, TokenMintError,
};
pub use distributor::{
    calculate_tokens, generate_journey_id, DistributionRequest, JourneyRecord, RewardDistributor,
};
pub use memory::{InMemoryContractExecutor, InMemoryLedger, InMemoryTokenIssuer};
pub use outcome::{
    ContractInvocationResult, ContractStatus, DistributionStep, LedgerRecord,
    RewardDistributionOutcome, RewardStatus, StepOutcome, StepRecord, TokenMintResult,
};
pub use reconciliation::{PendingReward, ReconciliationQueue, Reconciler, SweepReport};
pub use state::{DistributionState, InvalidTransition, StateMachine};
