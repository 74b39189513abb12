//! Error taxonomy for ledger operations and workflow stages.
//!
//! [`LedgerError`] is what the ledger collaborator reports; [`WorkflowError`]
//! is what each stage surfaces to callers, with ledger faults mapped onto
//! stage-specific meanings at the call site.

use displaydoc::Display;
use thiserror::Error;

use crate::keys::Address;

/// Faults reported by a ledger backend.
#[derive(Debug, Clone, Display, Error)]
pub enum LedgerError {
    /// transport failure: {0}
    Transport(String),

    /// rpc error {code}: {message}
    Rpc { code: i64, message: String },

    /// insufficient funds: {0}
    InsufficientFunds(String),

    /// invalid instruction parameter: {0}
    InvalidParameter(String),

    /// supply overflow: {0}
    SupplyOverflow(String),

    /// fee assertion mismatch: asserted {asserted}, ledger computed {expected}
    FeeMismatch { asserted: u64, expected: u64 },

    /// transaction rejected: {0}
    Rejected(String),

    /// malformed account data: {0}
    MalformedAccount(String),
}

/// Outcome of one withdraw batch within a harvest.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Position of the batch in submission order.
    pub index: usize,
    /// Source accounts the batch listed.
    pub sources: Vec<Address>,
    /// Signature of the landed batch, or the failure text.
    pub outcome: Result<String, String>,
}

/// Stage-level failures of the harvest workflow.
#[derive(Debug, Clone, Display, Error)]
pub enum WorkflowError {
    /// payer cannot fund the operation: {0}
    Funding(String),

    /// fee policy rejected: {0}
    InvalidPolicy(String),

    /// transaction {signature} unconfirmed after {timeout_ms} ms; outcome unknown, re-query ledger state before retrying
    ConfirmationTimeout { signature: String, timeout_ms: u64 },

    /// supply cap exceeded: {0}
    SupplyExceeded(String),

    /// fee-bearing account discovery failed: {0}
    Discovery(String),

    /// {failed} of {total} withdraw batches failed
    BatchWithdraw {
        total: usize,
        failed: usize,
        outcomes: Vec<BatchOutcome>,
    },

    /// stale fee assertion: configured policy computes {asserted}, live policy computes {live}
    StaleFeeAssertion { asserted: u64, live: u64 },

    /// account {0} does not exist on the ledger
    MissingAccount(Address),

    /// ledger fault: {0}
    Ledger(#[from] LedgerError),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl WorkflowError {
    /// True when the operation's outcome is unknown rather than cleanly
    /// rejected. A retry without first re-reading ledger state risks a
    /// duplicate side effect.
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            WorkflowError::ConfirmationTimeout { .. }
                | WorkflowError::Ledger(LedgerError::Transport(_))
        )
    }

    /// Map ledger faults from a fee-asserting transfer onto workflow terms.
    pub(crate) fn from_transfer(err: LedgerError) -> Self {
        match err {
            LedgerError::FeeMismatch { asserted, expected } => WorkflowError::StaleFeeAssertion {
                asserted,
                live: expected,
            },
            LedgerError::InsufficientFunds(msg) => WorkflowError::Funding(msg),
            other => WorkflowError::Ledger(other),
        }
    }

    /// Map ledger faults from a mint operation onto workflow terms.
    pub(crate) fn from_mint(err: LedgerError) -> Self {
        match err {
            LedgerError::SupplyOverflow(msg) => WorkflowError::SupplyExceeded(msg),
            LedgerError::InsufficientFunds(msg) => WorkflowError::Funding(msg),
            other => WorkflowError::Ledger(other),
        }
    }
}
