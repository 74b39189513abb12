//! Ledger-client surface: the capability trait, shared types, and the
//! confirmation and provisioning helpers built on top of it.
//!
//! Workflow stages depend only on [`LedgerClient`]; the JSON-RPC backend in
//! [`rpc`] talks to a real network and the in-process backend in [`memory`]
//! backs dry runs and tests.

pub mod memory;
pub mod rpc;

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::account::TokenAccount;
use crate::error::{LedgerError, WorkflowError, WorkflowResult};
use crate::instruction::create_associated_account_idempotent;
use crate::keys::{Address, Keypair};
use crate::transaction::Transaction;

/// Durability level for queries, preflight, and confirmation waits.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    /// Seen by the queried node; may still be rolled back.
    Processed,
    /// Voted on by a supermajority.
    #[default]
    Confirmed,
    /// Rooted; cannot be rolled back.
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw account snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub lamports: u64,
    pub owner: Address,
    pub data: Vec<u8>,
}

/// Status of a submitted signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    /// The ledger has no record of the signature (yet).
    Unknown,
    Processed,
    Confirmed,
    Finalized,
    /// Landed but failed execution.
    Failed(String),
}

impl TxStatus {
    /// Whether this status satisfies the requested commitment.
    pub fn satisfies(&self, commitment: Commitment) -> bool {
        let reached = match self {
            TxStatus::Processed => Commitment::Processed,
            TxStatus::Confirmed => Commitment::Confirmed,
            TxStatus::Finalized => Commitment::Finalized,
            TxStatus::Unknown | TxStatus::Failed(_) => return false,
        };
        reached >= commitment
    }
}

/// Capabilities the workflow needs from a ledger backend.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit a signed transaction; returns its base58 signature.
    async fn submit_transaction(&self, tx: &Transaction) -> Result<String, LedgerError>;

    /// Point-in-time status of a signature.
    async fn signature_status(&self, signature: &str) -> Result<TxStatus, LedgerError>;

    /// Recent blockhash for transaction assembly.
    async fn latest_blockhash(&self) -> Result<[u8; 32], LedgerError>;

    /// Minimum balance exempting an account of `size` bytes from rent.
    async fn minimum_balance_for_rent_exemption(&self, size: usize) -> Result<u64, LedgerError>;

    /// Fetch one account; `None` when it does not exist.
    async fn get_account(&self, address: &Address) -> Result<Option<AccountInfo>, LedgerError>;

    /// Server-side scan: accounts owned by `program` whose data at `offset`
    /// equals `bytes`.
    async fn get_program_accounts(
        &self,
        program: &Address,
        offset: usize,
        bytes: &[u8],
    ) -> Result<Vec<(Address, AccountInfo)>, LedgerError>;

    /// Native balance in lamports; zero when the account does not exist.
    async fn get_balance(&self, address: &Address) -> Result<u64, LedgerError>;

    /// Dev-network faucet credit.
    async fn request_airdrop(&self, address: &Address, lamports: u64)
        -> Result<String, LedgerError>;
}

const CONFIRMATION_POLL_INTERVAL: Duration = Duration::from_millis(400);

/// Wait until `signature` reaches `commitment`, bounded by `timeout`.
///
/// A timeout does not mean the transaction failed; it may still land. The
/// returned error says so, and callers must re-query ledger state before any
/// retry.
pub async fn confirm_transaction(
    ledger: &dyn LedgerClient,
    signature: &str,
    commitment: Commitment,
    timeout: Duration,
) -> WorkflowResult<()> {
    let started = Instant::now();
    loop {
        match ledger.signature_status(signature).await? {
            status if status.satisfies(commitment) => return Ok(()),
            TxStatus::Failed(reason) => {
                return Err(WorkflowError::Ledger(LedgerError::Rejected(reason)))
            }
            status => debug!(%signature, ?status, "not yet confirmed"),
        }
        if started.elapsed() >= timeout {
            return Err(WorkflowError::ConfirmationTimeout {
                signature: signature.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        tokio::time::sleep(CONFIRMATION_POLL_INTERVAL).await;
    }
}

/// Submit and wait; the standard write path.
pub async fn submit_and_confirm(
    ledger: &dyn LedgerClient,
    tx: &Transaction,
    commitment: Commitment,
    timeout: Duration,
) -> WorkflowResult<String> {
    let signature = ledger.submit_transaction(tx).await?;
    confirm_transaction(ledger, &signature, commitment, timeout).await?;
    Ok(signature)
}

/// Get-or-create the associated account for `(owner, mint)`.
///
/// Re-running is free: an existing account is verified and returned without
/// any ledger write, so provisioning the same pair any number of times
/// creates at most one account.
pub async fn ensure_associated_account(
    ledger: &dyn LedgerClient,
    payer: &Keypair,
    owner: &Address,
    mint: &Address,
    commitment: Commitment,
    timeout: Duration,
) -> WorkflowResult<Address> {
    let (address, instruction) = create_associated_account_idempotent(payer.address(), *owner, *mint);
    if let Some(existing) = ledger.get_account(&address).await? {
        let account = TokenAccount::decode(&existing.data)?;
        if account.mint != *mint || account.owner != *owner {
            return Err(WorkflowError::Ledger(LedgerError::Rejected(format!(
                "account {address} exists with a different owner or mint"
            ))));
        }
        debug!(%address, "associated account already exists");
        return Ok(address);
    }
    let blockhash = ledger.latest_blockhash().await?;
    let tx = Transaction::new_signed(payer, &[], &[instruction], blockhash)
        .map_err(|e| WorkflowError::Ledger(LedgerError::InvalidParameter(e.to_string())))?;
    submit_and_confirm(ledger, &tx, commitment, timeout).await?;
    debug!(%address, %owner, "associated account created");
    Ok(address)
}
