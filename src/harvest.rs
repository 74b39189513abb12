//! Withheld-fee harvesting into a vault account.
//!
//! A harvest walks a scan snapshot in fixed-size withdraw batches. Batches
//! that land stay landed; a failed batch is never resubmitted from the same
//! snapshot, because its sources may have gained or lost withheld fees in
//! the meantime. The caller re-scans and harvests again instead.
//!
//! Harvests of the same mint are serialized process-wide. Two overlapping
//! harvests would not corrupt balances, since a withdraw takes whatever is
//! withheld at execution, but their outcome accounting would double-count.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::account::{Mint, TokenAccount};
use crate::config::SweepConfig;
use crate::error::{BatchOutcome, LedgerError, WorkflowError, WorkflowResult};
use crate::instruction::{
    associated_account_address, transfer_checked_with_fee, withdraw_withheld_from_accounts,
};
use crate::keys::{Address, Keypair};
use crate::ledger::{
    confirm_transaction, ensure_associated_account, submit_and_confirm, LedgerClient,
};
use crate::scanner::ScanResult;
use crate::transaction::Transaction;

/// Source accounts per withdraw instruction, bounded by transaction size.
pub const MAX_WITHDRAW_SOURCES: usize = 25;

static HARVEST_LOCKS: Lazy<Mutex<HashMap<Address, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

async fn mint_lock(mint: &Address) -> Arc<Mutex<()>> {
    HARVEST_LOCKS.lock().await.entry(*mint).or_default().clone()
}

/// Result of a completed harvest.
#[derive(Debug, Clone)]
pub struct HarvestOutcome {
    /// The vault token account fees were swept into.
    pub vault: Address,
    pub vault_owner: Address,
    /// Vault balance gained over this harvest.
    pub withdrawn: u64,
    pub batches: Vec<BatchOutcome>,
    /// Vault balance after the harvest.
    pub vault_balance: u64,
}

/// A landed vault forwarding transfer.
#[derive(Debug, Clone)]
pub struct ForwardRecord {
    pub recipient: Address,
    /// The recipient's associated token account.
    pub destination: Address,
    /// Gross amount sent from the vault.
    pub amount: u64,
    /// Fee withheld on the forwarding transfer itself.
    pub fee: u64,
    pub signature: String,
}

pub struct HarvestCoordinator<'a> {
    ledger: &'a dyn LedgerClient,
    config: &'a SweepConfig,
}

impl<'a> HarvestCoordinator<'a> {
    pub fn new(ledger: &'a dyn LedgerClient, config: &'a SweepConfig) -> Self {
        Self { ledger, config }
    }

    /// Sweep the withheld fees of every account in `scan` into the vault
    /// owned by `vault_owner`.
    ///
    /// Sources whose withheld balance has dropped to zero since the scan
    /// are harmless; a withdraw takes whatever is withheld at execution.
    /// The amount actually gained is measured from the vault balance, not
    /// from the snapshot.
    pub async fn harvest(
        &self,
        payer: &Keypair,
        scan: &ScanResult,
        vault_owner: &Address,
    ) -> WorkflowResult<HarvestOutcome> {
        let lock = mint_lock(&scan.mint).await;
        let _guard = lock.lock().await;

        let commitment = self.config.network.commitment;
        let timeout = self.config.confirmation_timeout();
        let vault = ensure_associated_account(
            self.ledger,
            payer,
            vault_owner,
            &scan.mint,
            commitment,
            timeout,
        )
        .await?;
        let balance_before = self.vault_balance(&vault).await?;
        let authority = self.config.withdraw_authority(payer.address());

        let sources = scan.addresses();
        let mut batches = Vec::new();
        for (index, chunk) in sources.chunks(MAX_WITHDRAW_SOURCES).enumerate() {
            let result: WorkflowResult<String> = async {
                let instruction =
                    withdraw_withheld_from_accounts(scan.mint, vault, authority, chunk);
                let blockhash = self.ledger.latest_blockhash().await?;
                let tx = Transaction::new_signed(payer, &[], &[instruction], blockhash)
                    .map_err(|e| {
                        WorkflowError::Ledger(LedgerError::InvalidParameter(e.to_string()))
                    })?;
                submit_and_confirm(self.ledger, &tx, commitment, timeout).await
            }
            .await;

            match result {
                Ok(signature) => {
                    info!(batch = index, sources = chunk.len(), %signature, "withdraw batch landed");
                    batches.push(BatchOutcome {
                        index,
                        sources: chunk.to_vec(),
                        outcome: Ok(signature),
                    });
                }
                Err(error) => {
                    warn!(batch = index, sources = chunk.len(), %error, "withdraw batch failed");
                    batches.push(BatchOutcome {
                        index,
                        sources: chunk.to_vec(),
                        outcome: Err(error.to_string()),
                    });
                }
            }
        }

        let vault_balance = self.vault_balance(&vault).await?;
        let withdrawn = vault_balance.saturating_sub(balance_before);
        let failed = batches.iter().filter(|b| b.outcome.is_err()).count();
        if failed > 0 {
            return Err(WorkflowError::BatchWithdraw {
                total: batches.len(),
                failed,
                outcomes: batches,
            });
        }

        info!(withdrawn, vault_balance, "harvest complete");
        Ok(HarvestOutcome {
            vault,
            vault_owner: *vault_owner,
            withdrawn,
            batches,
            vault_balance,
        })
    }

    /// Send the vault's whole balance to `recipient`.
    ///
    /// The forwarding transfer is itself fee-bearing: the recipient receives
    /// the balance minus the fee the live schedule computes for it. The
    /// vault owner signs; when the payer is the owner no extra signature is
    /// needed.
    pub async fn forward_from_vault(
        &self,
        payer: &Keypair,
        vault_keys: &Keypair,
        mint: &Address,
        recipient: &Address,
    ) -> WorkflowResult<ForwardRecord> {
        let vault = associated_account_address(vault_keys.address(), *mint);
        let amount = self.vault_balance(&vault).await?;
        if amount == 0 {
            return Err(WorkflowError::Funding(format!(
                "vault {vault} holds no balance to forward"
            )));
        }

        let info = self
            .ledger
            .get_account(mint)
            .await?
            .ok_or(WorkflowError::MissingAccount(*mint))?;
        let decoded = Mint::decode(&info.data)?;
        let fee_config = decoded.transfer_fee.ok_or_else(|| {
            WorkflowError::InvalidPolicy(format!("mint {mint} has no transfer-fee extension"))
        })?;
        let fee = fee_config.policy.fee_for(amount);

        let commitment = self.config.network.commitment;
        let timeout = self.config.confirmation_timeout();
        let destination =
            ensure_associated_account(self.ledger, payer, recipient, mint, commitment, timeout)
                .await?;

        let instruction = transfer_checked_with_fee(
            vault,
            *mint,
            destination,
            vault_keys.address(),
            amount,
            decoded.decimals,
            fee,
        );
        let extra: Vec<&Keypair> = if vault_keys.address() == payer.address() {
            Vec::new()
        } else {
            vec![vault_keys]
        };
        let blockhash = self.ledger.latest_blockhash().await?;
        let tx = Transaction::new_signed(payer, &extra, &[instruction], blockhash)
            .map_err(|e| WorkflowError::Ledger(LedgerError::InvalidParameter(e.to_string())))?;
        let signature = self
            .ledger
            .submit_transaction(&tx)
            .await
            .map_err(WorkflowError::from_transfer)?;
        confirm_transaction(self.ledger, &signature, commitment, timeout).await?;

        info!(%vault, %destination, amount, fee, %signature, "vault balance forwarded");
        Ok(ForwardRecord {
            recipient: *recipient,
            destination,
            amount,
            fee,
            signature,
        })
    }

    async fn vault_balance(&self, vault: &Address) -> WorkflowResult<u64> {
        let info = self
            .ledger
            .get_account(vault)
            .await?
            .ok_or(WorkflowError::MissingAccount(*vault))?;
        Ok(TokenAccount::decode(&info.data)?.amount)
    }
}
