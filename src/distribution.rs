//! Supply distribution: mint into the payer's source account, then one
//! fee-asserting transfer per holder.
//!
//! Transfers run sequentially in holder order and a failed holder does not
//! stop the rest. The report keeps per-holder outcomes so a caller can
//! retry exactly the holders that failed.

use tracing::{info, warn};

use crate::account::Mint;
use crate::config::SweepConfig;
use crate::error::{LedgerError, WorkflowError, WorkflowResult};
use crate::fee::TransferFeePolicy;
use crate::instruction::{mint_to, transfer_checked_with_fee};
use crate::keys::{Address, Keypair};
use crate::ledger::{confirm_transaction, ensure_associated_account, LedgerClient};
use crate::transaction::Transaction;

/// One landed holder transfer.
#[derive(Debug, Clone)]
pub struct TransferRecord {
    pub holder_index: usize,
    pub holder: Address,
    /// The holder's associated token account.
    pub destination: Address,
    /// Gross amount debited from the source.
    pub amount: u64,
    /// Fee withheld on the destination.
    pub fee: u64,
    pub signature: String,
}

/// One holder transfer that did not land.
#[derive(Debug, Clone)]
pub struct FailedTransfer {
    pub holder_index: usize,
    pub holder: Address,
    pub error: WorkflowError,
}

#[derive(Debug, Clone)]
pub struct DistributionReport {
    /// Source token account the transfers were paid from.
    pub source: Address,
    pub decimals: u8,
    /// Signature of the supply mint, when one was submitted.
    pub mint_signature: Option<String>,
    pub transfers: Vec<TransferRecord>,
    pub failures: Vec<FailedTransfer>,
}

impl DistributionReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Total fees withheld across the landed transfers.
    pub fn total_fees(&self) -> u64 {
        self.transfers.iter().map(|t| t.fee).sum()
    }
}

struct LiveMint {
    decimals: u8,
    policy: TransferFeePolicy,
}

pub struct DistributionEngine<'a> {
    ledger: &'a dyn LedgerClient,
    config: &'a SweepConfig,
}

impl<'a> DistributionEngine<'a> {
    pub fn new(ledger: &'a dyn LedgerClient, config: &'a SweepConfig) -> Self {
        Self { ledger, config }
    }

    /// Mint `mint_amount` into the payer's source account, then send
    /// `transfer_amount` to every holder.
    ///
    /// The fee asserted on each transfer comes from the configured policy
    /// and is checked against the mint's live schedule up front; a mismatch
    /// aborts the distribution before anything is submitted, since every
    /// transfer would bounce against the ledger's own fee check anyway.
    pub async fn mint_and_distribute(
        &self,
        payer: &Keypair,
        mint: &Address,
        holders: &[Address],
        mint_amount: u64,
        transfer_amount: u64,
    ) -> WorkflowResult<DistributionReport> {
        let live = self.live_mint(mint).await?;
        let asserted = self.config.token.policy().fee_for(transfer_amount);
        let live_fee = live.policy.fee_for(transfer_amount);
        if asserted != live_fee {
            return Err(WorkflowError::StaleFeeAssertion {
                asserted,
                live: live_fee,
            });
        }

        let commitment = self.config.network.commitment;
        let timeout = self.config.confirmation_timeout();
        let source = ensure_associated_account(
            self.ledger,
            payer,
            &payer.address(),
            mint,
            commitment,
            timeout,
        )
        .await?;

        let mint_signature = if mint_amount > 0 {
            let instruction = mint_to(
                *mint,
                source,
                self.config.mint_authority(payer.address()),
                mint_amount,
            );
            let blockhash = self.ledger.latest_blockhash().await?;
            let tx = Transaction::new_signed(payer, &[], &[instruction], blockhash)
                .map_err(|e| WorkflowError::Ledger(LedgerError::InvalidParameter(e.to_string())))?;
            let signature = self
                .ledger
                .submit_transaction(&tx)
                .await
                .map_err(WorkflowError::from_mint)?;
            confirm_transaction(self.ledger, &signature, commitment, timeout).await?;
            info!(%signature, amount = mint_amount, "supply minted into source account");
            Some(signature)
        } else {
            None
        };

        let mut transfers = Vec::new();
        let mut failures = Vec::new();
        for (holder_index, holder) in holders.iter().enumerate() {
            match self
                .transfer_to_holder(payer, mint, &source, holder, transfer_amount, live_fee, live.decimals)
                .await
            {
                Ok((destination, signature)) => transfers.push(TransferRecord {
                    holder_index,
                    holder: *holder,
                    destination,
                    amount: transfer_amount,
                    fee: live_fee,
                    signature,
                }),
                Err(error) => {
                    warn!(holder_index, %holder, %error, "holder transfer failed");
                    failures.push(FailedTransfer {
                        holder_index,
                        holder: *holder,
                        error,
                    });
                }
            }
        }

        info!(
            landed = transfers.len(),
            failed = failures.len(),
            "distribution finished"
        );
        Ok(DistributionReport {
            source,
            decimals: live.decimals,
            mint_signature,
            transfers,
            failures,
        })
    }

    async fn transfer_to_holder(
        &self,
        payer: &Keypair,
        mint: &Address,
        source: &Address,
        holder: &Address,
        amount: u64,
        fee: u64,
        decimals: u8,
    ) -> WorkflowResult<(Address, String)> {
        let commitment = self.config.network.commitment;
        let timeout = self.config.confirmation_timeout();
        let destination =
            ensure_associated_account(self.ledger, payer, holder, mint, commitment, timeout)
                .await?;
        let instruction = transfer_checked_with_fee(
            *source,
            *mint,
            destination,
            payer.address(),
            amount,
            decimals,
            fee,
        );
        let blockhash = self.ledger.latest_blockhash().await?;
        let tx = Transaction::new_signed(payer, &[], &[instruction], blockhash)
            .map_err(|e| WorkflowError::Ledger(LedgerError::InvalidParameter(e.to_string())))?;
        let signature = self
            .ledger
            .submit_transaction(&tx)
            .await
            .map_err(WorkflowError::from_transfer)?;
        confirm_transaction(self.ledger, &signature, commitment, timeout).await?;
        Ok((destination, signature))
    }

    async fn live_mint(&self, mint: &Address) -> WorkflowResult<LiveMint> {
        let info = self
            .ledger
            .get_account(mint)
            .await?
            .ok_or(WorkflowError::MissingAccount(*mint))?;
        let decoded = Mint::decode(&info.data)?;
        if !decoded.is_initialized {
            return Err(WorkflowError::Ledger(LedgerError::Rejected(format!(
                "account {mint} is not an initialized mint"
            ))));
        }
        let config = decoded.transfer_fee.ok_or_else(|| {
            WorkflowError::InvalidPolicy(format!("mint {mint} has no transfer-fee extension"))
        })?;
        Ok(LiveMint {
            decimals: decoded.decimals,
            policy: config.policy,
        })
    }
}
