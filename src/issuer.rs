//! Issuance of fee-bearing mints.

use tracing::info;

use crate::account::{Mint, MINT_WITH_FEE_CONFIG_LEN};
use crate::config::SweepConfig;
use crate::error::{LedgerError, WorkflowError, WorkflowResult};
use crate::fee::{TransferFeePolicy, MAX_DECIMALS};
use crate::instruction::{
    create_account, initialize_mint, initialize_transfer_fee_config, TOKEN_PROGRAM_ID,
};
use crate::keys::{Address, Keypair};
use crate::ledger::{confirm_transaction, LedgerClient};
use crate::transaction::Transaction;

/// A mint the issuer created, or adopted from existing ledger state.
#[derive(Debug, Clone)]
pub struct IssuedMint {
    pub mint: Address,
    /// Signature of the issuance transaction; absent for adopted mints.
    pub signature: Option<String>,
    pub policy: TransferFeePolicy,
    pub decimals: u8,
}

pub struct TokenIssuer<'a> {
    ledger: &'a dyn LedgerClient,
    config: &'a SweepConfig,
}

impl<'a> TokenIssuer<'a> {
    pub fn new(ledger: &'a dyn LedgerClient, config: &'a SweepConfig) -> Self {
        Self { ledger, config }
    }

    /// Create a fee-bearing mint in a single transaction.
    ///
    /// The transaction funds the mint account, writes the transfer-fee
    /// extension, then initializes the mint. The ledger rejects the reverse
    /// order, so a mint can never land without its fee schedule.
    ///
    /// On a confirmation timeout the mint account is re-read before the
    /// failure is reported: the transaction may still have landed, and a
    /// blind resubmit would issue a second mint under a fresh address.
    pub async fn issue(&self, payer: &Keypair) -> WorkflowResult<IssuedMint> {
        let token = &self.config.token;
        let policy = TransferFeePolicy::new(token.fee_basis_points, token.max_fee)?;
        if token.decimals > MAX_DECIMALS {
            return Err(WorkflowError::InvalidPolicy(format!(
                "decimals {} exceed {MAX_DECIMALS}",
                token.decimals
            )));
        }

        let payer_address = payer.address();
        let rent = self
            .ledger
            .minimum_balance_for_rent_exemption(MINT_WITH_FEE_CONFIG_LEN)
            .await?;
        let balance = self.ledger.get_balance(&payer_address).await?;
        if balance < rent {
            return Err(WorkflowError::Funding(format!(
                "payer {payer_address} holds {balance} lamports, mint rent needs {rent}"
            )));
        }

        let mint_keypair = Keypair::generate();
        let mint = mint_keypair.address();
        let instructions = [
            create_account(
                payer_address,
                mint,
                rent,
                MINT_WITH_FEE_CONFIG_LEN as u64,
                *TOKEN_PROGRAM_ID,
            ),
            initialize_transfer_fee_config(
                mint,
                Some(self.config.fee_policy_authority(payer_address)),
                Some(self.config.withdraw_authority(payer_address)),
                policy,
            ),
            initialize_mint(
                mint,
                token.decimals,
                self.config.mint_authority(payer_address),
                None,
            ),
        ];

        let blockhash = self.ledger.latest_blockhash().await?;
        let tx = Transaction::new_signed(payer, &[&mint_keypair], &instructions, blockhash)
            .map_err(|e| WorkflowError::Ledger(LedgerError::InvalidParameter(e.to_string())))?;
        let signature = self
            .ledger
            .submit_transaction(&tx)
            .await
            .map_err(map_issue_error)?;
        info!(%mint, %signature, "issuance submitted");

        let confirmed = confirm_transaction(
            self.ledger,
            &signature,
            self.config.network.commitment,
            self.config.confirmation_timeout(),
        )
        .await;
        if let Err(err) = confirmed {
            if matches!(err, WorkflowError::ConfirmationTimeout { .. }) {
                if let Ok(found) = self.load_mint(&mint).await {
                    info!(%mint, "issuance landed despite confirmation timeout");
                    return Ok(IssuedMint {
                        signature: Some(signature),
                        ..found
                    });
                }
            }
            return Err(err);
        }

        info!(
            %mint,
            fee_basis_points = policy.fee_basis_points,
            max_fee = policy.max_fee,
            "mint issued"
        );
        Ok(IssuedMint {
            mint,
            signature: Some(signature),
            policy,
            decimals: token.decimals,
        })
    }

    /// Adopt an existing fee-bearing mint.
    pub async fn load_mint(&self, mint: &Address) -> WorkflowResult<IssuedMint> {
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
        Ok(IssuedMint {
            mint: *mint,
            signature: None,
            policy: config.policy,
            decimals: decoded.decimals,
        })
    }
}

fn map_issue_error(err: LedgerError) -> WorkflowError {
    match err {
        LedgerError::InsufficientFunds(msg) => WorkflowError::Funding(msg),
        LedgerError::InvalidParameter(msg) => WorkflowError::InvalidPolicy(msg),
        other => WorkflowError::Ledger(other),
    }
}
