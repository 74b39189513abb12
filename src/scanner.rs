//! Discovery of fee-bearing token accounts for a mint.

use tracing::info;

use crate::account::TokenAccount;
use crate::error::{WorkflowError, WorkflowResult};
use crate::instruction::TOKEN_PROGRAM_ID;
use crate::keys::Address;
use crate::ledger::LedgerClient;

/// A token account holding withheld fees at scan time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeBearingAccount {
    pub address: Address,
    pub withheld_amount: u64,
}

/// Point-in-time snapshot of a mint's fee-bearing accounts. Balances can
/// change the moment the scan returns; harvesting tolerates that rather
/// than assuming the snapshot stays accurate.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub mint: Address,
    pub accounts: Vec<FeeBearingAccount>,
}

impl ScanResult {
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn total_withheld(&self) -> u64 {
        self.accounts
            .iter()
            .fold(0u64, |acc, a| acc.saturating_add(a.withheld_amount))
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.accounts.iter().map(|a| a.address).collect()
    }
}

pub struct WithheldFeeScanner<'a> {
    ledger: &'a dyn LedgerClient,
}

impl<'a> WithheldFeeScanner<'a> {
    pub fn new(ledger: &'a dyn LedgerClient) -> Self {
        Self { ledger }
    }

    /// Find every token account of `mint` with a positive withheld balance.
    ///
    /// The ledger filters by mint server-side; the withheld balance lives in
    /// an extension entry whose position is not fixed, so that part of the
    /// filter runs locally. A token account that fails to decode fails the
    /// whole scan: silently skipping one would leave its fees stranded.
    pub async fn find_fee_bearing_accounts(&self, mint: &Address) -> WorkflowResult<ScanResult> {
        let raw = self
            .ledger
            .get_program_accounts(&*TOKEN_PROGRAM_ID, 0, mint.as_bytes())
            .await
            .map_err(|e| WorkflowError::Discovery(e.to_string()))?;

        let scanned = raw.len();
        let mut accounts = Vec::new();
        for (address, info) in raw {
            let account = TokenAccount::decode(&info.data)
                .map_err(|e| WorkflowError::Discovery(format!("account {address}: {e}")))?;
            if account.withheld_amount > 0 {
                accounts.push(FeeBearingAccount {
                    address,
                    withheld_amount: account.withheld_amount,
                });
            }
        }

        info!(%mint, scanned, fee_bearing = accounts.len(), "scan complete");
        Ok(ScanResult {
            mint: *mint,
            accounts,
        })
    }
}
