//! Transfer-fee policy and fee arithmetic.
//!
//! Every transfer of a fee-bearing mint withholds
//! `min(floor(amount * fee_basis_points / 10_000), max_fee)` on the
//! destination account. The product is computed in 128 bits so it cannot
//! overflow for any `u64` amount.

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

/// Highest fee rate a policy may carry, in basis points (100%).
pub const MAX_FEE_BASIS_POINTS: u16 = 10_000;

/// Highest decimal precision accepted for a new mint.
pub const MAX_DECIMALS: u8 = 18;

const BASIS_POINT_DENOMINATOR: u128 = 10_000;

/// Fee schedule attached to a mint at issuance. Immutable for the lifetime
/// of a deployment; every fee this crate asserts is derived from it or from
/// the mint's live on-ledger copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFeePolicy {
    /// Fee rate in basis points of the transfer amount.
    pub fee_basis_points: u16,
    /// Absolute cap on the fee per transfer, in base units.
    pub max_fee: u64,
}

impl TransferFeePolicy {
    /// Validate and construct a policy.
    pub fn new(fee_basis_points: u16, max_fee: u64) -> Result<Self, WorkflowError> {
        if fee_basis_points > MAX_FEE_BASIS_POINTS {
            return Err(WorkflowError::InvalidPolicy(format!(
                "fee basis points {fee_basis_points} exceed {MAX_FEE_BASIS_POINTS}"
            )));
        }
        Ok(Self {
            fee_basis_points,
            max_fee,
        })
    }

    /// Fee withheld on a transfer of `amount` base units.
    pub fn fee_for(&self, amount: u64) -> u64 {
        calculate_fee(amount, self.fee_basis_points, self.max_fee)
    }

    /// Amount credited to the destination after the fee is withheld.
    pub fn net_amount(&self, amount: u64) -> u64 {
        amount.saturating_sub(self.fee_for(amount))
    }
}

/// `min(floor(amount * fee_basis_points / 10_000), max_fee)`.
pub fn calculate_fee(amount: u64, fee_basis_points: u16, max_fee: u64) -> u64 {
    let raw = amount as u128 * fee_basis_points as u128 / BASIS_POINT_DENOMINATOR;
    raw.min(max_fee as u128) as u64
}

/// Render a base-unit amount in whole units, trailing zeros trimmed.
pub fn format_units(amount: u64, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let divisor = 10u64.pow(decimals as u32);
    let whole = amount / divisor;
    let frac = amount % divisor;
    if frac == 0 {
        whole.to_string()
    } else {
        let digits = format!("{frac:0width$}", width = decimals as usize);
        format!("{whole}.{}", digits.trim_end_matches('0'))
    }
}
