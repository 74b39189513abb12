//! Account-state codecs for fee-bearing mints and token accounts.
//!
//! Layouts follow the token program's extension scheme: a fixed base record,
//! an account-type discriminator at offset 165, then type/length/value
//! extension entries. Mint records are zero-padded up to the discriminator
//! so both account kinds keep it at the same offset.

use crate::error::LedgerError;
use crate::fee::TransferFeePolicy;
use crate::keys::{Address, ADDRESS_LEN};

/// Base record length of a mint.
pub const MINT_BASE_LEN: usize = 82;
/// Base record length of a token account.
pub const ACCOUNT_BASE_LEN: usize = 165;
/// Offset of the account-type discriminator when extensions are present.
pub const ACCOUNT_TYPE_OFFSET: usize = 165;

const ACCOUNT_TYPE_MINT: u8 = 1;
const ACCOUNT_TYPE_ACCOUNT: u8 = 2;

/// Extension carrying a mint's transfer-fee schedule.
pub const EXTENSION_TRANSFER_FEE_CONFIG: u16 = 1;
/// Extension carrying a token account's withheld fee balance.
pub const EXTENSION_TRANSFER_FEE_AMOUNT: u16 = 2;

const TRANSFER_FEE_CONFIG_LEN: usize = 108;
const TRANSFER_FEE_AMOUNT_LEN: usize = 8;

/// Full length of a mint account with the transfer-fee config attached.
pub const MINT_WITH_FEE_CONFIG_LEN: usize =
    ACCOUNT_TYPE_OFFSET + 1 + 4 + TRANSFER_FEE_CONFIG_LEN;
/// Full length of a token account with the withheld-amount extension.
pub const ACCOUNT_WITH_FEE_AMOUNT_LEN: usize =
    ACCOUNT_TYPE_OFFSET + 1 + 4 + TRANSFER_FEE_AMOUNT_LEN;

/// Token-account state byte for an initialized account.
pub const ACCOUNT_STATE_INITIALIZED: u8 = 1;

/// Decoded transfer-fee extension of a mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferFeeConfig {
    /// Authority allowed to change the schedule; encoded as the zero address
    /// when absent.
    pub config_authority: Option<Address>,
    /// Authority allowed to withdraw withheld fees.
    pub withdraw_authority: Option<Address>,
    /// Fees withheld on the mint account itself.
    pub withheld_amount: u64,
    /// Current fee schedule.
    pub policy: TransferFeePolicy,
}

impl TransferFeeConfig {
    fn decode(value: &[u8]) -> Result<Self, LedgerError> {
        if value.len() != TRANSFER_FEE_CONFIG_LEN {
            return Err(LedgerError::MalformedAccount(format!(
                "transfer fee config is {} bytes, expected {TRANSFER_FEE_CONFIG_LEN}",
                value.len()
            )));
        }
        let config_authority = read_optional_key(value, 0)?;
        let withdraw_authority = read_optional_key(value, 32)?;
        let withheld_amount = read_u64(value, 64)?;
        // two epoch-tagged schedules follow; the later one is current
        let max_fee = read_u64(value, 98)?;
        let fee_basis_points = read_u16(value, 106)?;
        Ok(Self {
            config_authority,
            withdraw_authority,
            withheld_amount,
            policy: TransferFeePolicy {
                fee_basis_points,
                max_fee,
            },
        })
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        write_optional_key(buf, self.config_authority.as_ref());
        write_optional_key(buf, self.withdraw_authority.as_ref());
        buf.extend_from_slice(&self.withheld_amount.to_le_bytes());
        // older and newer schedule slots, kept identical
        for _ in 0..2 {
            buf.extend_from_slice(&0u64.to_le_bytes());
            buf.extend_from_slice(&self.policy.max_fee.to_le_bytes());
            buf.extend_from_slice(&self.policy.fee_basis_points.to_le_bytes());
        }
    }
}

/// Decoded mint record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mint {
    pub mint_authority: Option<Address>,
    pub supply: u64,
    pub decimals: u8,
    pub is_initialized: bool,
    pub freeze_authority: Option<Address>,
    /// Present when the mint carries the transfer-fee extension.
    pub transfer_fee: Option<TransferFeeConfig>,
}

impl Mint {
    pub fn decode(data: &[u8]) -> Result<Self, LedgerError> {
        if data.len() < MINT_BASE_LEN {
            return Err(truncated(MINT_BASE_LEN, data.len()));
        }
        let mint_authority = read_coption_address(data, 0)?;
        let supply = read_u64(data, 36)?;
        let decimals = data[44];
        let is_initialized = data[45] != 0;
        let freeze_authority = read_coption_address(data, 46)?;
        let transfer_fee = if data.len() > ACCOUNT_TYPE_OFFSET {
            if data[ACCOUNT_TYPE_OFFSET] != ACCOUNT_TYPE_MINT {
                return Err(LedgerError::MalformedAccount(format!(
                    "account type {} is not a mint",
                    data[ACCOUNT_TYPE_OFFSET]
                )));
            }
            match find_extension(data, EXTENSION_TRANSFER_FEE_CONFIG)? {
                Some(value) => Some(TransferFeeConfig::decode(value)?),
                None => None,
            }
        } else {
            None
        };
        Ok(Self {
            mint_authority,
            supply,
            decimals,
            is_initialized,
            freeze_authority,
            transfer_fee,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let capacity = if self.transfer_fee.is_some() {
            MINT_WITH_FEE_CONFIG_LEN
        } else {
            MINT_BASE_LEN
        };
        let mut buf = Vec::with_capacity(capacity);
        write_coption_address(&mut buf, self.mint_authority.as_ref());
        buf.extend_from_slice(&self.supply.to_le_bytes());
        buf.push(self.decimals);
        buf.push(self.is_initialized as u8);
        write_coption_address(&mut buf, self.freeze_authority.as_ref());
        if let Some(fee) = &self.transfer_fee {
            buf.resize(ACCOUNT_TYPE_OFFSET, 0);
            buf.push(ACCOUNT_TYPE_MINT);
            buf.extend_from_slice(&EXTENSION_TRANSFER_FEE_CONFIG.to_le_bytes());
            buf.extend_from_slice(&(TRANSFER_FEE_CONFIG_LEN as u16).to_le_bytes());
            fee.encode_into(&mut buf);
        }
        buf
    }
}

/// Decoded token-account record. Delegate and close-authority fields are
/// parsed past but not retained; nothing here uses them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAccount {
    pub mint: Address,
    pub owner: Address,
    pub amount: u64,
    pub state: u8,
    /// Withheld transfer fees pending harvest.
    pub withheld_amount: u64,
}

impl TokenAccount {
    /// Fresh, empty account for `(owner, mint)`.
    pub fn new(mint: Address, owner: Address) -> Self {
        Self {
            mint,
            owner,
            amount: 0,
            state: ACCOUNT_STATE_INITIALIZED,
            withheld_amount: 0,
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, LedgerError> {
        if data.len() < ACCOUNT_BASE_LEN {
            return Err(truncated(ACCOUNT_BASE_LEN, data.len()));
        }
        let mint = read_address(data, 0)?;
        let owner = read_address(data, 32)?;
        let amount = read_u64(data, 64)?;
        let state = data[108];
        let withheld_amount = if data.len() > ACCOUNT_TYPE_OFFSET {
            if data[ACCOUNT_TYPE_OFFSET] != ACCOUNT_TYPE_ACCOUNT {
                return Err(LedgerError::MalformedAccount(format!(
                    "account type {} is not a token account",
                    data[ACCOUNT_TYPE_OFFSET]
                )));
            }
            match find_extension(data, EXTENSION_TRANSFER_FEE_AMOUNT)? {
                Some(value) => read_u64(value, 0)?,
                None => 0,
            }
        } else {
            0
        };
        Ok(Self {
            mint,
            owner,
            amount,
            state,
            withheld_amount,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ACCOUNT_WITH_FEE_AMOUNT_LEN);
        buf.extend_from_slice(self.mint.as_bytes());
        buf.extend_from_slice(self.owner.as_bytes());
        buf.extend_from_slice(&self.amount.to_le_bytes());
        write_coption_address(&mut buf, None); // delegate
        buf.push(self.state);
        buf.extend_from_slice(&0u32.to_le_bytes()); // native tag
        buf.extend_from_slice(&0u64.to_le_bytes()); // native amount
        buf.extend_from_slice(&0u64.to_le_bytes()); // delegated amount
        write_coption_address(&mut buf, None); // close authority
        buf.push(ACCOUNT_TYPE_ACCOUNT);
        buf.extend_from_slice(&EXTENSION_TRANSFER_FEE_AMOUNT.to_le_bytes());
        buf.extend_from_slice(&(TRANSFER_FEE_AMOUNT_LEN as u16).to_le_bytes());
        buf.extend_from_slice(&self.withheld_amount.to_le_bytes());
        buf
    }
}

/// Walk the type/length/value entries after the discriminator. A type of
/// zero terminates the walk; an entry running past the buffer is malformed.
fn find_extension(data: &[u8], extension_type: u16) -> Result<Option<&[u8]>, LedgerError> {
    let mut cursor = ACCOUNT_TYPE_OFFSET + 1;
    while cursor + 4 <= data.len() {
        let entry_type = read_u16(data, cursor)?;
        if entry_type == 0 {
            break;
        }
        let len = read_u16(data, cursor + 2)? as usize;
        let start = cursor + 4;
        let end = start + len;
        if end > data.len() {
            return Err(LedgerError::MalformedAccount(format!(
                "extension {entry_type} overruns account data"
            )));
        }
        if entry_type == extension_type {
            return Ok(Some(&data[start..end]));
        }
        cursor = end;
    }
    Ok(None)
}

fn truncated(needed: usize, have: usize) -> LedgerError {
    LedgerError::MalformedAccount(format!("need {needed} bytes, have {have}"))
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16, LedgerError> {
    match data.get(offset..offset + 2) {
        Some(b) => Ok(u16::from_le_bytes([b[0], b[1]])),
        None => Err(truncated(offset + 2, data.len())),
    }
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32, LedgerError> {
    match data.get(offset..offset + 4) {
        Some(b) => Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        None => Err(truncated(offset + 4, data.len())),
    }
}

fn read_u64(data: &[u8], offset: usize) -> Result<u64, LedgerError> {
    match data.get(offset..offset + 8) {
        Some(b) => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(b);
            Ok(u64::from_le_bytes(raw))
        }
        None => Err(truncated(offset + 8, data.len())),
    }
}

fn read_address(data: &[u8], offset: usize) -> Result<Address, LedgerError> {
    match data.get(offset..offset + ADDRESS_LEN) {
        Some(b) => {
            let mut raw = [0u8; ADDRESS_LEN];
            raw.copy_from_slice(b);
            Ok(Address(raw))
        }
        None => Err(truncated(offset + ADDRESS_LEN, data.len())),
    }
}

/// Tagged optional key: 4-byte little-endian tag, then 32 bytes reserved
/// whether present or not.
fn read_coption_address(data: &[u8], offset: usize) -> Result<Option<Address>, LedgerError> {
    match read_u32(data, offset)? {
        0 => {
            // value bytes are still reserved
            read_address(data, offset + 4)?;
            Ok(None)
        }
        1 => read_address(data, offset + 4).map(Some),
        other => Err(LedgerError::MalformedAccount(format!(
            "bad option tag {other}"
        ))),
    }
}

fn write_coption_address(buf: &mut Vec<u8>, value: Option<&Address>) {
    match value {
        Some(address) => {
            buf.extend_from_slice(&1u32.to_le_bytes());
            buf.extend_from_slice(address.as_bytes());
        }
        None => {
            buf.extend_from_slice(&0u32.to_le_bytes());
            buf.extend_from_slice(&[0u8; ADDRESS_LEN]);
        }
    }
}

/// Untagged optional key: the zero address stands for "none".
fn read_optional_key(data: &[u8], offset: usize) -> Result<Option<Address>, LedgerError> {
    let address = read_address(data, offset)?;
    Ok(if address.is_zero() { None } else { Some(address) })
}

fn write_optional_key(buf: &mut Vec<u8>, value: Option<&Address>) {
    match value {
        Some(address) => buf.extend_from_slice(address.as_bytes()),
        None => buf.extend_from_slice(&[0u8; ADDRESS_LEN]),
    }
}
