//! Instruction builders for the system, token, and associated-account
//! programs the workflow drives.

use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};

use crate::fee::TransferFeePolicy;
use crate::keys::Address;

/// System program: account allocation and native transfers.
pub const SYSTEM_PROGRAM_ID: Address = Address([0u8; 32]);

/// Token program with transfer-fee support.
pub static TOKEN_PROGRAM_ID: Lazy<Address> = Lazy::new(|| {
    Address::from_base58("TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb").expect("well-known id")
});

/// Associated-account program.
pub static ASSOCIATED_ACCOUNT_PROGRAM_ID: Lazy<Address> = Lazy::new(|| {
    Address::from_base58("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL").expect("well-known id")
});

// token program opcodes
pub(crate) const OP_INITIALIZE_MINT: u8 = 0;
pub(crate) const OP_MINT_TO: u8 = 7;
pub(crate) const OP_TRANSFER_FEE_EXTENSION: u8 = 26;
// transfer-fee sub-opcodes
pub(crate) const FEE_OP_INITIALIZE_CONFIG: u8 = 0;
pub(crate) const FEE_OP_TRANSFER_CHECKED_WITH_FEE: u8 = 1;
pub(crate) const FEE_OP_WITHDRAW_FROM_ACCOUNTS: u8 = 3;
// system program opcodes
pub(crate) const SYS_OP_CREATE_ACCOUNT: u32 = 0;
// associated-account program opcodes
pub(crate) const ATA_OP_CREATE_IDEMPOTENT: u8 = 1;

/// One account reference within an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMeta {
    pub address: Address,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn writable(address: Address, is_signer: bool) -> Self {
        Self {
            address,
            is_signer,
            is_writable: true,
        }
    }

    pub fn readonly(address: Address, is_signer: bool) -> Self {
        Self {
            address,
            is_signer,
            is_writable: false,
        }
    }
}

/// A single program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: Address,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// Allocate `space` bytes for `new_account` under `owner`, funded by `payer`.
/// Both payer and the new account must sign.
pub fn create_account(
    payer: Address,
    new_account: Address,
    lamports: u64,
    space: u64,
    owner: Address,
) -> Instruction {
    let mut data = Vec::with_capacity(52);
    data.extend_from_slice(&SYS_OP_CREATE_ACCOUNT.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());
    data.extend_from_slice(&space.to_le_bytes());
    data.extend_from_slice(owner.as_bytes());
    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(payer, true),
            AccountMeta::writable(new_account, true),
        ],
        data,
    }
}

/// Attach a transfer-fee schedule to a freshly allocated mint account.
/// Must precede [`initialize_mint`]; the token program rejects the reverse
/// order.
pub fn initialize_transfer_fee_config(
    mint: Address,
    config_authority: Option<Address>,
    withdraw_authority: Option<Address>,
    policy: TransferFeePolicy,
) -> Instruction {
    let mut data = vec![OP_TRANSFER_FEE_EXTENSION, FEE_OP_INITIALIZE_CONFIG];
    push_option(&mut data, config_authority);
    push_option(&mut data, withdraw_authority);
    data.extend_from_slice(&policy.fee_basis_points.to_le_bytes());
    data.extend_from_slice(&policy.max_fee.to_le_bytes());
    Instruction {
        program_id: *TOKEN_PROGRAM_ID,
        accounts: vec![AccountMeta::writable(mint, false)],
        data,
    }
}

/// Finalize the allocated account as a mint.
pub fn initialize_mint(
    mint: Address,
    decimals: u8,
    mint_authority: Address,
    freeze_authority: Option<Address>,
) -> Instruction {
    let mut data = vec![OP_INITIALIZE_MINT, decimals];
    data.extend_from_slice(mint_authority.as_bytes());
    push_option(&mut data, freeze_authority);
    Instruction {
        program_id: *TOKEN_PROGRAM_ID,
        accounts: vec![AccountMeta::writable(mint, false)],
        data,
    }
}

/// Mint `amount` base units into `destination`, signed by the mint
/// authority.
pub fn mint_to(mint: Address, destination: Address, authority: Address, amount: u64) -> Instruction {
    let mut data = vec![OP_MINT_TO];
    data.extend_from_slice(&amount.to_le_bytes());
    Instruction {
        program_id: *TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(mint, false),
            AccountMeta::writable(destination, false),
            AccountMeta::readonly(authority, true),
        ],
        data,
    }
}

/// Fee-asserting transfer. The token program recomputes the fee from the
/// mint's live policy and rejects the transfer when `fee` disagrees, so a
/// stale client assertion can never under- or over-withhold.
pub fn transfer_checked_with_fee(
    source: Address,
    mint: Address,
    destination: Address,
    authority: Address,
    amount: u64,
    decimals: u8,
    fee: u64,
) -> Instruction {
    let mut data = vec![OP_TRANSFER_FEE_EXTENSION, FEE_OP_TRANSFER_CHECKED_WITH_FEE];
    data.extend_from_slice(&amount.to_le_bytes());
    data.push(decimals);
    data.extend_from_slice(&fee.to_le_bytes());
    Instruction {
        program_id: *TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(source, false),
            AccountMeta::readonly(mint, false),
            AccountMeta::writable(destination, false),
            AccountMeta::readonly(authority, true),
        ],
        data,
    }
}

/// Move the withheld balances of `sources` into `destination`, signed by the
/// mint's withdraw authority. Each listed source is zeroed.
pub fn withdraw_withheld_from_accounts(
    mint: Address,
    destination: Address,
    authority: Address,
    sources: &[Address],
) -> Instruction {
    let data = vec![
        OP_TRANSFER_FEE_EXTENSION,
        FEE_OP_WITHDRAW_FROM_ACCOUNTS,
        sources.len() as u8,
    ];
    let mut accounts = Vec::with_capacity(3 + sources.len());
    accounts.push(AccountMeta::readonly(mint, false));
    accounts.push(AccountMeta::writable(destination, false));
    accounts.push(AccountMeta::readonly(authority, true));
    accounts.extend(sources.iter().map(|s| AccountMeta::writable(*s, false)));
    Instruction {
        program_id: *TOKEN_PROGRAM_ID,
        accounts,
        data,
    }
}

/// Create the associated account for `(owner, mint)` unless it already
/// exists; safe to submit either way. Returns the canonical address with the
/// instruction.
pub fn create_associated_account_idempotent(
    payer: Address,
    owner: Address,
    mint: Address,
) -> (Address, Instruction) {
    let address = associated_account_address(owner, mint);
    let instruction = Instruction {
        program_id: *ASSOCIATED_ACCOUNT_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(payer, true),
            AccountMeta::writable(address, false),
            AccountMeta::readonly(owner, false),
            AccountMeta::readonly(mint, false),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::readonly(*TOKEN_PROGRAM_ID, false),
        ],
        data: vec![ATA_OP_CREATE_IDEMPOTENT],
    };
    (address, instruction)
}

/// Canonical associated-account address for `(owner, mint)`: a hash over a
/// fixed tag, the owner, the token program, and the mint. Deterministic, so
/// every party derives the same account without coordination.
pub fn associated_account_address(owner: Address, mint: Address) -> Address {
    let mut hasher = Sha256::new();
    hasher.update(b"associated-account-v1");
    hasher.update(owner.as_bytes());
    hasher.update(TOKEN_PROGRAM_ID.as_bytes());
    hasher.update(mint.as_bytes());
    Address(hasher.finalize().into())
}

/// Instruction-data optional key: a one-byte tag, value bytes only when
/// present.
fn push_option(data: &mut Vec<u8>, value: Option<Address>) {
    match value {
        Some(address) => {
            data.push(1);
            data.extend_from_slice(address.as_bytes());
        }
        None => data.push(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Keypair;

    #[test]
    fn associated_address_is_deterministic() {
        let owner = Keypair::generate().address();
        let mint = Keypair::generate().address();
        let first = associated_account_address(owner, mint);
        let second = associated_account_address(owner, mint);
        assert_eq!(first, second);
        assert_ne!(first, associated_account_address(mint, owner));
        assert_ne!(
            first,
            associated_account_address(owner, Keypair::generate().address())
        );
    }

    #[test]
    fn create_account_data_layout() {
        let ix = create_account(
            Keypair::generate().address(),
            Keypair::generate().address(),
            1_000,
            278,
            *TOKEN_PROGRAM_ID,
        );
        assert_eq!(ix.data.len(), 52);
        assert_eq!(&ix.data[..4], &[0, 0, 0, 0]);
        assert_eq!(u64::from_le_bytes(ix.data[4..12].try_into().unwrap()), 1_000);
        assert_eq!(u64::from_le_bytes(ix.data[12..20].try_into().unwrap()), 278);
        assert!(ix.accounts.iter().all(|m| m.is_writable && m.is_signer));
    }

    #[test]
    fn fee_config_data_layout() {
        let policy = TransferFeePolicy {
            fee_basis_points: 3_000,
            max_fee: 9_000_000_000,
        };
        let authority = Keypair::generate().address();
        let ix = initialize_transfer_fee_config(
            Keypair::generate().address(),
            Some(authority),
            Some(authority),
            policy,
        );
        // two opcodes, two tagged keys, rate, cap
        assert_eq!(ix.data.len(), 2 + 33 + 33 + 2 + 8);
        assert_eq!(ix.data[0], OP_TRANSFER_FEE_EXTENSION);
        assert_eq!(ix.data[1], FEE_OP_INITIALIZE_CONFIG);
        let none_ix = initialize_transfer_fee_config(authority, None, None, policy);
        assert_eq!(none_ix.data.len(), 2 + 1 + 1 + 2 + 8);
    }

    #[test]
    fn transfer_data_layout() {
        let a = Keypair::generate().address();
        let ix = transfer_checked_with_fee(a, a, a, a, 1_000_000_000_000, 9, 9_000_000_000);
        assert_eq!(ix.data.len(), 2 + 8 + 1 + 8);
        assert_eq!(ix.data[10], 9);
        assert_eq!(
            u64::from_le_bytes(ix.data[11..19].try_into().unwrap()),
            9_000_000_000
        );
    }

    #[test]
    fn withdraw_lists_every_source_writable() {
        let sources: Vec<Address> = (0..4).map(|_| Keypair::generate().address()).collect();
        let a = Keypair::generate().address();
        let ix = withdraw_withheld_from_accounts(a, a, a, &sources);
        assert_eq!(ix.data, vec![26, 3, 4]);
        assert_eq!(ix.accounts.len(), 7);
        assert!(ix.accounts[3..].iter().all(|m| m.is_writable && !m.is_signer));
        assert!(ix.accounts[2].is_signer);
    }
}
