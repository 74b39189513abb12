//! Deterministic in-process ledger implementing the token semantics the
//! workflow depends on: rent-funded account creation, transfer-fee mints,
//! fee-asserting transfers, and withheld-fee withdrawal. Backs dry runs and
//! the test suite.
//!
//! Transactions execute synchronously at submission and finalize
//! immediately. Execution is atomic per transaction: instructions run
//! against a scratch copy of the account map that is committed only when
//! every instruction succeeds.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{AccountInfo, LedgerClient, TxStatus};
use crate::account::{
    Mint, TokenAccount, TransferFeeConfig, ACCOUNT_WITH_FEE_AMOUNT_LEN, MINT_BASE_LEN,
    MINT_WITH_FEE_CONFIG_LEN,
};
use crate::error::LedgerError;
use crate::fee::{TransferFeePolicy, MAX_FEE_BASIS_POINTS};
use crate::instruction::{
    associated_account_address, ASSOCIATED_ACCOUNT_PROGRAM_ID, ATA_OP_CREATE_IDEMPOTENT,
    FEE_OP_INITIALIZE_CONFIG, FEE_OP_TRANSFER_CHECKED_WITH_FEE, FEE_OP_WITHDRAW_FROM_ACCOUNTS,
    OP_INITIALIZE_MINT, OP_MINT_TO, OP_TRANSFER_FEE_EXTENSION, SYSTEM_PROGRAM_ID,
    SYS_OP_CREATE_ACCOUNT, TOKEN_PROGRAM_ID,
};
use crate::keys::{verify_signature, Address, ADDRESS_LEN};
use crate::transaction::{CompiledInstruction, Message, Transaction};

/// Lamports per byte of account storage, two-year horizon.
const RENT_LAMPORTS_PER_BYTE: u64 = 6_960;
/// Fixed per-account storage overhead charged alongside the data bytes.
const ACCOUNT_STORAGE_OVERHEAD: u64 = 128;

type Accounts = HashMap<Address, AccountInfo>;

#[derive(Debug, Default)]
struct LedgerState {
    accounts: Accounts,
    statuses: HashMap<String, TxStatus>,
    creations: HashMap<Address, u32>,
    next_nonce: u64,
    hold_confirmations: bool,
}

/// In-memory ledger backend.
#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimum lamports exempting `size` bytes of account data from rent.
    pub fn rent_exempt_minimum(size: usize) -> u64 {
        (size as u64 + ACCOUNT_STORAGE_OVERHEAD) * RENT_LAMPORTS_PER_BYTE
    }

    /// Credit lamports to an account, creating it when missing.
    pub fn fund(&self, address: &Address, lamports: u64) {
        let mut state = self.lock();
        let entry = state
            .accounts
            .entry(*address)
            .or_insert_with(|| AccountInfo {
                lamports: 0,
                owner: SYSTEM_PROGRAM_ID,
                data: Vec::new(),
            });
        entry.lamports = entry.lamports.saturating_add(lamports);
    }

    /// While set, every signature reports [`TxStatus::Unknown`]; exercises
    /// confirmation-timeout handling.
    pub fn hold_confirmations(&self, hold: bool) {
        self.lock().hold_confirmations = hold;
    }

    /// Times an account has been created, for idempotency assertions.
    pub fn creation_count(&self, address: &Address) -> u32 {
        self.lock().creations.get(address).copied().unwrap_or(0)
    }

    /// Decoded token account, if one exists at `address`.
    pub fn token_account(&self, address: &Address) -> Option<TokenAccount> {
        let state = self.lock();
        let info = state.accounts.get(address)?;
        TokenAccount::decode(&info.data).ok()
    }

    /// Decoded mint, if one exists at `address`.
    pub fn mint(&self, address: &Address) -> Option<Mint> {
        let state = self.lock();
        let info = state.accounts.get(address)?;
        Mint::decode(&info.data).ok()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().expect("ledger state poisoned")
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn submit_transaction(&self, tx: &Transaction) -> Result<String, LedgerError> {
        let mut state = self.lock();

        let payload = tx.message.serialize();
        let required = tx.message.header.num_required_signatures as usize;
        if tx.signatures.len() != required {
            return Err(LedgerError::Rejected(format!(
                "{} signatures present, {required} required",
                tx.signatures.len()
            )));
        }
        for (signature, key) in tx.signatures.iter().zip(&tx.message.account_keys) {
            if !verify_signature(key, &payload, signature) {
                return Err(LedgerError::Rejected(format!("bad signature for {key}")));
            }
        }
        let signature = tx.signature_base58();
        if signature.is_empty() {
            return Err(LedgerError::Rejected("unsigned transaction".into()));
        }

        let mut work = state.accounts.clone();
        let mut created = Vec::new();
        for ix in &tx.message.instructions {
            execute_instruction(&mut work, &mut created, &tx.message, ix)?;
        }

        state.accounts = work;
        for address in created {
            *state.creations.entry(address).or_insert(0) += 1;
        }
        state.statuses.insert(signature.clone(), TxStatus::Finalized);
        Ok(signature)
    }

    async fn signature_status(&self, signature: &str) -> Result<TxStatus, LedgerError> {
        let state = self.lock();
        if state.hold_confirmations {
            return Ok(TxStatus::Unknown);
        }
        Ok(state
            .statuses
            .get(signature)
            .cloned()
            .unwrap_or(TxStatus::Unknown))
    }

    async fn latest_blockhash(&self) -> Result<[u8; 32], LedgerError> {
        let mut state = self.lock();
        state.next_nonce += 1;
        let mut hasher = Sha256::new();
        hasher.update(b"blockhash");
        hasher.update(state.next_nonce.to_le_bytes());
        Ok(hasher.finalize().into())
    }

    async fn minimum_balance_for_rent_exemption(&self, size: usize) -> Result<u64, LedgerError> {
        Ok(Self::rent_exempt_minimum(size))
    }

    async fn get_account(&self, address: &Address) -> Result<Option<AccountInfo>, LedgerError> {
        Ok(self.lock().accounts.get(address).cloned())
    }

    async fn get_program_accounts(
        &self,
        program: &Address,
        offset: usize,
        bytes: &[u8],
    ) -> Result<Vec<(Address, AccountInfo)>, LedgerError> {
        let state = self.lock();
        let mut matches: Vec<(Address, AccountInfo)> = state
            .accounts
            .iter()
            .filter(|(_, info)| info.owner == *program)
            .filter(|(_, info)| {
                info.data
                    .get(offset..offset + bytes.len())
                    .is_some_and(|window| window == bytes)
            })
            .map(|(address, info)| (*address, info.clone()))
            .collect();
        // map iteration order is not a ledger guarantee; return a stable one
        matches.sort_by_key(|(address, _)| address.0);
        Ok(matches)
    }

    async fn get_balance(&self, address: &Address) -> Result<u64, LedgerError> {
        Ok(self
            .lock()
            .accounts
            .get(address)
            .map(|info| info.lamports)
            .unwrap_or(0))
    }

    async fn request_airdrop(
        &self,
        address: &Address,
        lamports: u64,
    ) -> Result<String, LedgerError> {
        let mut state = self.lock();
        let entry = state
            .accounts
            .entry(*address)
            .or_insert_with(|| AccountInfo {
                lamports: 0,
                owner: SYSTEM_PROGRAM_ID,
                data: Vec::new(),
            });
        entry.lamports = entry.lamports.saturating_add(lamports);
        state.next_nonce += 1;
        let mut hasher = Sha256::new();
        hasher.update(b"airdrop");
        hasher.update(state.next_nonce.to_le_bytes());
        let signature = bs58::encode(hasher.finalize()).into_string();
        state.statuses.insert(signature.clone(), TxStatus::Finalized);
        Ok(signature)
    }
}

fn execute_instruction(
    work: &mut Accounts,
    created: &mut Vec<Address>,
    message: &Message,
    ix: &CompiledInstruction,
) -> Result<(), LedgerError> {
    let program_id = key_at(message, ix.program_id_index)?;
    if program_id == SYSTEM_PROGRAM_ID {
        execute_system(work, created, message, ix)
    } else if program_id == *TOKEN_PROGRAM_ID {
        execute_token(work, message, ix)
    } else if program_id == *ASSOCIATED_ACCOUNT_PROGRAM_ID {
        execute_associated(work, created, message, ix)
    } else {
        Err(LedgerError::Rejected(format!(
            "unknown program {program_id}"
        )))
    }
}

fn execute_system(
    work: &mut Accounts,
    created: &mut Vec<Address>,
    message: &Message,
    ix: &CompiledInstruction,
) -> Result<(), LedgerError> {
    let tag = data_u32(&ix.data, 0)?;
    if tag != SYS_OP_CREATE_ACCOUNT {
        return Err(LedgerError::Rejected(format!(
            "unsupported system instruction {tag}"
        )));
    }
    let lamports = data_u64(&ix.data, 4)?;
    let space = data_u64(&ix.data, 12)? as usize;
    let owner = data_address(&ix.data, 20)?;

    let funder = account_at(message, ix, 0)?;
    let new_account = account_at(message, ix, 1)?;
    if !is_signer(message, &new_account) {
        return Err(LedgerError::Rejected(format!(
            "new account {new_account} must sign its creation"
        )));
    }
    if work.contains_key(&new_account) {
        return Err(LedgerError::Rejected(format!(
            "account {new_account} already in use"
        )));
    }
    let funder_info = work.get_mut(&funder).ok_or_else(|| {
        LedgerError::InsufficientFunds(format!("funder {funder} does not exist"))
    })?;
    if funder_info.lamports < lamports {
        return Err(LedgerError::InsufficientFunds(format!(
            "funder {funder} holds {} lamports, needs {lamports}",
            funder_info.lamports
        )));
    }
    funder_info.lamports -= lamports;
    work.insert(
        new_account,
        AccountInfo {
            lamports,
            owner,
            data: vec![0u8; space],
        },
    );
    created.push(new_account);
    Ok(())
}

fn execute_token(
    work: &mut Accounts,
    message: &Message,
    ix: &CompiledInstruction,
) -> Result<(), LedgerError> {
    match *ix.data.first().ok_or_else(empty_data)? {
        OP_INITIALIZE_MINT => initialize_mint(work, message, ix),
        OP_MINT_TO => mint_to(work, message, ix),
        OP_TRANSFER_FEE_EXTENSION => match *ix.data.get(1).ok_or_else(empty_data)? {
            FEE_OP_INITIALIZE_CONFIG => initialize_transfer_fee_config(work, message, ix),
            FEE_OP_TRANSFER_CHECKED_WITH_FEE => transfer_checked_with_fee(work, message, ix),
            FEE_OP_WITHDRAW_FROM_ACCOUNTS => withdraw_withheld(work, message, ix),
            other => Err(LedgerError::Rejected(format!(
                "unsupported transfer-fee instruction {other}"
            ))),
        },
        other => Err(LedgerError::Rejected(format!(
            "unsupported token instruction {other}"
        ))),
    }
}

fn initialize_transfer_fee_config(
    work: &mut Accounts,
    message: &Message,
    ix: &CompiledInstruction,
) -> Result<(), LedgerError> {
    let (config_authority, cursor) = data_option_address(&ix.data, 2)?;
    let (withdraw_authority, cursor) = data_option_address(&ix.data, cursor)?;
    let fee_basis_points = data_u16(&ix.data, cursor)?;
    let max_fee = data_u64(&ix.data, cursor + 2)?;
    if fee_basis_points > MAX_FEE_BASIS_POINTS {
        return Err(LedgerError::InvalidParameter(format!(
            "fee basis points {fee_basis_points} exceed {MAX_FEE_BASIS_POINTS}"
        )));
    }

    let mint_address = account_at(message, ix, 0)?;
    let info = work.get_mut(&mint_address).ok_or_else(|| {
        LedgerError::Rejected(format!("mint account {mint_address} does not exist"))
    })?;
    if info.owner != *TOKEN_PROGRAM_ID {
        return Err(LedgerError::Rejected(format!(
            "account {mint_address} is not owned by the token program"
        )));
    }
    if info.data.len() != MINT_WITH_FEE_CONFIG_LEN {
        return Err(LedgerError::InvalidParameter(format!(
            "mint account is {} bytes, the transfer-fee extension needs {MINT_WITH_FEE_CONFIG_LEN}",
            info.data.len()
        )));
    }
    if info.data.iter().any(|b| *b != 0) {
        return Err(LedgerError::Rejected(format!(
            "account {mint_address} already initialized"
        )));
    }

    let mint = Mint {
        mint_authority: None,
        supply: 0,
        decimals: 0,
        is_initialized: false,
        freeze_authority: None,
        transfer_fee: Some(TransferFeeConfig {
            config_authority,
            withdraw_authority,
            withheld_amount: 0,
            policy: TransferFeePolicy {
                fee_basis_points,
                max_fee,
            },
        }),
    };
    info.data = mint.encode();
    Ok(())
}

fn initialize_mint(
    work: &mut Accounts,
    message: &Message,
    ix: &CompiledInstruction,
) -> Result<(), LedgerError> {
    let decimals = *ix.data.get(1).ok_or_else(empty_data)?;
    let mint_authority = data_address(&ix.data, 2)?;
    let (freeze_authority, _) = data_option_address(&ix.data, 34)?;

    let mint_address = account_at(message, ix, 0)?;
    let info = work.get_mut(&mint_address).ok_or_else(|| {
        LedgerError::Rejected(format!("mint account {mint_address} does not exist"))
    })?;
    if info.owner != *TOKEN_PROGRAM_ID {
        return Err(LedgerError::Rejected(format!(
            "account {mint_address} is not owned by the token program"
        )));
    }

    let mut mint = match Mint::decode(&info.data) {
        Ok(mint) => mint,
        // an extended allocation whose discriminator is still zero: the
        // extension must be written first
        Err(_) if info.data.len() > MINT_BASE_LEN => {
            return Err(LedgerError::InvalidParameter(
                "transfer-fee extension must be initialized before the mint".into(),
            ))
        }
        Err(e) => return Err(e),
    };
    if mint.is_initialized {
        return Err(LedgerError::Rejected(format!(
            "mint {mint_address} already initialized"
        )));
    }
    mint.mint_authority = Some(mint_authority);
    mint.decimals = decimals;
    mint.freeze_authority = freeze_authority;
    mint.is_initialized = true;
    info.data = mint.encode();
    Ok(())
}

fn mint_to(
    work: &mut Accounts,
    message: &Message,
    ix: &CompiledInstruction,
) -> Result<(), LedgerError> {
    let amount = data_u64(&ix.data, 1)?;
    let mint_address = account_at(message, ix, 0)?;
    let destination_address = account_at(message, ix, 1)?;
    let authority = account_at(message, ix, 2)?;

    let mut mint = read_mint(work, &mint_address)?;
    if mint.mint_authority != Some(authority) {
        return Err(LedgerError::Rejected("owner does not match".into()));
    }
    if !is_signer(message, &authority) {
        return Err(LedgerError::Rejected(
            "mint authority signature missing".into(),
        ));
    }

    mint.supply = mint.supply.checked_add(amount).ok_or_else(|| {
        LedgerError::SupplyOverflow(format!(
            "supply {} plus {amount} exceeds the u64 range",
            mint.supply
        ))
    })?;

    let mut destination = read_token_account(work, &destination_address, &mint_address)?;
    destination.amount = destination
        .amount
        .checked_add(amount)
        .ok_or_else(|| LedgerError::Rejected("destination balance overflow".into()))?;

    write_token_account(work, &destination_address, &destination);
    write_mint(work, &mint_address, &mint);
    Ok(())
}

fn transfer_checked_with_fee(
    work: &mut Accounts,
    message: &Message,
    ix: &CompiledInstruction,
) -> Result<(), LedgerError> {
    let amount = data_u64(&ix.data, 2)?;
    let decimals = *ix.data.get(10).ok_or_else(empty_data)?;
    let fee = data_u64(&ix.data, 11)?;

    let source_address = account_at(message, ix, 0)?;
    let mint_address = account_at(message, ix, 1)?;
    let destination_address = account_at(message, ix, 2)?;
    let authority = account_at(message, ix, 3)?;

    let mint = read_mint(work, &mint_address)?;
    let config = mint.transfer_fee.ok_or_else(|| {
        LedgerError::InvalidParameter(format!("mint {mint_address} has no transfer-fee extension"))
    })?;
    if decimals != mint.decimals {
        return Err(LedgerError::Rejected(format!(
            "decimals assertion {decimals} does not match mint decimals {}",
            mint.decimals
        )));
    }
    let expected = config.policy.fee_for(amount);
    if fee != expected {
        return Err(LedgerError::FeeMismatch {
            asserted: fee,
            expected,
        });
    }

    let mut source = read_token_account(work, &source_address, &mint_address)?;
    if source.owner != authority {
        return Err(LedgerError::Rejected("owner does not match".into()));
    }
    if !is_signer(message, &authority) {
        return Err(LedgerError::Rejected("owner signature missing".into()));
    }
    if source.amount < amount {
        return Err(LedgerError::InsufficientFunds(format!(
            "source {source_address} holds {}, transfer needs {amount}",
            source.amount
        )));
    }
    source.amount -= amount;
    write_token_account(work, &source_address, &source);

    // destination is re-read after the debit so a self-transfer stays
    // consistent
    let mut destination = read_token_account(work, &destination_address, &mint_address)?;
    destination.amount = destination
        .amount
        .checked_add(amount - fee)
        .ok_or_else(|| LedgerError::Rejected("destination balance overflow".into()))?;
    destination.withheld_amount = destination
        .withheld_amount
        .checked_add(fee)
        .ok_or_else(|| LedgerError::Rejected("withheld balance overflow".into()))?;
    write_token_account(work, &destination_address, &destination);
    Ok(())
}

fn withdraw_withheld(
    work: &mut Accounts,
    message: &Message,
    ix: &CompiledInstruction,
) -> Result<(), LedgerError> {
    let declared = *ix.data.get(2).ok_or_else(empty_data)? as usize;
    if ix.account_indexes.len() != 3 + declared {
        return Err(LedgerError::InvalidParameter(format!(
            "{declared} sources declared, {} accounts supplied",
            ix.account_indexes.len().saturating_sub(3)
        )));
    }

    let mint_address = account_at(message, ix, 0)?;
    let destination_address = account_at(message, ix, 1)?;
    let authority = account_at(message, ix, 2)?;

    let mint = read_mint(work, &mint_address)?;
    let config = mint.transfer_fee.ok_or_else(|| {
        LedgerError::InvalidParameter(format!("mint {mint_address} has no transfer-fee extension"))
    })?;
    if config.withdraw_authority != Some(authority) {
        return Err(LedgerError::Rejected("withdraw authority mismatch".into()));
    }
    if !is_signer(message, &authority) {
        return Err(LedgerError::Rejected(
            "withdraw authority signature missing".into(),
        ));
    }

    let mut total: u64 = 0;
    for position in 3..3 + declared {
        let source_address = account_at(message, ix, position)?;
        let mut source = read_token_account(work, &source_address, &mint_address)?;
        total = total
            .checked_add(source.withheld_amount)
            .ok_or_else(|| LedgerError::Rejected("withheld total overflow".into()))?;
        source.withheld_amount = 0;
        write_token_account(work, &source_address, &source);
    }

    let mut destination = read_token_account(work, &destination_address, &mint_address)?;
    destination.amount = destination
        .amount
        .checked_add(total)
        .ok_or_else(|| LedgerError::Rejected("destination balance overflow".into()))?;
    write_token_account(work, &destination_address, &destination);
    Ok(())
}

fn execute_associated(
    work: &mut Accounts,
    created: &mut Vec<Address>,
    message: &Message,
    ix: &CompiledInstruction,
) -> Result<(), LedgerError> {
    if *ix.data.first().ok_or_else(empty_data)? != ATA_OP_CREATE_IDEMPOTENT {
        return Err(LedgerError::Rejected(
            "unsupported associated-account instruction".into(),
        ));
    }
    let payer = account_at(message, ix, 0)?;
    let address = account_at(message, ix, 1)?;
    let owner = account_at(message, ix, 2)?;
    let mint_address = account_at(message, ix, 3)?;

    if address != associated_account_address(owner, mint_address) {
        return Err(LedgerError::Rejected(format!(
            "{address} is not the associated account for the given owner and mint"
        )));
    }
    let mint = read_mint(work, &mint_address)?;
    if !mint.is_initialized {
        return Err(LedgerError::Rejected(format!(
            "mint {mint_address} is not initialized"
        )));
    }

    if let Some(existing) = work.get(&address) {
        let account = TokenAccount::decode(&existing.data)?;
        if account.mint != mint_address || account.owner != owner {
            return Err(LedgerError::Rejected(format!(
                "account {address} exists with a different owner or mint"
            )));
        }
        // idempotent: nothing to do
        return Ok(());
    }

    if !is_signer(message, &payer) {
        return Err(LedgerError::Rejected("payer signature missing".into()));
    }
    let rent = MemoryLedger::rent_exempt_minimum(ACCOUNT_WITH_FEE_AMOUNT_LEN);
    let payer_info = work
        .get_mut(&payer)
        .ok_or_else(|| LedgerError::InsufficientFunds(format!("payer {payer} does not exist")))?;
    if payer_info.lamports < rent {
        return Err(LedgerError::InsufficientFunds(format!(
            "payer {payer} holds {} lamports, associated account needs {rent}",
            payer_info.lamports
        )));
    }
    payer_info.lamports -= rent;
    work.insert(
        address,
        AccountInfo {
            lamports: rent,
            owner: *TOKEN_PROGRAM_ID,
            data: TokenAccount::new(mint_address, owner).encode(),
        },
    );
    created.push(address);
    Ok(())
}

fn read_mint(work: &Accounts, address: &Address) -> Result<Mint, LedgerError> {
    let info = work
        .get(address)
        .ok_or_else(|| LedgerError::Rejected(format!("mint {address} does not exist")))?;
    if info.owner != *TOKEN_PROGRAM_ID {
        return Err(LedgerError::Rejected(format!(
            "account {address} is not owned by the token program"
        )));
    }
    let mint = Mint::decode(&info.data)?;
    if !mint.is_initialized {
        return Err(LedgerError::Rejected(format!(
            "mint {address} is not initialized"
        )));
    }
    Ok(mint)
}

fn read_token_account(
    work: &Accounts,
    address: &Address,
    mint: &Address,
) -> Result<TokenAccount, LedgerError> {
    let info = work
        .get(address)
        .ok_or_else(|| LedgerError::Rejected(format!("token account {address} does not exist")))?;
    if info.owner != *TOKEN_PROGRAM_ID {
        return Err(LedgerError::Rejected(format!(
            "account {address} is not owned by the token program"
        )));
    }
    let account = TokenAccount::decode(&info.data)?;
    if account.mint != *mint {
        return Err(LedgerError::Rejected(format!(
            "account {address} belongs to a different mint"
        )));
    }
    Ok(account)
}

fn write_token_account(work: &mut Accounts, address: &Address, account: &TokenAccount) {
    if let Some(info) = work.get_mut(address) {
        info.data = account.encode();
    }
}

fn write_mint(work: &mut Accounts, address: &Address, mint: &Mint) {
    if let Some(info) = work.get_mut(address) {
        info.data = mint.encode();
    }
}

fn key_at(message: &Message, index: u8) -> Result<Address, LedgerError> {
    message
        .account_keys
        .get(index as usize)
        .copied()
        .ok_or_else(|| LedgerError::Rejected(format!("account index {index} out of range")))
}

fn account_at(
    message: &Message,
    ix: &CompiledInstruction,
    position: usize,
) -> Result<Address, LedgerError> {
    let index = *ix.account_indexes.get(position).ok_or_else(|| {
        LedgerError::Rejected(format!("instruction account {position} missing"))
    })?;
    key_at(message, index)
}

fn is_signer(message: &Message, address: &Address) -> bool {
    let signers = message.header.num_required_signatures as usize;
    message.account_keys[..signers.min(message.account_keys.len())].contains(address)
}

fn empty_data() -> LedgerError {
    LedgerError::InvalidParameter("instruction data truncated".into())
}

fn data_u16(data: &[u8], offset: usize) -> Result<u16, LedgerError> {
    match data.get(offset..offset + 2) {
        Some(b) => Ok(u16::from_le_bytes([b[0], b[1]])),
        None => Err(empty_data()),
    }
}

fn data_u32(data: &[u8], offset: usize) -> Result<u32, LedgerError> {
    match data.get(offset..offset + 4) {
        Some(b) => Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        None => Err(empty_data()),
    }
}

fn data_u64(data: &[u8], offset: usize) -> Result<u64, LedgerError> {
    match data.get(offset..offset + 8) {
        Some(b) => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(b);
            Ok(u64::from_le_bytes(raw))
        }
        None => Err(empty_data()),
    }
}

fn data_address(data: &[u8], offset: usize) -> Result<Address, LedgerError> {
    match data.get(offset..offset + ADDRESS_LEN) {
        Some(b) => {
            let mut raw = [0u8; ADDRESS_LEN];
            raw.copy_from_slice(b);
            Ok(Address(raw))
        }
        None => Err(empty_data()),
    }
}

/// One-byte tag, value bytes only when present. Returns the value and the
/// offset just past it.
fn data_option_address(
    data: &[u8],
    offset: usize,
) -> Result<(Option<Address>, usize), LedgerError> {
    match data.get(offset) {
        Some(0) => Ok((None, offset + 1)),
        Some(1) => Ok((
            Some(data_address(data, offset + 1)?),
            offset + 1 + ADDRESS_LEN,
        )),
        Some(other) => Err(LedgerError::InvalidParameter(format!(
            "bad option tag {other}"
        ))),
        None => Err(empty_data()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Keypair;

    #[test]
    fn rent_scales_with_size() {
        assert_eq!(
            MemoryLedger::rent_exempt_minimum(0),
            ACCOUNT_STORAGE_OVERHEAD * RENT_LAMPORTS_PER_BYTE
        );
        assert!(
            MemoryLedger::rent_exempt_minimum(278) > MemoryLedger::rent_exempt_minimum(178)
        );
    }

    #[tokio::test]
    async fn airdrop_credits_and_finalizes() {
        let ledger = MemoryLedger::new();
        let address = Keypair::generate().address();
        let signature = ledger.request_airdrop(&address, 5_000).await.unwrap();
        assert_eq!(ledger.get_balance(&address).await.unwrap(), 5_000);
        assert_eq!(
            ledger.signature_status(&signature).await.unwrap(),
            TxStatus::Finalized
        );
    }

    #[tokio::test]
    async fn held_confirmations_report_unknown() {
        let ledger = MemoryLedger::new();
        let address = Keypair::generate().address();
        let signature = ledger.request_airdrop(&address, 1).await.unwrap();
        ledger.hold_confirmations(true);
        assert_eq!(
            ledger.signature_status(&signature).await.unwrap(),
            TxStatus::Unknown
        );
        ledger.hold_confirmations(false);
        assert_eq!(
            ledger.signature_status(&signature).await.unwrap(),
            TxStatus::Finalized
        );
    }

    #[tokio::test]
    async fn unknown_signature_is_unknown() {
        let ledger = MemoryLedger::new();
        assert_eq!(
            ledger.signature_status("missing").await.unwrap(),
            TxStatus::Unknown
        );
    }

    #[tokio::test]
    async fn blockhashes_rotate() {
        let ledger = MemoryLedger::new();
        let first = ledger.latest_blockhash().await.unwrap();
        let second = ledger.latest_blockhash().await.unwrap();
        assert_ne!(first, second);
    }
}
