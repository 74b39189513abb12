//! Transaction assembly: message compilation, wire encoding, signing.
//!
//! Messages use the ledger's legacy wire layout: a three-byte header,
//! compact-length prefixed arrays, account keys ordered writable signers
//! first, and instructions referencing accounts by key-table index. Signers
//! sign the serialized message bytes.

use anyhow::{anyhow, bail, Result};

use crate::instruction::Instruction;
use crate::keys::{Address, Keypair};

/// Signature and read-only counts leading every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed: u8,
    pub num_readonly_unsigned: u8,
}

/// Instruction with account references resolved to key-table indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub account_indexes: Vec<u8>,
    pub data: Vec<u8>,
}

/// Compiled, unsigned transaction message.
#[derive(Debug, Clone)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Address>,
    pub recent_blockhash: [u8; 32],
    pub instructions: Vec<CompiledInstruction>,
}

#[derive(Clone)]
struct KeyEntry {
    address: Address,
    is_signer: bool,
    is_writable: bool,
}

fn upsert(entries: &mut Vec<KeyEntry>, address: Address, is_signer: bool, is_writable: bool) {
    match entries.iter_mut().find(|e| e.address == address) {
        Some(entry) => {
            entry.is_signer |= is_signer;
            entry.is_writable |= is_writable;
        }
        None => entries.push(KeyEntry {
            address,
            is_signer,
            is_writable,
        }),
    }
}

impl Message {
    /// Compile instructions into a message. `payer` funds the transaction
    /// fee and always lands at index zero.
    pub fn compile(
        payer: Address,
        instructions: &[Instruction],
        recent_blockhash: [u8; 32],
    ) -> Result<Self> {
        let mut entries = vec![KeyEntry {
            address: payer,
            is_signer: true,
            is_writable: true,
        }];
        for instruction in instructions {
            for meta in &instruction.accounts {
                upsert(&mut entries, meta.address, meta.is_signer, meta.is_writable);
            }
            upsert(&mut entries, instruction.program_id, false, false);
        }

        // writable signers, readonly signers, writable non-signers, readonly
        // non-signers; first-seen order within each group keeps the payer at
        // index zero
        let mut ordered: Vec<KeyEntry> = Vec::with_capacity(entries.len());
        for (want_signer, want_writable) in [(true, true), (true, false), (false, true), (false, false)]
        {
            ordered.extend(
                entries
                    .iter()
                    .filter(|e| e.is_signer == want_signer && e.is_writable == want_writable)
                    .cloned(),
            );
        }
        if ordered.len() > u8::MAX as usize + 1 {
            bail!("transaction references {} accounts, limit 256", ordered.len());
        }

        let num_required_signatures = ordered.iter().filter(|e| e.is_signer).count() as u8;
        let num_readonly_signed = ordered
            .iter()
            .filter(|e| e.is_signer && !e.is_writable)
            .count() as u8;
        let num_readonly_unsigned = ordered
            .iter()
            .filter(|e| !e.is_signer && !e.is_writable)
            .count() as u8;
        let account_keys: Vec<Address> = ordered.iter().map(|e| e.address).collect();

        let index_of = |address: &Address| -> Result<u8> {
            account_keys
                .iter()
                .position(|k| k == address)
                .map(|i| i as u8)
                .ok_or_else(|| anyhow!("account {address} missing from key table"))
        };
        let compiled = instructions
            .iter()
            .map(|ix| -> Result<CompiledInstruction> {
                Ok(CompiledInstruction {
                    program_id_index: index_of(&ix.program_id)?,
                    account_indexes: ix
                        .accounts
                        .iter()
                        .map(|m| index_of(&m.address))
                        .collect::<Result<_>>()?,
                    data: ix.data.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            header: MessageHeader {
                num_required_signatures,
                num_readonly_signed,
                num_readonly_unsigned,
            },
            account_keys,
            recent_blockhash,
            instructions: compiled,
        })
    }

    /// Wire bytes of the message; also the payload every signer signs.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(self.header.num_required_signatures);
        buf.push(self.header.num_readonly_signed);
        buf.push(self.header.num_readonly_unsigned);
        append_compact_len(&mut buf, self.account_keys.len());
        for key in &self.account_keys {
            buf.extend_from_slice(key.as_bytes());
        }
        buf.extend_from_slice(&self.recent_blockhash);
        append_compact_len(&mut buf, self.instructions.len());
        for ix in &self.instructions {
            buf.push(ix.program_id_index);
            append_compact_len(&mut buf, ix.account_indexes.len());
            buf.extend_from_slice(&ix.account_indexes);
            append_compact_len(&mut buf, ix.data.len());
            buf.extend_from_slice(&ix.data);
        }
        buf
    }
}

/// Compact length prefix: seven bits per byte, high bit marks continuation.
fn append_compact_len(buf: &mut Vec<u8>, len: usize) {
    let mut value = len as u16;
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Signed transaction ready for submission.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub signatures: Vec<[u8; 64]>,
    pub message: Message,
}

impl Transaction {
    /// Compile and sign. Every required signer must be `payer` or appear in
    /// `extra_signers`.
    pub fn new_signed(
        payer: &Keypair,
        extra_signers: &[&Keypair],
        instructions: &[Instruction],
        recent_blockhash: [u8; 32],
    ) -> Result<Self> {
        let message = Message::compile(payer.address(), instructions, recent_blockhash)?;
        let payload = message.serialize();
        let required = message.header.num_required_signatures as usize;
        let mut signatures = Vec::with_capacity(required);
        for key in message.account_keys.iter().take(required) {
            let signer = std::iter::once(payer)
                .chain(extra_signers.iter().copied())
                .find(|kp| kp.address() == *key)
                .ok_or_else(|| anyhow!("no key available for required signer {key}"))?;
            signatures.push(signer.sign(&payload));
        }
        Ok(Self {
            signatures,
            message,
        })
    }

    /// Transaction id: base58 of the fee payer's signature.
    pub fn signature_base58(&self) -> String {
        self.signatures
            .first()
            .map(|s| bs58::encode(s).into_string())
            .unwrap_or_default()
    }

    /// Full wire encoding: compact signature array, then the message.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        append_compact_len(&mut buf, self.signatures.len());
        for signature in &self.signatures {
            buf.extend_from_slice(signature);
        }
        buf.extend_from_slice(&self.message.serialize());
        buf
    }
}
