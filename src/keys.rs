//! Signing identities and ledger addresses.
//!
//! An [`Address`] is the 32-byte ed25519 public key of an account, shown
//! base58 everywhere a human sees it. A [`Keypair`] holds the matching
//! signing key; secrets are exported in the 64-byte seed-plus-public form
//! and wiped from memory on drop.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroizing;

/// Length of a ledger address in bytes.
pub const ADDRESS_LEN: usize = 32;

/// Length of an exported secret: 32-byte seed followed by the public key.
pub const SECRET_LEN: usize = 64;

/// A 32-byte account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; ADDRESS_LEN]);

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid address: {0}")]
pub struct AddressParseError(String);

impl Address {
    pub fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    pub fn from_base58(s: &str) -> Result<Self, AddressParseError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| AddressParseError(e.to_string()))?;
        let raw: [u8; ADDRESS_LEN] = bytes.as_slice().try_into().map_err(|_| {
            AddressParseError(format!("expected {ADDRESS_LEN} bytes, got {}", bytes.len()))
        })?;
        Ok(Self(raw))
    }

    /// True for the all-zero address, which the ledger uses to mean "none".
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_base58())
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base58(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_base58(&s).map_err(de::Error::custom)
    }
}

/// An ed25519 signing identity. `Debug` shows only the address.
#[derive(Clone)]
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Fresh identity from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Rebuild from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(seed),
        }
    }

    /// Decode a base58 secret, either the 64-byte seed-plus-public export or
    /// a bare 32-byte seed.
    pub fn from_secret_base58(secret: &str) -> anyhow::Result<Self> {
        let bytes = Zeroizing::new(
            bs58::decode(secret.trim())
                .into_vec()
                .map_err(|e| anyhow::anyhow!("secret is not base58: {e}"))?,
        );
        match bytes.len() {
            SECRET_LEN => {
                let mut seed = Zeroizing::new([0u8; 32]);
                seed.copy_from_slice(&bytes[..32]);
                let keypair = Self::from_seed(&seed);
                if keypair.address().as_bytes() != &bytes[32..] {
                    bail!("secret public half does not match its seed");
                }
                Ok(keypair)
            }
            32 => {
                let mut seed = Zeroizing::new([0u8; 32]);
                seed.copy_from_slice(&bytes);
                Ok(Self::from_seed(&seed))
            }
            n => bail!("secret must decode to 32 or 64 bytes, got {n}"),
        }
    }

    pub fn address(&self) -> Address {
        Address(self.signing.verifying_key().to_bytes())
    }

    /// Export as base58 seed-plus-public.
    pub fn to_secret_base58(&self) -> Zeroizing<String> {
        let mut full = Zeroizing::new([0u8; SECRET_LEN]);
        full[..32].copy_from_slice(&self.signing.to_bytes());
        full[32..].copy_from_slice(&self.signing.verifying_key().to_bytes());
        Zeroizing::new(bs58::encode(&full[..]).into_string())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({})", self.address())
    }
}

/// Verify an ed25519 signature by `address` over `message`.
pub fn verify_signature(address: &Address, message: &[u8], signature: &[u8; 64]) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(address.as_bytes()) else {
        return false;
    };
    key.verify_strict(message, &Signature::from_bytes(signature))
        .is_ok()
}
