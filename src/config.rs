//! TOML-backed configuration with environment overrides.
//!
//! Every field carries a default so a missing file or a partial file still
//! yields a runnable configuration. Secrets are never written back to disk;
//! they arrive through the file or through the `FEESWEEP_*` environment
//! variables, with the environment winning.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fee::{TransferFeePolicy, MAX_DECIMALS, MAX_FEE_BASIS_POINTS};
use crate::keys::{Address, Keypair};
use crate::ledger::Commitment;

/// Overrides `payer_secret`.
pub const PAYER_SECRET_ENV: &str = "FEESWEEP_PAYER_SECRET";
/// Overrides `harvest.vault_owner_secret`.
pub const VAULT_SECRET_ENV: &str = "FEESWEEP_VAULT_SECRET";
/// Overrides `network.endpoint`.
pub const ENDPOINT_ENV: &str = "FEESWEEP_ENDPOINT";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub network: NetworkConfig,
    pub token: TokenConfig,
    pub authorities: AuthorityConfig,
    pub distribution: DistributionConfig,
    pub harvest: HarvestConfig,
    /// Where the workflow records its progress between invocations.
    pub state_path: PathBuf,
    /// Base58 secret of the fee payer. Prefer the environment variable over
    /// the file for anything that is not a throwaway key.
    pub payer_secret: Option<String>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            token: TokenConfig::default(),
            authorities: AuthorityConfig::default(),
            distribution: DistributionConfig::default(),
            harvest: HarvestConfig::default(),
            state_path: default_state_path(),
            payer_secret: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint of the target ledger.
    pub endpoint: String,
    /// Commitment level used for queries and confirmation polling.
    pub commitment: Commitment,
    /// How long to poll a submitted signature before giving up on it.
    pub confirmation_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            commitment: Commitment::default(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Decimal places of the issued token.
    pub decimals: u8,
    /// Fee rate in basis points, at most 10000.
    pub fee_basis_points: u16,
    /// Per-transfer fee ceiling in base units.
    pub max_fee: u64,
    /// Adopt this existing mint instead of issuing a fresh one.
    pub mint: Option<Address>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            decimals: default_decimals(),
            fee_basis_points: default_fee_basis_points(),
            max_fee: default_max_fee(),
            mint: None,
        }
    }
}

impl TokenConfig {
    /// The schedule this configuration expects the mint to carry.
    pub fn policy(&self) -> TransferFeePolicy {
        TransferFeePolicy {
            fee_basis_points: self.fee_basis_points,
            max_fee: self.max_fee,
        }
    }
}

/// Mint and fee authorities. Any authority left unset falls back to the
/// payer's address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    pub mint_authority: Option<Address>,
    pub fee_policy_authority: Option<Address>,
    pub withdraw_authority: Option<Address>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// Supply minted into the source account before transfers start.
    pub mint_amount: u64,
    /// Gross amount sent to each holder.
    pub transfer_amount: u64,
    /// Recipients of the distribution. Leave empty to generate throwaway
    /// holders instead.
    pub holders: Vec<Address>,
    /// How many throwaway holders to generate when `holders` is empty.
    pub holder_count: usize,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            mint_amount: default_mint_amount(),
            transfer_amount: default_transfer_amount(),
            holders: Vec::new(),
            holder_count: default_holder_count(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Owner of the vault the harvested fees are swept into. When unset the
    /// workflow generates one and prints its secret.
    pub vault_owner: Option<Address>,
    /// Base58 secret of the vault owner, required only for forwarding.
    pub vault_owner_secret: Option<String>,
    /// Forward the vault balance to this recipient after each harvest.
    pub forward_to: Option<Address>,
}

fn default_endpoint() -> String {
    "https://api.devnet.solana.com".into()
}

fn default_confirmation_timeout_secs() -> u64 {
    30
}

fn default_decimals() -> u8 {
    9
}

fn default_fee_basis_points() -> u16 {
    3_000
}

fn default_max_fee() -> u64 {
    100_000_000_000_000
}

fn default_mint_amount() -> u64 {
    1_000_000_000_000_000
}

fn default_transfer_amount() -> u64 {
    1_000_000_000_000
}

fn default_holder_count() -> usize {
    3
}

fn default_state_path() -> PathBuf {
    PathBuf::from("feesweep-state.json")
}

impl SweepConfig {
    /// Read `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            debug!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Apply `FEESWEEP_*` environment overrides on top of the file values.
    pub fn apply_env(&mut self) {
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
            self.network.endpoint = endpoint;
        }
        if let Ok(secret) = std::env::var(PAYER_SECRET_ENV) {
            self.payer_secret = Some(secret);
        }
        if let Ok(secret) = std::env::var(VAULT_SECRET_ENV) {
            self.harvest.vault_owner_secret = Some(secret);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.network.endpoint.starts_with("http://")
            && !self.network.endpoint.starts_with("https://")
        {
            bail!(
                "network.endpoint must be an http(s) URL, got {:?}",
                self.network.endpoint
            );
        }
        if self.network.confirmation_timeout_secs == 0 {
            bail!("network.confirmation_timeout_secs must be positive");
        }
        if self.token.fee_basis_points > MAX_FEE_BASIS_POINTS {
            bail!(
                "token.fee_basis_points is {}, maximum is {MAX_FEE_BASIS_POINTS}",
                self.token.fee_basis_points
            );
        }
        if self.token.decimals > MAX_DECIMALS {
            bail!(
                "token.decimals is {}, maximum is {MAX_DECIMALS}",
                self.token.decimals
            );
        }
        if self.distribution.transfer_amount == 0 {
            bail!("distribution.transfer_amount must be positive");
        }
        if self.distribution.holders.is_empty() && self.distribution.holder_count == 0 {
            bail!("distribution needs holders or a positive holder_count");
        }
        Ok(())
    }

    pub fn payer_keypair(&self) -> Result<Keypair> {
        let secret = self.payer_secret.as_deref().with_context(|| {
            format!("payer secret missing: set {PAYER_SECRET_ENV} or payer_secret")
        })?;
        Keypair::from_secret_base58(secret).context("payer secret is not a valid key")
    }

    pub fn vault_owner_keypair(&self) -> Result<Option<Keypair>> {
        self.harvest
            .vault_owner_secret
            .as_deref()
            .map(Keypair::from_secret_base58)
            .transpose()
            .context("vault owner secret is not a valid key")
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.network.confirmation_timeout_secs)
    }

    /// Mint authority, defaulting to the payer.
    pub fn mint_authority(&self, payer: Address) -> Address {
        self.authorities.mint_authority.unwrap_or(payer)
    }

    /// Fee-schedule authority, defaulting to the payer.
    pub fn fee_policy_authority(&self, payer: Address) -> Address {
        self.authorities.fee_policy_authority.unwrap_or(payer)
    }

    /// Withheld-fee withdraw authority, defaulting to the payer.
    pub fn withdraw_authority(&self, payer: Address) -> Address {
        self.authorities.withdraw_authority.unwrap_or(payer)
    }
}
