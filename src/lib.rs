//! Fee-bearing token lifecycle tooling.
//!
//! feesweep issues a mint whose transfers withhold a fee on the destination
//! account, distributes supply to holders, discovers the accounts carrying
//! withheld fees, and sweeps those fees into a vault. Every stage talks to
//! the ledger through the [`ledger::LedgerClient`] trait: a JSON-RPC client
//! backs real runs, an in-memory ledger backs dry runs and tests.
//!
//! ## Stages
//!
//! 1. [`issuer::TokenIssuer`] creates the mint atomically with its fee
//!    schedule.
//! 2. [`distribution::DistributionEngine`] mints supply and pays holders
//!    with fee-asserting transfers.
//! 3. [`scanner::WithheldFeeScanner`] snapshots the accounts holding
//!    withheld fees.
//! 4. [`harvest::HarvestCoordinator`] sweeps a snapshot into the vault in
//!    bounded withdraw batches and can forward the vault balance onward.

pub mod account;
pub mod commands;
pub mod config;
pub mod distribution;
pub mod error;
pub mod fee;
pub mod harvest;
pub mod instruction;
pub mod issuer;
pub mod keys;
pub mod ledger;
pub mod scanner;
pub mod transaction;
pub mod workflow;

pub use config::SweepConfig;
pub use error::{LedgerError, WorkflowError, WorkflowResult};
pub use fee::{calculate_fee, TransferFeePolicy};
pub use keys::{Address, Keypair};
