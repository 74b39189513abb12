//! CLI command implementations.

pub mod airdrop;
pub mod distribute;
pub mod harvest;
pub mod issue;
pub mod keygen;
pub mod run;
pub mod scan;
pub mod status;

use std::io::{self, Write};

use anyhow::{bail, Result};

use crate::config::SweepConfig;
use crate::issuer::TokenIssuer;
use crate::keys::Address;
use crate::ledger::rpc::RpcLedgerClient;
use crate::ledger::LedgerClient;
use crate::workflow::WorkflowState;

pub(crate) fn print_error(message: &str) {
    eprintln!("\x1b[31mError:\x1b[0m {}", message);
}

pub(crate) fn print_success(message: &str) {
    println!("\x1b[32m{}\x1b[0m", message);
}

pub(crate) fn print_warning(message: &str) {
    println!("\x1b[33mWarning:\x1b[0m {}", message);
}

pub(crate) fn prompt_confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N]: ", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let answer = line.trim();
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}

pub(crate) fn connect(config: &SweepConfig) -> RpcLedgerClient {
    RpcLedgerClient::new(&config.network.endpoint, config.network.commitment)
}

pub(crate) fn load_state(config: &SweepConfig) -> Result<WorkflowState> {
    WorkflowState::load(&config.state_path)
}

/// The mint later stages operate on: recorded state first, then an
/// adoptable configured mint.
pub(crate) async fn resolve_mint(
    ledger: &dyn LedgerClient,
    config: &SweepConfig,
    state: &mut WorkflowState,
) -> Result<Address> {
    if let Some(mint) = state.mint {
        return Ok(mint);
    }
    if let Some(mint) = config.token.mint {
        let issued = TokenIssuer::new(ledger, config).load_mint(&mint).await?;
        state.record_issued(issued.mint, issued.decimals);
        return Ok(mint);
    }
    bail!("no mint recorded; run `feesweep issue` first or set token.mint")
}
