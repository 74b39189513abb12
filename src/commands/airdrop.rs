//! `airdrop`: request dev-network funds for the payer or a named address.

use anyhow::Result;

use crate::config::SweepConfig;
use crate::keys::Address;
use crate::ledger::{confirm_transaction, LedgerClient};

use super::{connect, print_success};

pub async fn run(config: &SweepConfig, lamports: u64, address: Option<Address>) -> Result<()> {
    config.validate()?;
    let target = match address {
        Some(address) => address,
        None => config.payer_keypair()?.address(),
    };

    let ledger = connect(config);
    let signature = ledger.request_airdrop(&target, lamports).await?;
    confirm_transaction(
        &ledger,
        &signature,
        config.network.commitment,
        config.confirmation_timeout(),
    )
    .await?;

    let balance = ledger.get_balance(&target).await?;
    print_success(&format!("Airdropped {lamports} lamports to {target}"));
    println!("Balance: {balance} lamports");
    Ok(())
}
