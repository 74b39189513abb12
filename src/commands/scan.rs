//! `scan`: list the fee-bearing accounts of the recorded mint.

use anyhow::Result;

use crate::config::SweepConfig;
use crate::fee::format_units;
use crate::scanner::WithheldFeeScanner;

use super::{connect, load_state, resolve_mint};

pub async fn run(config: &SweepConfig) -> Result<()> {
    config.validate()?;
    let mut state = load_state(config)?;
    let ledger = connect(config);
    let mint = resolve_mint(&ledger, config, &mut state).await?;
    let decimals = state.decimals.unwrap_or(config.token.decimals);

    let scan = WithheldFeeScanner::new(&ledger)
        .find_fee_bearing_accounts(&mint)
        .await?;
    if scan.is_empty() {
        println!("No fee-bearing accounts for mint {mint}");
    } else {
        println!("Fee-bearing accounts for mint {mint}:");
        for account in &scan.accounts {
            println!(
                "  {}  {}",
                account.address,
                format_units(account.withheld_amount, decimals)
            );
        }
        println!(
            "Total withheld: {} across {} account(s)",
            format_units(scan.total_withheld(), decimals),
            scan.len()
        );
    }

    state.record_scanned(scan.len(), scan.total_withheld());
    state.save(&config.state_path)?;
    Ok(())
}
