//! `distribute`: mint supply and send fee-bearing transfers to holders.

use anyhow::{bail, Result};

use crate::config::SweepConfig;
use crate::distribution::DistributionEngine;
use crate::fee::format_units;
use crate::keys::{Address, Keypair};
use crate::workflow::WorkflowState;

use super::{connect, load_state, print_error, print_success, print_warning, resolve_mint};

pub async fn run(config: &SweepConfig, generate: Option<usize>) -> Result<()> {
    config.validate()?;
    let mut state = load_state(config)?;
    let payer = config.payer_keypair()?;
    let ledger = connect(config);
    let mint = resolve_mint(&ledger, config, &mut state).await?;

    let (holders, generated) = resolve_holders(config, generate)?;
    for keypair in &generated {
        print_warning(&format!(
            "Generated holder {} secret {} (test use only)",
            keypair.address(),
            keypair.to_secret_base58().as_str()
        ));
    }

    let engine = DistributionEngine::new(&ledger, config);
    let report = engine
        .mint_and_distribute(
            &payer,
            &mint,
            &holders,
            config.distribution.mint_amount,
            config.distribution.transfer_amount,
        )
        .await?;

    let decimals = report.decimals;
    if let Some(signature) = &report.mint_signature {
        println!(
            "Minted {} into {} ({signature})",
            format_units(config.distribution.mint_amount, decimals),
            report.source
        );
    }
    for transfer in &report.transfers {
        println!(
            "  holder {} {} credited {} (fee {})",
            transfer.holder_index,
            transfer.holder,
            format_units(transfer.amount.saturating_sub(transfer.fee), decimals),
            format_units(transfer.fee, decimals)
        );
    }
    for failure in &report.failures {
        print_error(&format!(
            "holder {} {}: {}",
            failure.holder_index, failure.holder, failure.error
        ));
    }

    // record progress before reporting failure so a retry sees the layout
    state.record_distributed(report.source, &holders);
    state.save(&config.state_path)?;

    if !report.is_complete() {
        bail!(
            "{} of {} transfers failed",
            report.failures.len(),
            holders.len()
        );
    }
    print_success(&format!(
        "Distributed to {} holders, {} withheld in fees",
        report.transfers.len(),
        format_units(report.total_fees(), decimals)
    ));
    Ok(())
}

/// Holder list for a distribution: explicit `--generate`, then configured
/// addresses, then `holder_count` throwaway keys.
pub(crate) fn resolve_holders(
    config: &SweepConfig,
    generate: Option<usize>,
) -> Result<(Vec<Address>, Vec<Keypair>)> {
    let (holders, generated) = match generate {
        Some(count) => {
            let keys: Vec<Keypair> = (0..count).map(|_| Keypair::generate()).collect();
            (keys.iter().map(Keypair::address).collect(), keys)
        }
        None if !config.distribution.holders.is_empty() => {
            (config.distribution.holders.clone(), Vec::new())
        }
        None => {
            let keys: Vec<Keypair> = (0..config.distribution.holder_count)
                .map(|_| Keypair::generate())
                .collect();
            (keys.iter().map(Keypair::address).collect(), keys)
        }
    };
    if holders.is_empty() {
        bail!("distribution needs at least one holder");
    }
    Ok((holders, generated))
}
