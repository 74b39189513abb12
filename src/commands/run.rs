//! `run`: the whole pipeline in one invocation, live or against an
//! in-memory ledger.

use anyhow::{bail, Result};

use crate::config::SweepConfig;
use crate::distribution::DistributionEngine;
use crate::fee::format_units;
use crate::issuer::TokenIssuer;
use crate::keys::Keypair;
use crate::ledger::memory::MemoryLedger;
use crate::ledger::LedgerClient;
use crate::scanner::WithheldFeeScanner;
use crate::workflow::WorkflowState;

use super::distribute::resolve_holders;
use super::{connect, load_state, print_success, print_warning, prompt_confirm};

/// Payer funding for dry runs, in lamports.
const DRY_RUN_FUNDING: u64 = 1_000_000_000_000;

pub async fn run(config: &SweepConfig, dry_run: bool, yes: bool) -> Result<()> {
    config.validate()?;

    let memory;
    let rpc;
    let ledger: &dyn LedgerClient = if dry_run {
        memory = MemoryLedger::new();
        &memory
    } else {
        rpc = connect(config);
        &rpc
    };

    let payer = if dry_run {
        let payer = Keypair::generate();
        ledger
            .request_airdrop(&payer.address(), DRY_RUN_FUNDING)
            .await?;
        println!(
            "Dry run against an in-memory ledger; generated payer {}",
            payer.address()
        );
        payer
    } else {
        config.payer_keypair()?
    };

    if !dry_run && !yes {
        println!(
            "About to run issue, distribute, scan, harvest against {}",
            config.network.endpoint
        );
        if !prompt_confirm("Continue")? {
            println!("Aborted.");
            return Ok(());
        }
    }

    let mut state = if dry_run {
        WorkflowState::default()
    } else {
        load_state(config)?
    };

    println!("[1/4] Issue");
    let issued = if let Some(mint) = state.mint {
        println!("Reusing recorded mint {mint}");
        TokenIssuer::new(ledger, config).load_mint(&mint).await?
    } else {
        super::issue::issue_with(ledger, config, &payer, &mut state).await?
    };
    if !dry_run {
        state.save(&config.state_path)?;
    }

    println!("[2/4] Distribute");
    let (holders, generated) = resolve_holders(config, None)?;
    for keypair in &generated {
        if dry_run {
            println!("Generated holder {}", keypair.address());
        } else {
            print_warning(&format!(
                "Generated holder {} secret {} (test use only)",
                keypair.address(),
                keypair.to_secret_base58().as_str()
            ));
        }
    }
    let report = DistributionEngine::new(ledger, config)
        .mint_and_distribute(
            &payer,
            &issued.mint,
            &holders,
            config.distribution.mint_amount,
            config.distribution.transfer_amount,
        )
        .await?;
    state.record_distributed(report.source, &holders);
    if !dry_run {
        state.save(&config.state_path)?;
    }
    println!(
        "  {} transfers landed, {} withheld in fees",
        report.transfers.len(),
        format_units(report.total_fees(), report.decimals)
    );
    if !report.is_complete() {
        bail!(
            "{} of {} transfers failed",
            report.failures.len(),
            holders.len()
        );
    }

    println!("[3/4] Scan");
    let scan = WithheldFeeScanner::new(ledger)
        .find_fee_bearing_accounts(&issued.mint)
        .await?;
    println!(
        "  {} fee-bearing account(s), {} withheld",
        scan.len(),
        format_units(scan.total_withheld(), report.decimals)
    );
    state.record_scanned(scan.len(), scan.total_withheld());
    if !dry_run {
        state.save(&config.state_path)?;
    }

    println!("[4/4] Harvest");
    super::harvest::harvest_with(ledger, config, &payer, &mut state, scan, None).await?;
    if !dry_run {
        state.save(&config.state_path)?;
    }

    print_success("Pipeline complete");
    println!("{}", state.summary());
    Ok(())
}
