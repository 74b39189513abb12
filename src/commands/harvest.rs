//! `harvest`: sweep withheld fees into the vault, optionally forwarding the
//! vault balance onward.

use anyhow::{bail, Result};

use crate::config::{SweepConfig, VAULT_SECRET_ENV};
use crate::error::WorkflowError;
use crate::fee::format_units;
use crate::harvest::HarvestCoordinator;
use crate::keys::{Address, Keypair};
use crate::ledger::LedgerClient;
use crate::scanner::{ScanResult, WithheldFeeScanner};
use crate::workflow::WorkflowState;

use super::{connect, load_state, print_error, print_success, print_warning, resolve_mint};

pub async fn run(config: &SweepConfig, forward: Option<Address>) -> Result<()> {
    config.validate()?;
    let mut state = load_state(config)?;
    let payer = config.payer_keypair()?;
    let ledger = connect(config);
    let mint = resolve_mint(&ledger, config, &mut state).await?;
    let decimals = state.decimals.unwrap_or(config.token.decimals);

    let scan = WithheldFeeScanner::new(&ledger)
        .find_fee_bearing_accounts(&mint)
        .await?;
    println!(
        "Scan found {} fee-bearing account(s), {} withheld",
        scan.len(),
        format_units(scan.total_withheld(), decimals)
    );
    state.record_scanned(scan.len(), scan.total_withheld());

    // state is saved even when the harvest fails; landed batches and the
    // vault coordinates must survive into the retry
    let result = harvest_with(&ledger, config, &payer, &mut state, scan, forward).await;
    state.save(&config.state_path)?;
    result
}

pub(crate) async fn harvest_with(
    ledger: &dyn LedgerClient,
    config: &SweepConfig,
    payer: &Keypair,
    state: &mut WorkflowState,
    scan: ScanResult,
    forward: Option<Address>,
) -> Result<()> {
    let decimals = state.decimals.unwrap_or(config.token.decimals);

    // vault owner: configured secret, then configured address, then the
    // recorded one, then a fresh throwaway whose secret is printed once
    let (vault_owner, vault_keys): (Address, Option<Keypair>) =
        match config.vault_owner_keypair()? {
            Some(keys) => (keys.address(), Some(keys)),
            None => {
                if let Some(owner) = config.harvest.vault_owner.or(state.vault_owner) {
                    (owner, None)
                } else {
                    let keys = Keypair::generate();
                    print_warning(&format!(
                        "Generated vault owner {} secret {}; store it, harvests reuse this vault",
                        keys.address(),
                        keys.to_secret_base58().as_str()
                    ));
                    (keys.address(), Some(keys))
                }
            }
        };
    state.vault_owner = Some(vault_owner);

    let coordinator = HarvestCoordinator::new(ledger, config);
    match coordinator.harvest(payer, &scan, &vault_owner).await {
        Ok(outcome) => {
            state.record_harvested(vault_owner, outcome.vault, outcome.withdrawn);
            print_success(&format!(
                "Swept {} into vault {}",
                format_units(outcome.withdrawn, decimals),
                outcome.vault
            ));
            println!(
                "Vault balance: {}; total harvested: {} over {} cycle(s)",
                format_units(outcome.vault_balance, decimals),
                format_units(state.harvested_total, decimals),
                state.harvest_cycles
            );

            if let Some(recipient) = forward.or(config.harvest.forward_to) {
                let Some(keys) = vault_keys.as_ref() else {
                    bail!("forwarding needs the vault owner secret; set {VAULT_SECRET_ENV}");
                };
                let record = coordinator
                    .forward_from_vault(payer, keys, &scan.mint, &recipient)
                    .await?;
                print_success(&format!(
                    "Forwarded {} to {} (fee {}, {})",
                    format_units(record.amount.saturating_sub(record.fee), decimals),
                    recipient,
                    format_units(record.fee, decimals),
                    record.signature
                ));
            }
            Ok(())
        }
        Err(WorkflowError::BatchWithdraw {
            total,
            failed,
            outcomes,
        }) => {
            print_error(&format!("{failed} of {total} withdraw batches failed"));
            for batch in &outcomes {
                match &batch.outcome {
                    Ok(signature) => println!("  batch {} landed: {signature}", batch.index),
                    Err(reason) => println!(
                        "  batch {} FAILED ({} sources): {reason}",
                        batch.index,
                        batch.sources.len()
                    ),
                }
            }
            println!(
                "Re-run `feesweep harvest`; a fresh scan picks up the remaining withheld balances."
            );
            bail!("{failed} of {total} withdraw batches failed")
        }
        Err(other) => Err(other.into()),
    }
}
