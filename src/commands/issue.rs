//! `issue`: create the fee-bearing mint, or adopt a configured one.

use anyhow::Result;

use crate::config::SweepConfig;
use crate::fee::format_units;
use crate::issuer::{IssuedMint, TokenIssuer};
use crate::keys::Keypair;
use crate::ledger::LedgerClient;
use crate::workflow::WorkflowState;

use super::{connect, load_state, print_success, print_warning};

pub async fn run(config: &SweepConfig) -> Result<()> {
    config.validate()?;
    let mut state = load_state(config)?;
    if let Some(mint) = state.mint {
        print_warning(&format!("Mint already issued: {mint}"));
        println!(
            "Delete {} to start a fresh workflow.",
            config.state_path.display()
        );
        return Ok(());
    }

    let payer = config.payer_keypair()?;
    let ledger = connect(config);
    issue_with(&ledger, config, &payer, &mut state).await?;
    state.save(&config.state_path)?;
    Ok(())
}

pub(crate) async fn issue_with(
    ledger: &dyn LedgerClient,
    config: &SweepConfig,
    payer: &Keypair,
    state: &mut WorkflowState,
) -> Result<IssuedMint> {
    let issuer = TokenIssuer::new(ledger, config);
    let issued = if let Some(mint) = config.token.mint {
        println!("Adopting configured mint {mint}");
        issuer.load_mint(&mint).await?
    } else {
        issuer.issue(payer).await?
    };
    state.record_issued(issued.mint, issued.decimals);

    print_success(&format!("Mint ready: {}", issued.mint));
    if let Some(signature) = &issued.signature {
        println!("Issuance signature: {signature}");
    }
    println!(
        "Fee schedule: {} bp, max fee {}",
        issued.policy.fee_basis_points,
        format_units(issued.policy.max_fee, issued.decimals)
    );
    Ok(issued)
}
