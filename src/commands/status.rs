//! `status`: show the recorded workflow state.

use anyhow::Result;

use crate::config::SweepConfig;

use super::load_state;

pub async fn run(config: &SweepConfig) -> Result<()> {
    let state = load_state(config)?;
    println!("State file: {}", config.state_path.display());
    println!("{}", state.summary());
    Ok(())
}
