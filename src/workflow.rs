//! Workflow state persisted between invocations.
//!
//! The state file records what the pipeline has accomplished so far: the
//! issued mint, the distribution layout, vault coordinates, and running
//! harvest totals. Scan snapshots are deliberately not persisted; withheld
//! balances move under the workflow's feet, so each harvest starts from a
//! fresh scan and only the counts are kept for reporting.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::keys::Address;

/// Furthest pipeline stage the workflow has completed. A fresh scan after a
/// harvest moves the stage back to `Scanned`, starting the next cycle.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Unissued,
    Issued,
    Distributed,
    Scanned,
    Harvested,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Unissued => "unissued",
            Stage::Issued => "issued",
            Stage::Distributed => "distributed",
            Stage::Scanned => "scanned",
            Stage::Harvested => "harvested",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowState {
    pub stage: Stage,
    pub mint: Option<Address>,
    pub decimals: Option<u8>,
    /// Token account the distribution pays from.
    pub source_account: Option<Address>,
    pub holders: Vec<Address>,
    pub vault_owner: Option<Address>,
    pub vault_account: Option<Address>,
    pub last_scan_count: Option<usize>,
    pub last_scan_withheld: Option<u64>,
    /// Fees swept across all harvest cycles.
    pub harvested_total: u64,
    pub harvest_cycles: u32,
    pub updated_at: Option<String>,
}

impl WorkflowState {
    /// Read state from `path`; a missing file is an empty workflow.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read state file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse state file {}", path.display()))
    }

    /// Write state to `path` via a rename, so a crash mid-write cannot leave
    /// a half-written file behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize state")?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)
            .with_context(|| format!("failed to write state file {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("failed to replace state file {}", path.display()))?;
        Ok(())
    }

    pub fn record_issued(&mut self, mint: Address, decimals: u8) {
        self.mint = Some(mint);
        self.decimals = Some(decimals);
        self.stage = self.stage.max(Stage::Issued);
        self.touch();
    }

    pub fn record_distributed(&mut self, source: Address, holders: &[Address]) {
        self.source_account = Some(source);
        self.holders = holders.to_vec();
        self.stage = self.stage.max(Stage::Distributed);
        self.touch();
    }

    pub fn record_scanned(&mut self, count: usize, withheld: u64) {
        self.last_scan_count = Some(count);
        self.last_scan_withheld = Some(withheld);
        // assignment, not max: scanning after a harvest opens a new cycle
        self.stage = Stage::Scanned;
        self.touch();
    }

    pub fn record_harvested(&mut self, vault_owner: Address, vault: Address, withdrawn: u64) {
        self.vault_owner = Some(vault_owner);
        self.vault_account = Some(vault);
        self.harvested_total = self.harvested_total.saturating_add(withdrawn);
        self.harvest_cycles += 1;
        self.stage = Stage::Harvested;
        self.touch();
    }

    pub fn require_mint(&self) -> Result<Address> {
        self.mint
            .context("no mint recorded; run `feesweep issue` first or set token.mint")
    }

    /// Human-readable account of the recorded progress.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!("stage: {}", self.stage)];
        if let Some(mint) = &self.mint {
            match self.decimals {
                Some(decimals) => lines.push(format!("mint: {mint} ({decimals} decimals)")),
                None => lines.push(format!("mint: {mint}")),
            }
        }
        if let Some(source) = &self.source_account {
            lines.push(format!("source account: {source}"));
        }
        if !self.holders.is_empty() {
            lines.push(format!("holders: {}", self.holders.len()));
        }
        if let Some(owner) = &self.vault_owner {
            lines.push(format!("vault owner: {owner}"));
        }
        if let Some(vault) = &self.vault_account {
            lines.push(format!("vault account: {vault}"));
        }
        if let (Some(count), Some(withheld)) = (self.last_scan_count, self.last_scan_withheld) {
            lines.push(format!(
                "last scan: {count} fee-bearing accounts, {withheld} withheld"
            ));
        }
        if self.harvest_cycles > 0 {
            lines.push(format!(
                "harvested: {} across {} cycle(s)",
                self.harvested_total, self.harvest_cycles
            ));
        }
        if let Some(updated) = &self.updated_at {
            lines.push(format!("updated: {updated}"));
        }
        lines.join("\n")
    }

    fn touch(&mut self) {
        self.updated_at = Some(Utc::now().to_rfc3339());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Keypair;

    #[test]
    fn missing_file_is_an_empty_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let state = WorkflowState::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(state, WorkflowState::default());
        assert_eq!(state.stage, Stage::Unissued);
    }

    #[test]
    fn state_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut state = WorkflowState::default();
        state.record_issued(Keypair::generate().address(), 9);
        state.record_distributed(
            Keypair::generate().address(),
            &[Keypair::generate().address(), Keypair::generate().address()],
        );
        state.save(&path).unwrap();

        let loaded = WorkflowState::load(&path).unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.stage, Stage::Distributed);
        assert_eq!(loaded.holders.len(), 2);
    }

    #[test]
    fn stages_advance_and_cycle() {
        let mut state = WorkflowState::default();
        let mint = Keypair::generate().address();
        let vault = Keypair::generate().address();
        let owner = Keypair::generate().address();

        state.record_issued(mint, 6);
        assert_eq!(state.stage, Stage::Issued);

        state.record_scanned(3, 500);
        assert_eq!(state.stage, Stage::Scanned);

        state.record_harvested(owner, vault, 500);
        assert_eq!(state.stage, Stage::Harvested);
        assert_eq!(state.harvested_total, 500);
        assert_eq!(state.harvest_cycles, 1);

        // a fresh scan starts the next cycle
        state.record_scanned(1, 40);
        assert_eq!(state.stage, Stage::Scanned);

        state.record_harvested(owner, vault, 40);
        assert_eq!(state.harvested_total, 540);
        assert_eq!(state.harvest_cycles, 2);
    }

    #[test]
    fn issuing_again_does_not_regress_the_stage() {
        let mut state = WorkflowState::default();
        state.record_issued(Keypair::generate().address(), 9);
        state.record_distributed(Keypair::generate().address(), &[]);
        state.record_issued(Keypair::generate().address(), 9);
        assert_eq!(state.stage, Stage::Distributed);
    }

    #[test]
    fn mint_is_required_for_later_stages() {
        let state = WorkflowState::default();
        let err = state.require_mint().unwrap_err();
        assert!(err.to_string().contains("feesweep issue"));

        let mut state = WorkflowState::default();
        let mint = Keypair::generate().address();
        state.record_issued(mint, 9);
        assert_eq!(state.require_mint().unwrap(), mint);
    }

    #[test]
    fn summary_names_the_recorded_facts() {
        let mut state = WorkflowState::default();
        let mint = Keypair::generate().address();
        state.record_issued(mint, 9);
        state.record_scanned(2, 77);
        let summary = state.summary();
        assert!(summary.contains("stage: scanned"));
        assert!(summary.contains(&mint.to_base58()));
        assert!(summary.contains("2 fee-bearing accounts"));
    }
}
