//! Integration tests for the feesweep workflow
//!
//! These tests drive the pipeline end to end against the in-memory ledger:
//! - Mint issuance and adoption
//! - Supply distribution with destination-withheld fees
//! - Fee-bearing account discovery
//! - Batched harvesting into the vault and forwarding onward
//! - Failure and ambiguous-outcome handling

use std::collections::BTreeSet;

use async_trait::async_trait;
use feesweep::config::SweepConfig;
use feesweep::distribution::{DistributionEngine, DistributionReport};
use feesweep::error::{LedgerError, WorkflowError};
use feesweep::harvest::{HarvestCoordinator, MAX_WITHDRAW_SOURCES};
use feesweep::instruction::associated_account_address;
use feesweep::issuer::{IssuedMint, TokenIssuer};
use feesweep::keys::{Address, Keypair};
use feesweep::ledger::memory::MemoryLedger;
use feesweep::ledger::{ensure_associated_account, AccountInfo, LedgerClient, TxStatus};
use feesweep::scanner::WithheldFeeScanner;
use feesweep::transaction::Transaction;

/// One whole token at nine decimals.
const ONE: u64 = 1_000_000_000;
const PAYER_FUNDING: u64 = 1_000_000_000_000;

/// 1% fee capped at 9 tokens: the default transfer of 1000 hits the cap.
fn test_config() -> SweepConfig {
    let mut config = SweepConfig::default();
    config.network.confirmation_timeout_secs = 5;
    config.token.decimals = 9;
    config.token.fee_basis_points = 100;
    config.token.max_fee = 9 * ONE;
    config.distribution.mint_amount = 1_000_000 * ONE;
    config.distribution.transfer_amount = 1_000 * ONE;
    config
}

async fn funded_payer(ledger: &MemoryLedger) -> Keypair {
    let payer = Keypair::generate();
    ledger
        .request_airdrop(&payer.address(), PAYER_FUNDING)
        .await
        .unwrap();
    payer
}

async fn issue_mint(ledger: &MemoryLedger, config: &SweepConfig, payer: &Keypair) -> IssuedMint {
    TokenIssuer::new(ledger, config).issue(payer).await.unwrap()
}

async fn distribute(
    ledger: &MemoryLedger,
    config: &SweepConfig,
    payer: &Keypair,
    mint: &Address,
    holders: &[Address],
) -> DistributionReport {
    DistributionEngine::new(ledger, config)
        .mint_and_distribute(
            payer,
            mint,
            holders,
            config.distribution.mint_amount,
            config.distribution.transfer_amount,
        )
        .await
        .unwrap()
}

fn holder_addresses(count: usize) -> Vec<Address> {
    (0..count).map(|_| Keypair::generate().address()).collect()
}

/// Ledger stub whose every call fails at the transport.
struct FailingLedger;

#[async_trait]
impl LedgerClient for FailingLedger {
    async fn submit_transaction(&self, _tx: &Transaction) -> Result<String, LedgerError> {
        Err(LedgerError::Transport("rpc unreachable".into()))
    }

    async fn signature_status(&self, _signature: &str) -> Result<TxStatus, LedgerError> {
        Err(LedgerError::Transport("rpc unreachable".into()))
    }

    async fn latest_blockhash(&self) -> Result<[u8; 32], LedgerError> {
        Err(LedgerError::Transport("rpc unreachable".into()))
    }

    async fn minimum_balance_for_rent_exemption(&self, _size: usize) -> Result<u64, LedgerError> {
        Err(LedgerError::Transport("rpc unreachable".into()))
    }

    async fn get_account(&self, _address: &Address) -> Result<Option<AccountInfo>, LedgerError> {
        Err(LedgerError::Transport("rpc unreachable".into()))
    }

    async fn get_program_accounts(
        &self,
        _program: &Address,
        _offset: usize,
        _bytes: &[u8],
    ) -> Result<Vec<(Address, AccountInfo)>, LedgerError> {
        Err(LedgerError::Transport("rpc unreachable".into()))
    }

    async fn get_balance(&self, _address: &Address) -> Result<u64, LedgerError> {
        Err(LedgerError::Transport("rpc unreachable".into()))
    }

    async fn request_airdrop(
        &self,
        _address: &Address,
        _lamports: u64,
    ) -> Result<String, LedgerError> {
        Err(LedgerError::Transport("rpc unreachable".into()))
    }
}

// ============================================================================
// Issuance
// ============================================================================

mod issuance {
    use super::*;

    #[tokio::test]
    async fn test_issue_creates_fee_bearing_mint() {
        let ledger = MemoryLedger::new();
        let config = test_config();
        let payer = funded_payer(&ledger).await;

        let issued = issue_mint(&ledger, &config, &payer).await;
        assert!(issued.signature.is_some());
        assert_eq!(issued.decimals, 9);

        let mint = ledger.mint(&issued.mint).unwrap();
        assert!(mint.is_initialized);
        assert_eq!(mint.supply, 0);
        assert_eq!(mint.decimals, 9);
        assert_eq!(mint.mint_authority, Some(payer.address()));

        let fee = mint.transfer_fee.unwrap();
        assert_eq!(fee.policy.fee_basis_points, 100);
        assert_eq!(fee.policy.max_fee, 9 * ONE);
        assert_eq!(fee.withdraw_authority, Some(payer.address()));
        assert_eq!(fee.config_authority, Some(payer.address()));
    }

    #[tokio::test]
    async fn test_issue_requires_funding() {
        let ledger = MemoryLedger::new();
        let config = test_config();
        let broke = Keypair::generate();

        let err = TokenIssuer::new(&ledger, &config)
            .issue(&broke)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Funding(_)));
    }

    #[tokio::test]
    async fn test_issue_rejects_excessive_fee_rate() {
        let ledger = MemoryLedger::new();
        let mut config = test_config();
        config.token.fee_basis_points = 12_000;
        let payer = funded_payer(&ledger).await;

        let err = TokenIssuer::new(&ledger, &config)
            .issue(&payer)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidPolicy(_)));
    }

    #[tokio::test]
    async fn test_issue_reconciles_after_confirmation_timeout() {
        let ledger = MemoryLedger::new();
        let mut config = test_config();
        config.network.confirmation_timeout_secs = 0;
        let payer = funded_payer(&ledger).await;

        // confirmations never arrive, but the transaction itself lands
        ledger.hold_confirmations(true);
        let issued = issue_mint(&ledger, &config, &payer).await;
        assert!(issued.signature.is_some());
        assert_eq!(issued.policy.fee_basis_points, 100);
        assert!(ledger.mint(&issued.mint).unwrap().is_initialized);
    }

    #[tokio::test]
    async fn test_adopting_an_existing_mint() {
        let ledger = MemoryLedger::new();
        let config = test_config();
        let payer = funded_payer(&ledger).await;
        let issued = issue_mint(&ledger, &config, &payer).await;

        let adopted = TokenIssuer::new(&ledger, &config)
            .load_mint(&issued.mint)
            .await
            .unwrap();
        assert_eq!(adopted.mint, issued.mint);
        assert_eq!(adopted.policy, issued.policy);
        assert_eq!(adopted.decimals, 9);
        assert!(adopted.signature.is_none());

        let absent = Keypair::generate().address();
        let err = TokenIssuer::new(&ledger, &config)
            .load_mint(&absent)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::MissingAccount(a) if a == absent));
    }
}

// ============================================================================
// Distribution
// ============================================================================

mod distribution {
    use super::*;

    #[tokio::test]
    async fn test_distribution_credits_holders_and_withholds_fees() {
        let ledger = MemoryLedger::new();
        let config = test_config();
        let payer = funded_payer(&ledger).await;
        let issued = issue_mint(&ledger, &config, &payer).await;
        let holders = holder_addresses(3);

        let report = distribute(&ledger, &config, &payer, &issued.mint, &holders).await;
        assert!(report.is_complete());
        assert_eq!(report.transfers.len(), 3);
        assert!(report.mint_signature.is_some());
        assert_eq!(report.total_fees(), 27 * ONE);

        for (i, record) in report.transfers.iter().enumerate() {
            assert_eq!(record.holder_index, i);
            assert_eq!(record.holder, holders[i]);
            assert_eq!(record.amount, 1_000 * ONE);
            assert_eq!(record.fee, 9 * ONE);

            let destination = associated_account_address(holders[i], issued.mint);
            assert_eq!(record.destination, destination);
            let account = ledger.token_account(&destination).unwrap();
            assert_eq!(account.amount, 991 * ONE);
            assert_eq!(account.withheld_amount, 9 * ONE);
        }

        let source = ledger.token_account(&report.source).unwrap();
        assert_eq!(source.amount, (1_000_000 - 3_000) * ONE);
        assert_eq!(source.withheld_amount, 0);

        // fees are withheld, not burned
        assert_eq!(ledger.mint(&issued.mint).unwrap().supply, 1_000_000 * ONE);
    }

    #[tokio::test]
    async fn test_failed_holder_does_not_stop_the_rest() {
        let ledger = MemoryLedger::new();
        let config = test_config();
        let payer = funded_payer(&ledger).await;
        let issued = issue_mint(&ledger, &config, &payer).await;
        let holders = holder_addresses(3);

        // supply covers two and a half transfers
        let report = DistributionEngine::new(&ledger, &config)
            .mint_and_distribute(&payer, &issued.mint, &holders, 2_500 * ONE, 1_000 * ONE)
            .await
            .unwrap();

        assert_eq!(report.transfers.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].holder_index, 2);
        assert_eq!(report.failures[0].holder, holders[2]);
        assert!(matches!(report.failures[0].error, WorkflowError::Funding(_)));
    }

    #[tokio::test]
    async fn test_stale_fee_assertion_is_detected_before_submission() {
        let ledger = MemoryLedger::new();
        let config = test_config();
        let payer = funded_payer(&ledger).await;
        let issued = issue_mint(&ledger, &config, &payer).await;

        // the operator's config drifted from the schedule the mint carries
        let mut stale = test_config();
        stale.token.fee_basis_points = 200;
        stale.token.max_fee = 100 * ONE;

        let err = DistributionEngine::new(&ledger, &stale)
            .mint_and_distribute(
                &payer,
                &issued.mint,
                &holder_addresses(2),
                1_000_000 * ONE,
                1_000 * ONE,
            )
            .await
            .unwrap_err();
        match err {
            WorkflowError::StaleFeeAssertion { asserted, live } => {
                assert_eq!(asserted, 20 * ONE);
                assert_eq!(live, 9 * ONE);
            }
            other => panic!("unexpected error: {other}"),
        }

        // nothing landed
        let source = associated_account_address(payer.address(), issued.mint);
        assert!(ledger.token_account(&source).is_none());
    }

    #[tokio::test]
    async fn test_supply_cap_is_enforced() {
        let ledger = MemoryLedger::new();
        let config = test_config();
        let payer = funded_payer(&ledger).await;
        let issued = issue_mint(&ledger, &config, &payer).await;
        let engine = DistributionEngine::new(&ledger, &config);

        engine
            .mint_and_distribute(&payer, &issued.mint, &[], u64::MAX, 1_000 * ONE)
            .await
            .unwrap();
        assert_eq!(ledger.mint(&issued.mint).unwrap().supply, u64::MAX);

        let err = engine
            .mint_and_distribute(&payer, &issued.mint, &[], 1, 1_000 * ONE)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::SupplyExceeded(_)));
    }

    #[tokio::test]
    async fn test_account_provisioning_is_idempotent() {
        let ledger = MemoryLedger::new();
        let config = test_config();
        let payer = funded_payer(&ledger).await;
        let issued = issue_mint(&ledger, &config, &payer).await;
        let holder = Keypair::generate().address();

        let first = ensure_associated_account(
            &ledger,
            &payer,
            &holder,
            &issued.mint,
            config.network.commitment,
            config.confirmation_timeout(),
        )
        .await
        .unwrap();
        let second = ensure_associated_account(
            &ledger,
            &payer,
            &holder,
            &issued.mint,
            config.network.commitment,
            config.confirmation_timeout(),
        )
        .await
        .unwrap();

        assert_eq!(first, second);
        assert_eq!(first, associated_account_address(holder, issued.mint));
        assert_eq!(ledger.creation_count(&first), 1);
    }
}

// ============================================================================
// Scanning
// ============================================================================

mod scanning {
    use super::*;

    #[tokio::test]
    async fn test_scan_finds_exactly_the_fee_bearing_accounts() {
        let ledger = MemoryLedger::new();
        let config = test_config();
        let payer = funded_payer(&ledger).await;
        let issued = issue_mint(&ledger, &config, &payer).await;
        let holders = holder_addresses(3);
        let report = distribute(&ledger, &config, &payer, &issued.mint, &holders).await;

        let scan = WithheldFeeScanner::new(&ledger)
            .find_fee_bearing_accounts(&issued.mint)
            .await
            .unwrap();

        assert_eq!(scan.mint, issued.mint);
        assert_eq!(scan.len(), 3);
        assert_eq!(scan.total_withheld(), 27 * ONE);

        let found: BTreeSet<Address> = scan.addresses().into_iter().collect();
        let expected: BTreeSet<Address> = holders
            .iter()
            .map(|h| associated_account_address(*h, issued.mint))
            .collect();
        assert_eq!(found, expected);

        // the source account holds no withheld fees and is not reported
        assert!(!found.contains(&report.source));
        for account in &scan.accounts {
            assert_eq!(account.withheld_amount, 9 * ONE);
        }
    }

    #[tokio::test]
    async fn test_scan_of_quiet_mint_is_empty() {
        let ledger = MemoryLedger::new();
        let config = test_config();
        let payer = funded_payer(&ledger).await;
        let issued = issue_mint(&ledger, &config, &payer).await;

        let scan = WithheldFeeScanner::new(&ledger)
            .find_fee_bearing_accounts(&issued.mint)
            .await
            .unwrap();
        assert!(scan.is_empty());
        assert_eq!(scan.total_withheld(), 0);
    }

    #[tokio::test]
    async fn test_scan_failure_is_reported_as_discovery() {
        let ledger = FailingLedger;
        let err = WithheldFeeScanner::new(&ledger)
            .find_fee_bearing_accounts(&Keypair::generate().address())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Discovery(_)));
    }
}

// ============================================================================
// Harvesting
// ============================================================================

mod harvesting {
    use super::*;

    #[tokio::test]
    async fn test_harvest_sweeps_everything_into_the_vault() {
        let ledger = MemoryLedger::new();
        let config = test_config();
        let payer = funded_payer(&ledger).await;
        let issued = issue_mint(&ledger, &config, &payer).await;
        let holders = holder_addresses(3);
        distribute(&ledger, &config, &payer, &issued.mint, &holders).await;

        let scan = WithheldFeeScanner::new(&ledger)
            .find_fee_bearing_accounts(&issued.mint)
            .await
            .unwrap();
        let vault_owner = Keypair::generate().address();

        let outcome = HarvestCoordinator::new(&ledger, &config)
            .harvest(&payer, &scan, &vault_owner)
            .await
            .unwrap();

        assert_eq!(outcome.withdrawn, 27 * ONE);
        assert_eq!(outcome.vault_balance, 27 * ONE);
        assert_eq!(outcome.batches.len(), 1);
        assert!(outcome.batches[0].outcome.is_ok());
        assert_eq!(outcome.vault, associated_account_address(vault_owner, issued.mint));

        let vault = ledger.token_account(&outcome.vault).unwrap();
        assert_eq!(vault.amount, 27 * ONE);
        assert_eq!(vault.withheld_amount, 0);

        // sources are drained of fees but keep their balances
        for holder in &holders {
            let account = ledger
                .token_account(&associated_account_address(*holder, issued.mint))
                .unwrap();
            assert_eq!(account.withheld_amount, 0);
            assert_eq!(account.amount, 991 * ONE);
        }

        let rescan = WithheldFeeScanner::new(&ledger)
            .find_fee_bearing_accounts(&issued.mint)
            .await
            .unwrap();
        assert!(rescan.is_empty());
    }

    #[tokio::test]
    async fn test_harvest_batches_large_scans() {
        let ledger = MemoryLedger::new();
        let config = test_config();
        let payer = funded_payer(&ledger).await;
        let issued = issue_mint(&ledger, &config, &payer).await;
        let holders = holder_addresses(MAX_WITHDRAW_SOURCES + 1);
        distribute(&ledger, &config, &payer, &issued.mint, &holders).await;

        let scan = WithheldFeeScanner::new(&ledger)
            .find_fee_bearing_accounts(&issued.mint)
            .await
            .unwrap();
        assert_eq!(scan.len(), MAX_WITHDRAW_SOURCES + 1);

        let outcome = HarvestCoordinator::new(&ledger, &config)
            .harvest(&payer, &scan, &Keypair::generate().address())
            .await
            .unwrap();

        assert_eq!(outcome.batches.len(), 2);
        assert_eq!(outcome.batches[0].sources.len(), MAX_WITHDRAW_SOURCES);
        assert_eq!(outcome.batches[1].sources.len(), 1);
        assert_eq!(outcome.withdrawn, 9 * ONE * (MAX_WITHDRAW_SOURCES as u64 + 1));

        // every scanned source appears in exactly one batch
        let batched: BTreeSet<Address> = outcome
            .batches
            .iter()
            .flat_map(|b| b.sources.iter().copied())
            .collect();
        let scanned: BTreeSet<Address> = scan.addresses().into_iter().collect();
        assert_eq!(batched, scanned);
        let total_listed: usize = outcome.batches.iter().map(|b| b.sources.len()).sum();
        assert_eq!(total_listed, scan.len());
    }

    #[tokio::test]
    async fn test_harvest_tolerates_already_drained_sources() {
        let ledger = MemoryLedger::new();
        let config = test_config();
        let payer = funded_payer(&ledger).await;
        let issued = issue_mint(&ledger, &config, &payer).await;
        distribute(
            &ledger,
            &config,
            &payer,
            &issued.mint,
            &holder_addresses(2),
        )
        .await;

        let scan = WithheldFeeScanner::new(&ledger)
            .find_fee_bearing_accounts(&issued.mint)
            .await
            .unwrap();
        let vault_owner = Keypair::generate().address();
        let coordinator = HarvestCoordinator::new(&ledger, &config);

        let first = coordinator.harvest(&payer, &scan, &vault_owner).await.unwrap();
        assert_eq!(first.withdrawn, 18 * ONE);

        // the same stale snapshot again: sources are empty now, still fine
        let second = coordinator.harvest(&payer, &scan, &vault_owner).await.unwrap();
        assert_eq!(second.withdrawn, 0);
        assert_eq!(second.vault_balance, 18 * ONE);
    }

    #[tokio::test]
    async fn test_concurrent_harvests_do_not_double_count() {
        let ledger = MemoryLedger::new();
        let config = test_config();
        let payer = funded_payer(&ledger).await;
        let issued = issue_mint(&ledger, &config, &payer).await;
        distribute(
            &ledger,
            &config,
            &payer,
            &issued.mint,
            &holder_addresses(3),
        )
        .await;

        let scan = WithheldFeeScanner::new(&ledger)
            .find_fee_bearing_accounts(&issued.mint)
            .await
            .unwrap();
        let vault_owner = Keypair::generate().address();
        let a = HarvestCoordinator::new(&ledger, &config);
        let b = HarvestCoordinator::new(&ledger, &config);

        let (first, second) = tokio::join!(
            a.harvest(&payer, &scan, &vault_owner),
            b.harvest(&payer, &scan, &vault_owner)
        );
        let first = first.unwrap();
        let second = second.unwrap();

        // serialized per mint: one sweeps, the other finds nothing
        assert_eq!(first.withdrawn + second.withdrawn, 27 * ONE);
        let vault = ledger
            .token_account(&associated_account_address(vault_owner, issued.mint))
            .unwrap();
        assert_eq!(vault.amount, 27 * ONE);
    }

    #[tokio::test]
    async fn test_forward_sends_vault_balance_minus_fee() {
        let ledger = MemoryLedger::new();
        let config = test_config();
        let payer = funded_payer(&ledger).await;
        let issued = issue_mint(&ledger, &config, &payer).await;
        distribute(
            &ledger,
            &config,
            &payer,
            &issued.mint,
            &holder_addresses(3),
        )
        .await;

        let scan = WithheldFeeScanner::new(&ledger)
            .find_fee_bearing_accounts(&issued.mint)
            .await
            .unwrap();
        let vault_keys = Keypair::generate();
        let coordinator = HarvestCoordinator::new(&ledger, &config);
        coordinator
            .harvest(&payer, &scan, &vault_keys.address())
            .await
            .unwrap();

        let recipient = Keypair::generate().address();
        let record = coordinator
            .forward_from_vault(&payer, &vault_keys, &issued.mint, &recipient)
            .await
            .unwrap();

        // 1% of 27 tokens, under the cap
        let expected_fee = 270_000_000;
        assert_eq!(record.amount, 27 * ONE);
        assert_eq!(record.fee, expected_fee);

        let destination = ledger.token_account(&record.destination).unwrap();
        assert_eq!(destination.amount, 27 * ONE - expected_fee);
        assert_eq!(destination.withheld_amount, expected_fee);

        let vault = ledger
            .token_account(&associated_account_address(vault_keys.address(), issued.mint))
            .unwrap();
        assert_eq!(vault.amount, 0);
    }

    #[tokio::test]
    async fn test_forward_requires_a_vault_balance() {
        let ledger = MemoryLedger::new();
        let config = test_config();
        let payer = funded_payer(&ledger).await;
        let issued = issue_mint(&ledger, &config, &payer).await;
        let vault_keys = Keypair::generate();

        ensure_associated_account(
            &ledger,
            &payer,
            &vault_keys.address(),
            &issued.mint,
            config.network.commitment,
            config.confirmation_timeout(),
        )
        .await
        .unwrap();

        let err = HarvestCoordinator::new(&ledger, &config)
            .forward_from_vault(
                &payer,
                &vault_keys,
                &issued.mint,
                &Keypair::generate().address(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Funding(_)));
    }
}

// ============================================================================
// Failure handling
// ============================================================================

mod failure_handling {
    use super::*;

    #[tokio::test]
    async fn test_transport_failures_are_ambiguous() {
        let ledger = FailingLedger;
        let config = test_config();
        let payer = Keypair::generate();

        let err = TokenIssuer::new(&ledger, &config)
            .issue(&payer)
            .await
            .unwrap_err();
        assert!(err.is_ambiguous());

        let clean = WorkflowError::Funding("broke".into());
        assert!(!clean.is_ambiguous());
    }

    #[tokio::test]
    async fn test_wrong_withdraw_authority_fails_the_batch_and_keeps_fees() {
        let ledger = MemoryLedger::new();
        let config = test_config();
        let payer = funded_payer(&ledger).await;
        let issued = issue_mint(&ledger, &config, &payer).await;
        distribute(
            &ledger,
            &config,
            &payer,
            &issued.mint,
            &holder_addresses(2),
        )
        .await;

        let scan = WithheldFeeScanner::new(&ledger)
            .find_fee_bearing_accounts(&issued.mint)
            .await
            .unwrap();
        let vault_owner = Keypair::generate().address();

        // a config asserting an authority the payer cannot sign for
        let mut wrong = test_config();
        wrong.authorities.withdraw_authority = Some(Keypair::generate().address());

        let err = HarvestCoordinator::new(&ledger, &wrong)
            .harvest(&payer, &scan, &vault_owner)
            .await
            .unwrap_err();
        match err {
            WorkflowError::BatchWithdraw {
                total,
                failed,
                outcomes,
            } => {
                assert_eq!(total, 1);
                assert_eq!(failed, 1);
                assert!(outcomes[0].outcome.is_err());
                assert_eq!(outcomes[0].sources.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }

        // the fees stayed withheld and a correct harvest still sweeps them
        let outcome = HarvestCoordinator::new(&ledger, &config)
            .harvest(&payer, &scan, &vault_owner)
            .await
            .unwrap();
        assert_eq!(outcome.withdrawn, 18 * ONE);
    }
}

// ============================================================================
// Full pipeline
// ============================================================================

mod pipeline {
    use super::*;

    #[tokio::test]
    async fn test_full_cycle_conserves_supply() {
        let ledger = MemoryLedger::new();
        let config = test_config();
        let payer = funded_payer(&ledger).await;

        // 1. Issue
        let issued = issue_mint(&ledger, &config, &payer).await;

        // 2. Distribute
        let holders = holder_addresses(3);
        let report = distribute(&ledger, &config, &payer, &issued.mint, &holders).await;
        assert!(report.is_complete());

        // 3. Scan
        let scan = WithheldFeeScanner::new(&ledger)
            .find_fee_bearing_accounts(&issued.mint)
            .await
            .unwrap();
        assert_eq!(scan.total_withheld(), 27 * ONE);

        // 4. Harvest and forward
        let vault_keys = Keypair::generate();
        let coordinator = HarvestCoordinator::new(&ledger, &config);
        let outcome = coordinator
            .harvest(&payer, &scan, &vault_keys.address())
            .await
            .unwrap();
        assert_eq!(outcome.withdrawn, 27 * ONE);

        let recipient = Keypair::generate().address();
        let forward = coordinator
            .forward_from_vault(&payer, &vault_keys, &issued.mint, &recipient)
            .await
            .unwrap();

        // every token minted is still accounted for somewhere
        let source = ledger.token_account(&report.source).unwrap();
        let vault = ledger.token_account(&outcome.vault).unwrap();
        let destination = ledger.token_account(&forward.destination).unwrap();
        let holder_total: u64 = holders
            .iter()
            .map(|h| {
                ledger
                    .token_account(&associated_account_address(*h, issued.mint))
                    .unwrap()
                    .amount
            })
            .sum();

        let accounted = source.amount
            + holder_total
            + vault.amount
            + destination.amount
            + destination.withheld_amount;
        assert_eq!(accounted, 1_000_000 * ONE);
        assert_eq!(ledger.mint(&issued.mint).unwrap().supply, 1_000_000 * ONE);
    }
}
