//! Integration tests for rebalance execution against in-memory collaborators.
//!
//! Covers the two-leg migration, the withdrawn-but-not-redeposited incident state,
//! early failures that record no transactions, and idle-capital deposits.

mod common;

use std::sync::Arc;

use common::*;
use lp_rebalancer_core::{AutoRebalanceSettings, MigrationOutcome, TokenAmount};
use lp_rebalancer_engine::RebalanceExecutor;
use rust_decimal_macros::dec;

fn executor(dex: &Arc<MockDex>, vault: &Arc<MockVault>) -> RebalanceExecutor {
    RebalanceExecutor::new(dex.clone(), vault.clone(), 100)
}

fn migration() -> lp_rebalancer_core::OpportunityAnalysis {
    approved(opportunity(
        Some(position("pool-old", dec!(1000), 5.0)),
        pool("pool-new", "orca"),
        12.0,
        3.0,
    ))
}

#[tokio::test]
async fn full_migration_lands_both_legs_and_tracks_new_position() {
    let dex = Arc::new(MockDex::default());
    dex.receive(vec![
        TokenAmount::new(sol(), dec!(5.1)),
        TokenAmount::new(usdc(), dec!(498)),
    ]);
    let vault = Arc::new(MockVault::default());

    let result = executor(&dex, &vault).execute(USER, &migration()).await;

    assert!(result.success, "unexpected error: {:?}", result.error);
    assert_eq!(result.transaction_ids, vec!["withdraw-tx-1", "deposit-tx-2"]);
    assert_eq!(result.outcome(), MigrationOutcome::Migrated);
    assert_eq!(result.from_pool.as_deref(), Some("pool-old"));
    assert_eq!(result.to_pool, "pool-new");
    assert!((result.previous_apr - 5.0).abs() < f64::EPSILON);
    assert!((result.new_apr - 12.0).abs() < f64::EPSILON);

    let deposits = dex.deposits.lock().unwrap();
    assert_eq!(deposits.len(), 1);
    assert_eq!(deposits[0].pool_id, "pool-new");
    assert_eq!(deposits[0].token_a_amount, dec!(5.1));
    assert_eq!(deposits[0].token_b_amount, dec!(498));

    assert_eq!(*vault.untracked.lock().unwrap(), vec!["pool-old".to_string()]);
    let tracked = vault.tracked.lock().unwrap();
    assert_eq!(tracked.len(), 1);
    assert_eq!(tracked[0].pool_id, "pool-new");
    assert_eq!(tracked[0].migrated_from.as_deref(), Some("pool-old"));
}

#[tokio::test]
async fn token_mismatch_after_withdrawal_is_an_incident() {
    let dex = Arc::new(MockDex::default());
    dex.receive(vec![
        TokenAmount::new(usdt(), dec!(500)),
        TokenAmount::new(bonk(), dec!(1_000_000)),
    ]);
    let vault = Arc::new(MockVault::default());

    let result = executor(&dex, &vault).execute(USER, &migration()).await;

    assert!(!result.success);
    assert_eq!(result.transaction_ids.len(), 1);
    assert!(result.is_incident());
    assert_eq!(result.outcome(), MigrationOutcome::WithdrawnNotRedeposited);

    let error = result.error.unwrap();
    assert!(error.contains("USDT"), "{error}");
    assert!(error.contains("BONK"), "{error}");
    assert!(error.contains("SOL"), "{error}");
    assert!(error.contains("USDC"), "{error}");
    assert!(error.contains("NOT redeposited"), "{error}");

    assert_eq!(dex.deposit_count(), 0);
    assert!(vault.tracked.lock().unwrap().is_empty());
}

#[tokio::test]
async fn withdraw_without_id_still_counts_as_a_landed_leg() {
    let dex = Arc::new(MockDex::default());
    dex.omit_ids(true, false);
    dex.receive(vec![
        TokenAmount::new(sol(), dec!(5)),
        TokenAmount::new(usdt(), dec!(500)),
    ]);
    let vault = Arc::new(MockVault::default());

    let result = executor(&dex, &vault).execute(USER, &migration()).await;

    assert!(!result.success);
    assert_eq!(result.transaction_ids, vec!["pool-old-withdraw-unconfirmed"]);
    assert_eq!(result.outcome(), MigrationOutcome::WithdrawnNotRedeposited);
    assert!(result.is_incident());
}

#[tokio::test]
async fn deposit_without_id_completes_the_migration() {
    let dex = Arc::new(MockDex::default());
    dex.omit_ids(false, true);
    let vault = Arc::new(MockVault::default());

    let result = executor(&dex, &vault).execute(USER, &migration()).await;

    assert!(result.success);
    assert_eq!(
        result.transaction_ids,
        vec!["withdraw-tx-1", "pool-new-deposit-unconfirmed"]
    );
    assert_eq!(result.outcome(), MigrationOutcome::Migrated);
    assert!(!result.is_incident());
}

#[tokio::test]
async fn withdraw_failure_records_no_transactions() {
    let dex = Arc::new(MockDex::default());
    dex.set_fail_withdraw(true);
    let vault = Arc::new(MockVault::default());

    let result = executor(&dex, &vault).execute(USER, &migration()).await;

    assert!(!result.success);
    assert!(result.transaction_ids.is_empty());
    assert!(!result.is_incident());
    assert!(result.error.unwrap().contains("slippage tolerance exceeded"));
    assert_eq!(dex.deposit_count(), 0);
    assert!(vault.untracked.lock().unwrap().is_empty());
}

#[tokio::test]
async fn deposit_failure_after_withdrawal_keeps_withdraw_transaction() {
    let dex = Arc::new(MockDex::default());
    dex.set_fail_deposit(true);
    let vault = Arc::new(MockVault::default());

    let result = executor(&dex, &vault).execute(USER, &migration()).await;

    assert!(!result.success);
    assert_eq!(result.transaction_ids, vec!["withdraw-tx-1"]);
    assert!(result.is_incident());
    let error = result.error.unwrap();
    assert!(error.contains("Deposit failed after withdrawal"), "{error}");
    assert!(error.contains("blockhash expired"), "{error}");
}

#[tokio::test]
async fn missing_profile_fails_before_any_leg() {
    let dex = Arc::new(MockDex::default());
    let vault = Arc::new(MockVault::default());
    vault.set_profile(None);

    let result = executor(&dex, &vault).execute(USER, &migration()).await;

    assert!(!result.success);
    assert!(result.transaction_ids.is_empty());
    assert!(result.error.unwrap().contains("No profile"));
    assert_eq!(dex.withdrawal_count(), 0);
}

#[tokio::test]
async fn withdraw_without_token_report_falls_back_to_underlying() {
    let dex = Arc::new(MockDex::default());
    let vault = Arc::new(MockVault::default());

    let result = executor(&dex, &vault).execute(USER, &migration()).await;

    assert!(result.success);
    let deposits = dex.deposits.lock().unwrap();
    assert_eq!(deposits[0].token_a_amount, dec!(5));
    assert_eq!(deposits[0].token_b_amount, dec!(500));
}

#[tokio::test]
async fn idle_capital_is_deposited_in_one_transaction() {
    let dex = Arc::new(MockDex::default());
    let vault = Arc::new(MockVault::default());
    vault.set_balances(vec![
        TokenAmount::new(sol(), dec!(2)),
        TokenAmount::new(usdc(), dec!(300)),
    ]);
    let analysis = approved(opportunity(None, pool("pool-new", "orca"), 12.0, 12.0));

    let result = executor(&dex, &vault).execute(USER, &analysis).await;

    assert!(result.success);
    assert_eq!(result.transaction_ids, vec!["deposit-tx-1"]);
    assert_eq!(result.from_pool, None);
    assert_eq!(dex.withdrawal_count(), 0);
    let tracked = vault.tracked.lock().unwrap();
    assert_eq!(tracked[0].migrated_from, None);
}

#[tokio::test]
async fn idle_deposit_ignores_unrelated_vault_holdings() {
    let dex = Arc::new(MockDex::default());
    let vault = Arc::new(MockVault::default());
    vault.set_balances(vec![
        TokenAmount::new(sol(), dec!(2)),
        TokenAmount::new(usdc(), dec!(300)),
        TokenAmount::new(bonk(), dec!(1)),
    ]);
    let analysis = approved(opportunity(None, pool("pool-new", "orca"), 12.0, 12.0));

    let result = executor(&dex, &vault).execute(USER, &analysis).await;

    assert!(result.success, "unexpected error: {:?}", result.error);
    assert_eq!(result.transaction_ids, vec!["deposit-tx-1"]);
    let deposits = dex.deposits.lock().unwrap();
    assert_eq!(deposits[0].token_a_amount, dec!(2));
    assert_eq!(deposits[0].token_b_amount, dec!(300));
}

#[tokio::test]
async fn idle_balances_that_miss_the_pair_are_not_an_incident() {
    let dex = Arc::new(MockDex::default());
    let vault = Arc::new(MockVault::default());
    vault.set_balances(vec![TokenAmount::new(usdt(), dec!(300))]);
    let analysis = approved(opportunity(None, pool("pool-new", "orca"), 12.0, 12.0));

    let result = executor(&dex, &vault).execute(USER, &analysis).await;

    assert!(!result.success);
    assert!(result.transaction_ids.is_empty());
    assert!(!result.is_incident());
    assert_eq!(dex.deposit_count(), 0);
}

#[tokio::test]
async fn user_slippage_override_is_applied_to_both_legs() {
    let dex = Arc::new(MockDex::default());
    let vault = Arc::new(MockVault::default());
    let mut user = profile();
    user.auto_rebalance = AutoRebalanceSettings {
        max_slippage_bps: Some(30),
        ..Default::default()
    };
    vault.set_profile(Some(user));

    executor(&dex, &vault).execute(USER, &migration()).await;

    assert_eq!(dex.withdrawals.lock().unwrap()[0].slippage_bps, 30);
    assert_eq!(dex.deposits.lock().unwrap()[0].slippage_bps, 30);
}

#[tokio::test]
async fn default_slippage_applies_without_override() {
    let dex = Arc::new(MockDex::default());
    let vault = Arc::new(MockVault::default());

    executor(&dex, &vault).execute(USER, &migration()).await;

    let withdrawals = dex.withdrawals.lock().unwrap();
    assert_eq!(withdrawals[0].slippage_bps, 100);
    assert_eq!(withdrawals[0].share_amount, dec!(100));
}
