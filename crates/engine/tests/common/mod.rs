//! In-memory collaborators shared by the engine integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use lp_rebalancer_core::{
    AprQuality, DepositOutcome, DepositRequest, DexGateway, MonitorConfig, OpportunityAnalysis,
    OptimizationOpportunity, PoolDescriptor, Position, PositionMetadata, ServiceLocator,
    TokenAmount, TokenBalance, TokenInfo, TrackedPosition, UserProfile, VaultKeypair,
    VaultService, WithdrawOutcome, WithdrawRequest, YieldScout,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;

pub const USER: &str = "user-1";

// =============================================================================
// Fixtures
// =============================================================================

pub fn sol() -> TokenInfo {
    TokenInfo::new("So11111111111111111111111111111111111111112", "SOL", 9)
}

pub fn usdc() -> TokenInfo {
    TokenInfo::new("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", "USDC", 6)
}

pub fn usdt() -> TokenInfo {
    TokenInfo::new("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB", "USDT", 6)
}

pub fn bonk() -> TokenInfo {
    TokenInfo::new("DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263", "BONK", 5)
}

/// A two-day-old SOL/USDC position worth `value_usd`.
pub fn position(pool_id: &str, value_usd: Decimal, apr: f64) -> Position {
    Position {
        pool_id: pool_id.to_string(),
        dex: "raydium".to_string(),
        share_balance: dec!(100),
        underlying: vec![
            TokenAmount::new(sol(), dec!(5)),
            TokenAmount::new(usdc(), dec!(500)),
        ],
        value_usd: Some(value_usd),
        metadata: PositionMetadata {
            created_at: Some(Utc::now() - Duration::days(2)),
            apr: Some(apr),
            ..Default::default()
        },
    }
}

/// Deep SOL/USDC pool with healthy turnover.
pub fn pool(id: &str, dex: &str) -> PoolDescriptor {
    PoolDescriptor {
        id: id.to_string(),
        dex: dex.to_string(),
        token_a: sol(),
        token_b: usdc(),
        tvl_usd: dec!(5_000_000),
        volume_24h_usd: Some(dec!(1_000_000)),
    }
}

pub fn opportunity(
    source: Option<Position>,
    target: PoolDescriptor,
    new_apr: f64,
    net_gain_pct: f64,
) -> OptimizationOpportunity {
    let current_apr = source
        .as_ref()
        .and_then(|p| p.metadata.apr)
        .unwrap_or_default();
    OptimizationOpportunity {
        source_position: source,
        target_pool: target,
        estimated_new_apr: new_apr,
        current_apr,
        estimated_cost_usd: dec!(1),
        net_gain_pct,
    }
}

/// Wraps an opportunity as if the evaluator had approved it.
pub fn approved(opportunity: OptimizationOpportunity) -> OpportunityAnalysis {
    OpportunityAnalysis {
        estimated_net_gain_pct: opportunity.net_gain_pct,
        opportunity,
        should_execute: true,
        reason: "approved".to_string(),
        risk_score: 0.0,
        opportunity_score: 75.0,
        is_high_apr: false,
        apr_quality: AprQuality::Sustainable,
        estimated_il_risk_pct: 2.0,
    }
}

pub fn profile() -> UserProfile {
    UserProfile {
        user_id: USER.to_string(),
        vault_public_key: "vault-pubkey".to_string(),
        encrypted_secret: SecretString::from("encrypted-secret".to_string()),
        auto_rebalance: Default::default(),
    }
}

pub fn test_config() -> MonitorConfig {
    MonitorConfig {
        startup_retry_attempts: 2,
        startup_retry_delay_secs: 0,
        ..MonitorConfig::default()
    }
}

// =============================================================================
// MockDex
// =============================================================================

#[derive(Default)]
pub struct MockDex {
    positions: Mutex<Vec<Position>>,
    fail_fetch: AtomicBool,
    fail_withdraw: AtomicBool,
    fail_deposit: AtomicBool,
    omit_withdraw_id: AtomicBool,
    omit_deposit_id: AtomicBool,
    tokens_received: Mutex<Option<Vec<TokenAmount>>>,
    tx_counter: AtomicUsize,
    pub withdrawals: Mutex<Vec<WithdrawRequest>>,
    pub deposits: Mutex<Vec<DepositRequest>>,
}

impl MockDex {
    pub fn with_positions(positions: Vec<Position>) -> Self {
        let dex = Self::default();
        dex.set_positions(positions);
        dex
    }

    pub fn set_positions(&self, positions: Vec<Position>) {
        *self.positions.lock().unwrap() = positions;
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_withdraw(&self, fail: bool) {
        self.fail_withdraw.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deposit(&self, fail: bool) {
        self.fail_deposit.store(fail, Ordering::SeqCst);
    }

    /// Legs still succeed but report no transaction id.
    pub fn omit_ids(&self, withdraw: bool, deposit: bool) {
        self.omit_withdraw_id.store(withdraw, Ordering::SeqCst);
        self.omit_deposit_id.store(deposit, Ordering::SeqCst);
    }

    pub fn receive(&self, tokens: Vec<TokenAmount>) {
        *self.tokens_received.lock().unwrap() = Some(tokens);
    }

    pub fn withdrawal_count(&self) -> usize {
        self.withdrawals.lock().unwrap().len()
    }

    pub fn deposit_count(&self) -> usize {
        self.deposits.lock().unwrap().len()
    }

    fn next_tx(&self, kind: &str) -> String {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{kind}-tx-{n}")
    }
}

#[async_trait]
impl DexGateway for MockDex {
    async fn get_all_positions(&self, _user_id: &str) -> Result<Vec<Position>> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(anyhow!("RPC node unreachable"));
        }
        Ok(self.positions.lock().unwrap().clone())
    }

    async fn withdraw(
        &self,
        _vault: &VaultKeypair,
        request: WithdrawRequest,
    ) -> Result<WithdrawOutcome> {
        self.withdrawals.lock().unwrap().push(request);
        if self.fail_withdraw.load(Ordering::SeqCst) {
            return Ok(WithdrawOutcome {
                success: false,
                error: Some("slippage tolerance exceeded".to_string()),
                ..Default::default()
            });
        }
        Ok(WithdrawOutcome {
            success: true,
            transaction_id: (!self.omit_withdraw_id.load(Ordering::SeqCst))
                .then(|| self.next_tx("withdraw")),
            error: None,
            tokens_received: self.tokens_received.lock().unwrap().clone(),
        })
    }

    async fn deposit(&self, _vault: &VaultKeypair, request: DepositRequest) -> Result<DepositOutcome> {
        self.deposits.lock().unwrap().push(request);
        if self.fail_deposit.load(Ordering::SeqCst) {
            return Err(anyhow!("blockhash expired"));
        }
        Ok(DepositOutcome {
            success: true,
            transaction_id: (!self.omit_deposit_id.load(Ordering::SeqCst))
                .then(|| self.next_tx("deposit")),
            error: None,
        })
    }
}

// =============================================================================
// MockVault
// =============================================================================

pub struct MockVault {
    profile: Mutex<Option<UserProfile>>,
    balances: Mutex<Vec<TokenBalance>>,
    pub tracked: Mutex<Vec<TrackedPosition>>,
    pub untracked: Mutex<Vec<String>>,
}

impl Default for MockVault {
    fn default() -> Self {
        Self {
            profile: Mutex::new(Some(profile())),
            balances: Mutex::new(Vec::new()),
            tracked: Mutex::new(Vec::new()),
            untracked: Mutex::new(Vec::new()),
        }
    }
}

impl MockVault {
    pub fn set_profile(&self, profile: Option<UserProfile>) {
        *self.profile.lock().unwrap() = profile;
    }

    pub fn set_balances(&self, balances: Vec<TokenBalance>) {
        *self.balances.lock().unwrap() = balances;
    }
}

#[async_trait]
impl VaultService for MockVault {
    async fn get_profile(&self, _user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.profile.lock().unwrap().clone())
    }

    async fn get_vault_keypair(
        &self,
        _user_id: &str,
        encrypted_secret: &SecretString,
    ) -> Result<VaultKeypair> {
        Ok(VaultKeypair {
            public_key: "vault-pubkey".to_string(),
            secret: encrypted_secret.clone(),
        })
    }

    async fn get_balances(&self, _vault_public_key: &str) -> Result<Vec<TokenBalance>> {
        Ok(self.balances.lock().unwrap().clone())
    }

    async fn add_tracked_position(&self, _user_id: &str, position: TrackedPosition) -> Result<()> {
        self.tracked.lock().unwrap().push(position);
        Ok(())
    }

    async fn remove_tracked_position(&self, _user_id: &str, pool_id: &str) -> Result<()> {
        self.untracked.lock().unwrap().push(pool_id.to_string());
        Ok(())
    }
}

// =============================================================================
// MockScout
// =============================================================================

#[derive(Default)]
pub struct MockScout {
    opportunities: Mutex<Vec<OptimizationOpportunity>>,
    /// Pool ids of the eligible positions passed on each call.
    pub seen_eligible: Mutex<Vec<Vec<String>>>,
    pub seen_idle: Mutex<Vec<Vec<TokenBalance>>>,
}

impl MockScout {
    pub fn offering(opportunities: Vec<OptimizationOpportunity>) -> Self {
        let scout = Self::default();
        scout.set_opportunities(opportunities);
        scout
    }

    pub fn set_opportunities(&self, opportunities: Vec<OptimizationOpportunity>) {
        *self.opportunities.lock().unwrap() = opportunities;
    }
}

#[async_trait]
impl YieldScout for MockScout {
    async fn find_best_opportunities(
        &self,
        _user_id: &str,
        eligible_positions: &[Position],
        idle_balances: &[TokenBalance],
    ) -> Result<Vec<OptimizationOpportunity>> {
        self.seen_eligible
            .lock()
            .unwrap()
            .push(eligible_positions.iter().map(|p| p.pool_id.clone()).collect());
        self.seen_idle.lock().unwrap().push(idle_balances.to_vec());
        Ok(self.opportunities.lock().unwrap().clone())
    }
}

// =============================================================================
// MockLocator
// =============================================================================

pub struct MockLocator {
    pub dex: Arc<MockDex>,
    pub vault: Arc<MockVault>,
    pub scout: Arc<MockScout>,
    available: AtomicBool,
    pub lookups: AtomicUsize,
}

impl MockLocator {
    pub fn new(dex: MockDex, vault: MockVault, scout: MockScout) -> Arc<Self> {
        Arc::new(Self {
            dex: Arc::new(dex),
            vault: Arc::new(vault),
            scout: Arc::new(scout),
            available: AtomicBool::new(true),
            lookups: AtomicUsize::new(0),
        })
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceLocator for MockLocator {
    async fn dex_gateway(&self) -> Option<Arc<dyn DexGateway>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.is_available()
            .then(|| Arc::clone(&self.dex) as Arc<dyn DexGateway>)
    }

    async fn vault_service(&self) -> Option<Arc<dyn VaultService>> {
        self.is_available()
            .then(|| Arc::clone(&self.vault) as Arc<dyn VaultService>)
    }

    async fn yield_scout(&self) -> Option<Arc<dyn YieldScout>> {
        self.is_available()
            .then(|| Arc::clone(&self.scout) as Arc<dyn YieldScout>)
    }
}
