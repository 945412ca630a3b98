//! Paper collaborators backed by a JSON snapshot.
//!
//! Positions, balances and candidate opportunities are loaded once from disk. Withdraw
//! and deposit move funds between positions and the vault's idle balances in memory and
//! return generated transaction ids, so a full monitoring session can be run offline.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use lp_rebalancer_core::{
    AutoRebalanceSettings, DepositOutcome, DepositRequest, DexGateway, OptimizationOpportunity,
    PoolDescriptor, Position, PositionMetadata, ServiceLocator, TokenAmount, TokenBalance,
    TokenInfo, TrackedPosition, UserProfile, VaultKeypair, VaultService, WithdrawOutcome,
    WithdrawRequest, YieldScout,
};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// On-disk snapshot consumed by the paper collaborators.
#[derive(Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub positions: Vec<Position>,
    pub profile: ProfileRecord,
    #[serde(default)]
    pub balances: Vec<TokenBalance>,
    #[serde(default)]
    pub opportunities: Vec<OptimizationOpportunity>,
}

#[derive(Deserialize)]
pub struct ProfileRecord {
    pub vault_public_key: String,
    #[serde(default)]
    pub encrypted_secret: String,
    #[serde(default)]
    pub auto_rebalance: AutoRebalanceSettings,
}

impl Snapshot {
    /// Reads and parses a snapshot file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a valid snapshot.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))
    }
}

#[derive(Debug, Default)]
struct Book {
    positions: Vec<Position>,
    balances: Vec<TokenBalance>,
    tracked: Vec<TrackedPosition>,
}

impl Book {
    fn credit(&mut self, token: &TokenInfo, amount: Decimal) {
        match self.balances.iter_mut().find(|b| b.token.mint == token.mint) {
            Some(balance) => balance.amount += amount,
            None => self.balances.push(TokenAmount::new(token.clone(), amount)),
        }
    }

    fn available(&self, token: &TokenInfo) -> Decimal {
        self.balances
            .iter()
            .find(|b| b.token.mint == token.mint)
            .map_or(Decimal::ZERO, |b| b.amount)
    }

    fn debit(&mut self, token: &TokenInfo, amount: Decimal) {
        if let Some(balance) = self.balances.iter_mut().find(|b| b.token.mint == token.mint) {
            balance.amount -= amount;
        }
        self.balances.retain(|b| b.amount > Decimal::ZERO);
    }
}

/// Shared in-memory ledger behind the paper DEX and vault.
pub struct PaperLedger {
    user_id: String,
    profile: ProfileRecord,
    pools: HashMap<String, PoolDescriptor>,
    opportunities: Vec<OptimizationOpportunity>,
    book: Mutex<Book>,
    tx_counter: AtomicU64,
}

impl PaperLedger {
    #[must_use]
    pub fn new(user_id: impl Into<String>, snapshot: Snapshot) -> Arc<Self> {
        let pools = snapshot
            .opportunities
            .iter()
            .map(|o| (o.target_pool.id.clone(), o.target_pool.clone()))
            .collect();

        Arc::new(Self {
            user_id: user_id.into(),
            profile: snapshot.profile,
            pools,
            opportunities: snapshot.opportunities,
            book: Mutex::new(Book {
                positions: snapshot.positions,
                balances: snapshot.balances,
                tracked: Vec::new(),
            }),
            tx_counter: AtomicU64::new(0),
        })
    }

    /// Loads a snapshot file and wraps it in a ledger.
    ///
    /// # Errors
    /// Returns an error if the snapshot cannot be loaded.
    pub fn from_file(user_id: impl Into<String>, path: &Path) -> Result<Arc<Self>> {
        let snapshot = Snapshot::load(path)?;
        info!(
            path = %path.display(),
            positions = snapshot.positions.len(),
            balances = snapshot.balances.len(),
            opportunities = snapshot.opportunities.len(),
            "Loaded paper snapshot"
        );
        Ok(Self::new(user_id, snapshot))
    }

    fn next_tx(&self, kind: &str) -> String {
        let n = self.tx_counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("paper-{kind}-{n}")
    }
}

// =============================================================================
// PaperDex
// =============================================================================

pub struct PaperDex {
    ledger: Arc<PaperLedger>,
}

impl PaperDex {
    #[must_use]
    pub const fn new(ledger: Arc<PaperLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl DexGateway for PaperDex {
    async fn get_all_positions(&self, _user_id: &str) -> Result<Vec<Position>> {
        Ok(self.ledger.book.lock().await.positions.clone())
    }

    async fn withdraw(&self, _vault: &VaultKeypair, request: WithdrawRequest) -> Result<WithdrawOutcome> {
        let mut book = self.ledger.book.lock().await;

        let Some(index) = book.positions.iter().position(|p| p.pool_id == request.pool_id) else {
            return Ok(WithdrawOutcome {
                success: false,
                error: Some(format!("No position in pool {}", request.pool_id)),
                ..Default::default()
            });
        };

        let position = book.positions.remove(index);
        for token in &position.underlying {
            book.credit(&token.token, token.amount);
        }

        let tx = self.ledger.next_tx("withdraw");
        debug!(pool = %request.pool_id, tx = %tx, slippage_bps = request.slippage_bps, "Paper withdraw");

        Ok(WithdrawOutcome {
            success: true,
            transaction_id: Some(tx),
            error: None,
            tokens_received: Some(position.underlying),
        })
    }

    async fn deposit(&self, _vault: &VaultKeypair, request: DepositRequest) -> Result<DepositOutcome> {
        let Some(pool) = self.ledger.pools.get(&request.pool_id) else {
            return Ok(DepositOutcome {
                success: false,
                error: Some(format!("Unknown pool {}", request.pool_id)),
                ..Default::default()
            });
        };

        let mut book = self.ledger.book.lock().await;
        for (token, amount) in [
            (&pool.token_a, request.token_a_amount),
            (&pool.token_b, request.token_b_amount),
        ] {
            if book.available(token) < amount {
                return Ok(DepositOutcome {
                    success: false,
                    error: Some(format!("Insufficient {} balance", token.symbol)),
                    ..Default::default()
                });
            }
        }

        book.debit(&pool.token_a, request.token_a_amount);
        book.debit(&pool.token_b, request.token_b_amount);
        book.positions.push(Position {
            pool_id: pool.id.clone(),
            dex: pool.dex.clone(),
            share_balance: request.token_a_amount + request.token_b_amount,
            underlying: vec![
                TokenAmount::new(pool.token_a.clone(), request.token_a_amount),
                TokenAmount::new(pool.token_b.clone(), request.token_b_amount),
            ],
            value_usd: None,
            metadata: PositionMetadata {
                created_at: Some(Utc::now()),
                ..Default::default()
            },
        });

        let tx = self.ledger.next_tx("deposit");
        debug!(pool = %pool.id, tx = %tx, "Paper deposit");

        Ok(DepositOutcome {
            success: true,
            transaction_id: Some(tx),
            error: None,
        })
    }
}

// =============================================================================
// PaperVault
// =============================================================================

pub struct PaperVault {
    ledger: Arc<PaperLedger>,
}

impl PaperVault {
    #[must_use]
    pub const fn new(ledger: Arc<PaperLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl VaultService for PaperVault {
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        if user_id != self.ledger.user_id {
            return Ok(None);
        }
        let profile = &self.ledger.profile;
        Ok(Some(UserProfile {
            user_id: user_id.to_string(),
            vault_public_key: profile.vault_public_key.clone(),
            encrypted_secret: SecretString::from(profile.encrypted_secret.clone()),
            auto_rebalance: profile.auto_rebalance.clone(),
        }))
    }

    async fn get_vault_keypair(
        &self,
        _user_id: &str,
        encrypted_secret: &SecretString,
    ) -> Result<VaultKeypair> {
        Ok(VaultKeypair {
            public_key: self.ledger.profile.vault_public_key.clone(),
            secret: encrypted_secret.clone(),
        })
    }

    async fn get_balances(&self, _vault_public_key: &str) -> Result<Vec<TokenBalance>> {
        Ok(self.ledger.book.lock().await.balances.clone())
    }

    async fn add_tracked_position(&self, _user_id: &str, position: TrackedPosition) -> Result<()> {
        let mut book = self.ledger.book.lock().await;
        book.tracked.retain(|t| t.pool_id != position.pool_id);
        book.tracked.push(position);
        Ok(())
    }

    async fn remove_tracked_position(&self, _user_id: &str, pool_id: &str) -> Result<()> {
        self.ledger.book.lock().await.tracked.retain(|t| t.pool_id != pool_id);
        Ok(())
    }
}

// =============================================================================
// SnapshotScout
// =============================================================================

/// Offers the snapshot's opportunities whose source is still eligible, and idle
/// deployments only while the vault holds idle balances.
pub struct SnapshotScout {
    ledger: Arc<PaperLedger>,
}

impl SnapshotScout {
    #[must_use]
    pub const fn new(ledger: Arc<PaperLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl YieldScout for SnapshotScout {
    async fn find_best_opportunities(
        &self,
        _user_id: &str,
        eligible_positions: &[Position],
        idle_balances: &[TokenBalance],
    ) -> Result<Vec<OptimizationOpportunity>> {
        let offered = self
            .ledger
            .opportunities
            .iter()
            .filter(|o| match &o.source_position {
                Some(source) => eligible_positions.iter().any(|p| p.pool_id == source.pool_id),
                None => !idle_balances.is_empty(),
            })
            .cloned()
            .collect();
        Ok(offered)
    }
}

// =============================================================================
// PaperLocator
// =============================================================================

pub struct PaperLocator {
    dex: Arc<PaperDex>,
    vault: Arc<PaperVault>,
    scout: Arc<SnapshotScout>,
}

impl PaperLocator {
    #[must_use]
    pub fn new(ledger: &Arc<PaperLedger>) -> Arc<Self> {
        Arc::new(Self {
            dex: Arc::new(PaperDex::new(Arc::clone(ledger))),
            vault: Arc::new(PaperVault::new(Arc::clone(ledger))),
            scout: Arc::new(SnapshotScout::new(Arc::clone(ledger))),
        })
    }
}

#[async_trait]
impl ServiceLocator for PaperLocator {
    async fn dex_gateway(&self) -> Option<Arc<dyn DexGateway>> {
        Some(self.dex.clone())
    }

    async fn vault_service(&self) -> Option<Arc<dyn VaultService>> {
        Some(self.vault.clone())
    }

    async fn yield_scout(&self) -> Option<Arc<dyn YieldScout>> {
        Some(self.scout.clone())
    }
}
