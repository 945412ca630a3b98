//! Data model shared between the engine, its collaborators, and the host.
//!
//! `Position` and `OptimizationOpportunity` are produced by collaborators and are
//! read-only to the engine. Everything else is derived by the engine each cycle.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Token identity plus display hints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Mint / contract address; the identity used for matching.
    pub mint: String,
    pub symbol: String,
    #[serde(default)]
    pub decimals: u8,
}

impl TokenInfo {
    #[must_use]
    pub fn new(mint: impl Into<String>, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            mint: mint.into(),
            symbol: symbol.into(),
            decimals,
        }
    }
}

/// An amount of a specific token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmount {
    pub token: TokenInfo,
    pub amount: Decimal,
}

impl TokenAmount {
    #[must_use]
    pub const fn new(token: TokenInfo, amount: Decimal) -> Self {
        Self { token, amount }
    }
}

/// Idle wallet balance reported by the vault.
pub type TokenBalance = TokenAmount;

/// Concentrated-liquidity range declaration.
///
/// Either tick bounds or explicit price bounds may be present; explicit prices win.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeBounds {
    #[serde(default)]
    pub tick_lower: Option<i32>,
    #[serde(default)]
    pub tick_upper: Option<i32>,
    #[serde(default)]
    pub price_lower: Option<f64>,
    #[serde(default)]
    pub price_upper: Option<f64>,
    #[serde(default)]
    pub current_price: Option<f64>,
}

impl RangeBounds {
    /// A range is concentrated once it declares any lower bound.
    #[must_use]
    pub const fn declares_lower_bound(&self) -> bool {
        self.tick_lower.is_some() || self.price_lower.is_some()
    }

    /// Lower price bound, falling back to the tick-derived price.
    #[must_use]
    pub fn lower_price(&self) -> Option<f64> {
        self.price_lower.or_else(|| self.tick_lower.map(tick_to_price))
    }

    /// Upper price bound, falling back to the tick-derived price.
    #[must_use]
    pub fn upper_price(&self) -> Option<f64> {
        self.price_upper.or_else(|| self.tick_upper.map(tick_to_price))
    }
}

/// Price at a given tick (`1.0001^tick`).
#[must_use]
pub fn tick_to_price(tick: i32) -> f64 {
    1.0001_f64.powi(tick)
}

/// Optional per-position facts supplied by the chain collaborator.
///
/// Every field is independently optional; absence never blocks analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionMetadata {
    #[serde(default)]
    pub range: Option<RangeBounds>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub vesting_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// User preference; `Some(false)` opts the position out of rebalancing.
    #[serde(default)]
    pub auto_rebalance: Option<bool>,
    #[serde(default)]
    pub pending_rewards_usd: Option<Decimal>,
    #[serde(default)]
    pub apr: Option<f64>,
    #[serde(default)]
    pub apy: Option<f64>,
    #[serde(default)]
    pub fee_apr: Option<f64>,
    #[serde(default)]
    pub reward_apr: Option<f64>,
    #[serde(default)]
    pub volume_24h_usd: Option<Decimal>,
}

/// A liquidity position as reported by the chain collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub pool_id: String,
    pub dex: String,
    /// Pool-share (LP token) balance owned by the wallet.
    pub share_balance: Decimal,
    /// Underlying tokens the share balance represents.
    pub underlying: Vec<TokenAmount>,
    #[serde(default)]
    pub value_usd: Option<Decimal>,
    #[serde(default)]
    pub metadata: PositionMetadata,
}

/// Where the current price sits relative to a concentrated range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeStatus {
    InRange,
    BelowRange,
    AboveRange,
}

impl RangeStatus {
    #[must_use]
    pub const fn is_in_range(self) -> bool {
        matches!(self, Self::InRange)
    }
}

impl std::fmt::Display for RangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InRange => write!(f, "in range"),
            Self::BelowRange => write!(f, "below range"),
            Self::AboveRange => write!(f, "above range"),
        }
    }
}

/// Why a position cannot be rebalanced. Listed in gate precedence order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockReason {
    Locked,
    BelowMinimumValue { value_usd: Decimal, minimum_usd: Decimal },
    TooNew { age_minutes: i64 },
    UserDisabled,
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Locked => write!(f, "Position locked"),
            Self::BelowMinimumValue {
                value_usd,
                minimum_usd,
            } => write!(
                f,
                "Position value ${:.2} below minimum ${minimum_usd}",
                value_usd
            ),
            Self::TooNew { age_minutes } => {
                write!(f, "Position too new ({age_minutes} minutes old)")
            }
            Self::UserDisabled => write!(f, "User disabled rebalancing"),
        }
    }
}

/// Rebalance eligibility. A blocked position always carries its reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Eligibility {
    Eligible,
    Blocked(BlockReason),
}

/// Engine-derived annotation of a `Position`, recomputed every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredPosition {
    pub position: Position,
    pub is_concentrated: bool,
    /// Signed percent distance to the nearest boundary; negative means inside.
    pub price_distance_from_range: Option<f64>,
    pub range_status: Option<RangeStatus>,
    pub current_apr: f64,
    pub warnings: Vec<String>,
    pub eligibility: Eligibility,
    pub volume_24h_usd: Option<Decimal>,
    pub fee_apr: Option<f64>,
    pub reward_apr: Option<f64>,
    pub analyzed_at: DateTime<Utc>,
}

impl MonitoredPosition {
    #[must_use]
    pub const fn is_rebalancable(&self) -> bool {
        matches!(self.eligibility, Eligibility::Eligible)
    }

    #[must_use]
    pub const fn blocked_reason(&self) -> Option<&BlockReason> {
        match &self.eligibility {
            Eligibility::Eligible => None,
            Eligibility::Blocked(reason) => Some(reason),
        }
    }

    /// Key under which the engine stores this position.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.position.pool_id
    }
}

/// Candidate destination pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolDescriptor {
    pub id: String,
    pub dex: String,
    pub token_a: TokenInfo,
    pub token_b: TokenInfo,
    pub tvl_usd: Decimal,
    #[serde(default)]
    pub volume_24h_usd: Option<Decimal>,
}

impl PoolDescriptor {
    /// 24h volume divided by TVL; zero when either is unknown or TVL is zero.
    #[must_use]
    pub fn volume_tvl_ratio(&self) -> f64 {
        if self.tvl_usd <= Decimal::ZERO {
            return 0.0;
        }
        self.volume_24h_usd
            .and_then(|volume| (volume / self.tvl_usd).to_f64())
            .unwrap_or(0.0)
    }
}

/// A migration candidate supplied by the yield-discovery collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationOpportunity {
    #[serde(default)]
    pub source_position: Option<Position>,
    pub target_pool: PoolDescriptor,
    pub estimated_new_apr: f64,
    pub current_apr: f64,
    pub estimated_cost_usd: Decimal,
    pub net_gain_pct: f64,
}

/// How believable a pool's advertised APR is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AprQuality {
    Sustainable,
    Moderate,
    Unsustainable,
}

impl std::fmt::Display for AprQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sustainable => write!(f, "sustainable"),
            Self::Moderate => write!(f, "moderate"),
            Self::Unsustainable => write!(f, "unsustainable"),
        }
    }
}

/// Why an opportunity was not approved. Listed in gate precedence order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectionReason {
    SourceIneligible(BlockReason),
    PositionTooLarge { value_usd: Decimal, max_usd: Decimal },
    ImpermanentLossRisk { estimated_pct: f64, max_pct: f64 },
    BelowGainThreshold { net_gain_pct: f64, threshold_pct: f64 },
    RiskTooHigh { risk_score: f64 },
    DexNotPreferred { dex: String },
    UnsustainableApr { apr: f64 },
    UnknownPositionValue,
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceIneligible(reason) => write!(f, "{reason}"),
            Self::PositionTooLarge { value_usd, max_usd } => write!(
                f,
                "Position value ${:.2} exceeds max position size ${max_usd}",
                value_usd
            ),
            Self::ImpermanentLossRisk {
                estimated_pct,
                max_pct,
            } => write!(
                f,
                "Estimated IL risk {estimated_pct:.1}% exceeds max {max_pct:.1}%"
            ),
            Self::BelowGainThreshold {
                net_gain_pct,
                threshold_pct,
            } => write!(
                f,
                "Net gain {net_gain_pct:.2}% < threshold {threshold_pct:.2}%"
            ),
            Self::RiskTooHigh { risk_score } => {
                write!(f, "Risk score {risk_score:.0} exceeds limit of 50")
            }
            Self::DexNotPreferred { dex } => {
                write!(f, "Target DEX {dex} not in preferred DEX list")
            }
            Self::UnsustainableApr { apr } => {
                write!(f, "APR {apr:.1}% is unsustainable")
            }
            Self::UnknownPositionValue => {
                write!(f, "Position value unknown, cannot score migration")
            }
        }
    }
}

/// Evaluated and decided opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityAnalysis {
    pub opportunity: OptimizationOpportunity,
    pub should_execute: bool,
    pub reason: String,
    pub estimated_net_gain_pct: f64,
    /// 0-100, lower is safer.
    pub risk_score: f64,
    /// 0-100, higher is better.
    pub opportunity_score: f64,
    pub is_high_apr: bool,
    pub apr_quality: AprQuality,
    pub estimated_il_risk_pct: f64,
}

/// Outcome of one migration attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceResult {
    pub success: bool,
    pub from_pool: Option<String>,
    pub to_pool: String,
    pub previous_apr: f64,
    pub new_apr: f64,
    /// Ids of the legs that actually landed, in execution order.
    pub transaction_ids: Vec<String>,
    pub error: Option<String>,
    pub executed_at: DateTime<Utc>,
}

/// What a `RebalanceResult` means for the user's funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationOutcome {
    NothingExecuted,
    /// Withdrawn from the source pool but never redeposited. Needs a human.
    WithdrawnNotRedeposited,
    Migrated,
    /// Idle capital deposited without a source withdrawal.
    Deposited,
}

impl RebalanceResult {
    #[must_use]
    pub fn outcome(&self) -> MigrationOutcome {
        match (self.from_pool.is_some(), self.transaction_ids.is_empty(), self.success) {
            (_, true, _) => MigrationOutcome::NothingExecuted,
            (true, false, false) => MigrationOutcome::WithdrawnNotRedeposited,
            (true, false, true) => MigrationOutcome::Migrated,
            (false, false, _) => MigrationOutcome::Deposited,
        }
    }

    #[must_use]
    pub fn is_incident(&self) -> bool {
        self.outcome() == MigrationOutcome::WithdrawnNotRedeposited
    }
}

/// Per-user automation settings stored with the profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoRebalanceSettings {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub min_gain_threshold_pct: Option<f64>,
    #[serde(default)]
    pub max_slippage_bps: Option<u32>,
    #[serde(default)]
    pub preferred_dexes: Vec<String>,
}

/// User profile held by the vault collaborator.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub user_id: String,
    pub vault_public_key: String,
    pub encrypted_secret: SecretString,
    pub auto_rebalance: AutoRebalanceSettings,
}

/// Signing material for a user's vault.
#[derive(Debug, Clone)]
pub struct VaultKeypair {
    pub public_key: String,
    pub secret: SecretString,
}

/// Position registration handed to the vault after a deposit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedPosition {
    pub pool_id: String,
    pub dex: String,
    pub token_a: TokenInfo,
    pub token_b: TokenInfo,
    pub migrated_from: Option<String>,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct WithdrawRequest {
    pub pool_id: String,
    pub share_amount: Decimal,
    pub dex: String,
    pub slippage_bps: u32,
}

#[derive(Debug, Clone, Default)]
pub struct WithdrawOutcome {
    pub success: bool,
    pub transaction_id: Option<String>,
    pub error: Option<String>,
    pub tokens_received: Option<Vec<TokenAmount>>,
}

#[derive(Debug, Clone)]
pub struct DepositRequest {
    pub pool_id: String,
    pub token_a_amount: Decimal,
    pub token_b_amount: Decimal,
    pub dex: String,
    pub slippage_bps: u32,
}

#[derive(Debug, Clone, Default)]
pub struct DepositOutcome {
    pub success: bool,
    pub transaction_id: Option<String>,
    pub error: Option<String>,
}
