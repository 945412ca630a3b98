//! Rebalance execution: withdraw from the source pool, redeposit into the target.
//!
//! The two legs are not atomic and there is no automatic compensation. Every landed
//! leg adds one entry to `transaction_ids`, so a failed result with a source pool and a
//! recorded leg means funds were withdrawn but not redeposited.
//! `RebalanceResult::is_incident` reports that state and it is logged at error level.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use lp_rebalancer_core::{
    DepositRequest, DexGateway, OpportunityAnalysis, Position, RebalanceResult, TokenAmount,
    TokenInfo, TrackedPosition, UserProfile, VaultKeypair, VaultService, WithdrawRequest,
};

/// Carries out approved (or manually forced) migrations for a user.
pub struct RebalanceExecutor {
    dex: Arc<dyn DexGateway>,
    vault: Arc<dyn VaultService>,
    default_slippage_bps: u32,
}

/// Accumulates the legs of one migration attempt.
struct Attempt<'a> {
    analysis: &'a OpportunityAnalysis,
    transaction_ids: Vec<String>,
}

impl<'a> Attempt<'a> {
    const fn new(analysis: &'a OpportunityAnalysis) -> Self {
        Self {
            analysis,
            transaction_ids: Vec::new(),
        }
    }

    fn finish(self, error: Option<String>) -> RebalanceResult {
        let opp = &self.analysis.opportunity;
        RebalanceResult {
            success: error.is_none(),
            from_pool: opp.source_position.as_ref().map(|p| p.pool_id.clone()),
            to_pool: opp.target_pool.id.clone(),
            previous_apr: opp.current_apr,
            new_apr: opp.estimated_new_apr,
            transaction_ids: self.transaction_ids,
            error,
            executed_at: Utc::now(),
        }
    }

    /// Records a landed leg. A leg confirmed without an id still counts.
    fn record_leg(&mut self, transaction_id: Option<String>, pool_id: &str, leg: &str) {
        let id = transaction_id.unwrap_or_else(|| {
            warn!(pool = pool_id, leg, "Leg succeeded without a transaction id");
            format!("{pool_id}-{leg}-unconfirmed")
        });
        self.transaction_ids.push(id);
    }

    fn fail(self, message: impl Into<String>) -> RebalanceResult {
        self.finish(Some(message.into()))
    }
}

impl RebalanceExecutor {
    #[must_use]
    pub fn new(
        dex: Arc<dyn DexGateway>,
        vault: Arc<dyn VaultService>,
        default_slippage_bps: u32,
    ) -> Self {
        Self {
            dex,
            vault,
            default_slippage_bps,
        }
    }

    /// Executes one migration. Never returns an error: every failure is captured in
    /// the result, and `transaction_ids` reflects exactly the legs that landed.
    pub async fn execute(&self, user_id: &str, analysis: &OpportunityAnalysis) -> RebalanceResult {
        let attempt = Attempt::new(analysis);
        let opp = &analysis.opportunity;

        info!(
            user_id,
            from_pool = opp.source_position.as_ref().map(|p| p.pool_id.as_str()),
            to_pool = %opp.target_pool.id,
            net_gain_pct = opp.net_gain_pct,
            forced = !analysis.should_execute,
            "Starting rebalance"
        );

        // (a) Credentials
        let profile = match self.vault.get_profile(user_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => return attempt.fail(format!("No profile found for user {user_id}")),
            Err(e) => return attempt.fail(format!("Failed to load profile: {e}")),
        };
        let keypair = match self
            .vault
            .get_vault_keypair(user_id, &profile.encrypted_secret)
            .await
        {
            Ok(keypair) => keypair,
            Err(e) => return attempt.fail(format!("Failed to load vault keypair: {e}")),
        };
        let slippage_bps = profile
            .auto_rebalance
            .max_slippage_bps
            .unwrap_or(self.default_slippage_bps);

        // (b) Withdraw, or gather idle balances when there is no source
        let (attempt, available) = match &opp.source_position {
            Some(source) => {
                match self
                    .withdraw_leg(user_id, &keypair, source, slippage_bps, attempt)
                    .await
                {
                    Ok(pair) => pair,
                    Err(result) => return result,
                }
            }
            None => match self.idle_balances(&profile).await {
                Ok(balances) => (
                    attempt,
                    target_pair_only(balances, &opp.target_pool.token_a, &opp.target_pool.token_b),
                ),
                Err(message) => return attempt.fail(message),
            },
        };

        // (c) Token identity check
        let target = &opp.target_pool;
        let Some((amount_a, amount_b)) =
            match_target_tokens(&available, &target.token_a, &target.token_b)
        else {
            let message = mismatch_message(
                opp.source_position.as_ref(),
                &available,
                &target.token_a,
                &target.token_b,
                &target.id,
            );
            if opp.source_position.is_some() {
                error!(
                    user_id,
                    to_pool = %target.id,
                    transaction_ids = ?attempt.transaction_ids,
                    "{message}"
                );
            } else {
                warn!(user_id, to_pool = %target.id, "{message}");
            }
            return attempt.fail(message);
        };

        // (d) Deposit
        let request = DepositRequest {
            pool_id: target.id.clone(),
            token_a_amount: amount_a,
            token_b_amount: amount_b,
            dex: target.dex.clone(),
            slippage_bps,
        };
        let mut attempt = attempt;
        match self.dex.deposit(&keypair, request).await {
            Ok(outcome) if outcome.success => {
                attempt.record_leg(outcome.transaction_id, &target.id, "deposit");
            }
            Ok(outcome) => {
                let message = deposit_failure_message(
                    opp.source_position.as_ref(),
                    outcome.error.as_deref().unwrap_or("unknown error"),
                );
                log_deposit_failure(user_id, &target.id, &attempt.transaction_ids, &message);
                return attempt.fail(message);
            }
            Err(e) => {
                let message = deposit_failure_message(opp.source_position.as_ref(), &e.to_string());
                log_deposit_failure(user_id, &target.id, &attempt.transaction_ids, &message);
                return attempt.fail(message);
            }
        }

        // (e) Track the new position
        let tracked = TrackedPosition {
            pool_id: target.id.clone(),
            dex: target.dex.clone(),
            token_a: target.token_a.clone(),
            token_b: target.token_b.clone(),
            migrated_from: opp.source_position.as_ref().map(|p| p.pool_id.clone()),
            opened_at: Utc::now(),
        };
        if let Err(e) = self.vault.add_tracked_position(user_id, tracked).await {
            warn!(user_id, pool = %target.id, error = %e, "Failed to track new position");
        }

        info!(
            user_id,
            to_pool = %target.id,
            transaction_ids = ?attempt.transaction_ids,
            "Rebalance completed"
        );
        attempt.finish(None)
    }

    /// Withdraws the full share balance. On failure the finished result is returned
    /// as the error with no transaction recorded.
    async fn withdraw_leg<'a>(
        &self,
        user_id: &str,
        keypair: &VaultKeypair,
        source: &Position,
        slippage_bps: u32,
        mut attempt: Attempt<'a>,
    ) -> Result<(Attempt<'a>, Vec<TokenAmount>), RebalanceResult> {
        let request = WithdrawRequest {
            pool_id: source.pool_id.clone(),
            share_amount: source.share_balance,
            dex: source.dex.clone(),
            slippage_bps,
        };

        let outcome = match self.dex.withdraw(keypair, request).await {
            Ok(outcome) if outcome.success => outcome,
            Ok(outcome) => {
                let message = format!(
                    "Withdrawal from {} failed: {}",
                    source.pool_id,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
                warn!(user_id, pool = %source.pool_id, "{message}");
                return Err(attempt.fail(message));
            }
            Err(e) => {
                let message = format!("Withdrawal from {} failed: {e}", source.pool_id);
                warn!(user_id, pool = %source.pool_id, "{message}");
                return Err(attempt.fail(message));
            }
        };

        attempt.record_leg(outcome.transaction_id, &source.pool_id, "withdraw");
        info!(
            user_id,
            pool = %source.pool_id,
            transaction_ids = ?attempt.transaction_ids,
            "Withdrawal completed"
        );

        if let Err(e) = self.vault.remove_tracked_position(user_id, &source.pool_id).await {
            warn!(user_id, pool = %source.pool_id, error = %e, "Failed to untrack withdrawn position");
        }

        let received = outcome
            .tokens_received
            .filter(|tokens| !tokens.is_empty())
            .unwrap_or_else(|| source.underlying.clone());

        Ok((attempt, received))
    }

    async fn idle_balances(&self, profile: &UserProfile) -> Result<Vec<TokenAmount>, String> {
        self.vault
            .get_balances(&profile.vault_public_key)
            .await
            .map_err(|e| format!("Failed to read idle balances: {e}"))
    }
}

/// Maps held tokens onto the target pool's (token A, token B) amounts.
///
/// Every held token with a non-zero amount must be one of the target's tokens, and
/// at least one amount must be non-zero.
#[must_use]
pub fn match_target_tokens(
    held: &[TokenAmount],
    token_a: &TokenInfo,
    token_b: &TokenInfo,
) -> Option<(Decimal, Decimal)> {
    let mut amount_a = Decimal::ZERO;
    let mut amount_b = Decimal::ZERO;

    for holding in held.iter().filter(|h| h.amount > Decimal::ZERO) {
        if holding.token.mint == token_a.mint {
            amount_a += holding.amount;
        } else if holding.token.mint == token_b.mint {
            amount_b += holding.amount;
        } else {
            return None;
        }
    }

    (amount_a > Decimal::ZERO || amount_b > Decimal::ZERO).then_some((amount_a, amount_b))
}

/// Keeps only idle balances of the target pool's two mints; other holdings are left
/// in the vault untouched.
#[must_use]
pub fn target_pair_only(
    balances: Vec<TokenAmount>,
    token_a: &TokenInfo,
    token_b: &TokenInfo,
) -> Vec<TokenAmount> {
    balances
        .into_iter()
        .filter(|b| b.token.mint == token_a.mint || b.token.mint == token_b.mint)
        .collect()
}

fn describe_tokens(tokens: &[TokenAmount]) -> String {
    let held: Vec<String> = tokens
        .iter()
        .filter(|t| t.amount > Decimal::ZERO)
        .map(|t| format!("{} {} ({})", t.amount, t.token.symbol, t.token.mint))
        .collect();
    if held.is_empty() {
        "nothing".to_string()
    } else {
        held.join(", ")
    }
}

fn mismatch_message(
    source: Option<&Position>,
    held: &[TokenAmount],
    token_a: &TokenInfo,
    token_b: &TokenInfo,
    target_pool: &str,
) -> String {
    let needed = format!(
        "{} ({}) / {} ({})",
        token_a.symbol, token_a.mint, token_b.symbol, token_b.mint
    );
    match source {
        Some(source) => format!(
            "Token mismatch after withdrawal from {}: holding {} but target pool {} needs {}. \
             Funds were withdrawn and NOT redeposited; a manual swap and deposit is required",
            source.pool_id,
            describe_tokens(held),
            target_pool,
            needed
        ),
        None => format!(
            "Idle balances do not cover target pool {target_pool}: holding {} but need {needed}",
            describe_tokens(held)
        ),
    }
}

fn deposit_failure_message(source: Option<&Position>, cause: &str) -> String {
    match source {
        Some(source) => format!(
            "Deposit failed after withdrawal from {}: {cause}. Funds remain in the vault",
            source.pool_id
        ),
        None => format!("Deposit failed: {cause}"),
    }
}

fn log_deposit_failure(user_id: &str, pool: &str, transaction_ids: &[String], message: &str) {
    if transaction_ids.is_empty() {
        warn!(user_id, pool, "{message}");
    } else {
        error!(user_id, pool, ?transaction_ids, "{message}");
    }
}
