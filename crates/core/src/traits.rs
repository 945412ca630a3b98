use crate::types::{
    DepositOutcome, DepositRequest, OptimizationOpportunity, Position, TokenBalance,
    TrackedPosition, UserProfile, VaultKeypair, WithdrawOutcome, WithdrawRequest,
};
use anyhow::Result;
use async_trait::async_trait;
use secrecy::SecretString;
use std::sync::Arc;

/// Chain / DEX interaction.
#[async_trait]
pub trait DexGateway: Send + Sync {
    async fn get_all_positions(&self, user_id: &str) -> Result<Vec<Position>>;

    async fn withdraw(&self, vault: &VaultKeypair, request: WithdrawRequest)
        -> Result<WithdrawOutcome>;

    async fn deposit(&self, vault: &VaultKeypair, request: DepositRequest)
        -> Result<DepositOutcome>;
}

/// User profile and key custody.
#[async_trait]
pub trait VaultService: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>>;

    async fn get_vault_keypair(
        &self,
        user_id: &str,
        encrypted_secret: &SecretString,
    ) -> Result<VaultKeypair>;

    async fn get_balances(&self, vault_public_key: &str) -> Result<Vec<TokenBalance>>;

    async fn add_tracked_position(&self, user_id: &str, position: TrackedPosition) -> Result<()>;

    async fn remove_tracked_position(&self, user_id: &str, pool_id: &str) -> Result<()>;
}

/// Yield discovery.
#[async_trait]
pub trait YieldScout: Send + Sync {
    async fn find_best_opportunities(
        &self,
        user_id: &str,
        eligible_positions: &[Position],
        idle_balances: &[TokenBalance],
    ) -> Result<Vec<OptimizationOpportunity>>;
}

/// Resolves collaborator handles from the host process.
///
/// Any handle may be unavailable at a given moment; callers retry.
#[async_trait]
pub trait ServiceLocator: Send + Sync {
    async fn dex_gateway(&self) -> Option<Arc<dyn DexGateway>>;
    async fn vault_service(&self) -> Option<Arc<dyn VaultService>>;
    async fn yield_scout(&self) -> Option<Arc<dyn YieldScout>>;
}
