use std::sync::Arc;
use std::time::Duration;

use lp_rebalancer_core::{DexGateway, ServiceLocator, VaultService, YieldScout};

/// Collaborator handles held by a monitoring session. Any may be missing.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub dex: Option<Arc<dyn DexGateway>>,
    pub vault: Option<Arc<dyn VaultService>>,
    pub scout: Option<Arc<dyn YieldScout>>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("dex", &self.dex.is_some())
            .field("vault", &self.vault.is_some())
            .field("scout", &self.scout.is_some())
            .finish()
    }
}

impl Collaborators {
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.dex.is_some() && self.vault.is_some() && self.scout.is_some()
    }

    /// Names of the handles still missing.
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.dex.is_none() {
            missing.push("dex");
        }
        if self.vault.is_none() {
            missing.push("vault");
        }
        if self.scout.is_none() {
            missing.push("yield");
        }
        missing
    }

    /// Asks the locator for every handle not yet held.
    pub async fn refresh(&mut self, locator: &dyn ServiceLocator) {
        if self.dex.is_none() {
            self.dex = locator.dex_gateway().await;
        }
        if self.vault.is_none() {
            self.vault = locator.vault_service().await;
        }
        if self.scout.is_none() {
            self.scout = locator.yield_scout().await;
        }
    }

    /// Refreshes up to `attempts` times, sleeping `delay` between attempts, until
    /// every handle is held. Returns whatever was acquired.
    pub async fn acquire(&mut self, locator: &dyn ServiceLocator, attempts: u32, delay: Duration) {
        for attempt in 1..=attempts.max(1) {
            self.refresh(locator).await;
            if self.is_complete() {
                tracing::info!(attempt, "Collaborators acquired");
                return;
            }

            tracing::debug!(attempt, missing = ?self.missing(), "Collaborators not ready");
            if attempt < attempts {
                tokio::time::sleep(delay).await;
            }
        }

        tracing::warn!(
            attempts,
            missing = ?self.missing(),
            "Collaborators still unavailable after retries, continuing without them"
        );
    }
}
