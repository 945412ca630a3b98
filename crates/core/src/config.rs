use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Thresholds and limits for one monitoring session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between monitoring cycles.
    pub interval_secs: u64,
    /// Minimum net gain (percent) required to approve a migration.
    pub min_gain_threshold_pct: f64,
    pub max_slippage_bps: u32,
    pub auto_rebalance_enabled: bool,
    /// Fraction of range width (0.0-1.0) under which an edge warning is raised.
    pub concentrated_reposition_threshold: f64,
    pub max_position_size_usd: Decimal,
    pub min_pool_tvl_usd: Decimal,
    pub max_il_risk_pct: f64,
    /// Collaborator acquisition attempts during start.
    pub startup_retry_attempts: u32,
    pub startup_retry_delay_secs: u64,
    /// Recent rebalance results kept in memory.
    pub history_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            min_gain_threshold_pct: 1.0,
            max_slippage_bps: 100,
            auto_rebalance_enabled: false,
            concentrated_reposition_threshold: 0.1,
            max_position_size_usd: Decimal::from(100_000),
            min_pool_tvl_usd: Decimal::from(100_000),
            max_il_risk_pct: 10.0,
            startup_retry_attempts: 5,
            startup_retry_delay_secs: 2,
            history_capacity: 20,
        }
    }
}

impl MonitorConfig {
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[must_use]
    pub const fn startup_retry_delay(&self) -> Duration {
        Duration::from_secs(self.startup_retry_delay_secs)
    }

    /// Applies a partial update. Returns `true` if the interval changed.
    pub fn apply(&mut self, patch: &ConfigPatch) -> bool {
        let old_interval = self.interval_secs;

        if let Some(v) = patch.interval_secs.filter(|v| *v > 0) {
            self.interval_secs = v;
        }
        if let Some(v) = patch.min_gain_threshold_pct {
            self.min_gain_threshold_pct = v;
        }
        if let Some(v) = patch.max_slippage_bps {
            self.max_slippage_bps = v;
        }
        if let Some(v) = patch.auto_rebalance_enabled {
            self.auto_rebalance_enabled = v;
        }
        if let Some(v) = patch.concentrated_reposition_threshold {
            self.concentrated_reposition_threshold = v;
        }
        if let Some(v) = patch.max_position_size_usd {
            self.max_position_size_usd = v;
        }
        if let Some(v) = patch.min_pool_tvl_usd {
            self.min_pool_tvl_usd = v;
        }
        if let Some(v) = patch.max_il_risk_pct {
            self.max_il_risk_pct = v;
        }

        old_interval != self.interval_secs
    }
}

/// Partial configuration update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigPatch {
    pub interval_secs: Option<u64>,
    pub min_gain_threshold_pct: Option<f64>,
    pub max_slippage_bps: Option<u32>,
    pub auto_rebalance_enabled: Option<bool>,
    pub concentrated_reposition_threshold: Option<f64>,
    pub max_position_size_usd: Option<Decimal>,
    pub min_pool_tvl_usd: Option<Decimal>,
    pub max_il_risk_pct: Option<f64>,
}

impl From<&MonitorConfig> for ConfigPatch {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            interval_secs: Some(config.interval_secs),
            min_gain_threshold_pct: Some(config.min_gain_threshold_pct),
            max_slippage_bps: Some(config.max_slippage_bps),
            auto_rebalance_enabled: Some(config.auto_rebalance_enabled),
            concentrated_reposition_threshold: Some(config.concentrated_reposition_threshold),
            max_position_size_usd: Some(config.max_position_size_usd),
            min_pool_tvl_usd: Some(config.min_pool_tvl_usd),
            max_il_risk_pct: Some(config.max_il_risk_pct),
        }
    }
}
