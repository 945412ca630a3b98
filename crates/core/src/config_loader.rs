use crate::config::MonitorConfig;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::de::DeserializeOwned;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config/Rebalancer.toml";
pub const ENV_PREFIX: &str = "LP_REBALANCER_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the monitor configuration from `config/Rebalancer.toml` and `LP_REBALANCER_*`.
    #[must_use]
    pub fn load() -> MonitorConfig {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Loads the monitor configuration by merging a TOML file with environment variables.
    ///
    /// Never fails: each setting that is missing or malformed falls back to its default.
    #[must_use]
    pub fn load_from(path: impl AsRef<Path>) -> MonitorConfig {
        let figment = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX));
        Self::from_figment(&figment)
    }

    #[must_use]
    pub fn from_figment(figment: &Figment) -> MonitorConfig {
        let defaults = MonitorConfig::default();

        MonitorConfig {
            interval_secs: setting(figment, "interval_secs", defaults.interval_secs, |v| *v > 0),
            min_gain_threshold_pct: setting(
                figment,
                "min_gain_threshold_pct",
                defaults.min_gain_threshold_pct,
                |v| v.is_finite() && *v >= 0.0,
            ),
            max_slippage_bps: setting(
                figment,
                "max_slippage_bps",
                defaults.max_slippage_bps,
                |v| *v <= 10_000,
            ),
            auto_rebalance_enabled: setting(
                figment,
                "auto_rebalance_enabled",
                defaults.auto_rebalance_enabled,
                |_| true,
            ),
            concentrated_reposition_threshold: setting(
                figment,
                "concentrated_reposition_threshold",
                defaults.concentrated_reposition_threshold,
                |v| (0.0..=1.0).contains(v),
            ),
            max_position_size_usd: setting(
                figment,
                "max_position_size_usd",
                defaults.max_position_size_usd,
                |v| v.is_sign_positive(),
            ),
            min_pool_tvl_usd: setting(
                figment,
                "min_pool_tvl_usd",
                defaults.min_pool_tvl_usd,
                |v| v.is_sign_positive(),
            ),
            max_il_risk_pct: setting(
                figment,
                "max_il_risk_pct",
                defaults.max_il_risk_pct,
                |v| v.is_finite() && *v >= 0.0,
            ),
            startup_retry_attempts: setting(
                figment,
                "startup_retry_attempts",
                defaults.startup_retry_attempts,
                |v| *v > 0,
            ),
            startup_retry_delay_secs: setting(
                figment,
                "startup_retry_delay_secs",
                defaults.startup_retry_delay_secs,
                |_| true,
            ),
            history_capacity: setting(
                figment,
                "history_capacity",
                defaults.history_capacity,
                |v| *v > 0,
            ),
        }
    }
}

fn setting<T>(figment: &Figment, key: &str, default: T, valid: impl Fn(&T) -> bool) -> T
where
    T: DeserializeOwned + std::fmt::Debug,
{
    match figment.extract_inner::<T>(key) {
        Ok(value) if valid(&value) => value,
        Ok(value) => {
            tracing::warn!(key, ?value, ?default, "Out-of-range setting, using default");
            default
        }
        Err(e) if e.missing() => default,
        Err(e) => {
            tracing::warn!(key, error = %e, ?default, "Malformed setting, using default");
            default
        }
    }
}
