//! Position analysis: range health, eligibility, and warnings.
//!
//! Pure functions of the position, the config, and the supplied clock. Absent or
//! partial metadata never fails analysis.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use lp_rebalancer_core::{
    BlockReason, Eligibility, MonitorConfig, MonitoredPosition, Position, RangeBounds, RangeStatus,
};

/// Positions worth less than this are never moved.
pub const MIN_POSITION_VALUE_USD: Decimal = Decimal::from_parts(10, 0, 0, false, 0);

/// Positions younger than this are never moved.
pub const MIN_POSITION_AGE_MINUTES: i64 = 60;

/// Unclaimed rewards above this share of position value raise a warning.
const PENDING_REWARDS_WARN_FRACTION: f64 = 0.01;

/// Range placement of a concentrated position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeAnalysis {
    pub status: RangeStatus,
    /// Signed percent distance to the nearest boundary; negative inside the range.
    pub distance_pct: f64,
    /// Distance to the nearer edge as a fraction of range width (0.0-0.5), in range only.
    pub edge_proximity: Option<f64>,
}

/// Analyses one position against the config at the current wall-clock time.
#[must_use]
pub fn analyze_position(position: &Position, config: &MonitorConfig) -> MonitoredPosition {
    analyze_position_at(position, config, Utc::now())
}

/// Analyses one position against the config at `now`.
#[must_use]
pub fn analyze_position_at(
    position: &Position,
    config: &MonitorConfig,
    now: DateTime<Utc>,
) -> MonitoredPosition {
    let metadata = &position.metadata;
    let mut warnings = Vec::new();

    let is_concentrated = metadata
        .range
        .as_ref()
        .is_some_and(RangeBounds::declares_lower_bound);

    let range = if is_concentrated {
        metadata.range.as_ref().and_then(analyze_range)
    } else {
        None
    };

    if let Some(range) = range {
        match range.status {
            RangeStatus::BelowRange | RangeStatus::AboveRange => warnings.push(format!(
                "Price {} ({:.2}% from boundary), position earns no fees",
                range.status, range.distance_pct
            )),
            RangeStatus::InRange => {
                if let Some(proximity) = range.edge_proximity {
                    if proximity < config.concentrated_reposition_threshold {
                        warnings.push(format!(
                            "Price in range but within {:.1}% of range width from an edge",
                            proximity * 100.0
                        ));
                    }
                }
            }
        }
    }

    let current_apr = metadata.apr.filter(|apr| apr.is_finite()).unwrap_or(0.0);
    if current_apr < config.min_gain_threshold_pct {
        warnings.push(format!(
            "Low APR {current_apr:.2}% below {:.2}% threshold",
            config.min_gain_threshold_pct
        ));
    }

    let eligibility = match check_eligibility(position, now) {
        Some(reason) => Eligibility::Blocked(reason),
        None => {
            if let Some(warning) = pending_rewards_warning(position) {
                warnings.push(warning);
            }
            Eligibility::Eligible
        }
    };

    tracing::debug!(
        pool = %position.pool_id,
        dex = %position.dex,
        is_concentrated,
        ?eligibility,
        warnings = warnings.len(),
        "Analyzed position"
    );

    MonitoredPosition {
        position: position.clone(),
        is_concentrated,
        price_distance_from_range: range.map(|r| r.distance_pct),
        range_status: range.map(|r| r.status),
        current_apr,
        warnings,
        eligibility,
        volume_24h_usd: metadata.volume_24h_usd,
        fee_apr: metadata.fee_apr,
        reward_apr: metadata.reward_apr,
        analyzed_at: now,
    }
}

/// Places the current price relative to the range. `None` when any bound is unknown.
///
/// Boundaries are inclusive: a price exactly on a bound is in range with distance 0.
#[must_use]
pub fn analyze_range(range: &RangeBounds) -> Option<RangeAnalysis> {
    let lower = range.lower_price()?;
    let upper = range.upper_price()?;
    let current = range.current_price?;

    if ![lower, upper, current].iter().all(|v| v.is_finite()) {
        return None;
    }

    if current < lower {
        let distance_pct = if lower > 0.0 {
            (lower - current) / lower * 100.0
        } else {
            0.0
        };
        return Some(RangeAnalysis {
            status: RangeStatus::BelowRange,
            distance_pct,
            edge_proximity: None,
        });
    }

    if current > upper {
        let distance_pct = if upper > 0.0 {
            (current - upper) / upper * 100.0
        } else {
            0.0
        };
        return Some(RangeAnalysis {
            status: RangeStatus::AboveRange,
            distance_pct,
            edge_proximity: None,
        });
    }

    let width = upper - lower;
    let proximity = if width > 0.0 {
        (current - lower).min(upper - current) / width
    } else {
        0.0
    };

    Some(RangeAnalysis {
        status: RangeStatus::InRange,
        distance_pct: -(proximity * 100.0),
        edge_proximity: Some(proximity),
    })
}

/// Eligibility gate; first matching rule wins.
fn check_eligibility(position: &Position, now: DateTime<Utc>) -> Option<BlockReason> {
    let metadata = &position.metadata;

    // 1. Lock / vesting
    if metadata.locked || metadata.vesting_end.is_some() {
        return Some(BlockReason::Locked);
    }

    // 2. Dust
    if let Some(value_usd) = position.value_usd {
        if value_usd < MIN_POSITION_VALUE_USD {
            return Some(BlockReason::BelowMinimumValue {
                value_usd,
                minimum_usd: MIN_POSITION_VALUE_USD,
            });
        }
    }

    // 3. Age
    if let Some(created_at) = metadata.created_at {
        let age = now - created_at;
        if age < Duration::minutes(MIN_POSITION_AGE_MINUTES) {
            return Some(BlockReason::TooNew {
                age_minutes: age.num_minutes().max(0),
            });
        }
    }

    // 4. User opt-out
    if metadata.auto_rebalance == Some(false) {
        return Some(BlockReason::UserDisabled);
    }

    None
}

fn pending_rewards_warning(position: &Position) -> Option<String> {
    let rewards = position.metadata.pending_rewards_usd?;
    let value = position.value_usd?;
    if value <= Decimal::ZERO {
        return None;
    }

    let share = (rewards / value).to_f64().unwrap_or(0.0);
    (share > PENDING_REWARDS_WARN_FRACTION).then(|| {
        format!(
            "Unclaimed rewards ${:.2} ({:.1}% of position), claim before rebalancing",
            rewards,
            share * 100.0
        )
    })
}
