//! Opportunity scoring and the migration decision gate.

use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use lp_rebalancer_core::{
    AprQuality, AutoRebalanceSettings, MonitorConfig, MonitoredPosition, OpportunityAnalysis,
    OptimizationOpportunity, PoolDescriptor, RejectionReason,
};

use crate::analyzer::analyze_position;

/// Opportunities scoring above this risk are never approved.
pub const MAX_RISK_SCORE: f64 = 50.0;

/// New APR at or above this is flagged as a high-APR opportunity.
pub const HIGH_APR_THRESHOLD_PCT: f64 = 20.0;

/// Cost share assumed when the source position value is unknown.
const UNKNOWN_COST_PCT: f64 = 100.0;

/// Scores, gates, and ranks opportunities for one user.
pub struct OpportunityEvaluator<'a> {
    config: &'a MonitorConfig,
    settings: &'a AutoRebalanceSettings,
}

impl<'a> OpportunityEvaluator<'a> {
    #[must_use]
    pub const fn new(config: &'a MonitorConfig, settings: &'a AutoRebalanceSettings) -> Self {
        Self { config, settings }
    }

    /// Minimum net gain, honouring the user's override.
    #[must_use]
    pub fn gain_threshold_pct(&self) -> f64 {
        self.settings
            .min_gain_threshold_pct
            .unwrap_or(self.config.min_gain_threshold_pct)
    }

    /// Evaluates every opportunity and returns them ranked: approved first, then
    /// rejected, each group by descending opportunity score.
    #[must_use]
    pub fn evaluate_all(
        &self,
        opportunities: &[OptimizationOpportunity],
        positions: &HashMap<String, MonitoredPosition>,
    ) -> Vec<OpportunityAnalysis> {
        let mut analyses: Vec<OpportunityAnalysis> = opportunities
            .iter()
            .map(|opp| self.evaluate(opp, positions))
            .collect();

        analyses.sort_by(|a, b| {
            b.should_execute.cmp(&a.should_execute).then_with(|| {
                b.opportunity_score
                    .partial_cmp(&a.opportunity_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
        });

        let approved = analyses.iter().filter(|a| a.should_execute).count();
        tracing::info!(
            total = analyses.len(),
            approved,
            rejected = analyses.len() - approved,
            "Evaluated opportunities"
        );

        analyses
    }

    /// Evaluates one opportunity.
    #[must_use]
    pub fn evaluate(
        &self,
        opp: &OptimizationOpportunity,
        positions: &HashMap<String, MonitoredPosition>,
    ) -> OpportunityAnalysis {
        let apr = opp.estimated_new_apr;
        let position_value = opp.source_position.as_ref().and_then(|p| p.value_usd);
        let cost_pct = cost_pct_of_value(opp.estimated_cost_usd, position_value);
        let turnover = opp.target_pool.volume_tvl_ratio();

        let apr_quality = classify_apr(apr, turnover);
        let opportunity_score = opportunity_score(opp, cost_pct.unwrap_or(UNKNOWN_COST_PCT));
        let risk_score = risk_score(apr, cost_pct, &opp.target_pool, self.config);
        let estimated_il_risk_pct = estimate_il_risk_pct(apr);
        let is_high_apr = apr >= HIGH_APR_THRESHOLD_PCT
            && apr_quality != AprQuality::Unsustainable
            && opp.target_pool.tvl_usd >= self.config.min_pool_tvl_usd;

        let decision = self.decide(
            opp,
            positions,
            position_value,
            estimated_il_risk_pct,
            risk_score,
            apr_quality,
        );

        let (should_execute, reason) = match decision {
            Ok(()) => {
                let mut reason = format!(
                    "Net gain {:.2}% meets {:.2}% threshold",
                    opp.net_gain_pct,
                    self.gain_threshold_pct()
                );
                if is_high_apr {
                    reason.push_str(" [HIGH APR]");
                }
                (true, reason)
            }
            Err(rejection) => (false, rejection.to_string()),
        };

        tracing::debug!(
            target_pool = %opp.target_pool.id,
            dex = %opp.target_pool.dex,
            should_execute,
            opportunity_score,
            risk_score,
            %apr_quality,
            reason = %reason,
            "Evaluated opportunity"
        );

        OpportunityAnalysis {
            opportunity: opp.clone(),
            should_execute,
            reason,
            estimated_net_gain_pct: opp.net_gain_pct,
            risk_score,
            opportunity_score,
            is_high_apr,
            apr_quality,
            estimated_il_risk_pct,
        }
    }

    /// Decision gate; first failing rule wins.
    fn decide(
        &self,
        opp: &OptimizationOpportunity,
        positions: &HashMap<String, MonitoredPosition>,
        position_value: Option<Decimal>,
        il_risk_pct: f64,
        risk_score: f64,
        apr_quality: AprQuality,
    ) -> Result<(), RejectionReason> {
        // 1. Source must be currently eligible; unseen sources are analyzed on the spot
        if let Some(source) = &opp.source_position {
            let reason = match positions.get(&source.pool_id) {
                Some(monitored) => monitored.blocked_reason().cloned(),
                None => analyze_position(source, self.config).blocked_reason().cloned(),
            };
            if let Some(reason) = reason {
                return Err(RejectionReason::SourceIneligible(reason));
            }
        }

        // 2. Position size cap
        if let Some(value_usd) = position_value {
            if value_usd > self.config.max_position_size_usd {
                return Err(RejectionReason::PositionTooLarge {
                    value_usd,
                    max_usd: self.config.max_position_size_usd,
                });
            }
        }

        // 3. Impermanent-loss proxy
        if il_risk_pct > self.config.max_il_risk_pct {
            return Err(RejectionReason::ImpermanentLossRisk {
                estimated_pct: il_risk_pct,
                max_pct: self.config.max_il_risk_pct,
            });
        }

        // 4. Gain threshold
        let threshold_pct = self.gain_threshold_pct();
        if opp.net_gain_pct < threshold_pct {
            return Err(RejectionReason::BelowGainThreshold {
                net_gain_pct: opp.net_gain_pct,
                threshold_pct,
            });
        }

        // 5. Risk
        if risk_score > MAX_RISK_SCORE {
            return Err(RejectionReason::RiskTooHigh { risk_score });
        }

        // 6. DEX preference
        if !self.settings.preferred_dexes.is_empty()
            && !self
                .settings
                .preferred_dexes
                .iter()
                .any(|dex| dex.eq_ignore_ascii_case(&opp.target_pool.dex))
        {
            return Err(RejectionReason::DexNotPreferred {
                dex: opp.target_pool.dex.clone(),
            });
        }

        // 7. Unsustainable yield
        if apr_quality == AprQuality::Unsustainable && opp.estimated_new_apr > 100.0 {
            return Err(RejectionReason::UnsustainableApr {
                apr: opp.estimated_new_apr,
            });
        }

        // 8. Unscorable source
        if opp.source_position.is_some() && position_value.is_none() {
            return Err(RejectionReason::UnknownPositionValue);
        }

        Ok(())
    }
}

/// Migration cost as a percent of the source position value.
#[must_use]
pub fn cost_pct_of_value(cost_usd: Decimal, value_usd: Option<Decimal>) -> Option<f64> {
    let value = value_usd.filter(|v| *v > Decimal::ZERO)?;
    (cost_usd / value * Decimal::ONE_HUNDRED).to_f64()
}

/// Composite 0-100 attractiveness score.
#[must_use]
pub fn opportunity_score(opp: &OptimizationOpportunity, cost_pct: f64) -> f64 {
    let pool = &opp.target_pool;
    let mut score = (opp.net_gain_pct * 10.0).min(40.0);

    if pool.tvl_usd > Decimal::ZERO {
        let turnover = pool.volume_tvl_ratio();
        score += if (0.10..=0.50).contains(&turnover) {
            20.0
        } else if turnover > 0.50 {
            15.0
        } else if turnover > 0.05 {
            10.0
        } else {
            5.0
        };
    }

    let apr = opp.estimated_new_apr;
    score += if apr <= 30.0 {
        20.0
    } else if apr <= 50.0 {
        15.0
    } else if apr <= 100.0 {
        10.0
    } else {
        5.0
    };

    score += tvl_health_score(pool.tvl_usd);

    score += if cost_pct < 0.1 {
        10.0
    } else if cost_pct < 0.5 {
        7.0
    } else if cost_pct < 1.0 {
        4.0
    } else {
        1.0
    };

    score.min(100.0)
}

fn tvl_health_score(tvl_usd: Decimal) -> f64 {
    if tvl_usd >= Decimal::from(10_000_000) {
        10.0
    } else if tvl_usd >= Decimal::from(1_000_000) {
        8.0
    } else if tvl_usd >= Decimal::from(100_000) {
        5.0
    } else {
        2.0
    }
}

/// Additive risk score; not capped.
///
/// Cost points apply only when the source position value is known.
#[must_use]
pub fn risk_score(
    apr: f64,
    cost_pct: Option<f64>,
    pool: &PoolDescriptor,
    config: &MonitorConfig,
) -> f64 {
    let mut risk = 0.0;

    if apr > 50.0 {
        risk += 20.0;
    }
    if apr > 100.0 {
        risk += 30.0;
    }
    if let Some(cost_pct) = cost_pct {
        if cost_pct > 1.0 {
            risk += 15.0;
        }
        if cost_pct > 2.0 {
            risk += 15.0;
        }
    }
    if pool.tvl_usd < config.min_pool_tvl_usd {
        risk += 25.0;
    }

    risk
}

/// Classifies how believable an APR is given pool turnover.
#[must_use]
pub fn classify_apr(apr: f64, volume_tvl_ratio: f64) -> AprQuality {
    if volume_tvl_ratio >= 0.10 && apr <= 50.0 {
        AprQuality::Sustainable
    } else if apr > 100.0 || (apr > 50.0 && volume_tvl_ratio < 0.05) {
        AprQuality::Unsustainable
    } else {
        AprQuality::Moderate
    }
}

/// Coarse impermanent-loss estimate from APR bands alone. High advertised APR is
/// taken as a stand-in for a volatile pair; no price volatility is modelled.
#[must_use]
pub fn estimate_il_risk_pct(apr: f64) -> f64 {
    if apr >= 100.0 {
        15.0
    } else if apr >= 50.0 {
        10.0
    } else if apr >= 30.0 {
        5.0
    } else {
        2.0
    }
}
