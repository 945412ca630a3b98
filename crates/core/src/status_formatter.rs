#![allow(clippy::format_push_string)]

use crate::status::MonitorStatus;
use crate::types::{MigrationOutcome, MonitoredPosition, OpportunityAnalysis};

pub struct StatusFormatter;

impl StatusFormatter {
    #[must_use]
    pub fn format(status: &MonitorStatus) -> String {
        let mut output = String::new();

        output.push('\n');
        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push_str("                    LIQUIDITY MONITOR                          \n");
        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push('\n');

        output.push_str("Session\n");
        output.push_str("───────────────────────────────────────────────────────────────\n");
        output.push_str(&format!("State:                 {}\n", status.state));
        output.push_str(&format!(
            "User:                  {}\n",
            status.user_id.as_deref().unwrap_or("-")
        ));
        output.push_str(&format!(
            "Last Cycle:            {}\n",
            status
                .last_cycle_at
                .map_or_else(|| "never".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        ));
        output.push_str(&format!(
            "Next Cycle:            {}\n",
            status
                .next_cycle_at
                .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        ));
        output.push_str(&format!(
            "Auto Rebalance:        {}\n",
            if status.config.auto_rebalance_enabled { "enabled" } else { "disabled" }
        ));
        output.push('\n');

        output.push_str("Positions\n");
        output.push_str("───────────────────────────────────────────────────────────────\n");
        output.push_str(&format!("Total Value:           ${:.2}\n", status.total_value_usd));
        output.push_str(&format!("In Range:              {}\n", status.positions_in_range));
        output.push_str(&format!("Out of Range:          {}\n", status.positions_out_of_range));
        output.push_str(&format!(
            "Actionable Moves:      {}\n",
            status.actionable_opportunities
        ));
        output.push('\n');

        if !status.recent_rebalances.is_empty() {
            output.push_str("Recent Rebalances\n");
            output.push_str("───────────────────────────────────────────────────────────────\n");
            for result in status.recent_rebalances.iter().rev() {
                let marker = match result.outcome() {
                    MigrationOutcome::Migrated | MigrationOutcome::Deposited => "OK",
                    MigrationOutcome::NothingExecuted => "FAILED",
                    MigrationOutcome::WithdrawnNotRedeposited => "INCIDENT",
                };
                output.push_str(&format!(
                    "{} {:<8} {} -> {}  APR {:.2}% -> {:.2}%  txs={}\n",
                    result.executed_at.format("%m-%d %H:%M"),
                    marker,
                    result.from_pool.as_deref().unwrap_or("(idle)"),
                    result.to_pool,
                    result.previous_apr,
                    result.new_apr,
                    result.transaction_ids.len()
                ));
                if let Some(error) = &result.error {
                    output.push_str(&format!("    {error}\n"));
                }
            }
            output.push('\n');
        }

        output.push_str("═══════════════════════════════════════════════════════════════\n");

        output
    }

    /// One line per position with its range state, eligibility and warnings.
    #[must_use]
    pub fn format_positions(positions: &[MonitoredPosition]) -> String {
        if positions.is_empty() {
            return "No positions\n".to_string();
        }

        let mut output = String::new();
        for monitored in positions {
            let position = &monitored.position;
            let range = match (monitored.range_status, monitored.price_distance_from_range) {
                (Some(status), Some(distance)) => format!("{status} ({distance:+.2}%)"),
                (Some(status), None) => status.to_string(),
                _ if monitored.is_concentrated => "range unknown".to_string(),
                _ => "full range".to_string(),
            };
            output.push_str(&format!(
                "{:<12} {:<10} {:>12}  apr={:.2}%  {}  {}\n",
                position.pool_id,
                position.dex,
                position
                    .value_usd
                    .map_or_else(|| "?".to_string(), |v| format!("${v:.2}")),
                monitored.current_apr,
                range,
                monitored
                    .blocked_reason()
                    .map_or_else(|| "eligible".to_string(), ToString::to_string)
            ));
            for warning in &monitored.warnings {
                output.push_str(&format!("    ! {warning}\n"));
            }
        }
        output
    }

    /// One line per analysed opportunity, in ranked order.
    #[must_use]
    pub fn format_opportunities(analyses: &[OpportunityAnalysis]) -> String {
        if analyses.is_empty() {
            return "No opportunities\n".to_string();
        }

        let mut output = String::new();
        for (index, analysis) in analyses.iter().enumerate() {
            let opp = &analysis.opportunity;
            output.push_str(&format!(
                "[{index}] {} {} {}/{}  score={:.0} risk={:.0} apr={:.2}% ({})  {}\n",
                if analysis.should_execute { "GO  " } else { "SKIP" },
                opp.target_pool.dex,
                opp.target_pool.token_a.symbol,
                opp.target_pool.token_b.symbol,
                analysis.opportunity_score,
                analysis.risk_score,
                opp.estimated_new_apr,
                analysis.apr_quality,
                analysis.reason
            ));
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::types::RebalanceResult;
    use chrono::Utc;

    #[test]
    fn idle_status_renders() {
        let status = MonitorStatus::idle(MonitorConfig::default());
        let text = StatusFormatter::format(&status);
        assert!(text.contains("State:                 stopped"));
        assert!(text.contains("Last Cycle:            never"));
        assert!(!text.contains("Recent Rebalances"));
    }

    #[test]
    fn incident_is_flagged() {
        let mut status = MonitorStatus::idle(MonitorConfig::default());
        status.recent_rebalances.push(RebalanceResult {
            success: false,
            from_pool: Some("pool-a".to_string()),
            to_pool: "pool-b".to_string(),
            previous_apr: 4.0,
            new_apr: 11.0,
            transaction_ids: vec!["tx1".to_string()],
            error: Some("Token mismatch".to_string()),
            executed_at: Utc::now(),
        });

        let text = StatusFormatter::format(&status);

        assert!(text.contains("INCIDENT"));
        assert!(text.contains("Token mismatch"));
    }

    #[test]
    fn blocked_position_shows_reason() {
        use crate::types::{BlockReason, Eligibility, Position, PositionMetadata};

        let monitored = MonitoredPosition {
            position: Position {
                pool_id: "pool-a".to_string(),
                dex: "orca".to_string(),
                share_balance: rust_decimal::Decimal::ONE,
                underlying: Vec::new(),
                value_usd: None,
                metadata: PositionMetadata::default(),
            },
            is_concentrated: false,
            price_distance_from_range: None,
            range_status: None,
            current_apr: 3.5,
            warnings: vec!["Low APR".to_string()],
            eligibility: Eligibility::Blocked(BlockReason::Locked),
            volume_24h_usd: None,
            fee_apr: None,
            reward_apr: None,
            analyzed_at: Utc::now(),
        };

        let text = StatusFormatter::format_positions(&[monitored]);

        assert!(text.contains("pool-a"));
        assert!(text.contains("full range"));
        assert!(text.contains("Position locked"));
        assert!(text.contains("! Low APR"));
    }

    #[test]
    fn empty_opportunity_list() {
        assert_eq!(StatusFormatter::format_opportunities(&[]), "No opportunities\n");
    }
}
