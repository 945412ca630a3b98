use crate::config::MonitorConfig;
use crate::types::RebalanceResult;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Scheduler state of the monitoring loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MonitorState {
    #[default]
    Stopped,
    /// Acquiring collaborator handles.
    Starting,
    Running,
}

impl std::fmt::Display for MonitorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// Point-in-time view of a monitoring session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub state: MonitorState,
    pub user_id: Option<String>,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub next_cycle_at: Option<DateTime<Utc>>,
    pub total_value_usd: Decimal,
    pub positions_in_range: usize,
    pub positions_out_of_range: usize,
    pub actionable_opportunities: usize,
    pub recent_rebalances: Vec<RebalanceResult>,
    pub config: MonitorConfig,
}

impl MonitorStatus {
    #[must_use]
    pub fn idle(config: MonitorConfig) -> Self {
        Self {
            state: MonitorState::Stopped,
            user_id: None,
            last_cycle_at: None,
            next_cycle_at: None,
            total_value_usd: Decimal::ZERO,
            positions_in_range: 0,
            positions_out_of_range: 0,
            actionable_opportunities: 0,
            recent_rebalances: Vec::new(),
            config,
        }
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self.state, MonitorState::Running)
    }
}
