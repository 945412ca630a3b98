use lp_rebalancer_core::{
    ConfigPatch, MonitorStatus, MonitoredPosition, OpportunityAnalysis, RebalanceResult,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::MonitorError;

#[derive(Debug)]
pub enum MonitorCommand {
    Start {
        user_id: String,
        reply: oneshot::Sender<MonitorStatus>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    TriggerCheck {
        user_id: String,
        reply: oneshot::Sender<Result<CycleReport, MonitorError>>,
    },
    TriggerRebalance {
        user_id: String,
        index: usize,
        reply: oneshot::Sender<Result<RebalanceResult, MonitorError>>,
    },
    UpdateConfig(Box<ConfigPatch>),
    Shutdown,
}

/// Everything a monitoring session exposes, published after each state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub status: MonitorStatus,
    /// Sorted by pool id.
    pub positions: Vec<MonitoredPosition>,
    /// Ranked: approved first, then rejected, each by descending score.
    pub opportunities: Vec<OpportunityAnalysis>,
}

/// Summary of one monitoring cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleReport {
    pub positions_analyzed: usize,
    pub opportunities_found: usize,
    pub approved: usize,
    pub rebalances: Vec<RebalanceResult>,
}
