use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use lp_rebalancer_core::{
    AutoRebalanceSettings, ConfigPatch, MonitorConfig, MonitorState, MonitorStatus,
    MonitoredPosition, OpportunityAnalysis, Position, RangeStatus, RebalanceResult,
    ServiceLocator, TokenBalance, UserProfile,
};

use crate::analyzer::analyze_position_at;
use crate::collaborators::Collaborators;
use crate::commands::{CycleReport, MonitorCommand, MonitorSnapshot};
use crate::error::MonitorError;
use crate::evaluator::OpportunityEvaluator;
use crate::executor::RebalanceExecutor;

/// Owns all state of one monitoring session and processes commands and timer ticks
/// one at a time, so a cycle body never overlaps with another cycle or a manual
/// rebalance.
pub struct MonitorActor {
    config: MonitorConfig,
    state: MonitorState,
    user_id: Option<String>,
    rx: mpsc::Receiver<MonitorCommand>,
    locator: Arc<dyn ServiceLocator>,
    collaborators: Collaborators,
    ticker: Option<Interval>,

    positions: HashMap<String, MonitoredPosition>,
    opportunities: Vec<OpportunityAnalysis>,
    history: VecDeque<RebalanceResult>,
    last_cycle_at: Option<DateTime<Utc>>,
    next_cycle_at: Option<DateTime<Utc>>,

    snapshot_tx: watch::Sender<MonitorSnapshot>,
}

impl MonitorActor {
    /// Creates a new monitor actor in the stopped state.
    #[must_use]
    pub fn new(
        config: MonitorConfig,
        rx: mpsc::Receiver<MonitorCommand>,
        locator: Arc<dyn ServiceLocator>,
        snapshot_tx: watch::Sender<MonitorSnapshot>,
    ) -> Self {
        let history = VecDeque::with_capacity(config.history_capacity);
        Self {
            config,
            state: MonitorState::Stopped,
            user_id: None,
            rx,
            locator,
            collaborators: Collaborators::default(),
            ticker: None,
            positions: HashMap::new(),
            opportunities: Vec::new(),
            history,
            last_cycle_at: None,
            next_cycle_at: None,
            snapshot_tx,
        }
    }

    /// Snapshot of a freshly constructed, never-run session.
    #[must_use]
    pub fn initial_snapshot(config: &MonitorConfig) -> MonitorSnapshot {
        MonitorSnapshot {
            status: MonitorStatus::idle(config.clone()),
            positions: Vec::new(),
            opportunities: Vec::new(),
        }
    }

    /// Runs the actor until `Shutdown` or until every handle is dropped.
    pub async fn run(mut self) {
        info!("Monitor actor started");

        loop {
            tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    Some(MonitorCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },
                () = next_tick(&mut self.ticker), if self.ticker.is_some() => {
                    if let Some(user_id) = self.user_id.clone() {
                        if let Err(e) = self.run_cycle(&user_id).await {
                            warn!(user_id = %user_id, error = %e, "Scheduled cycle skipped");
                        }
                    }
                }
            }
        }

        self.ticker = None;
        self.state = MonitorState::Stopped;
        self.publish();
        info!("Monitor actor stopped");
    }

    async fn handle_command(&mut self, cmd: MonitorCommand) {
        match cmd {
            MonitorCommand::Start { user_id, reply } => {
                self.start(user_id).await;
                let _ = reply.send(self.status());
            }
            MonitorCommand::Stop { reply } => {
                self.stop();
                let _ = reply.send(());
            }
            MonitorCommand::TriggerCheck { user_id, reply } => {
                let result = self.run_cycle(&user_id).await;
                let _ = reply.send(result);
            }
            MonitorCommand::TriggerRebalance {
                user_id,
                index,
                reply,
            } => {
                let result = self.rebalance_at(&user_id, index).await;
                let _ = reply.send(result);
            }
            MonitorCommand::UpdateConfig(patch) => self.update_config(&patch),
            MonitorCommand::Shutdown => {}
        }
    }

    async fn start(&mut self, user_id: String) {
        if self.state != MonitorState::Stopped {
            warn!(
                state = %self.state,
                "Monitor already active, ignoring start command"
            );
            return;
        }

        info!(
            user_id = %user_id,
            interval_secs = self.config.interval_secs,
            min_gain_pct = self.config.min_gain_threshold_pct,
            auto_rebalance = self.config.auto_rebalance_enabled,
            "Starting liquidity monitor"
        );

        self.state = MonitorState::Starting;
        self.user_id = Some(user_id);
        self.publish();

        self.collaborators
            .acquire(
                self.locator.as_ref(),
                self.config.startup_retry_attempts,
                self.config.startup_retry_delay(),
            )
            .await;

        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
        self.state = MonitorState::Running;
        self.next_cycle_at = Some(Utc::now());
        self.publish();
    }

    fn stop(&mut self) {
        if self.state == MonitorState::Stopped {
            warn!("Monitor already stopped, ignoring stop command");
            return;
        }

        self.ticker = None;
        self.state = MonitorState::Stopped;
        self.next_cycle_at = None;
        self.publish();
        info!("Liquidity monitor stopped");
    }

    fn update_config(&mut self, patch: &ConfigPatch) {
        let interval_changed = self.config.apply(patch);
        if interval_changed && self.ticker.is_some() {
            info!(
                interval_secs = self.config.interval_secs,
                "Interval change takes effect after restart"
            );
        }
        info!(?patch, "Monitor config updated");
        self.publish();
    }

    /// One monitoring cycle: fetch, analyse, evaluate, then execute if allowed.
    async fn run_cycle(&mut self, user_id: &str) -> Result<CycleReport, MonitorError> {
        if !self.collaborators.is_complete() {
            self.collaborators.refresh(self.locator.as_ref()).await;
        }

        let Some(dex) = self.collaborators.dex.clone() else {
            warn!(user_id, "DEX gateway unavailable, skipping cycle");
            return Err(MonitorError::CycleSkipped(
                "DEX gateway unavailable".to_string(),
            ));
        };

        // 1. Fetch and analyse
        let positions = dex.get_all_positions(user_id).await.map_err(|e| {
            warn!(user_id, error = %e, "Failed to fetch positions, skipping cycle");
            MonitorError::CycleSkipped(format!("Failed to fetch positions: {e}"))
        })?;

        let now = Utc::now();
        self.positions = positions
            .iter()
            .map(|p| {
                let monitored = analyze_position_at(p, &self.config, now);
                (monitored.key().to_string(), monitored)
            })
            .collect();

        // 2. Evaluate
        let profile = self.load_profile(user_id).await;
        let settings = profile
            .as_ref()
            .map(|p| p.auto_rebalance.clone())
            .unwrap_or_default();
        self.opportunities = self.discover(user_id, profile.as_ref(), &settings).await;
        self.publish();

        let found = self.opportunities.len();
        let approved: Vec<OpportunityAnalysis> = self
            .opportunities
            .iter()
            .filter(|a| a.should_execute)
            .cloned()
            .collect();

        // 3. Execute, serially and in ranked order
        let mut rebalances = Vec::new();
        if !approved.is_empty() && self.auto_execution_allowed(&settings) {
            match self.executor() {
                Some(executor) => {
                    let mut migrated_sources = HashSet::new();
                    for analysis in &approved {
                        if let Some(source) = &analysis.opportunity.source_position {
                            if !migrated_sources.insert(source.pool_id.clone()) {
                                debug!(
                                    pool = %source.pool_id,
                                    "Source already migrated this cycle, skipping"
                                );
                                continue;
                            }
                        }
                        let result = executor.execute(user_id, analysis).await;
                        self.record(result.clone());
                        rebalances.push(result);
                    }
                }
                None => warn!(
                    user_id,
                    missing = ?self.collaborators.missing(),
                    "Auto-rebalance enabled but executor collaborators unavailable"
                ),
            }
        }

        self.last_cycle_at = Some(Utc::now());
        self.next_cycle_at = self
            .ticker
            .as_ref()
            .zip(self.last_cycle_at)
            .and_then(|(ticker, last)| {
                chrono::Duration::from_std(ticker.period())
                    .ok()
                    .map(|period| last + period)
            });
        self.publish();

        info!(
            user_id,
            positions = self.positions.len(),
            opportunities = found,
            approved = approved.len(),
            executed = rebalances.len(),
            "Monitoring cycle complete"
        );

        Ok(CycleReport {
            positions_analyzed: self.positions.len(),
            opportunities_found: found,
            approved: approved.len(),
            rebalances,
        })
    }

    /// Executes the pending opportunity at `index`, ignoring its decision.
    async fn rebalance_at(
        &mut self,
        user_id: &str,
        index: usize,
    ) -> Result<RebalanceResult, MonitorError> {
        let analysis = self.opportunities.get(index).cloned().ok_or(
            MonitorError::NoSuchOpportunity {
                index,
                available: self.opportunities.len(),
            },
        )?;

        if !self.collaborators.is_complete() {
            self.collaborators.refresh(self.locator.as_ref()).await;
        }
        let executor = self.executor().ok_or_else(|| {
            MonitorError::CollaboratorsUnavailable(self.collaborators.missing().join(", "))
        })?;

        if !analysis.should_execute {
            warn!(
                user_id,
                index,
                reason = %analysis.reason,
                "Manually executing an opportunity the evaluator rejected"
            );
        }

        let result = executor.execute(user_id, &analysis).await;
        self.record(result.clone());
        self.publish();
        Ok(result)
    }

    async fn load_profile(&self, user_id: &str) -> Option<UserProfile> {
        let vault = self.collaborators.vault.as_ref()?;
        match vault.get_profile(user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(user_id, error = %e, "Failed to load user profile");
                None
            }
        }
    }

    async fn discover(
        &self,
        user_id: &str,
        profile: Option<&UserProfile>,
        settings: &AutoRebalanceSettings,
    ) -> Vec<OpportunityAnalysis> {
        let Some(scout) = self.collaborators.scout.as_ref() else {
            warn!(user_id, "Yield discovery unavailable, skipping evaluation");
            return Vec::new();
        };

        let mut eligible: Vec<Position> = self
            .positions
            .values()
            .filter(|m| m.is_rebalancable())
            .map(|m| m.position.clone())
            .collect();
        eligible.sort_by(|a, b| a.pool_id.cmp(&b.pool_id));

        let idle = self.idle_balances(user_id, profile).await;

        match scout.find_best_opportunities(user_id, &eligible, &idle).await {
            Ok(candidates) => OpportunityEvaluator::new(&self.config, settings)
                .evaluate_all(&candidates, &self.positions),
            Err(e) => {
                warn!(user_id, error = %e, "Yield discovery failed");
                Vec::new()
            }
        }
    }

    async fn idle_balances(&self, user_id: &str, profile: Option<&UserProfile>) -> Vec<TokenBalance> {
        let (Some(vault), Some(profile)) = (self.collaborators.vault.as_ref(), profile) else {
            return Vec::new();
        };
        vault
            .get_balances(&profile.vault_public_key)
            .await
            .unwrap_or_else(|e| {
                warn!(user_id, error = %e, "Failed to read idle balances");
                Vec::new()
            })
    }

    fn auto_execution_allowed(&self, settings: &AutoRebalanceSettings) -> bool {
        self.config.auto_rebalance_enabled && settings.enabled != Some(false)
    }

    fn executor(&self) -> Option<RebalanceExecutor> {
        let dex = self.collaborators.dex.clone()?;
        let vault = self.collaborators.vault.clone()?;
        Some(RebalanceExecutor::new(dex, vault, self.config.max_slippage_bps))
    }

    fn record(&mut self, result: RebalanceResult) {
        while self.history.len() >= self.config.history_capacity.max(1) {
            self.history.pop_front();
        }
        self.history.push_back(result);
    }

    fn status(&self) -> MonitorStatus {
        let total_value_usd = self
            .positions
            .values()
            .filter_map(|m| m.position.value_usd)
            .sum::<Decimal>();
        let positions_in_range = self
            .positions
            .values()
            .filter(|m| m.range_status == Some(RangeStatus::InRange))
            .count();
        let positions_out_of_range = self
            .positions
            .values()
            .filter(|m| {
                matches!(
                    m.range_status,
                    Some(RangeStatus::BelowRange | RangeStatus::AboveRange)
                )
            })
            .count();

        MonitorStatus {
            state: self.state,
            user_id: self.user_id.clone(),
            last_cycle_at: self.last_cycle_at,
            next_cycle_at: self.next_cycle_at,
            total_value_usd,
            positions_in_range,
            positions_out_of_range,
            actionable_opportunities: self
                .opportunities
                .iter()
                .filter(|a| a.should_execute)
                .count(),
            recent_rebalances: self.history.iter().cloned().collect(),
            config: self.config.clone(),
        }
    }

    fn publish(&self) {
        let mut positions: Vec<MonitoredPosition> = self.positions.values().cloned().collect();
        positions.sort_by(|a, b| a.key().cmp(b.key()));

        self.snapshot_tx.send_replace(MonitorSnapshot {
            status: self.status(),
            positions,
            opportunities: self.opportunities.clone(),
        });
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
