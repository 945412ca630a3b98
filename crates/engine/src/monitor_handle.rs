use std::sync::Arc;

use lp_rebalancer_core::{
    ConfigPatch, MonitorConfig, MonitorStatus, MonitoredPosition, OpportunityAnalysis,
    RebalanceResult, ServiceLocator,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::commands::{CycleReport, MonitorCommand, MonitorSnapshot};
use crate::error::MonitorError;
use crate::monitor_actor::MonitorActor;

const COMMAND_BUFFER: usize = 32;

/// Cloneable control surface for a monitoring session.
///
/// Commands go through the actor's mailbox; reads come from the last published
/// snapshot and never wait on a running cycle.
#[derive(Clone)]
pub struct MonitorHandle {
    tx: mpsc::Sender<MonitorCommand>,
    snapshot_rx: watch::Receiver<MonitorSnapshot>,
}

impl MonitorHandle {
    /// Creates a new handle from an existing command sender and snapshot receiver.
    #[must_use]
    pub const fn new(
        tx: mpsc::Sender<MonitorCommand>,
        snapshot_rx: watch::Receiver<MonitorSnapshot>,
    ) -> Self {
        Self { tx, snapshot_rx }
    }

    /// Spawns a stopped monitor actor on the current runtime.
    #[must_use]
    pub fn spawn(config: MonitorConfig, locator: Arc<dyn ServiceLocator>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(MonitorActor::initial_snapshot(&config));
        let actor = MonitorActor::new(config, rx, locator, snapshot_tx);
        let task = tokio::spawn(actor.run());
        (Self::new(tx, snapshot_rx), task)
    }

    /// Starts monitoring `user_id`. Resolves once collaborators have been acquired
    /// (or retries exhausted) and the first cycle is scheduled.
    ///
    /// # Errors
    /// Returns an error if the actor has exited.
    pub async fn start(&self, user_id: impl Into<String>) -> Result<MonitorStatus, MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.send(MonitorCommand::Start {
            user_id: user_id.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| MonitorError::ActorUnavailable)
    }

    /// Stops the timer. Data from the last cycle stays readable.
    ///
    /// # Errors
    /// Returns an error if the actor has exited.
    pub async fn stop(&self) -> Result<(), MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.send(MonitorCommand::Stop { reply }).await?;
        rx.await.map_err(|_| MonitorError::ActorUnavailable)
    }

    /// Runs one cycle now, queued behind any cycle already in progress.
    ///
    /// # Errors
    /// Returns `CycleSkipped` if positions could not be fetched, or an error if the
    /// actor has exited.
    pub async fn trigger_check(&self, user_id: impl Into<String>) -> Result<CycleReport, MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.send(MonitorCommand::TriggerCheck {
            user_id: user_id.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| MonitorError::ActorUnavailable)?
    }

    /// Executes the pending opportunity at `index` regardless of its decision.
    ///
    /// # Errors
    /// Returns `NoSuchOpportunity` for an out-of-range index and
    /// `CollaboratorsUnavailable` if the DEX or vault handle is missing.
    pub async fn trigger_rebalance(
        &self,
        user_id: impl Into<String>,
        index: usize,
    ) -> Result<RebalanceResult, MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.send(MonitorCommand::TriggerRebalance {
            user_id: user_id.into(),
            index,
            reply,
        })
        .await?;
        rx.await.map_err(|_| MonitorError::ActorUnavailable)?
    }

    /// Merges a partial config. A changed interval applies on the next start.
    ///
    /// # Errors
    /// Returns an error if the actor has exited.
    pub async fn update_config(&self, patch: ConfigPatch) -> Result<(), MonitorError> {
        self.send(MonitorCommand::UpdateConfig(Box::new(patch))).await
    }

    /// Shuts the actor down.
    ///
    /// # Errors
    /// Returns an error if the actor has already exited.
    pub async fn shutdown(&self) -> Result<(), MonitorError> {
        self.send(MonitorCommand::Shutdown).await
    }

    #[must_use]
    pub fn get_status(&self) -> MonitorStatus {
        self.snapshot_rx.borrow().status.clone()
    }

    /// Positions from the last cycle, sorted by pool id.
    #[must_use]
    pub fn get_positions(&self) -> Vec<MonitoredPosition> {
        self.snapshot_rx.borrow().positions.clone()
    }

    /// Ranked opportunities from the last cycle.
    #[must_use]
    pub fn get_opportunities(&self) -> Vec<OpportunityAnalysis> {
        self.snapshot_rx.borrow().opportunities.clone()
    }

    /// Receiver notified on every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.snapshot_rx.clone()
    }

    async fn send(&self, cmd: MonitorCommand) -> Result<(), MonitorError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| MonitorError::ActorUnavailable)
    }
}
