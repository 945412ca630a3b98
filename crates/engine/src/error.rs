use thiserror::Error;

/// Errors surfaced by the monitor's control surface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MonitorError {
    /// The actor task has exited.
    #[error("Monitor actor is not running")]
    ActorUnavailable,

    #[error("No pending opportunity at index {index} ({available} available)")]
    NoSuchOpportunity { index: usize, available: usize },

    #[error("Cycle skipped: {0}")]
    CycleSkipped(String),

    #[error("Collaborators unavailable: {0}")]
    CollaboratorsUnavailable(String),
}
