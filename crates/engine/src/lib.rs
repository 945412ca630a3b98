//! Monitoring engine for concentrated and full-range liquidity positions.
//!
//! Each cycle fetches the user's positions, annotates them with range and eligibility
//! analysis, scores the opportunities offered by the yield scout, and optionally
//! executes approved migrations. The loop runs as a single actor; `MonitorHandle` is
//! its public control surface.

pub mod analyzer;
pub mod collaborators;
pub mod commands;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod monitor_actor;
pub mod monitor_handle;

pub use analyzer::{analyze_position, analyze_position_at, analyze_range, RangeAnalysis};
pub use collaborators::Collaborators;
pub use commands::{CycleReport, MonitorCommand, MonitorSnapshot};
pub use error::MonitorError;
pub use evaluator::OpportunityEvaluator;
pub use executor::{match_target_tokens, RebalanceExecutor};
pub use monitor_actor::MonitorActor;
pub use monitor_handle::MonitorHandle;
