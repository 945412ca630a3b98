pub mod config;
pub mod config_loader;
pub mod config_watcher;
pub mod status;
pub mod status_formatter;
pub mod traits;
pub mod types;

pub use config::{ConfigPatch, MonitorConfig};
pub use config_loader::ConfigLoader;
pub use config_watcher::ConfigWatcher;
pub use status::{MonitorState, MonitorStatus};
pub use status_formatter::StatusFormatter;
pub use traits::{DexGateway, ServiceLocator, VaultService, YieldScout};
pub use types::{
    AprQuality, AutoRebalanceSettings, BlockReason, DepositOutcome, DepositRequest, Eligibility,
    MigrationOutcome, MonitoredPosition, OpportunityAnalysis, OptimizationOpportunity,
    PoolDescriptor, Position, PositionMetadata, RangeBounds, RangeStatus, RebalanceResult,
    RejectionReason, TokenAmount, TokenBalance, TokenInfo, TrackedPosition, UserProfile,
    VaultKeypair, WithdrawOutcome, WithdrawRequest,
};
