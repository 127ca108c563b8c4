//! View synchronization: keeps a smoothly animated view of a tick-based
//! simulation running on a remote service.
//!
//! The service hands out discrete snapshots once per tick. This crate polls
//! it on a cadence, keeps the latest snapshot and statistics in a shared
//! view, resolves how busy each point of interest is, and turns stepwise
//! grid moves into continuous per-frame motion.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  advance/fetch   ┌─────────────┐   replace    ┌────────────┐
//! │ TickScheduler│ ───────────────▶ │ RemoteWorld │ ───────────▶ │ SharedView │
//! └──────────────┘                  └─────────────┘              └────────────┘
//!                                                       every frame    │
//!                                   ┌────────────┐ ◀──────────────────┤
//!                                   │ Reconciler │  OccupancyResolver ◀┘
//!                                   └────────────┘
//! ```
//!
//! # Modules
//!
//! - [`config`]: TOML configuration for cadence, motion and heat rendering
//! - [`view`]: [`SharedView`], the owned state both drivers share
//! - [`scheduler`]: [`TickScheduler`] and its [`SyncHandle`] command surface
//! - [`reconciler`]: per-frame easing of display positions
//! - [`occupancy`]: statistics-first occupancy with a goal-tally fallback

pub mod config;
pub mod occupancy;
pub mod reconciler;
pub mod scheduler;
pub mod view;

// Re-export config types
pub use config::{
    default_config_toml, BatchConfig, ConfigError, HeatConfig, MotionConfig, SyncConfig,
    TomlSerializeError, ViewSyncConfig,
};

// Re-export occupancy types
pub use occupancy::{goal_tally, max_occupancy, occupancy, HeatLevel, OccupancyResolver};

// Re-export reconciler types
pub use reconciler::{ease_toward, world_to_display, DisplayPoint, Reconciler};

// Re-export scheduler types
pub use scheduler::{CycleKind, CycleReport, SyncCommand, SyncEvent, SyncHandle, TickScheduler};

// Re-export view types
pub use view::{SelectedAgent, SharedView, ViewFrame};

use thiserror::Error;
use tokio::sync::mpsc;
use world_client::{ClientError, HttpWorldClient};

/// Errors surfaced by the view synchronizer.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The scheduler has shut down and no longer accepts commands.
    #[error("tick scheduler is no longer running")]
    Closed,
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Build a scheduler talking HTTP to the service named in `config`.
pub fn http_scheduler(
    config: &ViewSyncConfig,
    view: SharedView,
) -> Result<
    (
        TickScheduler<HttpWorldClient>,
        SyncHandle,
        mpsc::UnboundedReceiver<SyncEvent>,
    ),
    SyncError,
> {
    config.validate()?;
    let client = HttpWorldClient::new(config.sync.base_url.clone(), config.sync.request_timeout())?;
    tracing::info!("Connecting to simulation service at {}", client.base_url());
    Ok(TickScheduler::new(client, view, &config.sync))
}
