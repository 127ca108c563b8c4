//! Visualization layer: Bevy-based renderer for the campus simulation.
//!
//! The render side only reads the shared view and sends commands through
//! the sync bridge; all network traffic happens on the scheduler's runtime.

pub mod agents;
pub mod camera;
pub mod export;
pub mod overlay;
pub mod plugin;
pub mod sync_bridge;
pub mod world;

pub use plugin::CampusVizPlugin;
pub use sync_bridge::{BridgeError, Notice, SyncBridge, ViewUpdatedEvent, ViewerSettings};
