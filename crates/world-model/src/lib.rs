//! Shared data types for the world simulation viewer.
//!
//! This crate contains pure data structures with no networking or rendering
//! logic. It mirrors the JSON contract of the simulation service and is a
//! dependency for all other crates in the workspace.

pub mod snapshot;
pub mod stats;
pub mod wire;

#[cfg(feature = "test-fixtures")]
pub mod fixtures;

// Re-export snapshot types
pub use snapshot::{AgentKind, AgentSnapshot, PoiLocation, WorldSnapshot};

// Re-export statistics types
pub use stats::StatsRecord;

// Re-export wire envelopes
pub use wire::{
    AgentDecision, AgentDecisionRequest, AgentDecisionResponse, BatchRunRequest,
    BatchRunResponse, StatsResponse, TickRequest,
};
