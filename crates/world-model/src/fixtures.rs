//! Sample data fixtures for testing.
//!
//! This module provides ready-made worlds for other crates to use.
//! Enable the `test-fixtures` feature to access these helpers.
//!
//! # Example
//!
//! ```ignore
//! // In your Cargo.toml:
//! // [dev-dependencies]
//! // world-model = { path = "../world-model", features = ["test-fixtures"] }
//!
//! use world_model::fixtures;
//!
//! let world = fixtures::sample_world();
//! let stat = fixtures::sample_stat();
//! ```

use std::collections::BTreeMap;

use crate::{AgentKind, AgentSnapshot, PoiLocation, StatsRecord, WorldSnapshot};

/// Returns the campus world from the sample fixture file.
///
/// Contains:
/// - 5 POIs (library, canteen, ground, lab, office)
/// - 6 agents: 3 students, 2 professors, 1 vendor
pub fn sample_world() -> WorldSnapshot {
    let json = include_str!("../tests/fixtures/sample_world.json");
    serde_json::from_str(json).expect("Failed to parse sample_world.json")
}

/// Returns the latest statistics record matching [`sample_world`].
pub fn sample_stat() -> StatsRecord {
    let json = include_str!("../tests/fixtures/sample_stats.json");
    let response: crate::StatsResponse =
        serde_json::from_str(json).expect("Failed to parse sample_stats.json");
    response
        .into_latest()
        .expect("sample_stats.json has no records")
}

/// Builds an agent with the given position and goals.
pub fn agent(id: &str, x: f32, y: f32, goals: &[&str]) -> AgentSnapshot {
    AgentSnapshot {
        id: id.to_string(),
        kind: AgentKind::Student,
        x,
        y,
        goals: goals.iter().map(|g| g.to_string()).collect(),
        memory: Vec::new(),
        personality: String::new(),
    }
}

/// Two POIs (`Cafe` at 5,5 and `Library` at 10,10) and one agent heading to
/// the cafe.
pub fn cafe_world() -> WorldSnapshot {
    let mut pois = BTreeMap::new();
    pois.insert("Cafe".to_string(), PoiLocation(5.0, 5.0));
    pois.insert("Library".to_string(), PoiLocation(10.0, 10.0));

    WorldSnapshot {
        agents: vec![agent("a1", 5.0, 5.0, &["Cafe"])],
        pois,
    }
}

/// A statistics record with the given occupancy entries.
pub fn stat_with(tick: u64, occupancy: &[(&str, u32)]) -> StatsRecord {
    StatsRecord {
        tick,
        hour: 9,
        occupancy: occupancy
            .iter()
            .map(|(name, count)| (name.to_string(), *count))
            .collect(),
    }
}
