//! Per-tick statistics produced by the simulation service.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Occupancy statistics for a single simulated tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsRecord {
    pub tick: u64,
    #[serde(default)]
    pub hour: u32,
    /// POI name to number of agents counted there.
    #[serde(default)]
    pub occupancy: BTreeMap<String, u32>,
}

impl StatsRecord {
    /// The recorded count for a POI, `None` if the record has no entry for it.
    pub fn count(&self, poi: &str) -> Option<u32> {
        self.occupancy.get(poi).copied()
    }
}
