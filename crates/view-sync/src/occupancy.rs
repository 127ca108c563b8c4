//! Occupancy resolution: how busy each point of interest is.
//!
//! The service's statistics record is authoritative. When it has no entry for
//! a POI (or there is no record yet) the count falls back to a local tally of
//! agents whose primary goal names that POI. Nothing here is cached; every
//! call recomputes from its inputs.

use std::collections::BTreeMap;

use world_model::{AgentSnapshot, PoiLocation, StatsRecord, WorldSnapshot};

use crate::config::HeatConfig;

/// Occupancy of one POI.
///
/// A record entry wins whenever present, including an explicit zero.
pub fn occupancy(poi: &str, stat: Option<&StatsRecord>, agents: &[AgentSnapshot]) -> u32 {
    if let Some(count) = stat.and_then(|s| s.count(poi)) {
        return count;
    }
    goal_tally(poi, agents)
}

/// Number of agents whose first goal is `poi`.
pub fn goal_tally(poi: &str, agents: &[AgentSnapshot]) -> u32 {
    agents
        .iter()
        .filter(|a| a.primary_goal() == Some(poi))
        .count() as u32
}

/// Largest occupancy over `pois`, never less than 1.
pub fn max_occupancy<'a>(
    pois: impl IntoIterator<Item = &'a str>,
    stat: Option<&StatsRecord>,
    agents: &[AgentSnapshot],
) -> u32 {
    pois.into_iter()
        .map(|poi| occupancy(poi, stat, agents))
        .max()
        .unwrap_or(0)
        .max(1)
}

/// Rendering intensity of a POI relative to the busiest one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatLevel {
    pub occupancy: u32,
    /// `occupancy / max_occupancy`, in `[0, 1]`.
    pub ratio: f32,
    pub radius: f32,
    pub opacity: f32,
}

impl HeatLevel {
    pub fn new(occupancy: u32, max_occupancy: u32, config: &HeatConfig) -> Self {
        let ratio = (occupancy as f32 / max_occupancy.max(1) as f32).min(1.0);
        Self {
            occupancy,
            ratio,
            radius: config.min_radius + ratio * config.radius_span,
            opacity: (config.base_opacity + ratio * config.opacity_span).min(config.max_opacity),
        }
    }
}

/// Bundles the inputs of occupancy resolution for one snapshot.
#[derive(Debug, Clone, Copy)]
pub struct OccupancyResolver<'a> {
    pois: &'a BTreeMap<String, PoiLocation>,
    agents: &'a [AgentSnapshot],
    stat: Option<&'a StatsRecord>,
}

impl<'a> OccupancyResolver<'a> {
    pub fn new(snapshot: &'a WorldSnapshot, stat: Option<&'a StatsRecord>) -> Self {
        Self {
            pois: &snapshot.pois,
            agents: &snapshot.agents,
            stat,
        }
    }

    /// Occupancy of a POI by name. Unknown names resolve the same way, so
    /// the result is 0 unless a record or goal mentions them.
    pub fn get(&self, poi: &str) -> u32 {
        occupancy(poi, self.stat, self.agents)
    }

    pub fn max(&self) -> u32 {
        max_occupancy(self.pois.keys().map(String::as_str), self.stat, self.agents)
    }

    pub fn heat(&self, poi: &str, config: &HeatConfig) -> HeatLevel {
        HeatLevel::new(self.get(poi), self.max(), config)
    }

    /// Heat level of every known POI with its location, in name order.
    pub fn heat_map(&self, config: &HeatConfig) -> Vec<(&'a str, PoiLocation, HeatLevel)> {
        let max = self.max();
        self.pois
            .iter()
            .map(|(name, location)| {
                (
                    name.as_str(),
                    *location,
                    HeatLevel::new(self.get(name), max, config),
                )
            })
            .collect()
    }
}
