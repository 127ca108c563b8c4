//! Shared view state: the latest authoritative data the viewer knows about.
//!
//! One [`SharedView`] is created at startup and handed to both the network
//! side (which replaces its contents) and the frame side (which reads them).
//! Snapshots and records are stored behind `Arc` and swapped whole, so a
//! reader always sees either the previous value or the next one.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use world_model::{AgentDecision, AgentSnapshot, StatsRecord, WorldSnapshot};

use crate::occupancy::OccupancyResolver;

#[derive(Debug, Default)]
struct ViewState {
    world: Option<Arc<WorldSnapshot>>,
    /// Bumped on every applied world snapshot.
    world_revision: u64,
    latest_stat: Option<Arc<StatsRecord>>,
    /// Last decision per agent, set only by explicit queries.
    decisions: HashMap<String, AgentDecision>,
    selected: Option<String>,
    batch_report: Option<Arc<Vec<StatsRecord>>>,
    running: bool,
    last_error: Option<String>,
}

/// The latest world and statistics, read together under one lock.
#[derive(Debug, Clone, Default)]
pub struct ViewFrame {
    pub world: Option<Arc<WorldSnapshot>>,
    pub stat: Option<Arc<StatsRecord>>,
    pub world_revision: u64,
}

impl ViewFrame {
    /// Occupancy resolver over this frame, if a world has been fetched.
    pub fn occupancy(&self) -> Option<OccupancyResolver<'_>> {
        self.world
            .as_deref()
            .map(|world| OccupancyResolver::new(world, self.stat.as_deref()))
    }
}

/// The selected agent as it appears in the latest snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedAgent {
    pub agent: AgentSnapshot,
    pub decision: Option<AgentDecision>,
}

/// Cloneable handle to the viewer's state.
#[derive(Debug, Clone, Default)]
pub struct SharedView {
    inner: Arc<RwLock<ViewState>>,
}

impl SharedView {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, ViewState> {
        // A panicked writer leaves whole values behind, never partial ones.
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ViewState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the world snapshot. Returns the new revision.
    ///
    /// Decisions recorded for agents that are no longer present are dropped.
    pub fn apply_world(&self, snapshot: WorldSnapshot) -> u64 {
        let mut state = self.write();
        state
            .decisions
            .retain(|id, _| snapshot.contains_agent(id));
        state.world = Some(Arc::new(snapshot));
        state.world_revision += 1;
        state.world_revision
    }

    /// Store the latest statistics record. `None` (no ticks yet) keeps
    /// whatever record was already known.
    pub fn apply_stat(&self, stat: Option<StatsRecord>) {
        if let Some(stat) = stat {
            self.write().latest_stat = Some(Arc::new(stat));
        }
    }

    pub fn world(&self) -> Option<Arc<WorldSnapshot>> {
        self.read().world.clone()
    }

    pub fn latest_stat(&self) -> Option<Arc<StatsRecord>> {
        self.read().latest_stat.clone()
    }

    pub fn world_revision(&self) -> u64 {
        self.read().world_revision
    }

    /// World and statistics as of the same instant.
    pub fn frame(&self) -> ViewFrame {
        let state = self.read();
        ViewFrame {
            world: state.world.clone(),
            stat: state.latest_stat.clone(),
            world_revision: state.world_revision,
        }
    }

    /// Occupancy of a POI under the current world and record.
    pub fn occupancy(&self, poi: &str) -> u32 {
        self.frame().occupancy().map(|r| r.get(poi)).unwrap_or(0)
    }

    /// Highest occupancy over all known POIs, at least 1.
    pub fn max_occupancy(&self) -> u32 {
        self.frame().occupancy().map(|r| r.max()).unwrap_or(1)
    }

    pub fn record_decision(&self, agent_id: &str, decision: AgentDecision) {
        self.write()
            .decisions
            .insert(agent_id.to_string(), decision);
    }

    pub fn decision(&self, agent_id: &str) -> Option<AgentDecision> {
        self.read().decisions.get(agent_id).cloned()
    }

    /// Select an agent for the detail view, or clear the selection.
    pub fn select(&self, agent_id: Option<String>) {
        self.write().selected = agent_id;
    }

    pub fn selected_id(&self) -> Option<String> {
        self.read().selected.clone()
    }

    /// The selected agent resolved against the latest snapshot. `None` while
    /// nothing is selected or the agent is missing from the snapshot.
    pub fn selected_agent(&self) -> Option<SelectedAgent> {
        let state = self.read();
        let id = state.selected.as_deref()?;
        let agent = state.world.as_ref()?.agent(id)?.clone();
        Some(SelectedAgent {
            agent,
            decision: state.decisions.get(id).cloned(),
        })
    }

    pub fn set_batch_report(&self, records: Vec<StatsRecord>) {
        self.write().batch_report = Some(Arc::new(records));
    }

    pub fn batch_report(&self) -> Option<Arc<Vec<StatsRecord>>> {
        self.read().batch_report.clone()
    }

    pub fn set_running(&self, running: bool) {
        self.write().running = running;
    }

    pub fn is_running(&self) -> bool {
        self.read().running
    }

    pub fn record_error(&self, message: impl Into<String>) {
        self.write().last_error = Some(message.into());
    }

    pub fn last_error(&self) -> Option<String> {
        self.read().last_error.clone()
    }

    pub fn clear_error(&self) {
        self.write().last_error = None;
    }
}
