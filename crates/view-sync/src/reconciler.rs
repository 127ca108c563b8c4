//! Position reconciliation: smooth display motion from stepwise snapshots.
//!
//! Snapshots arrive once per simulation tick and move agents in whole grid
//! steps. The reconciler keeps one continuously-moving display position per
//! agent and, once per frame, eases it a fixed share of the way toward the
//! agent's position in the latest snapshot.
//!
//! Targets are never stored. Each frame reads them straight from whatever
//! snapshot the caller passes in, so a newer snapshot simply changes the
//! target underneath an in-progress ease.

use std::collections::{HashMap, HashSet};

use world_model::{AgentSnapshot, WorldSnapshot};

use crate::config::MotionConfig;

/// A point in display units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DisplayPoint {
    pub x: f32,
    pub y: f32,
}

impl DisplayPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Owns the display position of every known agent.
#[derive(Debug, Clone)]
pub struct Reconciler {
    config: MotionConfig,
    positions: HashMap<String, DisplayPoint>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(MotionConfig::default())
    }
}

impl Reconciler {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            positions: HashMap::new(),
        }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Display-space target of an agent for the given snapshot.
    pub fn target_of(&self, agent: &AgentSnapshot) -> DisplayPoint {
        world_to_display(agent.x, agent.y, self.config.world_scale)
    }

    /// Register a freshly fetched snapshot.
    ///
    /// New agents are placed exactly on their target. Known agents are left
    /// where they are; only [`Reconciler::step`] moves them. Entries for
    /// agents missing from the snapshot are dropped.
    pub fn observe(&mut self, snapshot: &WorldSnapshot) {
        for agent in &snapshot.agents {
            if !self.positions.contains_key(&agent.id) {
                let target = self.target_of(agent);
                self.positions.insert(agent.id.clone(), target);
            }
        }

        let present: HashSet<&str> = snapshot.agents.iter().map(|a| a.id.as_str()).collect();
        let before = self.positions.len();
        self.positions.retain(|id, _| present.contains(id.as_str()));
        let pruned = before - self.positions.len();
        if pruned > 0 {
            tracing::debug!("Dropped {} vanished agent position(s)", pruned);
        }
    }

    /// Advance every agent in `snapshot` by one frame. Returns how many
    /// positions changed.
    pub fn step(&mut self, snapshot: &WorldSnapshot) -> usize {
        let MotionConfig {
            ease_fraction,
            deadband,
            world_scale,
        } = self.config;
        let mut moved = 0;

        for agent in &snapshot.agents {
            let target = world_to_display(agent.x, agent.y, world_scale);
            // Unseen agents start on their target, which is no movement.
            let Some(current) = self.positions.get_mut(&agent.id) else {
                self.positions.insert(agent.id.clone(), target);
                continue;
            };

            let next = ease_toward(*current, target, ease_fraction, deadband);
            if next != *current {
                *current = next;
                moved += 1;
            }
        }

        moved
    }

    /// Current display position of an agent.
    pub fn position(&self, agent_id: &str) -> Option<DisplayPoint> {
        self.positions.get(agent_id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, DisplayPoint)> {
        self.positions.iter().map(|(id, p)| (id.as_str(), *p))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// True when every agent in `snapshot` sits exactly on its target.
    pub fn is_settled(&self, snapshot: &WorldSnapshot) -> bool {
        snapshot.agents.iter().all(|agent| {
            self.position(&agent.id) == Some(self.target_of(agent))
        })
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }
}

/// Scale a grid coordinate into display units.
pub fn world_to_display(x: f32, y: f32, world_scale: f32) -> DisplayPoint {
    DisplayPoint::new(x * world_scale, y * world_scale)
}

/// One easing step: close `fraction` of the offset, or snap onto `target`
/// once neither axis is further than `deadband` away.
pub fn ease_toward(
    current: DisplayPoint,
    target: DisplayPoint,
    fraction: f32,
    deadband: f32,
) -> DisplayPoint {
    let dx = target.x - current.x;
    let dy = target.y - current.y;

    if dx.abs() > deadband || dy.abs() > deadband {
        DisplayPoint::new(current.x + dx * fraction, current.y + dy * fraction)
    } else {
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use world_model::fixtures::agent;

    fn world_with(agents: Vec<AgentSnapshot>) -> WorldSnapshot {
        WorldSnapshot {
            agents,
            pois: Default::default(),
        }
    }

    /// Reconciler working directly in display units.
    fn unit_scale() -> Reconciler {
        Reconciler::new(MotionConfig {
            world_scale: 1.0,
            ..MotionConfig::default()
        })
    }

    #[test]
    fn test_first_sight_places_exactly() {
        let mut reconciler = Reconciler::default();
        let world = world_with(vec![agent("a1", 5.0, 7.0, &[])]);

        reconciler.observe(&world);

        assert_eq!(reconciler.position("a1"), Some(DisplayPoint::new(100.0, 140.0)));
        assert!(reconciler.is_settled(&world));
    }

    #[test]
    fn test_observe_leaves_known_positions_alone() {
        let mut reconciler = unit_scale();
        reconciler.observe(&world_with(vec![agent("a1", 0.0, 0.0, &[])]));

        reconciler.observe(&world_with(vec![agent("a1", 100.0, 0.0, &[])]));

        assert_eq!(reconciler.position("a1"), Some(DisplayPoint::new(0.0, 0.0)));
    }

    #[test]
    fn test_first_frame_eases_22_percent() {
        let mut reconciler = unit_scale();
        reconciler.observe(&world_with(vec![agent("a1", 0.0, 0.0, &[])]));
        let moved_world = world_with(vec![agent("a1", 100.0, 0.0, &[])]);

        let moved = reconciler.step(&moved_world);

        assert_eq!(moved, 1);
        let p = reconciler.position("a1").unwrap();
        assert!((p.x - 22.0).abs() < 1e-4);
        assert_eq!(p.y, 0.0);
    }

    #[test]
    fn test_converges_and_snaps() {
        let mut reconciler = unit_scale();
        reconciler.observe(&world_with(vec![agent("a1", 0.0, 0.0, &[])]));
        let target_world = world_with(vec![agent("a1", 100.0, 0.0, &[])]);

        let mut last_offset = 100.0_f32;
        let mut frames = 0;
        while !reconciler.is_settled(&target_world) {
            reconciler.step(&target_world);
            frames += 1;
            let offset = 100.0 - reconciler.position("a1").unwrap().x;
            assert!(offset < last_offset || offset == 0.0);
            last_offset = offset;
            assert!(frames < 100, "did not converge");
        }

        assert_eq!(reconciler.position("a1"), Some(DisplayPoint::new(100.0, 0.0)));
        // 22 easing frames bring the offset to ~0.42, the 23rd snaps.
        assert_eq!(frames, 23);

        // Idempotent once settled.
        assert_eq!(reconciler.step(&target_world), 0);
        assert_eq!(reconciler.position("a1"), Some(DisplayPoint::new(100.0, 0.0)));
    }

    #[test]
    fn test_new_target_mid_ease_retargets() {
        let mut reconciler = unit_scale();
        reconciler.observe(&world_with(vec![agent("a1", 0.0, 0.0, &[])]));
        reconciler.step(&world_with(vec![agent("a1", 100.0, 0.0, &[])]));

        // Target moves back behind the current position.
        let back = world_with(vec![agent("a1", 0.0, 0.0, &[])]);
        reconciler.observe(&back);
        reconciler.step(&back);

        let p = reconciler.position("a1").unwrap();
        assert!((p.x - 22.0 * 0.78).abs() < 1e-3);
    }

    #[test]
    fn test_within_deadband_snaps() {
        let next = ease_toward(
            DisplayPoint::new(9.6, 10.4),
            DisplayPoint::new(10.0, 10.0),
            0.22,
            0.5,
        );
        assert_eq!(next, DisplayPoint::new(10.0, 10.0));
    }

    #[test]
    fn test_single_axis_outside_deadband_eases_both() {
        let next = ease_toward(
            DisplayPoint::new(0.0, 9.8),
            DisplayPoint::new(10.0, 10.0),
            0.5,
            0.5,
        );
        assert_eq!(next.x, 5.0);
        assert!((next.y - 9.9).abs() < 1e-5);
    }

    #[test]
    fn test_vanished_agents_are_pruned() {
        let mut reconciler = Reconciler::default();
        reconciler.observe(&world_with(vec![
            agent("a1", 1.0, 1.0, &[]),
            agent("a2", 2.0, 2.0, &[]),
        ]));
        assert_eq!(reconciler.len(), 2);

        let only_a2 = world_with(vec![agent("a2", 3.0, 3.0, &[])]);
        reconciler.observe(&only_a2);

        assert_eq!(reconciler.len(), 1);
        assert!(reconciler.position("a1").is_none());
        // Stepping with a snapshot that lacks an agent never touches it.
        reconciler.step(&only_a2);
        assert!(reconciler.position("a1").is_none());
    }

    #[test]
    fn test_step_seeds_unobserved_agents() {
        let mut reconciler = Reconciler::default();
        let world = world_with(vec![agent("late", 2.0, 3.0, &[])]);

        assert_eq!(reconciler.step(&world), 0);
        assert_eq!(reconciler.position("late"), Some(DisplayPoint::new(40.0, 60.0)));

        // Once seeded, a moved target eases like any other agent.
        let moved = world_with(vec![agent("late", 7.0, 3.0, &[])]);
        assert_eq!(reconciler.step(&moved), 1);
        let p = reconciler.position("late").unwrap();
        assert!((p.x - 62.0).abs() < 1e-4);
        assert_eq!(p.y, 60.0);
    }

    #[test]
    fn test_crowd_churn_keeps_only_present_agents() {
        let mut reconciler = unit_scale();
        let crowd: Vec<_> = (0..500)
            .map(|i| agent(&format!("a{i}"), i as f32, 0.0, &[]))
            .collect();
        reconciler.observe(&world_with(crowd.clone()));
        assert_eq!(reconciler.len(), 500);

        // Every other agent leaves, and a newcomer arrives.
        let mut remaining: Vec<_> = crowd.into_iter().step_by(2).collect();
        remaining.push(agent("new", 1.0, 1.0, &[]));
        let world = world_with(remaining);
        reconciler.observe(&world);

        assert_eq!(reconciler.len(), 251);
        assert!(reconciler.position("a1").is_none());
        assert_eq!(reconciler.position("a498"), Some(DisplayPoint::new(498.0, 0.0)));
        assert_eq!(reconciler.position("new"), Some(DisplayPoint::new(1.0, 1.0)));
        assert_eq!(reconciler.step(&world), 0);
        assert!(reconciler.is_settled(&world));
    }
}
