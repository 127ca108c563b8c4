//! Snapshot Types
//!
//! Serialization structs for the authoritative world state returned by
//! `GET /world`.
//!
//! A snapshot is replaced wholesale on every fetch. Nothing in here is
//! merged field by field; the viewer keeps its own side tables keyed by
//! agent id.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Presentation category of an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Student,
    Professor,
    Vendor,
    /// Any kind the viewer does not recognise.
    #[default]
    #[serde(other)]
    Other,
}

impl AgentKind {
    /// Lowercase label as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Student => "student",
            AgentKind::Professor => "professor",
            AgentKind::Vendor => "vendor",
            AgentKind::Other => "other",
        }
    }
}

/// Agent as reported by the simulation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: AgentKind,
    /// Grid position in world units.
    pub x: f32,
    pub y: f32,
    /// Current intent, first entry is the primary goal.
    #[serde(default)]
    pub goals: Vec<String>,
    /// Log entries, oldest first.
    #[serde(default)]
    pub memory: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub personality: String,
}

impl AgentSnapshot {
    /// The goal used for occupancy tallying, if any.
    pub fn primary_goal(&self) -> Option<&str> {
        self.goals.first().map(String::as_str)
    }

    /// Memory entries, most recent first.
    pub fn recent_memory(&self) -> impl Iterator<Item = &str> {
        self.memory.iter().rev().map(String::as_str)
    }
}

/// Fixed location of a point of interest, encoded as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoiLocation(pub f32, pub f32);

impl PoiLocation {
    pub fn x(&self) -> f32 {
        self.0
    }

    pub fn y(&self) -> f32 {
        self.1
    }
}

/// Full authoritative world state as of one successful fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    #[serde(default)]
    pub agents: Vec<AgentSnapshot>,
    #[serde(default)]
    pub pois: BTreeMap<String, PoiLocation>,
}

impl WorldSnapshot {
    /// Look up an agent by id.
    pub fn agent(&self, agent_id: &str) -> Option<&AgentSnapshot> {
        self.agents.iter().find(|a| a.id == agent_id)
    }

    /// Check whether an agent with this id is part of the snapshot.
    pub fn contains_agent(&self, agent_id: &str) -> bool {
        self.agent(agent_id).is_some()
    }

    /// Names of all points of interest, in stable order.
    pub fn poi_names(&self) -> impl Iterator<Item = &str> {
        self.pois.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_snapshot_parses_service_shape() {
        let json = r#"{
            "agents": [
                {"id": "s1", "type": "student", "x": 3, "y": 4,
                 "goals": ["library", "canteen"], "memory": ["Moved to 3,4", "Moved to 3,5"],
                 "traits": {"curious": 0.8}, "personality": "quiet"}
            ],
            "pois": {"library": [10, 12], "canteen": [5, 5]}
        }"#;

        let snapshot: WorldSnapshot = serde_json::from_str(json).unwrap();
        let agent = snapshot.agent("s1").unwrap();
        assert_eq!(agent.kind, AgentKind::Student);
        assert_eq!(agent.x, 3.0);
        assert_eq!(agent.y, 4.0);
        assert_eq!(agent.primary_goal(), Some("library"));
        assert_eq!(agent.personality, "quiet");
        assert_eq!(snapshot.pois["library"], PoiLocation(10.0, 12.0));
    }

    #[test]
    fn test_unknown_agent_kind_decodes_as_other() {
        let json = r#"{"id": "g1", "type": "ghost", "x": 0, "y": 0}"#;
        let agent: AgentSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(agent.kind, AgentKind::Other);
        assert!(agent.goals.is_empty());
        assert_eq!(agent.primary_goal(), None);
    }

    #[test]
    fn test_recent_memory_is_most_recent_first() {
        let agent = AgentSnapshot {
            id: "a".into(),
            kind: AgentKind::Vendor,
            x: 0.0,
            y: 0.0,
            goals: vec![],
            memory: vec!["first".into(), "second".into(), "third".into()],
            personality: String::new(),
        };
        let recent: Vec<_> = agent.recent_memory().collect();
        assert_eq!(recent, vec!["third", "second", "first"]);
    }

    #[test]
    fn test_fractional_positions_accepted() {
        let json = r#"{"id": "p1", "type": "professor", "x": 2.5, "y": 7.25}"#;
        let agent: AgentSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(agent.x, 2.5);
        assert_eq!(agent.y, 7.25);
    }

    #[test]
    fn test_agent_kind_labels() {
        assert_eq!(AgentKind::Student.as_str(), "student");
        assert_eq!(AgentKind::default(), AgentKind::Other);
    }
}
