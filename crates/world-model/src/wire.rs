//! Request and response envelopes of the simulation service.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::StatsRecord;

/// Body of `GET /stats?last=N`. The list is empty before the first tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(default)]
    pub stats: Vec<StatsRecord>,
}

impl StatsResponse {
    /// The newest record, if the service has produced any.
    pub fn into_latest(self) -> Option<StatsRecord> {
        self.stats.into_iter().max_by_key(|r| r.tick)
    }
}

/// Body of `POST /tick`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickRequest {
    pub steps: u32,
}

/// Body of `POST /agent_llm`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDecisionRequest {
    pub agent_id: String,
}

/// The last decision an agent reached when queried on demand.
///
/// The model's reply is passed through by the service as-is, so every field
/// may be missing and `memory` may be any JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentDecision {
    #[serde(default)]
    pub thought: String,
    #[serde(default)]
    pub action: String,
    /// Memory line the service stored as a side effect, if any.
    #[serde(
        default,
        deserialize_with = "memory_as_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub memory: Option<String>,
}

/// Strings pass through, `null` is no memory, anything else is kept as its
/// JSON text.
fn memory_as_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

/// Response of `POST /agent_llm`: either a decision or an error payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentDecisionResponse {
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub llm_result: Option<AgentDecision>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `POST /run_sim_json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRunRequest {
    pub ticks: u32,
    pub reset_seed: bool,
}

/// Response of `POST /run_sim_json`: one record per simulated tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRunResponse {
    #[serde(default)]
    pub stats: Vec<StatsRecord>,
}
