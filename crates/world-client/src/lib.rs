//! Remote world client: typed access to the simulation service.
//!
//! The client owns no state beyond its HTTP connection pool. Every call is
//! independently fallible and nothing is retried; deciding what to do with a
//! failure is left to the caller.
//!
//! # Modules
//!
//! - [`error`]: [`ClientError`], the Network / Protocol / Server taxonomy
//! - [`http`]: [`HttpWorldClient`], the reqwest-backed implementation

pub mod error;
pub mod http;

pub use error::ClientError;
pub use http::{join_url, HttpWorldClient, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};

use std::future::Future;

use world_model::{AgentDecision, StatsRecord, WorldSnapshot};

/// The request/response contract of the simulation service.
///
/// The read operations are idempotent. `advance_tick`, `query_agent_decision`
/// and `run_batch` mutate server-side state; none of them return the updated
/// world, so callers refresh with [`RemoteWorld::fetch_world`] afterwards.
pub trait RemoteWorld: Send + Sync + 'static {
    /// `GET /world`: the full set of agents and POIs.
    fn fetch_world(&self) -> impl Future<Output = Result<WorldSnapshot, ClientError>> + Send;

    /// `GET /stats?last=1`: the newest statistics record, `None` before the
    /// first tick.
    fn fetch_latest_stat(
        &self,
    ) -> impl Future<Output = Result<Option<StatsRecord>, ClientError>> + Send;

    /// `POST /tick`: compute `steps` further simulation ticks.
    fn advance_tick(&self, steps: u32) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// `POST /agent_llm`: ask one agent to decide. May append to its memory.
    fn query_agent_decision(
        &self,
        agent_id: &str,
    ) -> impl Future<Output = Result<AgentDecision, ClientError>> + Send;

    /// `GET /export_stats`: the full statistics history as opaque CSV bytes.
    fn export_stats(&self) -> impl Future<Output = Result<Vec<u8>, ClientError>> + Send;

    /// `POST /run_sim_json`: run a headless batch and return its records.
    fn run_batch(
        &self,
        ticks: u32,
        reset_seed: bool,
    ) -> impl Future<Output = Result<Vec<StatsRecord>, ClientError>> + Send;
}
