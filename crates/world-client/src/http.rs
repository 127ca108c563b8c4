//! HTTP implementation of [`RemoteWorld`] backed by reqwest.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use world_model::{
    AgentDecision, AgentDecisionRequest, AgentDecisionResponse, BatchRunRequest,
    BatchRunResponse, StatsRecord, StatsResponse, TickRequest, WorldSnapshot,
};

use crate::{ClientError, RemoteWorld};

/// Where the simulation service listens when run locally.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

/// Upper bound on a single request. Matches the service's own LLM timeout so
/// decision queries are not cut short.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Client for the simulation service's JSON API.
#[derive(Debug, Clone)]
pub struct HttpWorldClient {
    client: Client,
    base_url: String,
}

impl HttpWorldClient {
    /// Build a client for the service rooted at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ClientError::Network {
                operation: "client",
                source,
            })?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Client for [`DEFAULT_BASE_URL`] with [`DEFAULT_TIMEOUT`].
    pub fn with_defaults() -> Result<Self, ClientError> {
        Self::new(DEFAULT_BASE_URL, DEFAULT_TIMEOUT)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

impl RemoteWorld for HttpWorldClient {
    async fn fetch_world(&self) -> Result<WorldSnapshot, ClientError> {
        const OP: &str = "world";
        let response = self
            .client
            .get(self.url("/world"))
            .send()
            .await
            .map_err(|source| network(OP, source))?;
        decode_json(OP, response).await
    }

    async fn fetch_latest_stat(&self) -> Result<Option<StatsRecord>, ClientError> {
        const OP: &str = "stats";
        let response = self
            .client
            .get(self.url("/stats"))
            .query(&[("last", "1")])
            .send()
            .await
            .map_err(|source| network(OP, source))?;
        let stats: StatsResponse = decode_json(OP, response).await?;
        Ok(stats.into_latest())
    }

    async fn advance_tick(&self, steps: u32) -> Result<(), ClientError> {
        const OP: &str = "tick";
        let response = self
            .client
            .post(self.url("/tick"))
            .json(&TickRequest { steps })
            .send()
            .await
            .map_err(|source| network(OP, source))?;
        // Only success matters; the body echoes agents we fetch separately.
        read_success_body(OP, response).await.map(|_| ())
    }

    async fn query_agent_decision(&self, agent_id: &str) -> Result<AgentDecision, ClientError> {
        const OP: &str = "agent_llm";
        let request = AgentDecisionRequest {
            agent_id: agent_id.to_string(),
        };
        let response = self
            .client
            .post(self.url("/agent_llm"))
            .json(&request)
            .send()
            .await
            .map_err(|source| network(OP, source))?;
        let body: AgentDecisionResponse = decode_json(OP, response).await?;

        match (body.llm_result, body.error) {
            (_, Some(message)) => Err(ClientError::Server {
                operation: OP,
                status: 200,
                message,
            }),
            (Some(decision), None) => Ok(decision),
            (None, None) => Err(ClientError::Protocol {
                operation: OP,
                detail: "response carries neither `llm_result` nor `error`".into(),
            }),
        }
    }

    async fn export_stats(&self) -> Result<Vec<u8>, ClientError> {
        const OP: &str = "export_stats";
        let response = self
            .client
            .get(self.url("/export_stats"))
            .send()
            .await
            .map_err(|source| network(OP, source))?;
        read_success_body(OP, response).await
    }

    async fn run_batch(&self, ticks: u32, reset_seed: bool) -> Result<Vec<StatsRecord>, ClientError> {
        const OP: &str = "run_sim_json";
        let response = self
            .client
            .post(self.url("/run_sim_json"))
            .json(&BatchRunRequest { ticks, reset_seed })
            .send()
            .await
            .map_err(|source| network(OP, source))?;
        let body: BatchRunResponse = decode_json(OP, response).await?;
        Ok(body.stats)
    }
}

/// Join a base URL and an endpoint path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

fn network(operation: &'static str, source: reqwest::Error) -> ClientError {
    ClientError::Network { operation, source }
}

/// Longest server message carried into a [`ClientError::Server`].
const MAX_MESSAGE_CHARS: usize = 200;

/// Body the service attaches to failed requests. Failed decision queries carry
/// a fallback `llm_result` instead of an `error`.
#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    llm_result: Option<FallbackDecision>,
}

#[derive(Deserialize)]
struct FallbackDecision {
    #[serde(default)]
    thought: Option<String>,
}

/// Short, single-line message describing a failed response.
fn failure_message(status: reqwest::StatusCode, body: &[u8]) -> String {
    let payload = serde_json::from_slice::<ErrorPayload>(body).ok();
    let explained = payload.and_then(|p| {
        p.error
            .or_else(|| p.llm_result.and_then(|d| d.thought))
            .filter(|m| !m.trim().is_empty())
    });

    let message = match explained {
        Some(message) => message,
        None => {
            let text = String::from_utf8_lossy(body);
            let text = text.trim();
            if text.is_empty() {
                return status
                    .canonical_reason()
                    .unwrap_or("<unavailable>")
                    .to_string();
            }
            text.to_string()
        }
    };

    let line = message.split_whitespace().collect::<Vec<_>>().join(" ");
    if line.chars().count() > MAX_MESSAGE_CHARS {
        let mut cut: String = line.chars().take(MAX_MESSAGE_CHARS).collect();
        cut.push('…');
        cut
    } else {
        line
    }
}

/// Read the full body of a successful response, mapping error statuses to
/// [`ClientError::Server`].
async fn read_success_body(
    operation: &'static str,
    response: Response,
) -> Result<Vec<u8>, ClientError> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|source| network(operation, source))?;

    if status.is_success() {
        return Ok(body.to_vec());
    }

    Err(ClientError::Server {
        operation,
        status: status.as_u16(),
        message: failure_message(status, &body),
    })
}

async fn decode_json<T>(operation: &'static str, response: Response) -> Result<T, ClientError>
where
    T: DeserializeOwned,
{
    let body = read_success_body(operation, response).await?;
    serde_json::from_slice(&body).map_err(|e| ClientError::Protocol {
        operation,
        detail: e.to_string(),
    })
}
