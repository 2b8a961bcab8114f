use std::collections::VecDeque;

use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::driver::DriverError;
use super::types::{QueryRequest, QueryResponse};

/// Single-shot query execution against a data source.
#[async_trait::async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run `request` and resolve with its terminal response.
    async fn query(&self, request: QueryRequest) -> anyhow::Result<QueryResponse>;
}

/// Drain a streaming transport down to its terminal response.
///
/// Stops at the first `Done`/`Error` response; if the stream ends first, the
/// last response seen is used.
pub async fn terminal_response<S>(request_id: &str, stream: S) -> Result<QueryResponse, DriverError>
where
    S: Stream<Item = anyhow::Result<QueryResponse>>,
{
    futures_util::pin_mut!(stream);
    let mut last: Option<QueryResponse> = None;
    while let Some(item) = stream.next().await {
        let response = item.map_err(DriverError::Executor)?;
        let terminal = response.state.is_terminal();
        last = Some(response);
        if terminal {
            break;
        }
    }
    last.ok_or_else(|| DriverError::EmptyResponse {
        request_id: request_id.to_string(),
    })
}

/// One scripted outcome for [`ScriptedExecutor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptedReply {
    Respond(QueryResponse),
    Fail(String),
    /// Never resolves.
    Hang,
}

/// Executor that replays a fixed list of replies in order and records every
/// request it receives. Used by the CLI replay command and by tests.
#[derive(Default)]
pub struct ScriptedExecutor {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<QueryRequest>>,
}

impl ScriptedExecutor {
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait::async_trait]
impl QueryExecutor for ScriptedExecutor {
    async fn query(&self, request: QueryRequest) -> anyhow::Result<QueryResponse> {
        let request_id = request.request_id.clone();
        self.requests.lock().await.push(request);
        let reply = self.replies.lock().await.pop_front();
        match reply {
            Some(ScriptedReply::Respond(mut response)) => {
                response.request_id = request_id;
                Ok(response)
            }
            Some(ScriptedReply::Fail(message)) => Err(anyhow::anyhow!(message)),
            Some(ScriptedReply::Hang) => std::future::pending().await,
            None => Err(anyhow::anyhow!(
                "no scripted reply left for request {request_id}"
            )),
        }
    }
}
