use std::sync::Arc;

use chrono::{DateTime, Utc};
use pageflow_frames::Frame;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// One target of a query request, correlated to result frames by `ref_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DataQuery {
    pub ref_id: String,
    /// Set on follow-up queries issued while paging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
    /// Source-specific query model, passed through untouched.
    #[serde(flatten)]
    pub model: Map<String, Value>,
}

impl DataQuery {
    pub fn new(ref_id: impl Into<String>) -> Self {
        Self {
            ref_id: ref_id.into(),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.model.insert(key.into(), value.into());
        self
    }

    pub fn with_continuation_token(mut self, token: impl Into<String>) -> Self {
        self.continuation_token = Some(token.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryRequest {
    pub request_id: String,
    pub targets: Vec<DataQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<TimeRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_data_points: Option<u32>,
}

impl QueryRequest {
    pub fn new(targets: Vec<DataQuery>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            targets,
            range: None,
            interval_ms: None,
            max_data_points: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_range(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.range = Some(TimeRange { from, to });
        self
    }

    pub fn target(&self, ref_id: &str) -> Option<&DataQuery> {
        self.targets.iter().find(|target| target.ref_id == ref_id)
    }

    /// Same request scope with new targets and a new id.
    pub fn continuation(&self, request_id: String, targets: Vec<DataQuery>) -> Self {
        Self {
            request_id,
            targets,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadingState {
    Loading,
    Streaming,
    #[default]
    Done,
    Error,
}

impl LoadingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadingState::Loading => "loading",
            LoadingState::Streaming => "streaming",
            LoadingState::Done => "done",
            LoadingState::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadingState::Done | LoadingState::Error)
    }
}

/// Query failure reported by the data source inside a response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            ref_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub frames: Vec<Frame>,
    #[serde(default)]
    pub state: LoadingState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<QueryError>,
}

impl QueryResponse {
    pub fn new(request_id: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self {
            request_id: request_id.into(),
            frames,
            state: LoadingState::Done,
            error: None,
        }
    }

    pub fn failed(request_id: impl Into<String>, error: QueryError) -> Self {
        Self {
            request_id: request_id.into(),
            frames: Vec::new(),
            state: LoadingState::Error,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.state == LoadingState::Error
    }
}

/// Running view of a paged query, emitted after every completed cycle.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Snapshot {
    /// Id of the request whose response produced this snapshot.
    pub request_id: String,
    pub cycle: u32,
    pub frames: Arc<Vec<Frame>>,
    pub is_done: bool,
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<QueryError>,
}

impl Snapshot {
    pub fn row_count(&self) -> usize {
        pageflow_frames::total_rows(&self.frames)
    }
}
