use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use pageflow_frames::{merge_frames, Frame};

use super::types::{QueryError, QueryResponse, Snapshot};

/// Bookkeeping for one paging sequence. Owned by the driver task and only
/// lent out (read-only) to the cancel hook.
#[derive(Debug, Clone)]
pub struct Tracker {
    request_id: String,
    cycle: u32,
    fetch_started_at: DateTime<Utc>,
    fetch_ended_at: Option<DateTime<Utc>>,
    frames: Arc<Vec<Frame>>,
}

impl Tracker {
    pub(crate) fn start(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            cycle: 1,
            fetch_started_at: Utc::now(),
            fetch_ended_at: None,
            frames: Arc::new(Vec::new()),
        }
    }

    pub(crate) fn finish_fetch(&mut self) {
        self.fetch_ended_at = Some(Utc::now());
    }

    pub(crate) fn next_cycle(&mut self, request_id: String) {
        self.request_id = request_id;
        self.cycle += 1;
        self.fetch_started_at = Utc::now();
        self.fetch_ended_at = None;
    }

    pub(crate) fn absorb(&mut self, incoming: Vec<Frame>) {
        self.frames = Arc::new(merge_frames(&self.frames, incoming));
    }

    pub(crate) fn snapshot(&self, is_done: bool) -> Snapshot {
        Snapshot {
            request_id: self.request_id.clone(),
            cycle: self.cycle,
            frames: Arc::clone(&self.frames),
            is_done,
            is_error: false,
            error: None,
        }
    }

    /// Error responses are forwarded as-is, without the accumulated frames.
    pub(crate) fn error_snapshot(&self, response: QueryResponse) -> Snapshot {
        let error = response
            .error
            .unwrap_or_else(|| QueryError::new("query failed"));
        Snapshot {
            request_id: self.request_id.clone(),
            cycle: self.cycle,
            frames: Arc::new(response.frames),
            is_done: true,
            is_error: true,
            error: Some(error),
        }
    }

    /// Id of the request currently (or most recently) in flight.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// 1-based number of the current cycle.
    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    pub fn fetch_started_at(&self) -> DateTime<Utc> {
        self.fetch_started_at
    }

    pub fn fetch_ended_at(&self) -> Option<DateTime<Utc>> {
        self.fetch_ended_at
    }

    pub fn is_in_flight(&self) -> bool {
        self.fetch_ended_at.is_none()
    }

    pub fn fetch_duration(&self) -> Option<Duration> {
        self.fetch_ended_at
            .map(|ended| ended - self.fetch_started_at)
    }

    pub fn frames(&self) -> &Arc<Vec<Frame>> {
        &self.frames
    }
}
