use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use pageflow_frames::total_rows;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::executor::QueryExecutor;
use super::policy::{ContinuationPolicy, TokenContinuation};
use super::tracker::Tracker;
use super::types::{QueryRequest, Snapshot};
use crate::config::DriverConfig;

#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    #[error("query executor failed: {0:#}")]
    Executor(anyhow::Error),
    #[error("executor returned no response for request {request_id}")]
    EmptyResponse { request_id: String },
}

/// Called at most once, when a sequence is cancelled while a fetch is outstanding.
pub type CancelHook = Box<dyn FnOnce(&Tracker) + Send + 'static>;

type Item = Result<Snapshot, DriverError>;

/// Pages a query to completion against a [`QueryExecutor`], merging each
/// page into the frames accumulated so far.
#[derive(Clone)]
pub struct ContinuationDriver {
    executor: Arc<dyn QueryExecutor>,
    policy: Arc<dyn ContinuationPolicy>,
    config: DriverConfig,
}

impl ContinuationDriver {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        policy: Arc<dyn ContinuationPolicy>,
        config: DriverConfig,
    ) -> Self {
        Self {
            executor,
            policy,
            config,
        }
    }

    /// Driver that follows continuation tokens under `config.continuation_key`.
    pub fn token_based(executor: Arc<dyn QueryExecutor>, config: DriverConfig) -> Self {
        let policy = Arc::new(TokenContinuation::from_config(&config));
        Self::new(executor, policy, config)
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Start a paging sequence for `request` on the current tokio runtime.
    ///
    /// The returned stream yields one snapshot per completed cycle and ends
    /// after the final one. Dropping it, or calling
    /// [`SnapshotStream::cancel`], stops the sequence.
    pub fn run<F>(&self, request: QueryRequest, on_cancel: F) -> SnapshotStream
    where
        F: FnOnce(&Tracker) + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let sequence = Sequence {
            executor: Arc::clone(&self.executor),
            policy: Arc::clone(&self.policy),
            config: self.config.clone(),
            tx,
            on_cancel: Some(Box::new(on_cancel)),
        };
        let task = tokio::spawn(sequence.drive(request));
        SnapshotStream {
            inner: UnboundedReceiverStream::new(rx),
            task,
        }
    }
}

/// Consumer side of a running sequence.
pub struct SnapshotStream {
    inner: UnboundedReceiverStream<Item>,
    task: JoinHandle<()>,
}

impl SnapshotStream {
    /// Stop the sequence. Snapshots already delivered stay readable; nothing
    /// new is produced.
    pub fn cancel(&mut self) {
        self.inner.close();
    }

    /// Whether the driver task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Stream for SnapshotStream {
    type Item = Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

struct Sequence {
    executor: Arc<dyn QueryExecutor>,
    policy: Arc<dyn ContinuationPolicy>,
    config: DriverConfig,
    tx: mpsc::UnboundedSender<Item>,
    on_cancel: Option<CancelHook>,
}

impl Sequence {
    async fn drive(mut self, request: QueryRequest) {
        let mut tracker = Tracker::start(request.request_id.clone());
        let mut current = request.clone();
        loop {
            if self.tx.is_closed() {
                tracing::debug!(
                    request_id = %tracker.request_id(),
                    cycle = tracker.cycle(),
                    "consumer gone before query was issued"
                );
                return;
            }
            tracing::debug!(
                request_id = %tracker.request_id(),
                cycle = tracker.cycle(),
                targets = current.targets.len(),
                "issuing query"
            );
            // The query is polled first: the cancel branch can only win once
            // the executor has been entered.
            let outcome = tokio::select! {
                biased;
                result = self.executor.query(current) => Some(result),
                _ = self.tx.closed() => None,
            };
            let Some(result) = outcome else {
                self.cancelled(&tracker);
                return;
            };
            tracker.finish_fetch();

            let response = match result {
                Ok(response) => response,
                Err(err) => {
                    tracing::warn!(
                        request_id = %tracker.request_id(),
                        cycle = tracker.cycle(),
                        error = %err,
                        "query executor failed"
                    );
                    let _ = self.tx.send(Err(DriverError::Executor(err)));
                    return;
                }
            };

            if response.is_error() {
                tracing::warn!(
                    request_id = %tracker.request_id(),
                    cycle = tracker.cycle(),
                    error = response.error.as_ref().map(|e| e.message.as_str()).unwrap_or("unknown"),
                    "query returned an error response"
                );
                let _ = self.tx.send(Ok(tracker.error_snapshot(response)));
                return;
            }

            let next = self
                .policy
                .next_queries(&request, &response)
                .filter(|queries| !queries.is_empty());
            tracker.absorb(response.frames);

            let capped = next.is_some()
                && self
                    .config
                    .max_cycles
                    .is_some_and(|max| tracker.cycle() >= max);
            if capped {
                tracing::warn!(
                    request_id = %request.request_id,
                    cycles = tracker.cycle(),
                    "cycle limit reached; ending sequence with more data pending"
                );
            }
            let next = next.filter(|_| !capped);

            let snapshot = tracker.snapshot(next.is_none());
            tracing::debug!(
                request_id = %tracker.request_id(),
                cycle = tracker.cycle(),
                frames = snapshot.frames.len(),
                rows = snapshot.row_count(),
                is_done = snapshot.is_done,
                "cycle complete"
            );
            if self.tx.send(Ok(snapshot)).is_err() {
                tracing::debug!(request_id = %request.request_id, "consumer gone; stopping");
                return;
            }

            let Some(targets) = next else {
                tracing::info!(
                    request_id = %request.request_id,
                    cycles = tracker.cycle(),
                    frames = tracker.frames().len(),
                    rows = total_rows(tracker.frames()),
                    "query sequence complete"
                );
                return;
            };

            let request_id = format!(
                "{}{}{}",
                request.request_id,
                self.config.request_id_separator,
                tracker.cycle()
            );
            current = request.continuation(request_id.clone(), targets);
            tracker.next_cycle(request_id);
        }
    }

    fn cancelled(&mut self, tracker: &Tracker) {
        if !tracker.is_in_flight() {
            return;
        }
        tracing::warn!(
            request_id = %tracker.request_id(),
            cycle = tracker.cycle(),
            "query sequence cancelled while in flight"
        );
        if let Some(hook) = self.on_cancel.take() {
            hook(tracker);
        }
    }
}
