//! Paged query execution: a driver that keeps re-issuing a query while the
//! data source hands back continuation tokens, merging every page into a
//! running snapshot.
//!
//! Exactly one executor call is outstanding per sequence; each cycle's
//! follow-up request depends on the previous response.

mod driver;
mod executor;
mod policy;
mod tracker;
mod types;

pub use driver::{CancelHook, ContinuationDriver, DriverError, SnapshotStream};
pub use executor::{terminal_response, QueryExecutor, ScriptedExecutor, ScriptedReply};
pub use policy::{ContinuationPolicy, TokenContinuation};
pub use tracker::Tracker;
pub use types::{
    DataQuery, LoadingState, QueryError, QueryRequest, QueryResponse, Snapshot, TimeRange,
};
