use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use futures_util::StreamExt;
use pageflow_core::continuation::{
    ContinuationDriver, QueryRequest, ScriptedExecutor, ScriptedReply, Snapshot, Tracker,
};
use pageflow_core::DriverConfig;
use serde::Deserialize;

use super::config::load_effective;

#[derive(Args, Clone)]
pub struct ReplayArgs {
    /// Fixture file: {"request": {...}, "pages": [{"respond": {...}} | {"fail": "..."} | "hang"]}
    #[arg(long)]
    pub fixture: PathBuf,
    /// TOML config file; defaults apply when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Override the request id recorded in the fixture
    #[arg(long)]
    pub request_id: Option<String>,
    /// Only print the final snapshot
    #[arg(long)]
    pub last: bool,
    /// Pretty-print snapshots
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Deserialize)]
struct Fixture {
    request: QueryRequest,
    pages: Vec<ScriptedReply>,
}

fn load_fixture(path: &Path) -> Result<Fixture> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading fixture {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing fixture {}", path.display()))
}

fn print_snapshot(snapshot: &Snapshot, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(snapshot)?
    } else {
        serde_json::to_string(snapshot)?
    };
    println!("{text}");
    Ok(())
}

pub async fn run(args: ReplayArgs) -> Result<()> {
    let fixture = load_fixture(&args.fixture)?;
    let config = match &args.config {
        Some(path) => load_effective(path)?.driver,
        None => DriverConfig::default().with_env_overrides(),
    };
    let mut request = fixture.request;
    if let Some(id) = args.request_id {
        request.request_id = id;
    }

    let executor = Arc::new(ScriptedExecutor::new(fixture.pages));
    let driver = ContinuationDriver::token_based(executor.clone(), config);
    let mut stream = driver.run(request, |tracker: &Tracker| {
        tracing::warn!(
            request_id = %tracker.request_id(),
            cycle = tracker.cycle(),
            "replay interrupted while a page was in flight"
        );
    });

    let mut last: Option<Snapshot> = None;
    loop {
        let item = tokio::select! {
            item = stream.next() => item,
            _ = tokio::signal::ctrl_c() => {
                stream.cancel();
                while !stream.is_finished() {
                    tokio::task::yield_now().await;
                }
                bail!("replay interrupted");
            }
        };
        let Some(item) = item else {
            break;
        };
        let snapshot = item?;
        if !args.last {
            print_snapshot(&snapshot, args.pretty)?;
        }
        last = Some(snapshot);
    }

    let calls = executor.call_count().await;
    match last {
        Some(snapshot) => {
            if args.last {
                print_snapshot(&snapshot, args.pretty)?;
            }
            if snapshot.is_error {
                let message = snapshot
                    .error
                    .as_ref()
                    .map(|error| error.message.as_str())
                    .unwrap_or("unknown error");
                bail!("query failed after {calls} request(s): {message}");
            }
            tracing::info!(
                calls,
                frames = snapshot.frames.len(),
                rows = snapshot.row_count(),
                "replay finished"
            );
            Ok(())
        }
        None => bail!("replay produced no snapshots"),
    }
}
