use once_cell::sync::OnceCell;
use pageflow_core::util::{env_bool, env_string};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

static FILE_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Install the global subscriber: console output on stderr filtered by
/// `RUST_LOG` (default `info`), plus an optional rolling file that records
/// the continuation driver at debug level when `PAGEFLOW_LOG_ROLL=1`.
///
/// Calling it more than once is harmless; later calls are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter);
    let registry = tracing_subscriber::registry().with(console);

    if env_bool("PAGEFLOW_LOG_ROLL") == Some(true) {
        let dir = env_string("PAGEFLOW_LOG_DIR").unwrap_or_else(|| "logs".to_string());
        let prefix = env_string("PAGEFLOW_LOG_PREFIX").unwrap_or_else(|| "pageflow".into());
        let rotation = env_string("PAGEFLOW_LOG_ROTATION").unwrap_or_else(|| "daily".into());
        if std::fs::create_dir_all(&dir).is_err() {
            tracing::warn!(directory = %dir, "failed to create log directory");
        }
        let writer = match rotation.to_lowercase().as_str() {
            "hourly" => tracing_appender::rolling::hourly(&dir, &prefix),
            "minutely" => tracing_appender::rolling::minutely(&dir, &prefix),
            "never" => tracing_appender::rolling::never(&dir, &prefix),
            _ => tracing_appender::rolling::daily(&dir, &prefix),
        };
        let (nb, guard) = tracing_appender::non_blocking(writer);
        let _ = FILE_GUARD.set(guard);
        let targets = Targets::new()
            .with_target("pageflow_core", tracing::Level::DEBUG)
            .with_target("pageflow_frames", tracing::Level::DEBUG)
            .with_default(tracing::Level::INFO);
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(nb)
            .with_filter(targets);
        let _ = registry.with(file_layer).try_init();
    } else {
        let _ = registry.try_init();
    }
}
