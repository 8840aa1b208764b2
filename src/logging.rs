use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_ENV: &str = "STOCKSIGHT_LOG";
const LOG_FILE: &str = "stocksight.log";

/// Install the global subscriber.
///
/// Logs go to a daily-rolling file under `log_dir`; stdout is left for
/// command output. `verbose` mirrors them to stderr. The returned guard
/// flushes the file writer on drop and must live until exit.
pub fn init(log_dir: &Path, verbose: bool) -> Result<WorkerGuard> {
  std::fs::create_dir_all(log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE);
  let (file_writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

  let stderr = verbose.then(|| fmt::layer().with_writer(std::io::stderr).with_target(false));

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(file_writer).with_ansi(false))
    .with(stderr)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}
