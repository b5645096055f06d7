use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::project_dirs;

/// Env var holding a filter directive, e.g. `YTSCRIPT_LOG=ytscript=trace`.
pub const LOG_ENV: &str = "YTSCRIPT_LOG";

/// Where log files go when no directory is given.
pub fn default_log_dir() -> Option<PathBuf> {
  project_dirs().map(|d| d.data_dir().join("logs"))
}

fn filter(verbose: bool) -> EnvFilter {
  let default = if verbose { "debug" } else { "info" };
  EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install a subscriber writing to a daily log file in `dir`.
///
/// The terminal belongs to the UI, so nothing goes to stdout or stderr. Keep the returned guard
/// alive for the program's lifetime; dropping it flushes buffered lines.
pub fn init(verbose: bool, dir: &Path) -> Result<WorkerGuard> {
  std::fs::create_dir_all(dir).with_context(|| format!("Failed to create log dir {}", dir.display()))?;
  let appender = tracing_appender::rolling::daily(dir, "ytscript.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::registry()
    .with(filter(verbose))
    .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false).with_target(false))
    .try_init()
    .context("Failed to install log subscriber")?;
  Ok(guard)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn log_dir_sits_under_data_dir() {
    if let (Some(dir), Some(dirs)) = (default_log_dir(), project_dirs()) {
      assert!(dir.starts_with(dirs.data_dir()));
      assert!(dir.ends_with("logs"));
    }
  }
}
