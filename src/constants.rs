//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!`, parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Playback clock
  pub clock_poll_ms: u64,
  pub autoscroll_cooldown_ms: u64,

  // Transcript parsing
  pub default_segment_secs: f64,
  pub preferred_languages: Vec<String>,

  // mpv IPC
  pub ipc_connect_timeout_ms: u64,
  pub ipc_retry_interval_ms: u64,
  pub ipc_response_timeout_ms: u64,
  pub ipc_max_lines: usize,

  // YouTube
  pub http_timeout_secs: u64,
  pub user_agent: String,
  pub accept_language: String,

  // UI
  pub error_dismiss_secs: u64,
}

impl Constants {
  pub fn clock_poll(&self) -> Duration {
    Duration::from_millis(self.clock_poll_ms)
  }

  pub fn autoscroll_cooldown(&self) -> Duration {
    Duration::from_millis(self.autoscroll_cooldown_ms)
  }

  pub fn ipc_response_timeout(&self) -> Duration {
    Duration::from_millis(self.ipc_response_timeout_ms)
  }
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time and covered by the test below.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn embedded_constants_parse() {
    let c = constants();
    assert_eq!(c.autoscroll_cooldown(), Duration::from_secs(2));
    assert!(c.clock_poll_ms > 0);
    assert!(c.default_segment_secs > 0.0);
    assert!(!c.preferred_languages.is_empty());
  }
}
