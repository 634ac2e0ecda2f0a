//! Engine configuration with sane defaults.

use chrono::FixedOffset;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Tunables for git access, batching, caching and diff handling.
#[derive(Debug, Clone)]
pub struct Config {
  /// The only executable the engine will spawn.
  pub git_binary: String,
  /// Working directory for every git invocation.
  pub repo_dir: PathBuf,
  /// Per-commit lookups issued concurrently per batch.
  pub batch_size: usize,
  /// Pause between batches.
  pub batch_pause: Duration,
  /// Commit Detail Cache capacity (entries).
  pub cache_capacity: usize,
  /// Estimated total diff size above which review diffs are streamed.
  pub stream_threshold_bytes: u64,
  /// Diff scanner safety valve.
  pub max_hunk_lines: usize,
  /// Files listed in impact metrics.
  pub top_files: usize,
  /// Offset used for time-of-day buckets. `None` = this machine's local zone.
  pub utc_offset: Option<FixedOffset>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      git_binary: "git".to_string(),
      repo_dir: PathBuf::from("."),
      batch_size: 50,
      batch_pause: Duration::from_millis(100),
      cache_capacity: 1000,
      stream_threshold_bytes: 10 * 1024 * 1024,
      max_hunk_lines: risk_engine::diff::DEFAULT_MAX_HUNK_LINES,
      top_files: 5,
      utc_offset: None,
    }
  }
}

impl Config {
  /// Defaults overlaid with `GIT_CONTRIB_*` environment variables.
  pub fn from_env() -> Self {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
    let mut config = Self::default();
    if let Some(bin) = lookup("GIT_CONTRIB_GIT_BIN").filter(|b| !b.trim().is_empty()) {
      config.git_binary = bin;
    }
    if let Some(n) = parse_var(&lookup, "GIT_CONTRIB_BATCH_SIZE") {
      config.batch_size = n.max(1) as usize;
    }
    if let Some(n) = parse_var(&lookup, "GIT_CONTRIB_CACHE_SIZE") {
      config.cache_capacity = n.max(1) as usize;
    }
    if let Some(n) = parse_var(&lookup, "GIT_CONTRIB_STREAM_THRESHOLD") {
      config.stream_threshold_bytes = n;
    }
    config
  }
}

fn parse_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
  let raw = lookup(key)?;
  match raw.trim().parse::<u64>() {
    Ok(n) => Some(n),
    Err(e) => {
      warn!(key, value = %raw, error = %e, "ignoring unparsable setting");
      None
    }
  }
}
