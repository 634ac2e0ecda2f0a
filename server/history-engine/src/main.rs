//! Binary entrypoint: analyze one contributor and print a JSON report on stdout.
//!
//! Logs go to stderr (`RUST_LOG`, default `warn`). Failures print an
//! [`ErrorOutput`] JSON object on stderr and exit 1.

use clap::Parser;
use history_engine::cli::{self, Args};
use history_engine::{Config, EngineError, ErrorOutput, Repository};
use std::io::{self, Write};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn init_logging() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(io::stderr)
    .try_init();
}

fn fail(e: &EngineError) -> ! {
  let out = ErrorOutput::from(e);
  match serde_json::to_string(&out) {
    Ok(json) => eprintln!("{}", json),
    Err(_) => eprintln!("history-engine: {}", e),
  }
  std::process::exit(1);
}

#[tokio::main]
async fn main() {
  init_logging();
  let args = Args::parse();

  let mut config = Config::from_env();
  if let Some(dir) = &args.repo {
    config.repo_dir = dir.clone();
  }
  let repo = match Repository::open(config) {
    Ok(r) => Arc::new(r),
    Err(e) => fail(&e),
  };

  let cancel = CancellationToken::new();
  let on_signal = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupted; cancelling");
      on_signal.cancel();
    }
  });

  let report = match cli::dispatch(&args, repo, &cancel).await {
    Ok(r) => r,
    Err(e) => fail(&e),
  };

  let json = match serde_json::to_string_pretty(&report) {
    Ok(j) => j,
    Err(e) => fail(&EngineError::from(e)),
  };
  let mut out = io::stdout().lock();
  if let Err(e) = writeln!(out, "{}", json).and_then(|_| out.flush()) {
    fail(&EngineError::from(e));
  }
}
