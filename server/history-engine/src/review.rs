//! Risk-annotated review packets built from commit or branch diffs.
//!
//! Diffs are either read whole and scanned, or consumed chunk by chunk from the
//! git process when the estimated total size is large.

use risk_engine::{ChangeSet, DiffScanner, ReviewPacket};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::executor::GitStream;
use crate::repo::Repository;
use crate::types::{Commit, CommitReview};

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffMode {
  Buffered,
  Streaming,
}

/// Extrapolate one sampled diff to the whole set.
pub fn choose_mode(sample_bytes: u64, commit_count: usize, threshold: u64) -> DiffMode {
  if sample_bytes.saturating_mul(commit_count as u64) > threshold {
    DiffMode::Streaming
  } else {
    DiffMode::Buffered
  }
}

pub fn scan_text(text: &str, max_hunk_lines: usize) -> ChangeSet {
  let mut scanner = DiffScanner::with_max_hunk_lines(max_hunk_lines);
  scanner.feed(text.as_bytes());
  scanner.finish()
}

/// Drain a live diff through the scanner, checking `cancel` between chunks.
pub async fn categorize_stream(
  mut stream: GitStream,
  max_hunk_lines: usize,
  cancel: &CancellationToken,
) -> Result<ChangeSet, EngineError> {
  let mut scanner = DiffScanner::with_max_hunk_lines(max_hunk_lines);
  let mut buf = vec![0u8; CHUNK_SIZE];
  let mut total = 0usize;
  loop {
    if cancel.is_cancelled() {
      return Err(EngineError::Cancelled);
    }
    let n = stream.read_chunk(&mut buf).await?;
    if n == 0 {
      break;
    }
    total += n;
    scanner.feed(&buf[..n]);
  }
  stream.finish().await?;
  debug!(bytes = total, "diff stream drained");
  Ok(scanner.finish())
}

pub struct ReviewBuilder {
  repo: Arc<Repository>,
}

impl ReviewBuilder {
  pub fn new(repo: Arc<Repository>) -> Self {
    Self { repo }
  }

  /// One packet per commit, in the order given.
  pub async fn review_commits(
    &self,
    commits: &[Commit],
    cancel: &CancellationToken,
  ) -> Result<Vec<CommitReview>, EngineError> {
    let Some(first) = commits.first() else {
      return Ok(Vec::new());
    };
    let config = self.repo.config();
    let sample = self.repo.commit_diff_text(&first.hash).await?;
    let mode = choose_mode(
      sample.len() as u64,
      commits.len(),
      config.stream_threshold_bytes,
    );
    info!(?mode, commits = commits.len(), sample_bytes = sample.len(), "reviewing commits");

    let mut sample = Some(sample);
    let mut reviews = Vec::with_capacity(commits.len());
    for commit in commits {
      if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
      }
      let changes = match (mode, sample.take()) {
        (DiffMode::Buffered, Some(text)) => scan_text(&text, config.max_hunk_lines),
        (DiffMode::Buffered, None) => {
          let text = self.repo.commit_diff_text(&commit.hash).await?;
          scan_text(&text, config.max_hunk_lines)
        }
        (DiffMode::Streaming, _) => {
          let stream = self.repo.commit_diff_stream(&commit.hash).await?;
          categorize_stream(stream, config.max_hunk_lines, cancel).await?
        }
      };
      reviews.push(CommitReview {
        hash: commit.hash.clone(),
        subject: commit.subject.clone(),
        date: commit.date,
        packet: risk_engine::review(&changes),
      });
    }
    Ok(reviews)
  }

  /// Review `base...head`, always streamed.
  pub async fn review_range(
    &self,
    base: &str,
    head: &str,
    cancel: &CancellationToken,
  ) -> Result<ReviewPacket, EngineError> {
    let stream = self.repo.range_diff_stream(base, head).await?;
    let changes = categorize_stream(stream, self.repo.config().max_hunk_lines, cancel).await?;
    info!(base, head, files = changes.file_count(), "reviewed range");
    Ok(risk_engine::review(&changes))
  }
}
