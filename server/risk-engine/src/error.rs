//! Structured error types for the review engine binary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReviewError {
  #[error("io: {0}")]
  Io(#[from] std::io::Error),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}
