//! Structured error types for the history engine.
//!
//! Every variant maps to a machine-checkable [`ErrorCode`] and a JSON details payload.

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
  InvalidAuthor,
  InvalidDateFormat,
  InvalidDirectoryFilter,
  NotGitRepo,
  EmptyRepository,
  GitNotFound,
  GitOperationFailed,
  InvalidHashFormat,
  CommitNotFound,
  DiffStreamError,
  InvalidTrendPeriod,
  InvalidDateRange,
  Cancelled,
  Io,
  Json,
}

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("author must not be empty")]
  InvalidAuthor,

  #[error("invalid date expression {value:?}: {reason}")]
  InvalidDateFormat { value: String, reason: String },

  #[error("invalid directory filter: {reason}")]
  InvalidDirectoryFilter { reason: String },

  #[error("not a git repository: {path}")]
  NotGitRepo { path: String },

  #[error("repository has no commits")]
  EmptyRepository,

  #[error("git executable not found: {binary}")]
  GitNotFound { binary: String },

  #[error("git {command} failed ({status}): {stderr}")]
  GitOperationFailed {
    command: String,
    status: String,
    stderr: String,
  },

  #[error("invalid commit hash or reference: {value:?}")]
  InvalidHashFormat { value: String },

  #[error("commit not found: {reference}")]
  CommitNotFound { reference: String },

  #[error("diff stream: {0}")]
  DiffStream(String),

  #[error("invalid trend period {0:?}: expected daily|weekly|monthly|yearly")]
  InvalidTrendPeriod(String),

  #[error("invalid date range: {0}")]
  InvalidDateRange(String),

  #[error("operation cancelled")]
  Cancelled,

  #[error("io: {0}")]
  Io(#[from] std::io::Error),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

impl EngineError {
  pub fn invalid_date(value: &str, reason: &str) -> Self {
    Self::InvalidDateFormat {
      value: value.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn invalid_filter(reason: impl Into<String>) -> Self {
    Self::InvalidDirectoryFilter {
      reason: reason.into(),
    }
  }

  pub fn git_failed(command: &str, status: impl ToString, stderr: impl Into<String>) -> Self {
    Self::GitOperationFailed {
      command: command.to_string(),
      status: status.to_string(),
      stderr: stderr.into(),
    }
  }

  pub fn code(&self) -> ErrorCode {
    match self {
      Self::InvalidAuthor => ErrorCode::InvalidAuthor,
      Self::InvalidDateFormat { .. } => ErrorCode::InvalidDateFormat,
      Self::InvalidDirectoryFilter { .. } => ErrorCode::InvalidDirectoryFilter,
      Self::NotGitRepo { .. } => ErrorCode::NotGitRepo,
      Self::EmptyRepository => ErrorCode::EmptyRepository,
      Self::GitNotFound { .. } => ErrorCode::GitNotFound,
      Self::GitOperationFailed { .. } => ErrorCode::GitOperationFailed,
      Self::InvalidHashFormat { .. } => ErrorCode::InvalidHashFormat,
      Self::CommitNotFound { .. } => ErrorCode::CommitNotFound,
      Self::DiffStream(_) => ErrorCode::DiffStreamError,
      Self::InvalidTrendPeriod(_) => ErrorCode::InvalidTrendPeriod,
      Self::InvalidDateRange(_) => ErrorCode::InvalidDateRange,
      Self::Cancelled => ErrorCode::Cancelled,
      Self::Io(_) => ErrorCode::Io,
      Self::Json(_) => ErrorCode::Json,
    }
  }

  /// Structured payload for the offending input or failed command.
  pub fn details(&self) -> Value {
    match self {
      Self::InvalidDateFormat { value, reason } => json!({ "value": value, "reason": reason }),
      Self::InvalidDirectoryFilter { reason } => json!({ "reason": reason }),
      Self::NotGitRepo { path } => json!({ "path": path }),
      Self::GitNotFound { binary } => json!({ "binary": binary }),
      Self::GitOperationFailed {
        command,
        status,
        stderr,
      } => json!({ "command": command, "status": status, "stderr": stderr }),
      Self::InvalidHashFormat { value } => json!({ "value": value }),
      Self::CommitNotFound { reference } => json!({ "reference": reference }),
      Self::InvalidTrendPeriod(period) => json!({ "period": period }),
      _ => Value::Null,
    }
  }
}

/// Structured error output printed by the binary.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub code: ErrorCode,
  pub message: String,
  #[serde(skip_serializing_if = "Value::is_null")]
  pub details: Value,
}

impl From<&EngineError> for ErrorOutput {
  fn from(e: &EngineError) -> Self {
    Self {
      error: true,
      code: e.code(),
      message: e.to_string(),
      details: e.details(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn codes_and_details() {
    let e = EngineError::invalid_date("yesterday; rm", "unsafe character ';'");
    assert_eq!(e.code(), ErrorCode::InvalidDateFormat);
    assert_eq!(e.details()["value"], "yesterday; rm");

    let e = EngineError::git_failed("log", 128, "fatal: bad");
    assert_eq!(e.code(), ErrorCode::GitOperationFailed);
    assert!(e.to_string().contains("fatal: bad"));
  }

  #[test]
  fn error_output_serializes_code() {
    let out = ErrorOutput::from(&EngineError::InvalidTrendPeriod("hourly".into()));
    let json = serde_json::to_value(&out).unwrap();
    assert_eq!(json["code"], "InvalidTrendPeriod");
    assert_eq!(json["details"]["period"], "hourly");

    let out = ErrorOutput::from(&EngineError::InvalidAuthor);
    let json = serde_json::to_value(&out).unwrap();
    assert!(json.get("details").is_none());
  }
}
