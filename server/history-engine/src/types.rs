//! Core types for the history engine (commit models + JSON report contracts).

use chrono::{DateTime, FixedOffset, NaiveDate};
use risk_engine::{CommitCategory, CommitTypeCounts, ReviewPacket};
use serde::Serialize;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Repository models
// ---------------------------------------------------------------------------

/// One commit attributed to the queried author. Identity is `hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
  pub hash: String,
  pub date: DateTime<FixedOffset>,
  pub subject: String,
  pub body: String,
}

impl Commit {
  /// Subject and body joined the way they appear in `git log`.
  pub fn message(&self) -> String {
    if self.body.is_empty() {
      self.subject.clone()
    } else {
      format!("{}\n\n{}", self.subject, self.body)
    }
  }
}

/// One distinct name/email pair from the repository history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
  pub name: String,
  pub email: String,
  pub commit_count: u64,
}

// ---------------------------------------------------------------------------
// Velocity metrics
// ---------------------------------------------------------------------------

/// Parsed `N files changed, N insertions(+), N deletions(-)` summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStats {
  pub files_changed: u64,
  pub insertions: u64,
  pub deletions: u64,
  pub total_changes: u64,
}

/// One row of a `--stat` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStat {
  pub path: String,
  pub changed_lines: u64,
}

/// File or directory with its share of the largest bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactEntry {
  pub path: String,
  pub changed_lines: u64,
  /// Relative to the largest entry of the same list, one decimal place.
  pub percentage_of_max: String,
}

/// Node of the grouped directory tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DirectoryNode {
  pub changed_lines: u64,
  /// Relative to the grand total of the flat list, one decimal place.
  pub percentage_of_total: String,
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub children: BTreeMap<String, DirectoryNode>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TimeDistribution {
  pub morning: f64,
  pub afternoon: f64,
  pub evening: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimeCounts {
  pub morning: u64,
  pub afternoon: u64,
  pub evening: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImpactMetrics {
  pub top_files: Vec<ImpactEntry>,
  pub directory_impact: Vec<ImpactEntry>,
  pub grouped_directories: BTreeMap<String, DirectoryNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeMetrics {
  pub type_breakdown: CommitTypeCounts,
  pub primary_contribution_type: CommitCategory,
}

impl Default for TypeMetrics {
  fn default() -> Self {
    Self {
      type_breakdown: CommitTypeCounts::default(),
      primary_contribution_type: CommitCategory::Unknown,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VelocityMetrics {
  pub total_lines_changed: u64,
  pub average_commit_size: u64,
  pub commits_per_day: f64,
  pub time_distribution: TimeDistribution,
  pub impact_metrics: ImpactMetrics,
  pub type_metrics: TypeMetrics,
}

// ---------------------------------------------------------------------------
// Trends
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendMetrics {
  pub commit_count: u64,
  pub time_counts: TimeCounts,
  pub time_distribution: TimeDistribution,
  pub commit_types: BTreeMap<CommitCategory, u64>,
}

/// Metrics for one calendar period; both bounds inclusive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPeriod {
  pub period: crate::trends::Period,
  pub start_date: NaiveDate,
  pub end_date: NaiveDate,
  pub metrics: TrendMetrics,
}

// ---------------------------------------------------------------------------
// Report (JSON contract: what the binary emits)
// ---------------------------------------------------------------------------

/// Review of one commit's diff.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitReview {
  pub hash: String,
  pub subject: String,
  pub date: DateTime<FixedOffset>,
  #[serde(flatten)]
  pub packet: ReviewPacket,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
  pub author: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub authors: Vec<Author>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub commits: Vec<Commit>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub metrics: Option<VelocityMetrics>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub trends: Vec<TrendPeriod>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub review: Vec<CommitReview>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub branch_review: Option<ReviewPacket>,
}
