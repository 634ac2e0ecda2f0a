//! Core types for the review engine (change sets, categories, risk tiers) and the
//! JSON contract of the binary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Change sets
// ---------------------------------------------------------------------------

/// Raw diff lines of one hunk. The first line is always the `@@ ... @@` marker.
pub type Hunk = Vec<String>;

/// How a file was touched by a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
  Added,
  Modified,
  Deleted,
  Renamed,
}

impl ChangeKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Added => "added",
      Self::Modified => "modified",
      Self::Deleted => "deleted",
      Self::Renamed => "renamed",
    }
  }
}

impl fmt::Display for ChangeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Per-file hunks bucketed by change kind. Renamed keys read `"{old} → {new}"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
  pub added: BTreeMap<String, Vec<Hunk>>,
  pub modified: BTreeMap<String, Vec<Hunk>>,
  pub deleted: BTreeMap<String, Vec<Hunk>>,
  pub renamed: BTreeMap<String, Vec<Hunk>>,
}

impl ChangeSet {
  pub fn bucket(&self, kind: ChangeKind) -> &BTreeMap<String, Vec<Hunk>> {
    match kind {
      ChangeKind::Added => &self.added,
      ChangeKind::Modified => &self.modified,
      ChangeKind::Deleted => &self.deleted,
      ChangeKind::Renamed => &self.renamed,
    }
  }

  pub fn bucket_mut(&mut self, kind: ChangeKind) -> &mut BTreeMap<String, Vec<Hunk>> {
    match kind {
      ChangeKind::Added => &mut self.added,
      ChangeKind::Modified => &mut self.modified,
      ChangeKind::Deleted => &mut self.deleted,
      ChangeKind::Renamed => &mut self.renamed,
    }
  }

  /// Every file entry as (kind, key, hunks), bucket by bucket.
  pub fn entries(&self) -> impl Iterator<Item = (ChangeKind, &String, &Vec<Hunk>)> {
    [
      ChangeKind::Added,
      ChangeKind::Modified,
      ChangeKind::Deleted,
      ChangeKind::Renamed,
    ]
    .into_iter()
    .flat_map(move |kind| self.bucket(kind).iter().map(move |(k, h)| (kind, k, h)))
  }

  pub fn file_count(&self) -> usize {
    self.added.len() + self.modified.len() + self.deleted.len() + self.renamed.len()
  }

  pub fn is_empty(&self) -> bool {
    self.file_count() == 0
  }
}

// ---------------------------------------------------------------------------
// Commit categories
// ---------------------------------------------------------------------------

/// Semantic commit category. Declaration order is the file-fallback scan order;
/// `Ord` is alphabetical by name, which is the tie-break order for aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommitCategory {
  Feature,
  BugFix,
  Refactor,
  Docs,
  Test,
  Config,
  Unknown,
}

impl CommitCategory {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Feature => "FEATURE",
      Self::BugFix => "BUG_FIX",
      Self::Refactor => "REFACTOR",
      Self::Docs => "DOCS",
      Self::Test => "TEST",
      Self::Config => "CONFIG",
      Self::Unknown => "UNKNOWN",
    }
  }
}

impl fmt::Display for CommitCategory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl PartialOrd for CommitCategory {
  fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for CommitCategory {
  fn cmp(&self, other: &Self) -> std::cmp::Ordering {
    self.as_str().cmp(other.as_str())
  }
}

/// Input to the classifier: a commit message plus the paths it touched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitSample {
  pub message: String,
  #[serde(default)]
  pub files: Vec<String>,
}

impl CommitSample {
  pub fn new(message: impl Into<String>, files: Vec<String>) -> Self {
    Self {
      message: message.into(),
      files,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
  pub category: CommitCategory,
  pub count: u64,
  /// Share of all category occurrences, one decimal place.
  pub percentage: f64,
}

/// Aggregated category counts over a commit set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitTypeCounts {
  /// Sorted by count desc, then category name.
  pub breakdown: Vec<CategoryCount>,
  pub primary: CommitCategory,
}

impl Default for CommitTypeCounts {
  fn default() -> Self {
    Self {
      breakdown: Vec::new(),
      primary: CommitCategory::Unknown,
    }
  }
}

impl CommitTypeCounts {
  pub fn count_of(&self, category: CommitCategory) -> u64 {
    self
      .breakdown
      .iter()
      .find(|c| c.category == category)
      .map(|c| c.count)
      .unwrap_or(0)
  }
}

// ---------------------------------------------------------------------------
// Risk
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
  Low,
  Medium,
  High,
}

impl RiskLevel {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Low => "LOW",
      Self::Medium => "MEDIUM",
      Self::High => "HIGH",
    }
  }
}

impl fmt::Display for RiskLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ---------------------------------------------------------------------------
// Output types (JSON contract: what the binary emits)
// ---------------------------------------------------------------------------

/// Review of one file inside a change set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReview {
  pub path: String,
  pub change: ChangeKind,
  pub risk: RiskLevel,
  pub hunk_count: usize,
  pub checklist: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RiskSummary {
  pub high: usize,
  pub medium: usize,
  pub low: usize,
}

impl RiskSummary {
  pub fn record(&mut self, level: RiskLevel) {
    match level {
      RiskLevel::High => self.high += 1,
      RiskLevel::Medium => self.medium += 1,
      RiskLevel::Low => self.low += 1,
    }
  }
}

/// Output: one JSON object per reviewed diff.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReviewPacket {
  pub files: Vec<FileReview>,
  pub summary: RiskSummary,
}
