//! Metrics Aggregator: velocity, impact, time-of-day and commit-type metrics.
//!
//! [`MetricsAggregator`] does the I/O (batched `--stat` lookups through the
//! cache); [`MetricsAccumulator`] is the pure fold over the results so the
//! arithmetic can be tested without git.

use chrono::{DateTime, FixedOffset};
use risk_engine::change_type;
use risk_engine::CommitSample;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::batch::for_each_batch;
use crate::error::EngineError;
use crate::repo::Repository;
use crate::scope::{is_source_file, PathScope};
use crate::stats::{bucket_times, parse_stat_files, parse_stat_summary, percent_string, round_to};
use crate::types::{Commit, DirectoryNode, ImpactEntry, ImpactMetrics, TypeMetrics, VelocityMetrics};

const MS_PER_DAY: f64 = 86_400_000.0;

/// Directory of a file path; `.` for files at the repository root.
pub fn dir_of(path: &str) -> &str {
  match path.rsplit_once('/') {
    Some((dir, _)) if !dir.is_empty() => dir,
    _ => ".",
  }
}

/// Fold one commit at a time, then [`finish`](Self::finish).
#[derive(Debug, Default)]
pub struct MetricsAccumulator {
  commit_count: u64,
  total_lines: u64,
  dates: Vec<DateTime<FixedOffset>>,
  file_totals: HashMap<String, u64>,
  /// First-seen order, for a stable tie order among equal files.
  file_order: Vec<String>,
  dir_totals: BTreeMap<String, u64>,
  samples: Vec<CommitSample>,
}

impl MetricsAccumulator {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add one commit and its `--stat` text.
  ///
  /// The line total comes from the summary row and ignores scope; per-file and
  /// per-directory totals only count in-scope source files.
  pub fn add(&mut self, commit: &Commit, stat_text: &str, scope: &PathScope) {
    self.commit_count += 1;
    self.total_lines += parse_stat_summary(stat_text).total_changes;
    self.dates.push(commit.date);

    let mut files = Vec::new();
    for stat in parse_stat_files(stat_text) {
      if !scope.contains(&stat.path) || !is_source_file(&stat.path) {
        continue;
      }
      *self
        .dir_totals
        .entry(dir_of(&stat.path).to_string())
        .or_insert(0) += stat.changed_lines;
      match self.file_totals.get_mut(&stat.path) {
        Some(total) => *total += stat.changed_lines,
        None => {
          self.file_totals.insert(stat.path.clone(), stat.changed_lines);
          self.file_order.push(stat.path.clone());
        }
      }
      files.push(stat.path);
    }
    self
      .samples
      .push(CommitSample::new(commit.subject.clone(), files));
  }

  pub fn finish(self, top_files: usize, offset: Option<FixedOffset>) -> VelocityMetrics {
    if self.commit_count == 0 {
      return VelocityMetrics::default();
    }
    let count = self.commit_count;

    let span_days = match (self.dates.iter().min(), self.dates.iter().max()) {
      (Some(first), Some(last)) => {
        let ms = (*last - *first).num_milliseconds() as f64;
        (ms / MS_PER_DAY).ceil().max(1.0)
      }
      _ => 1.0,
    };

    let mut files: Vec<(String, u64)> = self
      .file_order
      .iter()
      .map(|p| (p.clone(), self.file_totals.get(p).copied().unwrap_or(0)))
      .collect();
    files.sort_by(|a, b| b.1.cmp(&a.1));
    files.truncate(top_files);

    let mut dirs: Vec<(String, u64)> = self.dir_totals.into_iter().collect();
    dirs.sort_by(|a, b| b.1.cmp(&a.1));

    let directory_impact = relative_to_max(dirs);
    let grouped_directories = group_paths(&directory_impact);
    let type_breakdown = change_type::aggregate(&self.samples);

    VelocityMetrics {
      total_lines_changed: self.total_lines,
      average_commit_size: (self.total_lines as f64 / count as f64).round() as u64,
      commits_per_day: round_to(count as f64 / span_days, 2),
      time_distribution: bucket_times(&self.dates, offset).distribution(count),
      impact_metrics: ImpactMetrics {
        top_files: relative_to_max(files),
        directory_impact,
        grouped_directories,
      },
      type_metrics: TypeMetrics {
        primary_contribution_type: type_breakdown.primary,
        type_breakdown,
      },
    }
  }
}

/// Entries with their share of the largest one (input already sorted desc).
fn relative_to_max(sorted: Vec<(String, u64)>) -> Vec<ImpactEntry> {
  let max = sorted.first().map(|(_, n)| *n).unwrap_or(0);
  sorted
    .into_iter()
    .map(|(path, changed_lines)| ImpactEntry {
      percentage_of_max: percent_string(changed_lines, max),
      path,
      changed_lines,
    })
    .collect()
}

/// Fold a flat directory list into a tree keyed by path segment.
///
/// Every node carries the total of everything beneath it, so the top-level
/// nodes sum to the flat list's total. Percentages are of that grand total.
pub fn group_paths(entries: &[ImpactEntry]) -> BTreeMap<String, DirectoryNode> {
  let grand_total: u64 = entries.iter().map(|e| e.changed_lines).sum();
  let mut root: BTreeMap<String, DirectoryNode> = BTreeMap::new();

  for entry in entries {
    let mut level = &mut root;
    for segment in entry.path.split('/').filter(|s| !s.is_empty()) {
      let node = level.entry(segment.to_string()).or_default();
      node.changed_lines += entry.changed_lines;
      level = &mut node.children;
    }
  }

  fill_percentages(&mut root, grand_total);
  root
}

fn fill_percentages(level: &mut BTreeMap<String, DirectoryNode>, grand_total: u64) {
  for node in level.values_mut() {
    node.percentage_of_total = percent_string(node.changed_lines, grand_total);
    fill_percentages(&mut node.children, grand_total);
  }
}

pub struct MetricsAggregator {
  repo: Arc<Repository>,
}

impl MetricsAggregator {
  pub fn new(repo: Arc<Repository>) -> Self {
    Self { repo }
  }

  /// Metrics over `commits`; an empty list yields the zeroed record.
  pub async fn calculate_velocity_metrics(
    &self,
    commits: &[Commit],
    scope: &PathScope,
    cancel: &CancellationToken,
  ) -> Result<VelocityMetrics, EngineError> {
    if commits.is_empty() {
      return Ok(VelocityMetrics::default());
    }
    let config = self.repo.config();
    let repo = &self.repo;
    let items: Vec<&Commit> = commits.iter().collect();
    let stats = for_each_batch(
      items,
      config.batch_size,
      config.batch_pause,
      cancel,
      |commit| async move { repo.commit_stat(&commit.hash).await },
    )
    .await?;

    let mut acc = MetricsAccumulator::new();
    for (commit, stat) in commits.iter().zip(stats) {
      acc.add(commit, &stat?, scope);
    }
    let metrics = acc.finish(config.top_files, config.utc_offset);
    info!(
      commits = commits.len(),
      lines = metrics.total_lines_changed,
      "velocity metrics computed"
    );
    Ok(metrics)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;
  use risk_engine::CommitCategory;

  fn commit(hash: &str, subject: &str, day: u32, hour: u32) -> Commit {
    let utc = FixedOffset::east_opt(0).unwrap();
    Commit {
      hash: hash.into(),
      date: utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap(),
      subject: subject.into(),
      body: String::new(),
    }
  }

  const STAT_A: &str = "\
 src/api/users.rs | 30 +++++++++++++++---------------
 src/lib.rs       | 10 +++++-----
 README.md        |  5 +++--
 Cargo.lock       | 40 ++++++++++++++++++++--------------------
 4 files changed, 50 insertions(+), 35 deletions(-)
";

  const STAT_B: &str = "\
 src/api/users.rs | 6 +++---
 tests/api.rs     | 4 ++++
 2 files changed, 7 insertions(+), 3 deletions(-)
";

  fn utc() -> Option<FixedOffset> {
    FixedOffset::east_opt(0)
  }

  #[test]
  fn empty_input_is_zeroed() {
    let m = MetricsAccumulator::new().finish(5, utc());
    assert_eq!(m.total_lines_changed, 0);
    assert_eq!(m.average_commit_size, 0);
    assert_eq!(m.commits_per_day, 0.0);
    assert_eq!(m.type_metrics.primary_contribution_type, CommitCategory::Unknown);
    assert!(m.impact_metrics.top_files.is_empty());
  }

  #[test]
  fn totals_files_and_directories() {
    let mut acc = MetricsAccumulator::new();
    acc.add(&commit("a1", "feat: users api", 1, 10), STAT_A, &PathScope::All);
    acc.add(&commit("b2", "fix: users api", 3, 10), STAT_B, &PathScope::All);
    let m = acc.finish(5, utc());

    assert_eq!(m.total_lines_changed, 95);
    assert_eq!(m.average_commit_size, 48);
    assert_eq!(m.commits_per_day, 1.0);

    let top: Vec<(&str, u64)> = m
      .impact_metrics
      .top_files
      .iter()
      .map(|e| (e.path.as_str(), e.changed_lines))
      .collect();
    assert_eq!(
      top,
      vec![("src/api/users.rs", 36), ("src/lib.rs", 10), ("README.md", 5), ("tests/api.rs", 4)]
    );
    assert_eq!(m.impact_metrics.top_files[0].percentage_of_max, "100.0");

    let dirs: Vec<(&str, &str)> = m
      .impact_metrics
      .directory_impact
      .iter()
      .map(|e| (e.path.as_str(), e.percentage_of_max.as_str()))
      .collect();
    assert_eq!(
      dirs,
      vec![("src/api", "100.0"), ("src", "27.8"), (".", "13.9"), ("tests", "11.1")]
    );
  }

  #[test]
  fn include_scope_filters_files_not_total() {
    let scope = PathScope::from_lists(&["tests".to_string()], &[]).unwrap();
    let mut acc = MetricsAccumulator::new();
    acc.add(&commit("b2", "test: api", 3, 14), STAT_B, &scope);
    let m = acc.finish(5, utc());
    assert_eq!(m.total_lines_changed, 10);
    assert_eq!(m.impact_metrics.top_files.len(), 1);
    assert_eq!(m.impact_metrics.top_files[0].path, "tests/api.rs");
  }

  #[test]
  fn grouped_tree_preserves_total() {
    let mut acc = MetricsAccumulator::new();
    acc.add(&commit("a1", "feat: x", 1, 10), STAT_A, &PathScope::All);
    acc.add(&commit("b2", "fix: y", 2, 10), STAT_B, &PathScope::All);
    let m = acc.finish(5, utc());

    let flat: u64 = m.impact_metrics.directory_impact.iter().map(|e| e.changed_lines).sum();
    let grouped: u64 = m
      .impact_metrics
      .grouped_directories
      .values()
      .map(|n| n.changed_lines)
      .sum();
    assert_eq!(flat, grouped);

    let src = &m.impact_metrics.grouped_directories["src"];
    assert_eq!(src.changed_lines, 46);
    assert_eq!(src.children["api"].changed_lines, 36);
    assert_eq!(src.percentage_of_total, percent_string(46, flat));
  }

  #[test]
  fn type_metrics_use_subjects_and_files() {
    let mut acc = MetricsAccumulator::new();
    acc.add(&commit("a1", "feat: users api", 1, 10), STAT_A, &PathScope::All);
    acc.add(&commit("b2", "feat: more", 1, 11), STAT_B, &PathScope::All);
    let m = acc.finish(5, utc());
    assert_eq!(m.type_metrics.primary_contribution_type, CommitCategory::Feature);
    assert_eq!(m.type_metrics.type_breakdown.count_of(CommitCategory::Feature), 2);
    assert_eq!(m.type_metrics.type_breakdown.count_of(CommitCategory::Test), 1);
  }

  #[test]
  fn same_day_span_counts_as_one_day() {
    let mut acc = MetricsAccumulator::new();
    for (i, h) in [9, 10, 11].iter().enumerate() {
      acc.add(&commit(&format!("c{}", i), "chore", 5, *h), "", &PathScope::All);
    }
    let m = acc.finish(5, utc());
    assert_eq!(m.commits_per_day, 3.0);
    assert_eq!(m.time_distribution.morning, 100.0);
  }

  #[test]
  fn root_files_group_under_dot() {
    assert_eq!(dir_of("README.md"), ".");
    assert_eq!(dir_of("a/b/c.rs"), "a/b");
  }
}
