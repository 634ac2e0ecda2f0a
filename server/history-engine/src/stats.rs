//! Per-commit statistics: `--stat` parsing and time-of-day bucketing.

use chrono::{DateTime, FixedOffset, Local, Timelike};
use regex::Regex;
use std::sync::LazyLock;

use crate::types::{DiffStats, FileStat, TimeCounts, TimeDistribution};

static FILES_RE: LazyLock<Option<Regex>> =
  LazyLock::new(|| Regex::new(r"(\d+) files? changed").ok());
static INSERTIONS_RE: LazyLock<Option<Regex>> =
  LazyLock::new(|| Regex::new(r"(\d+) insertions?\(\+\)").ok());
static DELETIONS_RE: LazyLock<Option<Regex>> =
  LazyLock::new(|| Regex::new(r"(\d+) deletions?\(-\)").ok());

fn matches(re: &Option<Regex>, line: &str) -> bool {
  re.as_ref().is_some_and(|re| re.is_match(line))
}

fn capture_u64(re: &Option<Regex>, line: &str) -> Option<u64> {
  re.as_ref()?
    .captures(line)?
    .get(1)?
    .as_str()
    .parse()
    .ok()
}

/// Parse the `N files changed, N insertions(+), N deletions(-)` line.
/// Missing clauses count as zero.
pub fn parse_stat_summary(text: &str) -> DiffStats {
  let summary = text.lines().rev().find(|line| {
    matches(&FILES_RE, line) || matches(&INSERTIONS_RE, line) || matches(&DELETIONS_RE, line)
  });
  let Some(line) = summary else {
    return DiffStats::default();
  };

  let insertions = capture_u64(&INSERTIONS_RE, line).unwrap_or(0);
  let deletions = capture_u64(&DELETIONS_RE, line).unwrap_or(0);
  DiffStats {
    files_changed: capture_u64(&FILES_RE, line).unwrap_or(0),
    insertions,
    deletions,
    total_changes: insertions + deletions,
  }
}

/// Parse the per-file rows of a `--stat` listing.
///
/// Binary rows count as zero lines; renames resolve to the new path.
pub fn parse_stat_files(text: &str) -> Vec<FileStat> {
  text
    .lines()
    .filter_map(|line| {
      let (path, rest) = line.rsplit_once('|')?;
      let path = path.trim();
      if path.is_empty() {
        return None;
      }
      let rest = rest.trim();
      let changed_lines = if rest.starts_with("Bin") {
        0
      } else {
        rest.split_whitespace().next()?.parse().ok()?
      };
      Some(FileStat {
        path: resolve_rename(path),
        changed_lines,
      })
    })
    .collect()
}

/// `dir/{old => new}/f.rs` → `dir/new/f.rs`; `a.rs => b.rs` → `b.rs`.
pub fn resolve_rename(path: &str) -> String {
  if let (Some(open), Some(close)) = (path.find('{'), path.rfind('}')) {
    if open < close {
      if let Some((_, new)) = path[open + 1..close].split_once(" => ") {
        let joined = format!("{}{}{}", &path[..open], new, &path[close + 1..]);
        return joined.replace("//", "/").trim_start_matches('/').to_string();
      }
    }
  }
  match path.split_once(" => ") {
    Some((_, new)) => new.to_string(),
    None => path.to_string(),
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDay {
  Morning,
  Afternoon,
  Evening,
}

/// `[5,12)` morning, `[12,17)` afternoon, everything else (wrapping midnight) evening.
pub fn time_of_day(hour: u32) -> TimeOfDay {
  match hour {
    5..=11 => TimeOfDay::Morning,
    12..=16 => TimeOfDay::Afternoon,
    _ => TimeOfDay::Evening,
  }
}

/// Hour of the commit in `offset`, or in this machine's local zone.
pub fn local_hour(date: &DateTime<FixedOffset>, offset: Option<FixedOffset>) -> u32 {
  match offset {
    Some(o) => date.with_timezone(&o).hour(),
    None => date.with_timezone(&Local).hour(),
  }
}

impl TimeCounts {
  pub fn record(&mut self, bucket: TimeOfDay) {
    match bucket {
      TimeOfDay::Morning => self.morning += 1,
      TimeOfDay::Afternoon => self.afternoon += 1,
      TimeOfDay::Evening => self.evening += 1,
    }
  }

  pub fn total(&self) -> u64 {
    self.morning + self.afternoon + self.evening
  }

  /// Percentages of `total`, one decimal place; zeros when `total` is 0.
  pub fn distribution(&self, total: u64) -> TimeDistribution {
    if total == 0 {
      return TimeDistribution::default();
    }
    let pct = |n: u64| round_to(n as f64 * 100.0 / total as f64, 1);
    TimeDistribution {
      morning: pct(self.morning),
      afternoon: pct(self.afternoon),
      evening: pct(self.evening),
    }
  }
}

/// Count commits per time-of-day bucket.
pub fn bucket_times<'a, I>(dates: I, offset: Option<FixedOffset>) -> TimeCounts
where
  I: IntoIterator<Item = &'a DateTime<FixedOffset>>,
{
  let mut counts = TimeCounts::default();
  for date in dates {
    counts.record(time_of_day(local_hour(date, offset)));
  }
  counts
}

pub fn round_to(value: f64, places: i32) -> f64 {
  let f = 10f64.powi(places);
  (value * f).round() / f
}

/// Percentage string with one decimal place; `0.0` when `denominator` is 0.
pub fn percent_string(numerator: u64, denominator: u64) -> String {
  if denominator == 0 {
    return "0.0".to_string();
  }
  format!("{:.1}", numerator as f64 * 100.0 / denominator as f64)
}
