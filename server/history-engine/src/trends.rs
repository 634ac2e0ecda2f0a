//! Trend Calculator: commit activity bucketed into calendar periods.
//!
//! Period boundaries are computed in UTC. Weeks run Sunday to Saturday.

use chrono::{DateTime, Datelike, Days, FixedOffset, Months, NaiveDate, NaiveTime, TimeDelta, Utc};
use risk_engine::change_type;
use risk_engine::{CommitCategory, CommitSample};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::EngineError;
use crate::resolver::{AuthorQuery, AuthorResolver};
use crate::stats::bucket_times;
use crate::types::{Commit, TrendMetrics, TrendPeriod};

const GIT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
  Daily,
  Weekly,
  Monthly,
  Yearly,
}

impl Period {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Daily => "daily",
      Self::Weekly => "weekly",
      Self::Monthly => "monthly",
      Self::Yearly => "yearly",
    }
  }
}

impl fmt::Display for Period {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Period {
  type Err = EngineError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "daily" => Ok(Self::Daily),
      "weekly" => Ok(Self::Weekly),
      "monthly" => Ok(Self::Monthly),
      "yearly" => Ok(Self::Yearly),
      _ => Err(EngineError::InvalidTrendPeriod(s.to_string())),
    }
  }
}

fn first_day(period: Period, day: NaiveDate) -> NaiveDate {
  match period {
    Period::Daily => day,
    Period::Weekly => day - Days::new(u64::from(day.weekday().num_days_from_sunday())),
    Period::Monthly => day.with_day(1).unwrap_or(day),
    Period::Yearly => NaiveDate::from_ymd_opt(day.year(), 1, 1).unwrap_or(day),
  }
}

fn next_first_day(period: Period, start: NaiveDate) -> NaiveDate {
  let next = match period {
    Period::Daily => start.checked_add_days(Days::new(1)),
    Period::Weekly => start.checked_add_days(Days::new(7)),
    Period::Monthly => start.checked_add_months(Months::new(1)),
    Period::Yearly => start.checked_add_months(Months::new(12)),
  };
  next.unwrap_or(NaiveDate::MAX)
}

fn midnight(day: NaiveDate) -> DateTime<Utc> {
  day.and_time(NaiveTime::default()).and_utc()
}

/// 00:00:00.000 UTC on the first day of the period containing `date`.
pub fn start_of(period: Period, date: DateTime<Utc>) -> DateTime<Utc> {
  midnight(first_day(period, date.date_naive()))
}

/// 23:59:59.999 UTC on the last day of the period containing `date`.
pub fn end_of(period: Period, date: DateTime<Utc>) -> DateTime<Utc> {
  let start = first_day(period, date.date_naive());
  midnight(next_first_day(period, start)) - TimeDelta::milliseconds(1)
}

/// The same instant one period earlier.
pub fn step_back(period: Period, date: DateTime<Utc>) -> Result<DateTime<Utc>, EngineError> {
  let prev = match period {
    Period::Daily => date.checked_sub_days(Days::new(1)),
    Period::Weekly => date.checked_sub_days(Days::new(7)),
    Period::Monthly => date.checked_sub_months(Months::new(1)),
    Period::Yearly => date.checked_sub_months(Months::new(12)),
  };
  prev.ok_or_else(|| EngineError::InvalidDateRange(format!("cannot step back from {}", date)))
}

/// Time-of-day and commit-type counts for one period's commits.
///
/// Only subjects are classified; no file context at this granularity.
pub fn trend_metrics(commits: &[Commit], offset: Option<FixedOffset>) -> TrendMetrics {
  let count = commits.len() as u64;
  let time_counts = bucket_times(commits.iter().map(|c| &c.date), offset);

  let mut commit_types: BTreeMap<CommitCategory, u64> = BTreeMap::new();
  for commit in commits {
    let tags = change_type::categorize(&CommitSample::new(commit.subject.clone(), Vec::new()));
    if tags.is_empty() {
      *commit_types.entry(CommitCategory::Unknown).or_insert(0) += 1;
    }
    for tag in tags {
      *commit_types.entry(tag).or_insert(0) += 1;
    }
  }

  TrendMetrics {
    commit_count: count,
    time_counts,
    time_distribution: time_counts.distribution(count),
    commit_types,
  }
}

pub struct TrendCalculator {
  resolver: Arc<AuthorResolver>,
  offset: Option<FixedOffset>,
}

impl TrendCalculator {
  pub fn new(resolver: Arc<AuthorResolver>) -> Self {
    let offset = resolver.repo().config().utc_offset;
    Self { resolver, offset }
  }

  /// Metrics for the period containing `date`.
  ///
  /// `query.since`/`query.until` are replaced by the period window.
  pub async fn get_trends(
    &self,
    query: &AuthorQuery,
    period: Period,
    date: DateTime<Utc>,
    cancel: &CancellationToken,
  ) -> Result<TrendPeriod, EngineError> {
    let start = start_of(period, date);
    let end = end_of(period, date);
    let window = query
      .clone()
      .since(start.format(GIT_DATE_FORMAT).to_string())
      .until(end.format(GIT_DATE_FORMAT).to_string());

    let mut commits = self.resolver.resolve_commits(&window, cancel).await?;
    commits.retain(|c| {
      let at = c.date.with_timezone(&Utc);
      at >= start && at <= end
    });
    debug!(%period, start = %start, commits = commits.len(), "trend period");

    Ok(TrendPeriod {
      period,
      start_date: start.date_naive(),
      end_date: end.date_naive(),
      metrics: trend_metrics(&commits, self.offset),
    })
  }

  /// `count` consecutive periods walking back from `end` (default now), newest first.
  pub async fn get_rolling_trends(
    &self,
    query: &AuthorQuery,
    period: Period,
    count: u32,
    end: Option<DateTime<Utc>>,
    cancel: &CancellationToken,
  ) -> Result<Vec<TrendPeriod>, EngineError> {
    if count == 0 {
      return Err(EngineError::InvalidDateRange(
        "rolling trend count must be at least 1".into(),
      ));
    }
    let mut date = end.unwrap_or_else(Utc::now);
    let mut periods = Vec::with_capacity(count as usize);
    for i in 0..count {
      if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
      }
      periods.push(self.get_trends(query, period, date, cancel).await?);
      if i + 1 < count {
        date = step_back(period, date)?;
      }
    }
    Ok(periods)
  }

  /// Two independent periods, for the caller to diff.
  pub async fn compare_trends(
    &self,
    query: &AuthorQuery,
    period: Period,
    a: DateTime<Utc>,
    b: DateTime<Utc>,
    cancel: &CancellationToken,
  ) -> Result<(TrendPeriod, TrendPeriod), EngineError> {
    let first = self.get_trends(query, period, a, cancel).await?;
    let second = self.get_trends(query, period, b, cancel).await?;
    Ok((first, second))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CommitCache;
  use crate::config::Config;
  use crate::executor::fake::ScriptedGit;
  use crate::repo::Repository;
  use chrono::TimeZone;
  use std::time::Duration;

  fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
  }

  fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn calculator(log: &'static str) -> TrendCalculator {
    let git = ScriptedGit::new(move |args| match args[0].as_str() {
      "log" => Ok(log.to_string()),
      "show" => {
        let subject = match args.last().map(String::as_str) {
          Some("aaaaaaa1") => "feat: search",
          Some("bbbbbbb2") => "fix: search crash",
          _ => "tidy",
        };
        Ok(format!("{}\u{1f}", subject))
      }
      _ => Ok(String::new()),
    });
    let config = Config {
      batch_pause: Duration::ZERO,
      utc_offset: FixedOffset::east_opt(0),
      ..Config::default()
    };
    let repo = Repository::new(Arc::new(git), Arc::new(CommitCache::new(50)), config);
    TrendCalculator::new(Arc::new(AuthorResolver::new(Arc::new(repo))))
  }

  #[test]
  fn period_parsing() {
    assert_eq!("Monthly".parse::<Period>().unwrap(), Period::Monthly);
    let err = "hourly".parse::<Period>().unwrap_err();
    assert!(matches!(err, EngineError::InvalidTrendPeriod(_)));
  }

  #[test]
  fn boundaries() {
    // 2024-03-13 is a Wednesday.
    let d = at(2024, 3, 13);
    assert_eq!(start_of(Period::Daily, d).date_naive(), day(2024, 3, 13));
    assert_eq!(start_of(Period::Weekly, d).date_naive(), day(2024, 3, 10));
    assert_eq!(end_of(Period::Weekly, d).date_naive(), day(2024, 3, 16));
    assert_eq!(end_of(Period::Monthly, d).date_naive(), day(2024, 3, 31));
    assert_eq!(start_of(Period::Yearly, d).date_naive(), day(2024, 1, 1));
    assert_eq!(end_of(Period::Yearly, d).date_naive(), day(2024, 12, 31));

    let end = end_of(Period::Daily, d);
    assert_eq!(end.format("%H:%M:%S%.3f").to_string(), "23:59:59.999");
    assert_eq!(end_of(Period::Monthly, at(2024, 2, 10)).date_naive(), day(2024, 2, 29));
  }

  #[test]
  fn sunday_starts_its_own_week() {
    let sunday = at(2024, 3, 10);
    assert_eq!(start_of(Period::Weekly, sunday).date_naive(), day(2024, 3, 10));
  }

  #[test]
  fn metrics_without_files() {
    let utc = FixedOffset::east_opt(0).unwrap();
    let commits = vec![
      Commit {
        hash: "a".into(),
        date: utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap(),
        subject: "feat: x".into(),
        body: String::new(),
      },
      Commit {
        hash: "b".into(),
        date: utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap(),
        subject: "wip".into(),
        body: String::new(),
      },
    ];
    let m = trend_metrics(&commits, Some(utc));
    assert_eq!(m.commit_count, 2);
    assert_eq!(m.time_counts.morning, 1);
    assert_eq!(m.time_counts.evening, 1);
    assert_eq!(m.time_distribution.morning, 50.0);
    assert_eq!(m.commit_types[&CommitCategory::Feature], 1);
    assert_eq!(m.commit_types[&CommitCategory::Unknown], 1);
  }

  #[tokio::test]
  async fn rolling_monthly_walks_back() {
    let calc = calculator(
      "aaaaaaa1\t2024-01-20T10:00:00+00:00\nbbbbbbb2\t2023-12-05T15:00:00+00:00\n",
    );
    let periods = calc
      .get_rolling_trends(
        &AuthorQuery::new("jane"),
        Period::Monthly,
        2,
        Some(at(2024, 1, 15)),
        &CancellationToken::new(),
      )
      .await
      .unwrap();

    let spans: Vec<(NaiveDate, NaiveDate)> =
      periods.iter().map(|p| (p.start_date, p.end_date)).collect();
    assert_eq!(
      spans,
      vec![
        (day(2024, 1, 1), day(2024, 1, 31)),
        (day(2023, 12, 1), day(2023, 12, 31)),
      ]
    );
    assert_eq!(periods[0].metrics.commit_count, 1);
    assert_eq!(periods[0].metrics.commit_types[&CommitCategory::Feature], 1);
    assert_eq!(periods[1].metrics.commit_types[&CommitCategory::BugFix], 1);
  }

  #[tokio::test]
  async fn zero_count_is_invalid_range() {
    let calc = calculator("");
    let err = calc
      .get_rolling_trends(
        &AuthorQuery::new("jane"),
        Period::Daily,
        0,
        None,
        &CancellationToken::new(),
      )
      .await
      .unwrap_err();
    assert!(matches!(err, EngineError::InvalidDateRange(_)));
  }

  #[tokio::test]
  async fn compare_returns_both_periods() {
    let calc = calculator("aaaaaaa1\t2024-01-20T10:00:00+00:00\n");
    let (a, b) = calc
      .compare_trends(
        &AuthorQuery::new("jane"),
        Period::Yearly,
        at(2024, 6, 1),
        at(2023, 6, 1),
        &CancellationToken::new(),
      )
      .await
      .unwrap();
    assert_eq!(a.metrics.commit_count, 1);
    assert_eq!(b.metrics.commit_count, 0);
    assert_eq!(b.start_date, day(2023, 1, 1));
  }

  #[tokio::test]
  async fn cancelled_rolling_stops() {
    let calc = calculator("");
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = calc
      .get_rolling_trends(&AuthorQuery::new("jane"), Period::Weekly, 3, None, &cancel)
      .await
      .unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
  }
}
