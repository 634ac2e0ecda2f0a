//! Command-line surface and top-level dispatch.

use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::EngineError;
use crate::metrics::MetricsAggregator;
use crate::repo::Repository;
use crate::resolver::{validate_date_expr, AuthorQuery, AuthorResolver};
use crate::review::ReviewBuilder;
use crate::scope::PathScope;
use crate::trends::{Period, TrendCalculator};
use crate::types::Report;

#[derive(Parser, Debug, Clone, Default)]
#[command(
  author,
  version,
  about = "One contributor's history from a git repository, as JSON",
  long_about = None
)]
pub struct Args {
  /// Author name or email to report on
  pub author: Option<String>,

  /// Repository to analyze
  #[arg(long)]
  pub repo: Option<PathBuf>,

  /// Only commits after this date expression (e.g. "2024-01-01", "2 weeks ago")
  #[arg(long)]
  pub since: Option<String>,

  /// Only commits before this date expression
  #[arg(long)]
  pub until: Option<String>,

  /// List known authors matching AUTHOR instead of reporting
  #[arg(long)]
  pub verify: bool,

  /// List every author in the repository
  #[arg(long)]
  pub list_authors: bool,

  /// Skip velocity/impact metrics
  #[arg(long)]
  pub no_metrics: bool,

  /// Trend period: daily, weekly, monthly or yearly
  #[arg(long)]
  pub trend: Option<String>,

  /// Number of trend periods to walk back
  #[arg(long, default_value_t = 1)]
  pub rolling: u32,

  /// Reference date for trends (YYYY-MM-DD or RFC 3339; default now)
  #[arg(long)]
  pub at: Option<String>,

  /// Compare the trend period at --at with the one containing this date
  #[arg(long)]
  pub compare: Option<String>,

  /// Attach a risk-annotated review of each commit's diff
  #[arg(long)]
  pub review: bool,

  /// Review the branch diff BASE...HEAD instead of the author's commits
  #[arg(long)]
  pub base: Option<String>,

  /// Head ref for --base
  #[arg(long, default_value = "HEAD")]
  pub head: String,

  /// Only count these directories (comma separated)
  #[arg(long)]
  pub include_dirs: Option<String>,

  /// Ignore these directories (comma separated)
  #[arg(long)]
  pub exclude_dirs: Option<String>,

  /// Do not run `git fetch --all` first
  #[arg(long)]
  pub skip_fetch: bool,
}

impl Args {
  pub fn scope(&self) -> Result<PathScope, EngineError> {
    let include = match &self.include_dirs {
      Some(raw) => PathScope::parse_list(raw)?,
      None => Vec::new(),
    };
    let exclude = match &self.exclude_dirs {
      Some(raw) => PathScope::parse_list(raw)?,
      None => Vec::new(),
    };
    PathScope::from_lists(&include, &exclude)
  }

  fn author(&self) -> Result<String, EngineError> {
    self
      .author
      .as_deref()
      .map(str::trim)
      .filter(|a| !a.is_empty())
      .map(String::from)
      .ok_or(EngineError::InvalidAuthor)
  }
}

/// `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp.
pub fn parse_reference_date(raw: &str) -> Result<DateTime<Utc>, EngineError> {
  let raw = raw.trim();
  if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
    return Ok(day.and_time(chrono::NaiveTime::default()).and_utc());
  }
  DateTime::parse_from_rfc3339(raw)
    .map(|d| d.with_timezone(&Utc))
    .map_err(|e| EngineError::invalid_date(raw, &e.to_string()))
}

/// `--since` after `--until` is an error when both are plain dates.
fn check_date_range(since: Option<&str>, until: Option<&str>) -> Result<(), EngineError> {
  for date in since.iter().chain(until.iter()) {
    validate_date_expr(date)?;
  }
  let parse = |s: &str| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok();
  if let (Some(s), Some(u)) = (since.and_then(parse), until.and_then(parse)) {
    if s > u {
      return Err(EngineError::InvalidDateRange(format!(
        "--since {} is after --until {}",
        s, u
      )));
    }
  }
  Ok(())
}

/// Run one invocation against `repo`.
pub async fn dispatch(
  args: &Args,
  repo: Arc<Repository>,
  cancel: &CancellationToken,
) -> Result<Report, EngineError> {
  let scope = args.scope()?;
  check_date_range(args.since.as_deref(), args.until.as_deref())?;
  let period = args.trend.as_deref().map(str::parse::<Period>).transpose()?;

  repo.validate().await?;
  if !args.skip_fetch {
    repo.fetch_all().await;
  }

  if args.list_authors {
    return Ok(Report {
      author: args.author.clone().unwrap_or_default(),
      authors: repo.list_authors().await?,
      ..Report::default()
    });
  }

  if let Some(base) = &args.base {
    let packet = ReviewBuilder::new(repo.clone())
      .review_range(base, &args.head, cancel)
      .await?;
    return Ok(Report {
      author: args.author.clone().unwrap_or_default(),
      branch_review: Some(packet),
      ..Report::default()
    });
  }

  let author = args.author()?;
  if args.verify {
    let authors = repo.verify_author(&author).await?;
    let message = authors
      .is_empty()
      .then(|| format!("no authors matching {:?}", author));
    return Ok(Report {
      author,
      message,
      authors,
      ..Report::default()
    });
  }

  let mut query = AuthorQuery::new(author.clone()).scope(scope.clone());
  query.since = args.since.clone();
  query.until = args.until.clone();
  let resolver = Arc::new(AuthorResolver::new(repo.clone()));

  if let Some(period) = period {
    let at = match &args.at {
      Some(raw) => Some(parse_reference_date(raw)?),
      None => None,
    };
    let calc = TrendCalculator::new(resolver);
    let trends = match &args.compare {
      Some(raw) => {
        let other = parse_reference_date(raw)?;
        let (a, b) = calc
          .compare_trends(&query, period, at.unwrap_or_else(Utc::now), other, cancel)
          .await?;
        vec![a, b]
      }
      None => {
        calc
          .get_rolling_trends(&query, period, args.rolling, at, cancel)
          .await?
      }
    };
    return Ok(Report {
      author,
      trends,
      ..Report::default()
    });
  }

  let commits = resolver.resolve_commits(&query, cancel).await?;
  if commits.is_empty() {
    info!(author = %author, "no commits found");
    return Ok(Report {
      message: Some(format!("no commits found for {}", author)),
      author,
      ..Report::default()
    });
  }

  let metrics = if args.no_metrics {
    None
  } else {
    Some(
      MetricsAggregator::new(repo.clone())
        .calculate_velocity_metrics(&commits, &scope, cancel)
        .await?,
    )
  };

  let review = if args.review {
    ReviewBuilder::new(repo.clone())
      .review_commits(&commits, cancel)
      .await?
  } else {
    Vec::new()
  };

  Ok(Report {
    author,
    commits,
    metrics,
    review,
    ..Report::default()
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_flags() {
    let args = Args::try_parse_from([
      "history-engine",
      "Jane Doe",
      "--since=2024-01-01",
      "--trend=weekly",
      "--rolling=4",
      "--exclude-dirs=docs,vendor",
      "--skip-fetch",
    ])
    .unwrap();
    assert_eq!(args.author.as_deref(), Some("Jane Doe"));
    assert_eq!(args.rolling, 4);
    assert!(args.skip_fetch);
    assert_eq!(
      args.scope().unwrap(),
      PathScope::Exclude(vec!["docs".into(), "vendor".into()])
    );
  }

  #[test]
  fn include_and_exclude_conflict() {
    let args = Args {
      include_dirs: Some("src".into()),
      exclude_dirs: Some("docs".into()),
      ..Args::default()
    };
    assert!(matches!(
      args.scope(),
      Err(EngineError::InvalidDirectoryFilter { .. })
    ));
  }

  #[test]
  fn date_range_checks() {
    assert!(check_date_range(Some("2024-01-01"), Some("2024-02-01")).is_ok());
    assert!(check_date_range(Some("2 weeks ago"), Some("yesterday")).is_ok());
    assert!(matches!(
      check_date_range(Some("2024-03-01"), Some("2024-02-01")),
      Err(EngineError::InvalidDateRange(_))
    ));
    assert!(matches!(
      check_date_range(Some("now;ls"), None),
      Err(EngineError::InvalidDateFormat { .. })
    ));
  }

  #[test]
  fn reference_dates() {
    let d = parse_reference_date("2024-01-15").unwrap();
    assert_eq!(d.to_rfc3339(), "2024-01-15T00:00:00+00:00");
    assert!(parse_reference_date("2024-01-15T08:00:00+02:00").is_ok());
    assert!(parse_reference_date("mid january").is_err());
  }
}
