//! Author Resolver: free-text author query → the commits that person made.
//!
//! Author metadata is inconsistent across a history (middle names, doubled
//! spaces, case), so matching falls back through progressively looser
//! patterns until one yields commits.

use chrono::{DateTime, FixedOffset};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::batch::for_each_batch;
use crate::error::EngineError;
use crate::repo::Repository;
use crate::scope::PathScope;
use crate::types::Commit;

/// Characters never allowed in a date expression.
const UNSAFE_DATE_CHARS: &[char] = &['<', '>', '|', '&', ';', '$', '`'];

/// ERE metacharacters escaped for an exact match.
const ERE_META: &[char] = &['\\', '.', '[', ']', '(', ')', '*', '+', '?', '{', '}', '|', '^', '$'];

/// Everything needed to select one contributor's commits.
#[derive(Debug, Clone, Default)]
pub struct AuthorQuery {
  pub author: String,
  /// Any git date expression (`2024-01-01`, `2 weeks ago`, `last monday`).
  pub since: Option<String>,
  pub until: Option<String>,
  pub scope: PathScope,
}

impl AuthorQuery {
  pub fn new(author: impl Into<String>) -> Self {
    Self {
      author: author.into(),
      ..Self::default()
    }
  }

  pub fn since(mut self, since: impl Into<String>) -> Self {
    self.since = Some(since.into());
    self
  }

  pub fn until(mut self, until: impl Into<String>) -> Self {
    self.until = Some(until.into());
    self
  }

  pub fn scope(mut self, scope: PathScope) -> Self {
    self.scope = scope;
    self
  }
}

/// One `--author` attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorPattern {
  pub regex: String,
  pub ignore_case: bool,
}

/// Escape a literal for `git log --extended-regexp`.
pub fn escape_ere(literal: &str) -> String {
  let mut out = String::with_capacity(literal.len());
  for c in literal.chars() {
    if ERE_META.contains(&c) {
      out.push('\\');
    }
    out.push(c);
  }
  out
}

/// Patterns to try, most specific first.
///
/// 1. exact literal
/// 2. name tokens separated by any run of whitespace
/// 3. (2) or (1), ignoring case
///
/// Email queries only get the exact pattern. A single-token name has no
/// spacing to relax, so (2) is skipped.
pub fn author_patterns(query: &str) -> Vec<AuthorPattern> {
  let query = query.trim();
  let exact = escape_ere(query);
  let mut patterns = vec![AuthorPattern {
    regex: exact.clone(),
    ignore_case: false,
  }];
  if query.contains('@') {
    return patterns;
  }

  let tokens: Vec<String> = query.split_whitespace().map(escape_ere).collect();
  if tokens.len() > 1 {
    let flexible = tokens.join("[[:space:]]+");
    patterns.push(AuthorPattern {
      regex: flexible.clone(),
      ignore_case: false,
    });
    patterns.push(AuthorPattern {
      regex: format!("({})|({})", flexible, exact),
      ignore_case: true,
    });
  } else {
    patterns.push(AuthorPattern {
      regex: exact,
      ignore_case: true,
    });
  }
  patterns
}

/// Reject shell metacharacters; date semantics are left to git.
pub fn validate_date_expr(value: &str) -> Result<(), EngineError> {
  match value.chars().find(|c| UNSAFE_DATE_CHARS.contains(c)) {
    Some(c) => Err(EngineError::invalid_date(
      value,
      &format!("unsafe character {:?}", c),
    )),
    None if value.trim_start().starts_with('-') => {
      Err(EngineError::invalid_date(value, "must not start with '-'"))
    }
    None => Ok(()),
  }
}

/// Parse `%H%x09%aI` rows.
pub fn parse_log_rows(text: &str) -> Vec<(String, DateTime<FixedOffset>)> {
  text
    .lines()
    .filter_map(|line| {
      let (hash, date) = line.trim().split_once('\t')?;
      match DateTime::parse_from_rfc3339(date.trim()) {
        Ok(date) => Some((hash.trim().to_string(), date)),
        Err(e) => {
          warn!(line, error = %e, "skipping log row with unparsable date");
          None
        }
      }
    })
    .collect()
}

pub struct AuthorResolver {
  repo: Arc<Repository>,
}

impl AuthorResolver {
  pub fn new(repo: Arc<Repository>) -> Self {
    Self { repo }
  }

  pub fn repo(&self) -> &Arc<Repository> {
    &self.repo
  }

  /// Commits by the queried author across all branches, newest first.
  ///
  /// No match is an empty list, not an error.
  pub async fn resolve_commits(
    &self,
    query: &AuthorQuery,
    cancel: &CancellationToken,
  ) -> Result<Vec<Commit>, EngineError> {
    let author = query.author.trim();
    if author.is_empty() {
      return Err(EngineError::InvalidAuthor);
    }
    let since = non_empty(&query.since);
    let until = non_empty(&query.until);
    for date in since.iter().chain(until.iter()) {
      validate_date_expr(date)?;
    }

    let pathspec = match &query.scope {
      PathScope::Exclude(_) => {
        let tracked = self.repo.tracked_files().await?;
        query.scope.pathspec(&tracked)
      }
      other => other.pathspec(&[]),
    };
    if pathspec.as_ref().is_some_and(|p| p.is_empty()) {
      info!(author, "every tracked path is excluded");
      return Ok(Vec::new());
    }

    let patterns = author_patterns(author);
    let last = patterns.len() - 1;
    let mut rows = Vec::new();
    for (i, pattern) in patterns.iter().enumerate() {
      if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
      }
      let args = log_args(pattern, since, until, pathspec.as_deref());
      match self.repo.run(&args).await {
        Ok(out) => rows = parse_log_rows(&out),
        Err(e) if i < last => {
          warn!(pattern = %pattern.regex, error = %e, "author pattern failed; trying next");
          continue;
        }
        Err(e) => return Err(e),
      }
      if !rows.is_empty() {
        debug!(pattern = %pattern.regex, commits = rows.len(), "author pattern matched");
        break;
      }
    }

    let mut seen = HashSet::new();
    rows.retain(|(hash, _)| seen.insert(hash.clone()));

    let config = self.repo.config();
    let repo = &self.repo;
    let mut commits = for_each_batch(
      rows,
      config.batch_size,
      config.batch_pause,
      cancel,
      |(hash, date)| async move {
        let (subject, body) = repo.commit_message(&hash).await.unwrap_or_else(|e| {
          warn!(hash = %hash, error = %e, "message lookup failed; using empty subject");
          (String::new(), String::new())
        });
        Commit {
          hash,
          date,
          subject,
          body,
        }
      },
    )
    .await?;

    commits.sort_by(|a, b| b.date.cmp(&a.date));
    info!(author, commits = commits.len(), "resolved commits");
    Ok(commits)
  }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
  value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn log_args(
  pattern: &AuthorPattern,
  since: Option<&str>,
  until: Option<&str>,
  pathspec: Option<&[String]>,
) -> Vec<String> {
  let mut args: Vec<String> = [
    "log",
    "--all",
    "--no-merges",
    "--format=%H%x09%aI",
    "--extended-regexp",
  ]
  .iter()
  .map(|s| s.to_string())
  .collect();
  if pattern.ignore_case {
    args.push("--regexp-ignore-case".into());
  }
  args.push(format!("--author={}", pattern.regex));
  if let Some(since) = since {
    args.push(format!("--since={}", since));
  }
  if let Some(until) = until {
    args.push(format!("--until={}", until));
  }
  if let Some(paths) = pathspec {
    args.push("--".into());
    args.extend(paths.iter().cloned());
  }
  args
}
