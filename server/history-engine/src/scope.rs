//! Directory scope shared by commit resolution and metrics.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::EngineError;

/// Paths always dropped when excluding, and never counted as source.
const DEFAULT_EXCLUDED: &[&str] = &[
  r"(^|/)node_modules/",
  r"(^|/)(dist|build|target|coverage|vendor|\.next|out)/",
  r"(^|/)(package-lock\.json|yarn\.lock|pnpm-lock\.yaml|Cargo\.lock|composer\.lock|Gemfile\.lock|poetry\.lock|go\.sum)$",
  r"\.min\.(js|css)$",
  r"\.map$",
  r"\.d\.ts$",
];

static DEFAULT_EXCLUDED_RE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
  DEFAULT_EXCLUDED
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// True unless the path is a build artifact, lockfile, or generated file.
pub fn is_source_file(path: &str) -> bool {
  !DEFAULT_EXCLUDED_RE.iter().any(|re| re.is_match(path))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PathScope {
  #[default]
  All,
  Include(Vec<String>),
  Exclude(Vec<String>),
}

impl PathScope {
  /// Build from the two mutually exclusive directory lists.
  pub fn from_lists(include: &[String], exclude: &[String]) -> Result<Self, EngineError> {
    if !include.is_empty() && !exclude.is_empty() {
      return Err(EngineError::invalid_filter(
        "include and exclude directories are mutually exclusive",
      ));
    }
    let include = normalize_dirs(include)?;
    let exclude = normalize_dirs(exclude)?;
    Ok(if !include.is_empty() {
      Self::Include(include)
    } else if !exclude.is_empty() {
      Self::Exclude(exclude)
    } else {
      Self::All
    })
  }

  /// Parse a comma-separated CLI value (`a,b/c`).
  pub fn parse_list(raw: &str) -> Result<Vec<String>, EngineError> {
    raw
      .split(',')
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(|s| {
        if s.chars().any(char::is_whitespace) {
          Err(EngineError::invalid_filter(format!(
            "directory {:?} contains whitespace",
            s
          )))
        } else {
          Ok(s.to_string())
        }
      })
      .collect()
  }

  pub fn is_all(&self) -> bool {
    matches!(self, Self::All)
  }

  /// Does a file path fall inside this scope?
  pub fn contains(&self, path: &str) -> bool {
    match self {
      Self::All => true,
      Self::Include(dirs) => dirs.iter().any(|d| under(path, d)),
      Self::Exclude(dirs) => !dirs.iter().any(|d| under(path, d)),
    }
  }

  /// Pathspec for `git log -- <paths>`; `None` means no restriction.
  ///
  /// Exclusion is resolved against the tracked file list, minus the default
  /// excluded patterns.
  pub fn pathspec(&self, tracked: &[String]) -> Option<Vec<String>> {
    match self {
      Self::All => None,
      Self::Include(dirs) => Some(dirs.clone()),
      Self::Exclude(_) => Some(
        tracked
          .iter()
          .filter(|p| self.contains(p) && is_source_file(p))
          .cloned()
          .collect(),
      ),
    }
  }
}

fn normalize_dirs(dirs: &[String]) -> Result<Vec<String>, EngineError> {
  dirs
    .iter()
    .map(|d| {
      let d = d.trim().trim_start_matches("./").trim_end_matches('/');
      if d.chars().any(char::is_whitespace) {
        Err(EngineError::invalid_filter(format!(
          "directory {:?} contains whitespace",
          d
        )))
      } else {
        Ok(d.to_string())
      }
    })
    .filter(|d| !matches!(d, Ok(s) if s.is_empty()))
    .collect()
}

/// `path` is `dir` itself or lives beneath it.
fn under(path: &str, dir: &str) -> bool {
  path == dir
    || path
      .strip_prefix(dir)
      .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn lists_are_mutually_exclusive() {
    let err = PathScope::from_lists(&strings(&["src"]), &strings(&["docs"])).unwrap_err();
    assert!(matches!(err, EngineError::InvalidDirectoryFilter { .. }));
  }

  #[test]
  fn parse_list_rejects_spaces() {
    assert_eq!(PathScope::parse_list("src, lib/").unwrap(), strings(&["src", "lib/"]));
    assert!(PathScope::parse_list("my dir,src").is_err());
  }

  #[test]
  fn include_matches_whole_segments() {
    let scope = PathScope::from_lists(&strings(&["src/"]), &[]).unwrap();
    assert!(scope.contains("src/main.rs"));
    assert!(!scope.contains("srcfoo/main.rs"));
    assert_eq!(scope.pathspec(&[]), Some(strings(&["src"])));
  }

  #[test]
  fn exclude_pathspec_drops_excluded_and_artifacts() {
    let scope = PathScope::from_lists(&[], &strings(&["docs"])).unwrap();
    let tracked = strings(&[
      "src/a.rs",
      "docs/guide.md",
      "package-lock.json",
      "web/app.min.js",
      "types/index.d.ts",
      "node_modules/x/index.js",
      "web/app.js",
    ]);
    assert_eq!(
      scope.pathspec(&tracked),
      Some(strings(&["src/a.rs", "web/app.js"]))
    );
  }

  #[test]
  fn empty_lists_mean_all() {
    let scope = PathScope::from_lists(&[], &[]).unwrap();
    assert!(scope.is_all());
    assert_eq!(scope.pathspec(&strings(&["a"])), None);
  }

  #[test]
  fn source_file_check() {
    assert!(is_source_file("src/lib.rs"));
    assert!(!is_source_file("dist/bundle.js"));
    assert!(!is_source_file("Cargo.lock"));
    assert!(!is_source_file("app.js.map"));
  }
}
