//! Risk tiers derived from file path patterns and diff content.
//!
//! Markdown is always LOW. Otherwise the first path tier that matches (HIGH, then
//! MEDIUM, then LOW) sets the baseline, and content rules may only raise it.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::{Hunk, RiskLevel};

struct ContentCategory {
  patterns: &'static [&'static str],
}

const MARKDOWN: &str = r"(?i)\.(md|mdx|markdown)$";

const PATH_TIERS: &[(RiskLevel, &[&str])] = &[
  (
    RiskLevel::High,
    &[
      r"(?i)auth",
      r"(?i)security",
      r"(?i)passw(or)?d",
      r"(?i)secret",
      r"(?i)credential",
      r"(?i)permission",
      r"(?i)crypto",
      r"(?i)payment|billing|stripe|invoice",
      r"(?i)(^|/)migrations?/",
      r"(?i)\.sql$",
      r"(^|/)\.env",
      r"(^|/)\.github/workflows/",
      r"(?i)(^|/)dockerfile$",
    ],
  ),
  (
    RiskLevel::Medium,
    &[
      r"(?i)(^|/)package\.json$",
      r"(?i)(^|/)(package-lock\.json|yarn\.lock|pnpm-lock\.yaml|cargo\.(toml|lock)|go\.(mod|sum))$",
      r"(?i)\.(ya?ml|toml|ini)$",
      r"(?i)\.config\.[cm]?[jt]s$",
      r"(?i)(^|/)(api|routes?|middleware|controllers?|database|db|models?|services?)/",
      r"(?i)schema",
    ],
  ),
  (
    RiskLevel::Low,
    &[
      r"(?i)(^|/)(__tests__|tests?|specs?)/",
      r"(?i)\.(test|spec)\.[cm]?[jt]sx?$",
      r"(?i)\.(css|scss|less|svg|png|jpe?g|gif|ico)$",
      r"(?i)(^|/)docs?/",
      r"(?i)\.(txt|rst)$",
    ],
  ),
];

const CONTENT_TIERS: &[(RiskLevel, &[ContentCategory])] = &[
  (
    RiskLevel::High,
    &[
      // security
      ContentCategory {
        patterns: &[
          r"(?i)passw(or)?d",
          r"(?i)secret",
          r"(?i)api[_-]?key",
          r"(?i)private[_-]?key",
          r"(?i)\btoken\b",
          r"\beval\s*\(",
          r"dangerouslySetInnerHTML",
          r"\.innerHTML\s*=",
          r"\bunsafe\s*\{",
        ],
      },
      // database
      ContentCategory {
        patterns: &[
          r"(?i)\bdrop\s+(table|database|column)\b",
          r"(?i)\balter\s+table\b",
          r"(?i)\bdelete\s+from\b",
          r"(?i)\btruncate\s+table\b",
        ],
      },
      // auth
      ContentCategory {
        patterns: &[
          r"(?i)authenticat",
          r"(?i)authoriz",
          r"(?i)\bjwt\b",
          r"(?i)bcrypt|argon2|scrypt",
          r"(?i)\bsession\b",
        ],
      },
    ],
  ),
  (
    RiskLevel::Medium,
    &[
      // error_handling
      ContentCategory {
        patterns: &[
          r"\bcatch\s*\(",
          r"\bthrow\s+new\b",
          r"\bpanic!\s*\(",
          r"\.unwrap\(\)",
          r"\bexcept\b.*:",
        ],
      },
      // concurrency
      ContentCategory {
        patterns: &[
          r"\basync\b",
          r"\bawait\b",
          r"\bPromise\.",
          r"\bsetTimeout\s*\(",
          r"\bMutex\b",
          r"\bthread::spawn\b",
        ],
      },
      // network
      ContentCategory {
        patterns: &[r"\bfetch\s*\(", r"\baxios\b", r"https?://", r"\breqwest::"],
      },
      // state
      ContentCategory {
        patterns: &[r"\buse(State|Effect|Reducer)\b", r"\bsetState\s*\(", r"\bglobal\s+\w+"],
      },
    ],
  ),
  (
    RiskLevel::Low,
    &[
      // logging
      ContentCategory {
        patterns: &[r"console\.(log|debug|info)", r"\b(e?println|debug|info)!\s*\("],
      },
      // comments
      ContentCategory {
        patterns: &[r"(?m)^[+-]\s*(//|#|/\*|\*)"],
      },
    ],
  ),
];

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
  patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

static MARKDOWN_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(MARKDOWN).ok());

static PATH_RULES: LazyLock<Vec<(RiskLevel, Vec<Regex>)>> = LazyLock::new(|| {
  PATH_TIERS
    .iter()
    .map(|(level, patterns)| (*level, compile_all(patterns)))
    .collect()
});

static CONTENT_RULES: LazyLock<Vec<(RiskLevel, Vec<Regex>)>> = LazyLock::new(|| {
  CONTENT_TIERS
    .iter()
    .map(|(level, categories)| {
      let patterns: Vec<&str> = categories
        .iter()
        .flat_map(|c| c.patterns.iter().copied())
        .collect();
      (*level, compile_all(&patterns))
    })
    .collect()
});

pub fn is_markdown(path: &str) -> bool {
  MARKDOWN_RE.as_ref().is_some_and(|re| re.is_match(path))
}

/// Baseline tier from the path alone; LOW when no tier matches.
pub fn path_risk(path: &str) -> RiskLevel {
  PATH_RULES
    .iter()
    .find(|(_, res)| res.iter().any(|re| re.is_match(path)))
    .map(|(level, _)| *level)
    .unwrap_or(RiskLevel::Low)
}

/// Highest tier whose content rules match the text, if any.
pub fn content_risk(text: &str) -> Option<RiskLevel> {
  CONTENT_RULES
    .iter()
    .filter(|(_, res)| res.iter().any(|re| re.is_match(text)))
    .map(|(level, _)| *level)
    .max()
}

/// Risk for one file given its hunks.
pub fn identify_risk_level(path: &str, hunks: &[Hunk]) -> RiskLevel {
  if is_markdown(path) {
    return RiskLevel::Low;
  }

  let baseline = path_risk(path);
  let text = hunks
    .iter()
    .flat_map(|h| h.iter())
    .map(String::as_str)
    .collect::<Vec<_>>()
    .join("\n");

  match content_risk(&text) {
    Some(candidate) if candidate > baseline => candidate,
    _ => baseline,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn hunk(lines: &[&str]) -> Vec<Hunk> {
    let mut h = vec!["@@ -1 +1 @@".to_string()];
    h.extend(lines.iter().map(|l| l.to_string()));
    vec![h]
  }

  #[test]
  fn all_patterns_compile() {
    assert!(MARKDOWN_RE.is_some());
    for (_, patterns) in PATH_TIERS {
      assert_eq!(compile_all(patterns).len(), patterns.len());
    }
    for (_, categories) in CONTENT_TIERS {
      for c in categories.iter() {
        assert_eq!(compile_all(c.patterns).len(), c.patterns.len(), "{:?}", c.patterns);
      }
    }
  }

  #[test]
  fn markdown_is_low_even_with_dangerous_content() {
    let hunks = hunk(&["+password = hunter2", "+DROP TABLE users;"]);
    for path in ["README.md", "docs/auth.MDX", "notes/secret.markdown"] {
      assert_eq!(identify_risk_level(path, &hunks), RiskLevel::Low, "{}", path);
    }
  }

  #[test]
  fn path_tiers_set_baseline() {
    assert_eq!(identify_risk_level("src/auth/login.ts", &[]), RiskLevel::High);
    assert_eq!(identify_risk_level("package.json", &[]), RiskLevel::Medium);
    assert_eq!(identify_risk_level("src/api/users.ts", &[]), RiskLevel::Medium);
    assert_eq!(identify_risk_level("styles/main.css", &[]), RiskLevel::Low);
    assert_eq!(identify_risk_level("src/widget.rs", &[]), RiskLevel::Low);
  }

  #[test]
  fn content_can_raise_risk() {
    let hunks = hunk(&["+const apiKey = process.env.API_KEY;"]);
    assert_eq!(identify_risk_level("src/widget.ts", &hunks), RiskLevel::High);

    let hunks = hunk(&["+  const res = await fetch(url);"]);
    assert_eq!(identify_risk_level("src/widget.ts", &hunks), RiskLevel::Medium);
  }

  #[test]
  fn content_never_lowers_baseline() {
    let hunks = hunk(&["+console.log('hi')"]);
    assert_eq!(identify_risk_level("src/auth/session.ts", &hunks), RiskLevel::High);
    assert_eq!(identify_risk_level("src/api/x.ts", &hunks), RiskLevel::Medium);
  }

  #[test]
  fn sql_keywords_are_high() {
    let hunks = hunk(&["+  DROP TABLE users;"]);
    assert_eq!(identify_risk_level("scripts/cleanup.sh", &hunks), RiskLevel::High);
  }

  #[test]
  fn risk_levels_are_ordered() {
    assert!(RiskLevel::Low < RiskLevel::Medium);
    assert!(RiskLevel::Medium < RiskLevel::High);
  }
}
