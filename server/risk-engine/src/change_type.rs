//! Commit categories derived from commit message and file paths.
//!
//! Rule table, scanned in declaration order:
//! - every category whose message pattern matches the trimmed, lowercased message is tagged;
//! - any test-looking path always adds TEST;
//! - only when no message pattern matched, the first category (in table order) whose
//!   file pattern matches any path is tagged, and the scan stops.
//!
//! Untagged commits are counted as UNKNOWN by [`aggregate`]; [`categorize`] itself
//! returns an empty set for them.

use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use crate::types::{CategoryCount, CommitCategory, CommitSample, CommitTypeCounts};

struct CategoryRule {
  category: CommitCategory,
  message_patterns: &'static [&'static str],
  file_patterns: &'static [&'static str],
}

const TEST_FILE_PATTERNS: &[&str] = &[
  r"(^|/)(__tests__|tests?|specs?)/",
  r"\.(test|spec)\.[cm]?[jt]sx?$",
  r"_test\.(go|rs|py|rb|exs?)$",
  r"(^|/)test_[^/]+\.py$",
  r"_spec\.rb$",
];

const RULES: &[CategoryRule] = &[
  CategoryRule {
    category: CommitCategory::Feature,
    message_patterns: &[
      r"^feat(\([^)]*\))?!?:",
      r"^feat(ure)?\b",
      r"^add(s|ed)?\b",
      r"^implement",
      r"^introduce",
      r"^new\b",
      r"^support\b",
    ],
    file_patterns: &[r"(^|/)(features?|components|pages|views)/"],
  },
  CategoryRule {
    category: CommitCategory::BugFix,
    message_patterns: &[
      r"^fix(\([^)]*\))?!?:",
      r"^fix(es|ed)?\b",
      r"^bug\s?fix",
      r"^hot\s?fix",
      r"^bug\b",
      r"^patch\b",
      r"^resolve[sd]?\b",
      r"^correct",
    ],
    file_patterns: &[],
  },
  CategoryRule {
    category: CommitCategory::Refactor,
    message_patterns: &[
      r"^refactor",
      r"^restructure",
      r"^clean\s?up",
      r"^simplif",
      r"^rename",
      r"^move[sd]?\b",
      r"^extract",
      r"^(perf|style)(\([^)]*\))?!?:",
    ],
    file_patterns: &[],
  },
  CategoryRule {
    category: CommitCategory::Docs,
    message_patterns: &[
      r"^docs?(\([^)]*\))?!?:",
      r"^docs?\b",
      r"^document",
      r"^readme",
      r"^update\s+readme",
    ],
    file_patterns: &[r"(?i)\.(md|mdx|markdown|rst|adoc|txt)$", r"(^|/)docs?/"],
  },
  CategoryRule {
    category: CommitCategory::Test,
    message_patterns: &[
      r"^tests?(\([^)]*\))?!?:",
      r"^tests?\b",
      r"\badd(s|ed|ing)?\s+(unit\s+|integration\s+|e2e\s+)?tests?\b",
      r"^spec\b",
    ],
    file_patterns: TEST_FILE_PATTERNS,
  },
  CategoryRule {
    category: CommitCategory::Config,
    message_patterns: &[
      r"^(chore|build|ci)(\([^)]*\))?!?:",
      r"^config",
      r"^bump\b",
      r"^upgrade\b",
      r"^deps?\b",
      r"^update\s+(dependencies|deps)\b",
      r"^release\b",
    ],
    file_patterns: &[
      r"(?i)\.(json|ya?ml|toml|ini|cfg|conf)$",
      r"(^|/)\.env",
      r"(^|/)\.github/",
      r"(?i)(^|/)(dockerfile|makefile)$",
      r"\.config\.[cm]?[jt]s$",
      r"(^|/)\.[a-z]+rc(\.[a-z]+)?$",
    ],
  },
];

struct CompiledRule {
  category: CommitCategory,
  message: Vec<Regex>,
  files: Vec<Regex>,
}

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
  patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

static COMPILED: LazyLock<Vec<CompiledRule>> = LazyLock::new(|| {
  RULES
    .iter()
    .map(|rule| CompiledRule {
      category: rule.category,
      message: compile_all(rule.message_patterns),
      files: compile_all(rule.file_patterns),
    })
    .collect()
});

static TEST_FILES: LazyLock<Vec<Regex>> = LazyLock::new(|| compile_all(TEST_FILE_PATTERNS));

/// Does this path look like a test file?
pub fn is_test_file(path: &str) -> bool {
  let p = path.to_lowercase();
  TEST_FILES.iter().any(|re| re.is_match(&p))
}

/// Categories for one commit. Empty when nothing matched.
pub fn categorize(sample: &CommitSample) -> BTreeSet<CommitCategory> {
  let msg = sample.message.trim().to_lowercase();
  let files: Vec<String> = sample.files.iter().map(|f| f.to_lowercase()).collect();
  let mut tags = BTreeSet::new();

  for rule in COMPILED.iter() {
    if rule.message.iter().any(|re| re.is_match(&msg)) {
      tags.insert(rule.category);
    }
  }
  let matched_message = !tags.is_empty();

  if sample.files.iter().any(|f| is_test_file(f)) {
    tags.insert(CommitCategory::Test);
  }

  if !matched_message {
    let fallback = COMPILED.iter().find(|rule| {
      files
        .iter()
        .any(|f| rule.files.iter().any(|re| re.is_match(f)))
    });
    if let Some(rule) = fallback {
      tags.insert(rule.category);
    }
  }

  tags
}

/// Count categories across commits (multi-tagged commits count once per tag,
/// untagged ones once as UNKNOWN).
pub fn aggregate<'a, I>(samples: I) -> CommitTypeCounts
where
  I: IntoIterator<Item = &'a CommitSample>,
{
  tally(samples.into_iter().map(categorize))
}

/// Count pre-computed tag sets; an empty set counts as UNKNOWN.
pub fn tally<I>(tag_sets: I) -> CommitTypeCounts
where
  I: IntoIterator<Item = BTreeSet<CommitCategory>>,
{
  let mut counts: HashMap<CommitCategory, u64> = HashMap::new();
  for tags in tag_sets {
    if tags.is_empty() {
      *counts.entry(CommitCategory::Unknown).or_insert(0) += 1;
    }
    for tag in tags {
      *counts.entry(tag).or_insert(0) += 1;
    }
  }

  let total: u64 = counts.values().sum();
  let mut breakdown: Vec<CategoryCount> = counts
    .into_iter()
    .map(|(category, count)| CategoryCount {
      category,
      count,
      percentage: round1(count as f64 * 100.0 / total as f64),
    })
    .collect();
  breakdown.sort_by(|a, b| b.count.cmp(&a.count).then(a.category.cmp(&b.category)));

  let primary = breakdown
    .first()
    .map(|c| c.category)
    .unwrap_or(CommitCategory::Unknown);

  CommitTypeCounts { breakdown, primary }
}

fn round1(v: f64) -> f64 {
  (v * 10.0).round() / 10.0
}
