//! Contributor Review / Risk Engine: rule-based, no git, no network.
//!
//! Reconstructs change sets from unified diffs, classifies commits, and scores
//! per-file risk. Used by the binary for stdin/stdout and by `history-engine`
//! as a library.

pub mod change_type;
pub mod checklist;
pub mod diff;
pub mod error;
pub mod risk;
pub mod types;

pub use diff::{categorize_diff, DiffScanner};
pub use error::ReviewError;
pub use types::{
  ChangeKind, ChangeSet, CommitCategory, CommitSample, CommitTypeCounts, FileReview, Hunk,
  ReviewPacket, RiskLevel, RiskSummary,
};

/// Path used for rules: the new side of a `"{old} → {new}"` rename key.
pub fn rule_path(key: &str) -> &str {
  key.rsplit_once(" → ").map(|(_, new)| new).unwrap_or(key)
}

/// Review every file of a change set (no I/O).
///
/// Files are ordered by risk, highest first, then by path.
pub fn review(changes: &ChangeSet) -> ReviewPacket {
  let mut summary = RiskSummary::default();
  let mut files: Vec<FileReview> = changes
    .entries()
    .map(|(kind, key, hunks)| {
      let path = rule_path(key);
      let level = risk::identify_risk_level(path, hunks);
      summary.record(level);
      FileReview {
        path: key.clone(),
        change: kind,
        risk: level,
        hunk_count: hunks.len(),
        checklist: checklist::generate_checklist(path, kind, level),
      }
    })
    .collect();

  files.sort_by(|a, b| b.risk.cmp(&a.risk).then_with(|| a.path.cmp(&b.path)));
  ReviewPacket { files, summary }
}

/// Parse diff text and review it in one step.
pub fn run(diff_text: &str) -> ReviewPacket {
  review(&categorize_diff(diff_text))
}
