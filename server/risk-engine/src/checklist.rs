//! Review checklist text for one changed file.

use crate::types::{ChangeKind, RiskLevel};

const COMMON: &[&str] = &[
  "Code follows project style and naming conventions",
  "Changes are covered by tests or the lack of tests is justified",
];

const HIGH_RISK: &[&str] = &[
  "Security implications reviewed (input validation, injection, secrets)",
  "Authentication and authorization paths verified",
  "Database or schema changes are reversible and migrated safely",
  "Error handling covers failure modes without leaking details",
  "Rollback plan identified for this change",
  "A second reviewer has signed off",
];

fn for_change(kind: ChangeKind) -> &'static [&'static str] {
  match kind {
    ChangeKind::Added => &[
      "New file is necessary and placed in the right module",
      "New code is wired into existing entry points",
      "License and ownership headers match the project",
    ],
    ChangeKind::Modified => &[
      "Callers of changed functions still behave correctly",
      "No unintended behavior change outside the stated scope",
    ],
    ChangeKind::Deleted => &[
      "No remaining references to the removed file",
      "Removed functionality is no longer required or has moved",
    ],
    ChangeKind::Renamed => &[
      "All imports and references use the new path",
      "Build and packaging configuration reflect the rename",
    ],
  }
}

const TEST_ITEMS: &[&str] = &[
  "Tests assert behavior, not implementation details",
  "Tests are deterministic and independent of run order",
];

const JSON_ITEMS: &[&str] = &[
  "JSON is valid and consistently formatted",
  "Dependent code handles added or removed keys",
];

/// Deterministic Markdown checklist for one file.
pub fn generate_checklist(path: &str, kind: ChangeKind, risk: RiskLevel) -> String {
  let mut items: Vec<&str> = COMMON.to_vec();
  if risk == RiskLevel::High {
    items.extend_from_slice(HIGH_RISK);
  }
  items.extend_from_slice(for_change(kind));
  if path.contains("test") {
    items.extend_from_slice(TEST_ITEMS);
  }
  if path.ends_with(".json") {
    items.extend_from_slice(JSON_ITEMS);
  }

  items
    .iter()
    .map(|item| format!("- [ ] {}", item))
    .collect::<Vec<_>>()
    .join("\n")
}
