//! Unified diff → change set reconstruction.
//!
//! A single-pass line scanner. Unified diff has no end-of-hunk marker, so a hunk
//! is closed only when the next `@@` or `diff --git` line arrives (or input ends);
//! the previous hunk is always flushed before state for the next marker begins.
//!
//! The same scanner serves buffered text ([`categorize_diff`]) and chunked byte
//! input ([`DiffScanner::feed`]), where at most one partial trailing line is held
//! between chunks.

use crate::types::{ChangeKind, ChangeSet, Hunk};

/// Hunk lines accumulated before the safety valve flushes mid-hunk.
pub const DEFAULT_MAX_HUNK_LINES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
  /// Before the first `diff --git` line.
  ScanningForFile,
  /// Inside a file header, waiting for the first `@@`.
  ScanningForHunk,
  InHunk,
}

/// File header being assembled between `diff --git` and its first hunk.
#[derive(Debug, Default)]
struct PendingFile {
  old_path: String,
  new_path: String,
  new_file: bool,
  deleted_file: bool,
  /// Header could not be split; take paths from the `---`/`+++` lines.
  unresolved: bool,
  /// Bucket and key once the entry exists in the change set.
  placed: Option<(ChangeKind, String)>,
}

impl PendingFile {
  fn from_header(line: &str) -> Self {
    match parse_git_header(line) {
      Some((old_path, new_path)) => Self {
        old_path,
        new_path,
        ..Self::default()
      },
      None => {
        let raw = line.trim_start_matches("diff --git ").trim().to_string();
        Self {
          old_path: raw.clone(),
          new_path: raw,
          unresolved: true,
          ..Self::default()
        }
      }
    }
  }

  fn record_header_line(&mut self, line: &str) {
    if line.starts_with("new file mode") {
      self.new_file = true;
    } else if line.starts_with("deleted file mode") {
      self.deleted_file = true;
    } else if let Some(p) = line.strip_prefix("rename from ") {
      self.old_path = unquote(p).to_string();
    } else if let Some(p) = line.strip_prefix("rename to ") {
      self.new_path = unquote(p).to_string();
    } else if self.unresolved {
      if let Some(p) = line.strip_prefix("--- ").and_then(marker_path) {
        self.old_path = p;
      } else if let Some(p) = line.strip_prefix("+++ ").and_then(marker_path) {
        self.new_path = p;
      }
    }
  }

  fn kind_and_key(&self) -> (ChangeKind, String) {
    if self.new_file {
      (ChangeKind::Added, self.new_path.clone())
    } else if self.deleted_file {
      (ChangeKind::Deleted, self.old_path.clone())
    } else if self.old_path != self.new_path {
      (
        ChangeKind::Renamed,
        format!("{} → {}", self.old_path, self.new_path),
      )
    } else {
      (ChangeKind::Modified, self.new_path.clone())
    }
  }
}

/// Incremental unified-diff scanner.
#[derive(Debug)]
pub struct DiffScanner {
  state: ScanState,
  file: Option<PendingFile>,
  hunk: Hunk,
  /// Marker of the hunk in progress, replayed when the safety valve splits it.
  hunk_marker: String,
  partial: Vec<u8>,
  max_hunk_lines: usize,
  changes: ChangeSet,
}

impl Default for DiffScanner {
  fn default() -> Self {
    Self::new()
  }
}

impl DiffScanner {
  pub fn new() -> Self {
    Self::with_max_hunk_lines(DEFAULT_MAX_HUNK_LINES)
  }

  pub fn with_max_hunk_lines(max_hunk_lines: usize) -> Self {
    Self {
      state: ScanState::ScanningForFile,
      file: None,
      hunk: Vec::new(),
      hunk_marker: String::new(),
      partial: Vec::new(),
      max_hunk_lines: max_hunk_lines.max(2),
      changes: ChangeSet::default(),
    }
  }

  pub fn state(&self) -> ScanState {
    self.state
  }

  /// Bytes held back because they do not yet end in a newline.
  pub fn pending_bytes(&self) -> usize {
    self.partial.len()
  }

  /// Feed a chunk of raw diff bytes. Complete lines are scanned immediately.
  pub fn feed(&mut self, chunk: &[u8]) {
    let mut buf = std::mem::take(&mut self.partial);
    buf.extend_from_slice(chunk);

    let mut start = 0;
    while let Some(pos) = buf[start..].iter().position(|&b| b == b'\n') {
      let end = start + pos;
      let line = String::from_utf8_lossy(&buf[start..end]);
      self.push_line(line.trim_end_matches('\r'));
      start = end + 1;
    }

    buf.drain(..start);
    self.partial = buf;
  }

  /// Scan one complete line (without its trailing newline).
  pub fn push_line(&mut self, line: &str) {
    if line.starts_with("diff --git ") {
      self.flush_hunk();
      self.place_file();
      self.file = Some(PendingFile::from_header(line));
      self.state = ScanState::ScanningForHunk;
      return;
    }

    match self.state {
      ScanState::ScanningForFile => {}
      ScanState::ScanningForHunk | ScanState::InHunk if line.starts_with("@@") => {
        self.flush_hunk();
        self.place_file();
        self.hunk_marker = line.to_string();
        self.hunk.push(line.to_string());
        self.state = ScanState::InHunk;
      }
      ScanState::ScanningForHunk => {
        if let Some(file) = self.file.as_mut() {
          file.record_header_line(line);
        }
      }
      ScanState::InHunk => {
        if !matches!(line.as_bytes().first(), Some(b'+' | b'-' | b' ')) {
          return;
        }
        if self.hunk.is_empty() {
          self.hunk.push(self.hunk_marker.clone());
        }
        self.hunk.push(line.to_string());
        if self.hunk.len() >= self.max_hunk_lines {
          self.flush_hunk();
        }
      }
    }
  }

  /// Flush whatever is pending and return the finished change set.
  pub fn finish(mut self) -> ChangeSet {
    if !self.partial.is_empty() {
      let rest = std::mem::take(&mut self.partial);
      let line = String::from_utf8_lossy(&rest).into_owned();
      self.push_line(line.trim_end_matches('\r'));
    }
    self.flush_hunk();
    self.place_file();
    self.changes
  }

  fn place_file(&mut self) {
    let Some(file) = self.file.as_mut() else {
      return;
    };
    if file.placed.is_none() {
      let (kind, key) = file.kind_and_key();
      self.changes.bucket_mut(kind).entry(key.clone()).or_default();
      file.placed = Some((kind, key));
    }
  }

  fn flush_hunk(&mut self) {
    if self.hunk.is_empty() {
      return;
    }
    let hunk = std::mem::take(&mut self.hunk);
    self.place_file();
    if let Some((kind, key)) = self.file.as_ref().and_then(|f| f.placed.as_ref()) {
      self
        .changes
        .bucket_mut(*kind)
        .entry(key.clone())
        .or_default()
        .push(hunk);
    }
  }
}

/// Reconstruct a change set from fully buffered diff text.
pub fn categorize_diff(text: &str) -> ChangeSet {
  let mut scanner = DiffScanner::new();
  for line in text.lines() {
    scanner.push_line(line);
  }
  scanner.finish()
}

/// Split `diff --git a/X b/Y` into (X, Y).
fn parse_git_header(line: &str) -> Option<(String, String)> {
  let rest = line.strip_prefix("diff --git ")?.trim();

  if let Some(quoted) = rest.strip_prefix('"') {
    let end = quoted.find('"')?;
    let old = &quoted[..end];
    let new = unquote(quoted[end + 1..].trim());
    return Some((strip_side(old, "a/"), strip_side(new, "b/")));
  }

  // Unchanged path: "a/P b/P" has length 5 + 2 * len(P); handles spaces in P.
  let len = rest.len();
  if len > 5 && (len - 5) % 2 == 0 {
    let p = (len - 5) / 2;
    if let (Some(old), Some(sep), Some(new)) =
      (rest.get(2..2 + p), rest.get(2 + p..5 + p), rest.get(5 + p..))
    {
      if rest.starts_with("a/") && sep == " b/" && old == new {
        return Some((old.to_string(), new.to_string()));
      }
    }
  }

  if let Some(idx) = rest.find(" b/") {
    return Some((strip_side(&rest[..idx], "a/"), rest[idx + 3..].to_string()));
  }

  // No prefixes at all ("P P"), as written under `diff.noprefix`.
  if len % 2 == 1 {
    let p = len / 2;
    let (old, sep, new) = (rest.get(..p), rest.get(p..p + 1), rest.get(p + 1..));
    if let (Some(old), Some(" "), Some(new)) = (old, sep, new) {
      if old == new {
        return Some((old.to_string(), new.to_string()));
      }
    }
  }
  None
}

/// Path named on a `---`/`+++` line; `None` for `/dev/null`.
fn marker_path(raw: &str) -> Option<String> {
  let path = unquote(raw.trim_end_matches('\t'));
  (path != "/dev/null" && !path.is_empty()).then(|| path.to_string())
}

fn strip_side(path: &str, prefix: &str) -> String {
  path.strip_prefix(prefix).unwrap_or(path).to_string()
}

fn unquote(s: &str) -> &str {
  s.trim().trim_matches('"')
}
