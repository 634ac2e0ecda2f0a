//! Command Executor: the one place a process is spawned.
//!
//! Only the configured git binary may run, and only with an allow-listed
//! subcommand. Output comes back either buffered ([`GitExecutor::run`]) or as a
//! live byte stream ([`GitExecutor::stream`]) for large diffs.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::EngineError;

/// Subcommands the engine is allowed to issue.
pub const ALLOWED_SUBCOMMANDS: &[&str] = &[
  "log",
  "show",
  "diff",
  "ls-files",
  "shortlog",
  "rev-parse",
  "rev-list",
  "fetch",
];

#[async_trait]
pub trait GitExecutor: Send + Sync {
  /// Run to completion and return stdout.
  async fn run(&self, args: &[String]) -> Result<String, EngineError>;

  /// Spawn and hand back stdout as it is produced.
  async fn stream(&self, args: &[String]) -> Result<GitStream, EngineError>;
}

/// Readable stdout of a running (or in-memory) git command.
pub struct GitStream {
  reader: Box<dyn AsyncRead + Send + Unpin>,
  child: Option<Child>,
  command: String,
}

impl GitStream {
  /// Stream over any reader; [`GitStream::finish`] then has nothing to wait for.
  pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
    Self {
      reader: Box::new(reader),
      child: None,
      command: String::new(),
    }
  }

  /// Read the next chunk; `Ok(0)` at end of stream.
  pub async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, EngineError> {
    self
      .reader
      .read(buf)
      .await
      .map_err(|e| EngineError::DiffStream(e.to_string()))
  }

  /// Wait for the process and surface a non-zero exit.
  pub async fn finish(mut self) -> Result<(), EngineError> {
    let Some(child) = self.child.take() else {
      return Ok(());
    };
    let output = child
      .wait_with_output()
      .await
      .map_err(|e| EngineError::DiffStream(e.to_string()))?;
    if output.status.success() {
      Ok(())
    } else {
      Err(EngineError::DiffStream(format!(
        "git {} exited with {}: {}",
        self.command,
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
      )))
    }
  }
}

/// Executor backed by the system git binary.
#[derive(Debug, Clone)]
pub struct SystemGit {
  binary: String,
  repo_dir: PathBuf,
}

impl SystemGit {
  /// Fails unless `binary` names a git executable.
  pub fn new(binary: &str, repo_dir: impl Into<PathBuf>) -> Result<Self, EngineError> {
    let stem = Path::new(binary)
      .file_stem()
      .and_then(|s| s.to_str())
      .unwrap_or_default();
    if stem != "git" {
      return Err(EngineError::git_failed(
        binary,
        "rejected",
        "only the git executable may be invoked",
      ));
    }
    Ok(Self {
      binary: binary.to_string(),
      repo_dir: repo_dir.into(),
    })
  }

  fn command(&self, args: &[String]) -> Result<Command, EngineError> {
    check_allowed(args)?;
    debug!(args = ?args, "git");
    let mut cmd = Command::new(&self.binary);
    cmd
      .args(args)
      .current_dir(&self.repo_dir)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);
    Ok(cmd)
  }

  fn spawn_error(&self, e: io::Error) -> EngineError {
    if e.kind() == io::ErrorKind::NotFound {
      EngineError::GitNotFound {
        binary: self.binary.clone(),
      }
    } else {
      EngineError::Io(e)
    }
  }
}

#[async_trait]
impl GitExecutor for SystemGit {
  async fn run(&self, args: &[String]) -> Result<String, EngineError> {
    let output = self
      .command(args)?
      .output()
      .await
      .map_err(|e| self.spawn_error(e))?;

    if !output.status.success() {
      let status = output
        .status
        .code()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
      return Err(classify_failure(
        &self.repo_dir,
        subcommand(args),
        &status,
        &String::from_utf8_lossy(&output.stderr),
      ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
  }

  async fn stream(&self, args: &[String]) -> Result<GitStream, EngineError> {
    let mut child = self.command(args)?.spawn().map_err(|e| self.spawn_error(e))?;
    let stdout = child
      .stdout
      .take()
      .ok_or_else(|| EngineError::DiffStream("stdout not captured".into()))?;
    Ok(GitStream {
      reader: Box::new(stdout),
      child: Some(child),
      command: subcommand(args).to_string(),
    })
  }
}

fn subcommand(args: &[String]) -> &str {
  args.first().map(String::as_str).unwrap_or_default()
}

/// Reject anything but an allow-listed subcommand.
pub fn check_allowed(args: &[String]) -> Result<(), EngineError> {
  let sub = subcommand(args);
  if ALLOWED_SUBCOMMANDS.contains(&sub) {
    Ok(())
  } else {
    Err(EngineError::git_failed(
      sub,
      "rejected",
      "subcommand is not on the allow-list",
    ))
  }
}

/// Map git's stderr to a typed failure.
pub fn classify_failure(repo_dir: &Path, command: &str, status: &str, stderr: &str) -> EngineError {
  let lower = stderr.to_lowercase();
  if lower.contains("not a git repository") {
    EngineError::NotGitRepo {
      path: repo_dir.display().to_string(),
    }
  } else if lower.contains("does not have any commits") {
    EngineError::EmptyRepository
  } else if [
    "bad revision",
    "unknown revision",
    "bad object",
    "ambiguous argument",
    "invalid object name",
  ]
  .iter()
  .any(|needle| lower.contains(needle))
  {
    EngineError::CommitNotFound {
      reference: quoted_reference(stderr).unwrap_or_else(|| stderr.trim().to_string()),
    }
  } else {
    EngineError::git_failed(command, status, stderr.trim())
  }
}

/// First `'...'` span in a git error line.
fn quoted_reference(stderr: &str) -> Option<String> {
  let start = stderr.find('\'')? + 1;
  let len = stderr[start..].find('\'')?;
  Some(stderr[start..start + len].to_string())
}

#[cfg(test)]
pub(crate) mod fake {
  //! Scripted executor for unit tests.

  use super::*;
  use parking_lot::Mutex;

  type Handler = Box<dyn Fn(&[String]) -> Result<String, EngineError> + Send + Sync>;

  pub struct ScriptedGit {
    handler: Handler,
    pub calls: Mutex<Vec<Vec<String>>>,
  }

  impl ScriptedGit {
    pub fn new(
      handler: impl Fn(&[String]) -> Result<String, EngineError> + Send + Sync + 'static,
    ) -> Self {
      Self {
        handler: Box::new(handler),
        calls: Mutex::new(Vec::new()),
      }
    }

    pub fn calls_to(&self, sub: &str) -> usize {
      self.calls.lock().iter().filter(|c| c[0] == sub).count()
    }
  }

  #[async_trait]
  impl GitExecutor for ScriptedGit {
    async fn run(&self, args: &[String]) -> Result<String, EngineError> {
      check_allowed(args)?;
      self.calls.lock().push(args.to_vec());
      (self.handler)(args)
    }

    async fn stream(&self, args: &[String]) -> Result<GitStream, EngineError> {
      let text = self.run(args).await?;
      Ok(GitStream::from_reader(std::io::Cursor::new(text.into_bytes())))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn args(a: &[&str]) -> Vec<String> {
    a.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn allow_list() {
    assert!(check_allowed(&args(&["log", "--all"])).is_ok());
    assert!(check_allowed(&args(&["push", "origin"])).is_err());
    assert!(check_allowed(&args(&["config", "--global"])).is_err());
    assert!(check_allowed(&[]).is_err());
  }

  #[test]
  fn only_git_binary_is_trusted() {
    assert!(SystemGit::new("git", ".").is_ok());
    assert!(SystemGit::new("/usr/bin/git", ".").is_ok());
    assert!(SystemGit::new("sh", ".").is_err());
    assert!(SystemGit::new("/bin/gitx", ".").is_err());
  }

  #[test]
  fn failures_are_classified() {
    let dir = Path::new("/tmp/repo");
    let e = classify_failure(dir, "log", "128", "fatal: not a git repository (or any parent)");
    assert!(matches!(e, EngineError::NotGitRepo { .. }));

    let e = classify_failure(dir, "show", "128", "fatal: bad object deadbeef");
    assert!(matches!(e, EngineError::CommitNotFound { .. }));

    let e = classify_failure(
      dir,
      "diff",
      "128",
      "fatal: ambiguous argument 'nope...HEAD': unknown revision",
    );
    match e {
      EngineError::CommitNotFound { reference } => assert_eq!(reference, "nope...HEAD"),
      other => panic!("unexpected {:?}", other),
    }

    let e = classify_failure(
      dir,
      "log",
      "128",
      "fatal: your current branch 'main' does not have any commits yet",
    );
    assert!(matches!(e, EngineError::EmptyRepository));

    let e = classify_failure(dir, "fetch", "1", "fatal: could not read from remote");
    assert!(matches!(e, EngineError::GitOperationFailed { .. }));
  }

  #[tokio::test]
  async fn stream_from_reader_reads_all_bytes() {
    let mut s = GitStream::from_reader(std::io::Cursor::new(b"hello world".to_vec()));
    let mut buf = [0u8; 4];
    let mut got = Vec::new();
    loop {
      let n = s.read_chunk(&mut buf).await.unwrap();
      if n == 0 {
        break;
      }
      got.extend_from_slice(&buf[..n]);
    }
    assert_eq!(got, b"hello world");
    assert!(s.finish().await.is_ok());
  }

  #[tokio::test]
  async fn rejected_subcommand_never_spawns() {
    let git = SystemGit::new("git", ".").unwrap();
    let err = git.run(&args(&["push"])).await.unwrap_err();
    assert!(matches!(err, EngineError::GitOperationFailed { .. }));
  }
}
