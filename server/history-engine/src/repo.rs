//! Repository state queries issued through the Command Executor.
//!
//! Expensive per-commit lookups (message, `--stat`) go through the shared
//! [`CommitCache`]; everything else is issued fresh.

use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use crate::cache::{self, CachedDetail, CommitCache};
use crate::config::Config;
use crate::error::EngineError;
use crate::executor::{GitExecutor, GitStream, SystemGit};
use crate::types::Author;

static HASH_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{7,40}$").ok());

const UNSAFE_REF_CHARS: &[char] = &['<', '>', '|', '&', ';', '$', '`', '\\'];

/// Subject/body separator requested from `git show`.
const FIELD_SEP: char = '\u{1f}';

/// Pin the patch format the scanner expects, whatever the user's git config says.
const DIFF_FORMAT_FLAGS: &[&str] = &[
  "--no-color",
  "--no-ext-diff",
  "--src-prefix=a/",
  "--dst-prefix=b/",
  "-M",
];

pub fn validate_hash(hash: &str) -> Result<(), EngineError> {
  if HASH_RE.as_ref().is_some_and(|re| re.is_match(hash)) {
    Ok(())
  } else {
    Err(EngineError::InvalidHashFormat {
      value: hash.to_string(),
    })
  }
}

/// Branch/tag/range names: non-empty, no whitespace, no shell metacharacters, no leading dash.
pub fn validate_ref(reference: &str) -> Result<(), EngineError> {
  let ok = !reference.is_empty()
    && !reference.starts_with('-')
    && !reference.chars().any(|c| c.is_whitespace() || UNSAFE_REF_CHARS.contains(&c));
  if ok {
    Ok(())
  } else {
    Err(EngineError::InvalidHashFormat {
      value: reference.to_string(),
    })
  }
}

fn owned(args: &[&str]) -> Vec<String> {
  args.iter().map(|s| s.to_string()).collect()
}

pub struct Repository {
  git: Arc<dyn GitExecutor>,
  cache: Arc<CommitCache>,
  config: Config,
}

impl Repository {
  pub fn new(git: Arc<dyn GitExecutor>, cache: Arc<CommitCache>, config: Config) -> Self {
    Self { git, cache, config }
  }

  /// Repository backed by the system git in `config.repo_dir`, with a fresh cache.
  pub fn open(config: Config) -> Result<Self, EngineError> {
    let git = SystemGit::new(&config.git_binary, config.repo_dir.clone())?;
    let cache = Arc::new(CommitCache::new(config.cache_capacity));
    Ok(Self::new(Arc::new(git), cache, config))
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn cache(&self) -> &Arc<CommitCache> {
    &self.cache
  }

  pub async fn run(&self, args: &[String]) -> Result<String, EngineError> {
    self.git.run(args).await
  }

  /// Fails with `NotGitRepo` / `EmptyRepository` before any pipeline work starts.
  pub async fn validate(&self) -> Result<(), EngineError> {
    let inside = self
      .run(&owned(&["rev-parse", "--is-inside-work-tree"]))
      .await?;
    if inside.trim() != "true" {
      return Err(EngineError::NotGitRepo {
        path: self.config.repo_dir.display().to_string(),
      });
    }

    let head = match self.run(&owned(&["rev-list", "-n", "1", "--all"])).await {
      Ok(out) => out,
      Err(EngineError::CommitNotFound { .. }) => String::new(),
      Err(e) => return Err(e),
    };
    if head.trim().is_empty() {
      return Err(EngineError::EmptyRepository);
    }
    Ok(())
  }

  /// `git fetch --all`; failures are logged, never fatal.
  pub async fn fetch_all(&self) {
    if let Err(e) = self.run(&owned(&["fetch", "--all", "--quiet"])).await {
      warn!(error = %e, "fetch failed; continuing with local refs");
    }
  }

  /// Every distinct name/email pair, most commits first.
  pub async fn list_authors(&self) -> Result<Vec<Author>, EngineError> {
    let out = self.run(&owned(&["shortlog", "-sne", "--all"])).await?;
    let mut authors = parse_shortlog(&out);
    authors.sort_by(|a, b| {
      b.commit_count
        .cmp(&a.commit_count)
        .then_with(|| a.name.cmp(&b.name))
    });
    Ok(authors)
  }

  /// Authors whose name or email contains `query`, case-insensitively.
  pub async fn verify_author(&self, query: &str) -> Result<Vec<Author>, EngineError> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
      return Err(EngineError::InvalidAuthor);
    }
    Ok(
      self
        .list_authors()
        .await?
        .into_iter()
        .filter(|a| {
          a.name.to_lowercase().contains(&needle) || a.email.to_lowercase().contains(&needle)
        })
        .collect(),
    )
  }

  pub async fn tracked_files(&self) -> Result<Vec<String>, EngineError> {
    let out = self.run(&owned(&["ls-files"])).await?;
    Ok(
      out
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect(),
    )
  }

  /// (subject, body) of a commit, through the cache.
  pub async fn commit_message(&self, hash: &str) -> Result<(String, String), EngineError> {
    validate_hash(hash)?;
    let key = cache::message_key(hash);
    if let Some(CachedDetail::Message { subject, body }) = self.cache.get(&key) {
      return Ok((subject, body));
    }

    let out = self
      .run(&owned(&["show", "-s", "--no-color", "--format=%s%x1f%b", hash]))
      .await?;
    let (subject, body) = match out.split_once(FIELD_SEP) {
      Some((s, b)) => (s.trim().to_string(), b.trim().to_string()),
      None => (out.trim().to_string(), String::new()),
    };
    self.cache.set(
      key,
      CachedDetail::Message {
        subject: subject.clone(),
        body: body.clone(),
      },
    );
    Ok((subject, body))
  }

  /// `--stat` text of a commit, through the cache.
  pub async fn commit_stat(&self, hash: &str) -> Result<String, EngineError> {
    validate_hash(hash)?;
    let key = cache::stat_key(hash);
    if let Some(CachedDetail::Stat(text)) = self.cache.get(&key) {
      return Ok(text);
    }
    debug!(hash, "stat cache miss");
    let out = self
      .run(&owned(&[
        "show",
        "--format=",
        "--no-color",
        "-M",
        "--stat=1000,1000",
        hash,
      ]))
      .await?;
    self.cache.set(key, CachedDetail::Stat(out.clone()));
    Ok(out)
  }

  fn commit_diff_args(hash: &str) -> Result<Vec<String>, EngineError> {
    validate_hash(hash)?;
    let mut args = owned(&["show", "--format="]);
    args.extend(owned(DIFF_FORMAT_FLAGS));
    args.extend(owned(&["--patch", hash]));
    Ok(args)
  }

  fn range_diff_args(base: &str, head: &str) -> Result<Vec<String>, EngineError> {
    validate_ref(base)?;
    validate_ref(head)?;
    let mut args = owned(&["diff"]);
    args.extend(owned(DIFF_FORMAT_FLAGS));
    args.push(format!("{}...{}", base, head));
    Ok(args)
  }

  pub async fn commit_diff_text(&self, hash: &str) -> Result<String, EngineError> {
    self.run(&Self::commit_diff_args(hash)?).await
  }

  pub async fn commit_diff_stream(&self, hash: &str) -> Result<GitStream, EngineError> {
    self.git.stream(&Self::commit_diff_args(hash)?).await
  }

  pub async fn range_diff_text(&self, base: &str, head: &str) -> Result<String, EngineError> {
    self.run(&Self::range_diff_args(base, head)?).await
  }

  pub async fn range_diff_stream(&self, base: &str, head: &str) -> Result<GitStream, EngineError> {
    self.git.stream(&Self::range_diff_args(base, head)?).await
  }
}

/// Parse `git shortlog -sne` rows: `<count>\t<name> <<email>>`.
pub fn parse_shortlog(text: &str) -> Vec<Author> {
  text
    .lines()
    .filter_map(|line| {
      let (count, ident) = line.trim().split_once('\t')?;
      let commit_count = count.trim().parse().ok()?;
      let (name, email) = match ident.rsplit_once(" <") {
        Some((name, email)) => (name.trim(), email.trim_end_matches('>').trim()),
        None => (ident.trim(), ""),
      };
      Some(Author {
        name: name.to_string(),
        email: email.to_string(),
        commit_count,
      })
    })
    .collect()
}
