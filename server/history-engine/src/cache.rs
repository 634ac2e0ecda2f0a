//! Commit Detail Cache: bounded LRU memo of per-commit git lookups.
//!
//! One instance per invocation, shared (behind `Arc`) by every component that
//! fetches commit detail. Mutation is serialized by a mutex so concurrent batch
//! entries racing on the same key never corrupt recency order.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

pub const DEFAULT_CAPACITY: usize = 1000;

/// Cached value for one lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedDetail {
  Message { subject: String, body: String },
  Stat(String),
}

/// Key for a commit's subject/body.
pub fn message_key(hash: &str) -> String {
  format!("msg:{}", hash)
}

/// Key for a commit's `--stat` text.
pub fn stat_key(hash: &str) -> String {
  format!("stat:{}", hash)
}

pub struct CommitCache {
  inner: Mutex<LruCache<String, CachedDetail>>,
}

impl CommitCache {
  /// A zero capacity is bumped to one.
  pub fn new(capacity: usize) -> Self {
    let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
    Self {
      inner: Mutex::new(LruCache::new(capacity)),
    }
  }

  /// Stored value, promoted to most-recently-used.
  pub fn get(&self, key: &str) -> Option<CachedDetail> {
    self.inner.lock().get(key).cloned()
  }

  /// Insert or update. Inserting into a full cache evicts the least-recently-used entry.
  pub fn set(&self, key: impl Into<String>, value: CachedDetail) {
    self.inner.lock().put(key.into(), value);
  }

  /// Presence check without touching recency.
  pub fn contains(&self, key: &str) -> bool {
    self.inner.lock().contains(key)
  }

  pub fn len(&self) -> usize {
    self.inner.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn capacity(&self) -> usize {
    self.inner.lock().cap().get()
  }
}

impl Default for CommitCache {
  fn default() -> Self {
    Self::new(DEFAULT_CAPACITY)
  }
}
