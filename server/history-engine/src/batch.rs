//! Bounded fan-out over independent per-commit lookups.
//!
//! Items run concurrently within a batch and batches run one after another with a
//! short pause, which caps the number of git processes alive at once. The token is
//! checked before every batch and during the pause.

use futures::future::join_all;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::EngineError;

/// Run `f` over `items` in batches of `batch_size`, preserving input order.
pub async fn for_each_batch<T, R, F, Fut>(
  items: Vec<T>,
  batch_size: usize,
  pause: Duration,
  cancel: &CancellationToken,
  f: F,
) -> Result<Vec<R>, EngineError>
where
  F: Fn(T) -> Fut,
  Fut: Future<Output = R>,
{
  let total = items.len();
  let batch_size = batch_size.max(1);
  let mut out = Vec::with_capacity(total);
  let mut items = items.into_iter();
  let mut batch_no = 0usize;

  loop {
    if cancel.is_cancelled() {
      return Err(EngineError::Cancelled);
    }
    let batch: Vec<T> = items.by_ref().take(batch_size).collect();
    if batch.is_empty() {
      break;
    }
    if batch_no > 0 && !pause.is_zero() {
      tokio::select! {
        _ = cancel.cancelled() => return Err(EngineError::Cancelled),
        _ = tokio::time::sleep(pause) => {}
      }
    }
    debug!(batch = batch_no, size = batch.len(), total, "batch");
    out.extend(join_all(batch.into_iter().map(&f)).await);
    batch_no += 1;
  }

  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  #[tokio::test]
  async fn preserves_order_across_batches() {
    let cancel = CancellationToken::new();
    let out = for_each_batch((0..7).collect(), 3, Duration::ZERO, &cancel, |i: u32| async move {
      i * 10
    })
    .await
    .unwrap();
    assert_eq!(out, vec![0, 10, 20, 30, 40, 50, 60]);
  }

  #[tokio::test]
  async fn concurrency_is_bounded_by_batch_size() {
    let cancel = CancellationToken::new();
    let live = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    for_each_batch((0..20).collect::<Vec<u32>>(), 4, Duration::ZERO, &cancel, |_| {
      let live = live.clone();
      let peak = peak.clone();
      async move {
        let now = live.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        live.fetch_sub(1, Ordering::SeqCst);
      }
    })
    .await
    .unwrap();
    assert!(peak.load(Ordering::SeqCst) <= 4);
  }

  #[tokio::test]
  async fn cancelled_token_stops_before_work() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let ran = AtomicUsize::new(0);
    let err = for_each_batch(vec![1, 2, 3], 2, Duration::ZERO, &cancel, |_| {
      ran.fetch_add(1, Ordering::SeqCst);
      async {}
    })
    .await
    .unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn empty_input_is_empty_output() {
    let cancel = CancellationToken::new();
    let out: Vec<u8> =
      for_each_batch(Vec::<u8>::new(), 50, Duration::from_millis(5), &cancel, |x| async move { x })
        .await
        .unwrap();
    assert!(out.is_empty());
  }
}
