use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Poll `probe` every `interval` until it yields `Some`, giving up after `timeout`.
///
/// The probe runs once more when the deadline passes, so a condition that turns true
/// during the last sleep is still seen.
pub async fn wait_until<T, F, Fut>(mut probe: F, timeout: Duration, interval: Duration) -> Option<T>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Option<T>>,
{
  let deadline = Instant::now() + timeout;
  loop {
    if let Some(found) = probe().await {
      return Some(found);
    }
    let now = Instant::now();
    if now >= deadline {
      return None;
    }
    tokio::time::sleep(interval.min(deadline - now)).await;
    if Instant::now() >= deadline {
      return probe().await;
    }
  }
}
