//! Polling state machine for partially computed resources.
//!
//! Some tree-shaped resources are delivered while the server is still
//! computing them; their leaves carry a partial-result marker. The poller
//! schedules a refetch after a fixed delay for as long as any leaf stays
//! partial, and stops permanently once a leaf reports the computation was
//! abandoned. The machine is deliberately free of any presentation
//! concern: consumers drive it with fetch verdicts and tear it down with
//! [`Poller::stop`].

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

/// Verdict over one fetched snapshot of a tree-shaped resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partiality {
  /// No leaf is partial, the value is final.
  Complete,
  /// At least one leaf is still being computed.
  Partial,
  /// The server gave up computing at least one leaf.
  Aborted,
}

/// Polling state of one observed resource.
///
/// `Idle -> Fetching -> {Complete, PartialPending, Aborted}`, with
/// `PartialPending -> Fetching` when the delay elapses. `Aborted` is
/// terminal for polling; explicit page advances may still move a
/// `Complete` resource back to `Fetching`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
  Idle,
  Fetching,
  PartialPending,
  Complete,
  Aborted,
}

/// Schedules refetches for a resource the server is still computing.
pub struct Poller {
  delay: Duration,
  state: Arc<Mutex<PollState>>,
  timer: Mutex<Option<JoinHandle<()>>>,
}

impl Poller {
  pub fn new(delay: Duration) -> Self {
    Self {
      delay,
      state: Arc::new(Mutex::new(PollState::Idle)),
      timer: Mutex::new(None),
    }
  }

  pub fn state(&self) -> PollState {
    *lock(&self.state)
  }

  /// Record that an explicit fetch or page advance started. Ignored once
  /// the resource is aborted.
  pub fn mark_fetching(&self) {
    self.cancel_timer();
    let mut state = lock(&self.state);
    if *state != PollState::Aborted {
      *state = PollState::Fetching;
    }
  }

  /// Evaluate a finished fetch. A partial verdict schedules `refetch`
  /// after the configured delay; an aborted verdict stops polling for
  /// good, even though the value remains partial.
  pub fn on_fetched<F, Fut>(&self, partiality: Partiality, refetch: F)
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    self.cancel_timer();

    let mut state = lock(&self.state);
    if *state == PollState::Aborted {
      return;
    }
    match partiality {
      Partiality::Aborted => {
        debug!("server aborted computation, polling stops");
        *state = PollState::Aborted;
      }
      Partiality::Complete => {
        *state = PollState::Complete;
      }
      Partiality::Partial => {
        *state = PollState::PartialPending;
        drop(state);

        let delay = self.delay;
        let shared = Arc::clone(&self.state);
        let handle = tokio::spawn(async move {
          tokio::time::sleep(delay).await;
          {
            let mut state = lock(&shared);
            if *state != PollState::PartialPending {
              return;
            }
            *state = PollState::Fetching;
          }
          refetch().await;
        });
        *lock(&self.timer) = Some(handle);
      }
    }
  }

  /// Cancel a pending refetch timer; no timer outlives the consumer.
  /// Safe to call any number of times.
  pub fn stop(&self) {
    self.cancel_timer();
  }

  fn cancel_timer(&self) {
    if let Some(timer) = lock(&self.timer).take() {
      timer.abort();
    }
  }
}

impl Drop for Poller {
  fn drop(&mut self) {
    self.stop();
  }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  fn counting_refetch(counter: Arc<AtomicUsize>) -> impl FnOnce() -> futures::future::Ready<()> {
    move || {
      counter.fetch_add(1, Ordering::SeqCst);
      futures::future::ready(())
    }
  }

  #[tokio::test]
  async fn test_complete_resource_schedules_nothing() {
    let poller = Poller::new(Duration::from_millis(10));
    let counter = Arc::new(AtomicUsize::new(0));

    poller.mark_fetching();
    poller.on_fetched(Partiality::Complete, counting_refetch(Arc::clone(&counter)));

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(poller.state(), PollState::Complete);
    assert_eq!(counter.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_partial_resource_triggers_refetch_after_delay() {
    let poller = Poller::new(Duration::from_millis(10));
    let counter = Arc::new(AtomicUsize::new(0));

    poller.mark_fetching();
    poller.on_fetched(Partiality::Partial, counting_refetch(Arc::clone(&counter)));
    assert_eq!(poller.state(), PollState::PartialPending);

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(poller.state(), PollState::Fetching);
  }

  #[tokio::test]
  async fn test_aborted_is_terminal() {
    let poller = Poller::new(Duration::from_millis(10));
    let counter = Arc::new(AtomicUsize::new(0));

    poller.mark_fetching();
    poller.on_fetched(Partiality::Aborted, counting_refetch(Arc::clone(&counter)));
    assert_eq!(poller.state(), PollState::Aborted);

    // even a partial verdict afterwards must not schedule anything
    poller.on_fetched(Partiality::Partial, counting_refetch(Arc::clone(&counter)));
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(poller.state(), PollState::Aborted);
    assert_eq!(counter.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_stop_cancels_pending_timer() {
    let poller = Poller::new(Duration::from_millis(10));
    let counter = Arc::new(AtomicUsize::new(0));

    poller.mark_fetching();
    poller.on_fetched(Partiality::Partial, counting_refetch(Arc::clone(&counter)));
    poller.stop();

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 0);
  }
}
