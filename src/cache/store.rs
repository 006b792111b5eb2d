//! Key-addressed store of resource snapshots with read-through fetching.
//!
//! Values are JSON snapshots; typed views are deserialized at the call
//! site. The store is bound to the owning client session, there is no
//! global state. A stale entry is still servable (no UI flash) but
//! triggers exactly one background revalidation on access; concurrent
//! requests for the same key are coalesced into a single network call.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::invalidation::MutationEffects;
use super::key::CacheKey;
use crate::error::ApiError;

/// Freshness of a cached entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
  Fresh,
  Stale,
  Missing,
}

/// Snapshot returned by [`ResourceCache::lookup`].
#[derive(Debug, Clone)]
pub struct CacheEntry {
  pub key: CacheKey,
  pub value: Option<Value>,
  pub state: EntryState,
}

struct StoredEntry {
  value: Value,
  stale: bool,
  written_at: DateTime<Utc>,
  /// Sequence of the fetch (or explicit write) that produced this value.
  /// A completion only stores its value if no later-initiated write got
  /// there first, so a slow early fetch cannot clobber fresher data.
  written_seq: u64,
}

type FetchOutcome = Result<Value, ApiError>;
type SeedFn = Box<dyn Fn(&Value) -> Vec<(CacheKey, Value)> + Send>;

struct CacheState {
  entries: HashMap<CacheKey, StoredEntry>,
  inflight: HashMap<CacheKey, broadcast::Sender<FetchOutcome>>,
  next_seq: u64,
}

impl CacheState {
  fn take_seq(&mut self) -> u64 {
    self.next_seq += 1;
    self.next_seq
  }

  fn store(&mut self, key: CacheKey, value: Value, seq: u64) {
    self.entries.insert(
      key,
      StoredEntry {
        value,
        stale: false,
        written_at: Utc::now(),
        written_seq: seq,
      },
    );
  }

  fn invalidate(&mut self, prefix: &CacheKey) {
    for (key, entry) in self.entries.iter_mut() {
      if key.starts_with(prefix) {
        entry.stale = true;
      }
    }
  }

  fn remove(&mut self, key: &CacheKey) {
    self.entries.retain(|stored, _| !stored.starts_with(key));
  }
}

/// In-memory, key-addressed store of resource snapshots.
#[derive(Clone)]
pub struct ResourceCache {
  state: Arc<Mutex<CacheState>>,
  stale_after: Option<Duration>,
}

impl Default for ResourceCache {
  fn default() -> Self {
    Self::new()
  }
}

impl ResourceCache {
  pub fn new() -> Self {
    Self {
      state: Arc::new(Mutex::new(CacheState {
        entries: HashMap::new(),
        inflight: HashMap::new(),
        next_seq: 0,
      })),
      stale_after: None,
    }
  }

  /// Additionally treat entries older than `stale_after` as stale, on top
  /// of explicit invalidation.
  pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
    self.stale_after = Some(stale_after);
    self
  }

  fn lock(&self) -> MutexGuard<'_, CacheState> {
    self
      .state
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner)
  }

  fn entry_is_stale(&self, entry: &StoredEntry) -> bool {
    if entry.stale {
      return true;
    }
    match self.stale_after {
      Some(stale_after) => Utc::now() - entry.written_at > stale_after,
      None => false,
    }
  }

  /// Non-fetching peek at a key.
  pub fn lookup(&self, key: &CacheKey) -> CacheEntry {
    let state = self.lock();
    match state.entries.get(key) {
      Some(entry) => CacheEntry {
        key: key.clone(),
        value: Some(entry.value.clone()),
        state: if self.entry_is_stale(entry) {
          EntryState::Stale
        } else {
          EntryState::Fresh
        },
      },
      None => CacheEntry {
        key: key.clone(),
        value: None,
        state: EntryState::Missing,
      },
    }
  }

  /// Unconditional overwrite; the entry becomes fresh and wins over any
  /// earlier-initiated in-flight fetch for the same key.
  pub fn set(&self, key: CacheKey, value: Value) {
    let mut state = self.lock();
    let seq = state.take_seq();
    state.store(key, value, seq);
  }

  /// Mark `prefix` and every entry nested under it stale. Stale entries
  /// keep serving their value until a refetch replaces it.
  pub fn invalidate(&self, prefix: &CacheKey) {
    self.lock().invalidate(prefix);
  }

  /// Drop `key` and every entry nested under it. Unlike invalidation a
  /// removed entry has no stale value to show while refetching.
  pub fn remove(&self, key: &CacheKey) {
    self.lock().remove(key);
  }

  /// Drop everything, e.g. after login or logout.
  pub fn clear(&self) {
    self.lock().entries.clear();
  }

  /// Apply the effects of a successful mutation under a single lock.
  pub fn apply(&self, effects: MutationEffects) {
    let mut state = self.lock();
    for (key, value) in effects.sets {
      let seq = state.take_seq();
      state.store(key, value, seq);
    }
    for prefix in &effects.invalidates {
      state.invalidate(prefix);
    }
    for key in &effects.removes {
      state.remove(key);
    }
  }

  /// Read-through access: a fresh entry is served from the cache, a
  /// missing one awaits the fetch, a stale one is returned immediately
  /// while one background revalidation runs. Concurrent callers share a
  /// single in-flight fetch per key.
  pub async fn get_with<F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<Value, ApiError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = FetchOutcome> + Send + 'static,
  {
    self.get_with_seed(key, fetch, |_| Vec::new()).await
  }

  /// Like [`get_with`](Self::get_with), additionally seeding related keys
  /// from the fetched value (a collection seeds its embedded items).
  pub async fn get_with_seed<F, Fut, S>(
    &self,
    key: &CacheKey,
    fetch: F,
    seed: S,
  ) -> Result<Value, ApiError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = FetchOutcome> + Send + 'static,
    S: Fn(&Value) -> Vec<(CacheKey, Value)> + Send + 'static,
  {
    enum Plan {
      Hit(Value),
      Wait(broadcast::Receiver<FetchOutcome>),
      Fetch { seq: u64 },
      Revalidate { stale_value: Value, seq: u64 },
    }

    let seed: SeedFn = Box::new(seed);
    let plan = {
      let mut state = self.lock();
      let cached = state
        .entries
        .get(key)
        .map(|entry| (entry.value.clone(), self.entry_is_stale(entry)));

      match cached {
        Some((value, false)) => Plan::Hit(value),
        Some((value, true)) => {
          if state.inflight.contains_key(key) {
            // revalidation already running, keep serving the stale value
            Plan::Hit(value)
          } else {
            let seq = state.take_seq();
            let (tx, _) = broadcast::channel(1);
            state.inflight.insert(key.clone(), tx);
            Plan::Revalidate {
              stale_value: value,
              seq,
            }
          }
        }
        None => match state.inflight.get(key) {
          Some(tx) => Plan::Wait(tx.subscribe()),
          None => {
            let seq = state.take_seq();
            let (tx, _) = broadcast::channel(1);
            state.inflight.insert(key.clone(), tx);
            Plan::Fetch { seq }
          }
        },
      }
    };

    match plan {
      Plan::Hit(value) => Ok(value),
      Plan::Wait(mut rx) => match rx.recv().await {
        Ok(outcome) => outcome,
        Err(_) => Err(ApiError::Network("in-flight fetch was dropped".to_string())),
      },
      Plan::Fetch { seq } => {
        let outcome = fetch().await;
        self.finish_fetch(key, seq, outcome, &seed)
      }
      Plan::Revalidate { stale_value, seq } => {
        let cache = self.clone();
        let key = key.clone();
        let future = fetch();
        tokio::spawn(async move {
          let outcome = future.await;
          let _ = cache.finish_fetch(&key, seq, outcome, &seed);
        });
        Ok(stale_value)
      }
    }
  }

  fn finish_fetch(
    &self,
    key: &CacheKey,
    seq: u64,
    outcome: FetchOutcome,
    seed: &SeedFn,
  ) -> FetchOutcome {
    let tx = {
      let mut state = self.lock();
      let tx = state.inflight.remove(key);

      match &outcome {
        Ok(value) => {
          let superseded = state
            .entries
            .get(key)
            .map(|entry| entry.written_seq > seq)
            .unwrap_or(false);
          if superseded {
            debug!(key = %key, "discarding superseded fetch result");
          } else {
            state.store(key.clone(), value.clone(), seq);
            for (seed_key, seed_value) in seed(value) {
              let seed_seq = state.take_seq();
              state.store(seed_key, seed_value, seed_seq);
            }
          }
        }
        Err(error) => {
          // a failed refetch must not destroy existing data
          warn!(key = %key, error = %error, "fetch failed, keeping cached value");
        }
      }
      tx
    };

    if let Some(tx) = tx {
      let _ = tx.send(outcome.clone());
    }
    outcome
  }
}
