//! Per-mutation cache effect declarations.
//!
//! Dependency relationships between resources are domain specific, so
//! every mutation declares its own effects instead of relying on
//! inference. Effects run only after the mutation's network call
//! succeeded; a failed mutation leaves the cache untouched.

use serde_json::Value;

use super::key::CacheKey;

/// Declarative cache effects of one successful mutation: keys to seed
/// with fresh values, keys to mark stale, and keys to drop entirely.
///
/// Applied atomically by [`ResourceCache::apply`](super::ResourceCache::apply),
/// in the order set, invalidate, remove.
#[derive(Default)]
pub struct MutationEffects {
  pub(super) sets: Vec<(CacheKey, Value)>,
  pub(super) invalidates: Vec<CacheKey>,
  pub(super) removes: Vec<CacheKey>,
}

impl MutationEffects {
  pub fn new() -> Self {
    Self::default()
  }

  /// Store `value` under `key`, marking it fresh.
  pub fn set(mut self, key: CacheKey, value: Value) -> Self {
    self.sets.push((key, value));
    self
  }

  /// Mark `prefix` and everything nested under it stale.
  pub fn invalidate(mut self, prefix: CacheKey) -> Self {
    self.invalidates.push(prefix);
    self
  }

  /// Drop `key` and everything nested under it.
  pub fn remove(mut self, key: CacheKey) -> Self {
    self.removes.push(key);
    self
  }

  pub fn is_empty(&self) -> bool {
    self.sets.is_empty() && self.invalidates.is_empty() && self.removes.is_empty()
  }
}
