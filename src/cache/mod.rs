//! Key-addressed resource cache with cross-entity invalidation.
//!
//! This module provides the session-scoped cache behind every resource
//! lookup:
//! - structural keys compared element-wise, with prefix matching
//! - read-through fetching with per-key coalescing of concurrent calls
//! - stale-while-revalidate access and population of related keys
//! - per-mutation effect batches declared by the domain modules

mod invalidation;
mod key;
mod store;

pub use invalidation::MutationEffects;
pub use key::{CacheKey, KeySegment};
pub use store::{CacheEntry, EntryState, ResourceCache};
