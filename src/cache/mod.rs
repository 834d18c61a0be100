//! Keyed, time-stamped cache of server responses.
//!
//! This module is resource-agnostic: it caches JSON payloads keyed by
//! (resource kind, parameter digest), deduplicates concurrent fetches for
//! one key, and applies mutation-declared invalidations. Typed query keys
//! for the catalog live in `catalog::cache`.

mod layer;
mod store;
mod traits;

pub use layer::{Invalidation, QueryCache, Retry};
pub use traits::{CacheKey, CacheResult, CacheSource, EntryState, QueryKey};
