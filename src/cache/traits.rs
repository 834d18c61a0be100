//! Core traits and types for the caching system.

use std::time::Duration;

use crate::api::error::ApiError;

/// Trait for typed query keys.
///
/// Implementors identify one (resource kind, parameter set) pair and carry
/// the kind's default time-to-live. The hash must be stable across processes
/// for identical parameters.
pub trait QueryKey {
  /// Resource kind this key belongs to (e.g. "models", "favorites").
  /// Invalidation by kind matches every key with the same value.
  fn resource_kind(&self) -> &'static str;

  /// Stable, fixed-length digest of the parameters.
  fn cache_hash(&self) -> String;

  /// Human-readable form for logging.
  fn description(&self) -> String;

  /// How long a cached value for this key stays fresh.
  fn ttl(&self) -> Duration;

  /// The full cache key (kind + parameter digest).
  fn cache_key(&self) -> CacheKey {
    CacheKey {
      kind: self.resource_kind(),
      hash: self.cache_hash(),
    }
  }
}

/// A fully-resolved cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  pub kind: &'static str,
  pub hash: String,
}

/// Lifecycle state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
  /// Value is within its TTL and may be served without fetching.
  Fresh,
  /// Value is past its TTL or was invalidated; next `get` refetches.
  Stale,
  /// A fetch for this key is in flight; concurrent readers join it.
  Fetching,
  /// The last fetch failed; retried only on the next explicit `get`.
  Error,
}

/// Result from a cache read, including where the data came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// Set when stale data is being served because the refresh failed.
  pub error: Option<ApiError>,
}

impl<T> CacheResult<T> {
  /// Fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      error: None,
    }
  }

  /// Data served from cache within its TTL.
  pub fn from_cache(data: T) -> Self {
    Self {
      data,
      source: CacheSource::CacheFresh,
      error: None,
    }
  }

  /// Stale data served because the refresh failed.
  pub fn stale(data: T, error: ApiError) -> Self {
    Self {
      data,
      source: CacheSource::CacheStale,
      error: Some(error),
    }
  }
}

/// Indicates where a cache read was satisfied from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from the network (possibly via a shared in-flight fetch)
  Network,
  /// Data from cache, still within its TTL
  CacheFresh,
  /// Stale data from cache, refresh failed
  CacheStale,
}
