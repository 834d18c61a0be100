//! Cache layer that orchestrates caching logic with network fetching.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use super::store::{CacheStore, Claim};
use super::traits::{CacheKey, CacheResult, EntryState, QueryKey};
use crate::api::error::{ApiError, ApiResult};

/// Retry policy for a cache-driven fetch. The base design never retries;
/// list call sites opt into a single retry on network failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
  Never,
  Once,
}

/// Cache invalidation applied after a successful mutation.
#[derive(Debug, Clone)]
pub enum Invalidation {
  /// Mark every entry of a resource kind stale.
  Kind(&'static str),
  /// Mark one exact entry stale.
  Key(CacheKey),
}

/// Query cache that sits between callers and the resource services.
///
/// Entries hold the JSON response payload; callers decode into their own
/// types on read. Concurrent `get`s for one key share a single network
/// fetch, and mutations invalidate by declaration rather than refetching.
pub struct QueryCache {
  store: Arc<CacheStore>,
}

impl QueryCache {
  pub fn new() -> Self {
    Self {
      store: Arc::new(CacheStore::new()),
    }
  }

  /// Fetch with the default no-retry policy. See [`get_with`](Self::get_with).
  pub async fn get<K, T, F, Fut>(&self, key: &K, fetcher: F) -> ApiResult<CacheResult<T>>
  where
    K: QueryKey,
    T: Serialize + DeserializeOwned,
    F: Fn() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
  {
    self.get_with(key, Retry::Never, fetcher).await
  }

  /// Read a key, fetching if the cached value is stale or missing.
  ///
  /// - Fresh entry: returned immediately, no network call.
  /// - Fetch already in flight: wait for it and share its outcome.
  /// - Stale or missing: run `fetcher` (once more on network failure when
  ///   `retry` is `Once`). On failure the entry is marked `Error`; a prior
  ///   stale value, if any, is served alongside the error, otherwise the
  ///   error is returned. Failed entries refetch on the next `get`.
  pub async fn get_with<K, T, F, Fut>(
    &self,
    key: &K,
    retry: Retry,
    fetcher: F,
  ) -> ApiResult<CacheResult<T>>
  where
    K: QueryKey,
    T: Serialize + DeserializeOwned,
    F: Fn() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
  {
    let cache_key = key.cache_key();

    match self.store.claim(&cache_key, key.ttl()) {
      Claim::Hit(value) => {
        debug!(query = %key.description(), "cache hit");
        decode(value).map(CacheResult::from_cache)
      }
      Claim::Join(mut rx) => {
        debug!(query = %key.description(), "joining in-flight fetch");
        match rx.recv().await {
          Ok(Ok(value)) => decode(value).map(CacheResult::from_network),
          // Joined readers observe the same outcome as the fetch owner: a
          // failed refresh still serves the prior stale value when one exists.
          Ok(Err(err)) => match self.store.stale_value(&cache_key) {
            Some(value) => decode(value).map(|data| CacheResult::stale(data, err)),
            None => Err(err),
          },
          // Sender dropped without completing (cache cleared mid-fetch).
          Err(_) => Err(ApiError::Network("request was canceled".to_string())),
        }
      }
      Claim::Fetch { prior } => {
        debug!(query = %key.description(), "cache miss, fetching");
        let mut result = fetcher().await;
        if retry == Retry::Once && matches!(result, Err(ApiError::Network(_))) {
          debug!(query = %key.description(), "network failure, retrying once");
          result = fetcher().await;
        }

        let outcome = result.and_then(encode);
        self.store.complete(&cache_key, outcome.clone());

        match outcome {
          Ok(value) => decode(value).map(CacheResult::from_network),
          Err(err) => match prior {
            Some(value) => decode(value).map(|data| CacheResult::stale(data, err)),
            None => Err(err),
          },
        }
      }
    }
  }

  /// Run a mutation and, only on success, apply its declared invalidations.
  ///
  /// Invalidations are applied before this returns, so a subsequent `get`
  /// on an overlapping key can never reuse pre-mutation data. On failure
  /// the cache is untouched and the error is surfaced to the caller.
  pub async fn mutate<T, F, Fut>(
    &self,
    op: F,
    invalidations: impl IntoIterator<Item = Invalidation>,
  ) -> ApiResult<T>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
  {
    let out = op().await?;
    for invalidation in invalidations {
      match invalidation {
        Invalidation::Kind(kind) => {
          debug!(kind, "invalidating cache kind after mutation");
          self.store.invalidate_kind(kind);
        }
        Invalidation::Key(key) => {
          debug!(kind = key.kind, "invalidating cache entry after mutation");
          self.store.invalidate_key(&key);
        }
      }
    }
    Ok(out)
  }

  /// Mark every entry of a resource kind stale without refetching.
  pub fn invalidate_kind(&self, kind: &'static str) {
    self.store.invalidate_kind(kind);
  }

  /// Mark one key stale without refetching.
  pub fn invalidate<K: QueryKey>(&self, key: &K) {
    self.store.invalidate_key(&key.cache_key());
  }

  /// Drop every entry. Used on session transitions so no data cached for
  /// one user is ever observable by another.
  pub fn clear(&self) {
    self.store.clear();
  }

  /// Effective state of a key's entry, if one exists.
  pub fn entry_state<K: QueryKey>(&self, key: &K) -> Option<EntryState> {
    self.store.state(&key.cache_key())
  }

  #[allow(dead_code)]
  pub fn len(&self) -> usize {
    self.store.len()
  }
}

impl Default for QueryCache {
  fn default() -> Self {
    Self::new()
  }
}

impl Clone for QueryCache {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}

fn encode<T: Serialize>(data: T) -> ApiResult<Value> {
  serde_json::to_value(data).map_err(|e| ApiError::Decode(e.to_string()))
}

fn decode<T: DeserializeOwned>(value: Value) -> ApiResult<T> {
  serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::traits::CacheSource;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration;

  struct TestKey {
    kind: &'static str,
    name: String,
    ttl: Duration,
  }

  impl TestKey {
    fn new(kind: &'static str, name: &str) -> Self {
      Self {
        kind,
        name: name.to_string(),
        ttl: Duration::from_secs(60),
      }
    }

    fn with_ttl(mut self, ttl: Duration) -> Self {
      self.ttl = ttl;
      self
    }
  }

  impl QueryKey for TestKey {
    fn resource_kind(&self) -> &'static str {
      self.kind
    }

    fn cache_hash(&self) -> String {
      self.name.clone()
    }

    fn description(&self) -> String {
      format!("{}:{}", self.kind, self.name)
    }

    fn ttl(&self) -> Duration {
      self.ttl
    }
  }

  #[tokio::test]
  async fn test_concurrent_gets_share_one_fetch() {
    let cache = QueryCache::new();
    let key = TestKey::new("models", "page1");
    let calls = AtomicU32::new(0);

    let fetcher = || async {
      calls.fetch_add(1, Ordering::SeqCst);
      tokio::time::sleep(Duration::from_millis(20)).await;
      Ok::<_, ApiError>(vec![1, 2, 3])
    };

    let (a, b, c) = tokio::join!(
      cache.get(&key, fetcher),
      cache.get(&key, fetcher),
      cache.get(&key, fetcher),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.unwrap().data, vec![1, 2, 3]);
    assert_eq!(b.unwrap().data, vec![1, 2, 3]);
    assert_eq!(c.unwrap().data, vec![1, 2, 3]);
  }

  #[tokio::test]
  async fn test_fresh_entry_served_without_fetching() {
    let cache = QueryCache::new();
    let key = TestKey::new("models", "page1");
    let calls = AtomicU32::new(0);

    let fetcher = || async {
      calls.fetch_add(1, Ordering::SeqCst);
      Ok::<_, ApiError>(42u32)
    };

    let first = cache.get(&key, fetcher).await.unwrap();
    assert_eq!(first.source, CacheSource::Network);

    let second = cache.get(&key, fetcher).await.unwrap();
    assert_eq!(second.source, CacheSource::CacheFresh);
    assert_eq!(second.data, 42);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_expired_entry_refetches() {
    let cache = QueryCache::new();
    let key = TestKey::new("models", "page1").with_ttl(Duration::ZERO);
    let calls = AtomicU32::new(0);

    let fetcher = || async { Ok::<_, ApiError>(calls.fetch_add(1, Ordering::SeqCst)) };

    cache.get(&key, fetcher).await.unwrap();
    assert_eq!(cache.entry_state(&key), Some(EntryState::Stale));

    let second = cache.get(&key, fetcher).await.unwrap();
    assert_eq!(second.source, CacheSource::Network);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_invalidated_key_never_serves_old_value() {
    let cache = QueryCache::new();
    let key = TestKey::new("favorites", "all");
    let version = AtomicU32::new(1);

    let fetcher = || async { Ok::<_, ApiError>(version.load(Ordering::SeqCst)) };

    assert_eq!(cache.get(&key, fetcher).await.unwrap().data, 1);

    version.store(2, Ordering::SeqCst);
    cache.invalidate(&key);
    assert_eq!(cache.entry_state(&key), Some(EntryState::Stale));

    let after = cache.get(&key, fetcher).await.unwrap();
    assert_eq!(after.data, 2);
    assert_eq!(after.source, CacheSource::Network);
  }

  #[tokio::test]
  async fn test_mutate_success_applies_invalidations() {
    let cache = QueryCache::new();
    let list_key = TestKey::new("favorites", "all");
    let detail_key = TestKey::new("model", "7");
    let other_key = TestKey::new("manufacturers", "all");

    let fetcher = || async { Ok::<_, ApiError>("cached".to_string()) };
    cache.get(&list_key, fetcher).await.unwrap();
    cache.get(&detail_key, fetcher).await.unwrap();
    cache.get(&other_key, fetcher).await.unwrap();

    cache
      .mutate(
        || async { Ok::<_, ApiError>(()) },
        [
          Invalidation::Kind("favorites"),
          Invalidation::Key(detail_key.cache_key()),
        ],
      )
      .await
      .unwrap();

    assert_eq!(cache.entry_state(&list_key), Some(EntryState::Stale));
    assert_eq!(cache.entry_state(&detail_key), Some(EntryState::Stale));
    assert_eq!(cache.entry_state(&other_key), Some(EntryState::Fresh));
  }

  #[tokio::test]
  async fn test_mutate_failure_leaves_cache_untouched() {
    let cache = QueryCache::new();
    let key = TestKey::new("models", "page1");

    cache
      .get(&key, || async { Ok::<_, ApiError>(1u32) })
      .await
      .unwrap();

    let result: ApiResult<()> = cache
      .mutate(
        || async { Err(ApiError::server(500, None)) },
        [Invalidation::Kind("models")],
      )
      .await;

    assert!(result.is_err());
    assert_eq!(cache.entry_state(&key), Some(EntryState::Fresh));
  }

  #[tokio::test]
  async fn test_failed_refresh_serves_stale_value_with_error() {
    let cache = QueryCache::new();
    let key = TestKey::new("models", "page1").with_ttl(Duration::ZERO);

    cache
      .get(&key, || async { Ok::<_, ApiError>("page-one".to_string()) })
      .await
      .unwrap();

    let result: CacheResult<String> = cache
      .get(&key, || async {
        Err(ApiError::Network("timed out".to_string()))
      })
      .await
      .unwrap();

    assert_eq!(result.data, "page-one");
    assert_eq!(result.source, CacheSource::CacheStale);
    assert!(matches!(result.error, Some(ApiError::Network(_))));
    assert_eq!(cache.entry_state(&key), Some(EntryState::Error));
  }

  #[tokio::test]
  async fn test_joined_reader_gets_stale_value_when_shared_refresh_fails() {
    let cache = QueryCache::new();
    let key = TestKey::new("models", "page1").with_ttl(Duration::ZERO);

    cache
      .get(&key, || async { Ok::<_, ApiError>("page-one".to_string()) })
      .await
      .unwrap();

    let failing = || async {
      tokio::time::sleep(Duration::from_millis(20)).await;
      Err::<String, _>(ApiError::Network("timed out".to_string()))
    };

    // First get owns the refresh, second joins it; both must resolve the
    // same way when the refresh fails.
    let (owner, joined) = tokio::join!(cache.get(&key, failing), cache.get(&key, failing));

    let owner = owner.unwrap();
    assert_eq!(owner.data, "page-one");
    assert_eq!(owner.source, CacheSource::CacheStale);

    let joined = joined.unwrap();
    assert_eq!(joined.data, "page-one");
    assert_eq!(joined.source, CacheSource::CacheStale);
    assert!(matches!(joined.error, Some(ApiError::Network(_))));
  }

  #[tokio::test]
  async fn test_failed_fetch_without_prior_value_is_an_error() {
    let cache = QueryCache::new();
    let key = TestKey::new("models", "page1");

    let result: ApiResult<CacheResult<u32>> = cache
      .get(&key, || async {
        Err(ApiError::Network("no route".to_string()))
      })
      .await;

    assert!(matches!(result, Err(ApiError::Network(_))));
    assert_eq!(cache.entry_state(&key), Some(EntryState::Error));
  }

  #[tokio::test]
  async fn test_error_entry_retries_on_next_get() {
    let cache = QueryCache::new();
    let key = TestKey::new("models", "page1");
    let calls = AtomicU32::new(0);

    let fetcher = || async {
      if calls.fetch_add(1, Ordering::SeqCst) == 0 {
        Err(ApiError::Network("down".to_string()))
      } else {
        Ok(7u32)
      }
    };

    assert!(cache.get(&key, fetcher).await.is_err());
    assert_eq!(cache.get(&key, fetcher).await.unwrap().data, 7);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_retry_once_recovers_from_transient_network_failure() {
    let cache = QueryCache::new();
    let key = TestKey::new("models", "page1");
    let calls = AtomicU32::new(0);

    let fetcher = || async {
      if calls.fetch_add(1, Ordering::SeqCst) == 0 {
        Err(ApiError::Network("reset".to_string()))
      } else {
        Ok(9u32)
      }
    };

    let result = cache.get_with(&key, Retry::Once, fetcher).await.unwrap();
    assert_eq!(result.data, 9);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_retry_once_does_not_retry_server_errors() {
    let cache = QueryCache::new();
    let key = TestKey::new("models", "page1");
    let calls = AtomicU32::new(0);

    let fetcher = || async {
      calls.fetch_add(1, Ordering::SeqCst);
      Err::<u32, _>(ApiError::server(500, Some("boom".to_string())))
    };

    assert!(cache.get_with(&key, Retry::Once, fetcher).await.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_clear_drops_all_entries() {
    let cache = QueryCache::new();
    let key = TestKey::new("models", "page1");

    cache
      .get(&key, || async { Ok::<_, ApiError>(1u32) })
      .await
      .unwrap();
    assert_eq!(cache.len(), 1);

    cache.clear();
    assert_eq!(cache.len(), 0);
    assert_eq!(cache.entry_state(&key), None);
  }

  #[tokio::test]
  async fn test_invalidation_during_fetch_lands_stale() {
    let cache = QueryCache::new();
    let key = TestKey::new("models", "page1");

    let slow = cache.get(&key, || async {
      tokio::time::sleep(Duration::from_millis(30)).await;
      Ok::<_, ApiError>(1u32)
    });

    let invalidate = async {
      tokio::time::sleep(Duration::from_millis(10)).await;
      assert_eq!(cache.entry_state(&key), Some(EntryState::Fetching));
      cache.invalidate(&key);
    };

    let (fetched, ()) = tokio::join!(slow, invalidate);
    fetched.unwrap();

    // The fetch that started before the invalidation may not serve as fresh.
    assert_eq!(cache.entry_state(&key), Some(EntryState::Stale));
  }
}
