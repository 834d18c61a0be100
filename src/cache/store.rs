//! In-memory store of cache entries, one per (resource kind, parameter
//! digest). The store hands out fetch claims so that at most one fetch per
//! key is ever in flight; concurrent readers of the same key join it.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use super::traits::{CacheKey, EntryState};
use crate::api::error::ApiError;

/// What a finished fetch produced, fanned out to every joined reader.
pub type FetchOutcome = Result<Value, ApiError>;

struct Entry {
  value: Option<Value>,
  fetched_at: Option<Instant>,
  ttl: Duration,
  state: EntryState,
  inflight: Option<broadcast::Sender<FetchOutcome>>,
  /// Set when an invalidation lands while a fetch is in flight; the fetch
  /// result is still stored but lands already stale.
  dirtied: bool,
}

impl Entry {
  fn new(ttl: Duration) -> Self {
    Self {
      value: None,
      fetched_at: None,
      ttl,
      state: EntryState::Stale,
      inflight: None,
      dirtied: false,
    }
  }

  fn is_fresh(&self) -> bool {
    self.state == EntryState::Fresh
      && self
        .fetched_at
        .map(|t| t.elapsed() <= self.ttl)
        .unwrap_or(false)
  }
}

/// Outcome of asking the store for a key.
pub enum Claim {
  /// Entry is fresh; serve this value without fetching.
  Hit(Value),
  /// Another reader is already fetching; wait on this receiver.
  Join(broadcast::Receiver<FetchOutcome>),
  /// The caller owns the fetch. `prior` is the stale value, if any, for
  /// serving when the fetch fails.
  Fetch { prior: Option<Value> },
}

/// Process-wide cache store. All mutation goes through the claim/complete
/// and invalidation APIs; entries are never written directly.
#[derive(Default)]
pub struct CacheStore {
  entries: Mutex<HashMap<CacheKey, Entry>>,
}

impl CacheStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Look up `key`, claiming the fetch if the entry is stale or missing.
  ///
  /// Exactly one caller receives `Claim::Fetch` per fetch cycle; it must
  /// call [`complete`](Self::complete) with the outcome.
  pub fn claim(&self, key: &CacheKey, ttl: Duration) -> Claim {
    let mut entries = self.lock();
    let entry = entries
      .entry(key.clone())
      .or_insert_with(|| Entry::new(ttl));
    entry.ttl = ttl;

    if let Some(tx) = &entry.inflight {
      return Claim::Join(tx.subscribe());
    }

    if entry.is_fresh() {
      if let Some(value) = &entry.value {
        return Claim::Hit(value.clone());
      }
    }

    let (tx, _rx) = broadcast::channel(1);
    entry.inflight = Some(tx);
    entry.state = EntryState::Fetching;
    entry.dirtied = false;

    Claim::Fetch {
      prior: entry.value.clone(),
    }
  }

  /// Record a fetch outcome and fan it out to joined readers.
  pub fn complete(&self, key: &CacheKey, outcome: FetchOutcome) {
    let mut entries = self.lock();
    let Some(entry) = entries.get_mut(key) else {
      // Entry was dropped by a clear() while the fetch was in flight; the
      // result is discarded and waiters observe a closed channel.
      return;
    };

    let tx = entry.inflight.take();
    match &outcome {
      Ok(value) => {
        entry.value = Some(value.clone());
        entry.fetched_at = Some(Instant::now());
        entry.state = if entry.dirtied {
          EntryState::Stale
        } else {
          EntryState::Fresh
        };
      }
      Err(_) => {
        entry.state = EntryState::Error;
      }
    }
    entry.dirtied = false;

    if let Some(tx) = tx {
      // No receivers is fine - nobody joined this fetch.
      let _ = tx.send(outcome);
    }
  }

  /// Mark every entry of `kind` stale.
  pub fn invalidate_kind(&self, kind: &str) {
    let mut entries = self.lock();
    for (key, entry) in entries.iter_mut() {
      if key.kind == kind {
        Self::mark_stale(entry);
      }
    }
  }

  /// Mark one entry stale, if present.
  pub fn invalidate_key(&self, key: &CacheKey) {
    let mut entries = self.lock();
    if let Some(entry) = entries.get_mut(key) {
      Self::mark_stale(entry);
    }
  }

  fn mark_stale(entry: &mut Entry) {
    if entry.inflight.is_some() {
      entry.dirtied = true;
    } else {
      entry.state = EntryState::Stale;
    }
  }

  /// Drop every entry. In-flight fetches complete into the void and their
  /// waiters observe a closed channel.
  pub fn clear(&self) {
    self.lock().clear();
  }

  /// Last stored value for a key, regardless of freshness. Used to serve
  /// stale data when a refresh fails.
  pub fn stale_value(&self, key: &CacheKey) -> Option<Value> {
    self.lock().get(key).and_then(|entry| entry.value.clone())
  }

  /// Effective state of an entry, if one exists. A `Fresh` entry past its
  /// TTL reports `Stale`.
  pub fn state(&self, key: &CacheKey) -> Option<EntryState> {
    let entries = self.lock();
    entries.get(key).map(|entry| {
      if entry.state == EntryState::Fresh && !entry.is_fresh() {
        EntryState::Stale
      } else {
        entry.state
      }
    })
  }

  pub fn len(&self) -> usize {
    self.lock().len()
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Entry>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
