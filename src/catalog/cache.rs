//! Query keys and invalidation declarations for catalog API calls.

use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::cache::{Invalidation, QueryKey};

use super::types::{ModelQuery, PageRequest};

/// Resource kind names, shared between query keys and invalidations.
pub mod kind {
  pub const MODELS: &str = "models";
  pub const MODEL: &str = "model";
  pub const MODEL_VARIANTS: &str = "model_variants";
  pub const FAVORITES: &str = "favorites";
  pub const PURCHASES: &str = "purchases";
  pub const MANUFACTURERS: &str = "manufacturers";
  pub const PROFILE: &str = "profile";
}

// List results go stale faster than single items: a listing reflects other
// users' writes, a single kit rarely changes under you.
const LIST_TTL: Duration = Duration::from_secs(5 * 60);
const DETAIL_TTL: Duration = Duration::from_secs(10 * 60);
const USER_LIST_TTL: Duration = Duration::from_secs(2 * 60);

/// Query key types for catalog API calls.
#[derive(Clone, Debug)]
pub enum CatalogQueryKey {
  /// Filtered, paged model listing
  Models(ModelQuery),
  /// Single model by id
  ModelDetail { id: u64 },
  /// Variants of a model
  ModelVariants { id: u64 },
  /// The user's favorites, paged
  Favorites(PageRequest),
  /// The user's purchases, paged
  Purchases(PageRequest),
  /// All manufacturers
  Manufacturers,
  /// The authenticated user's profile
  Profile,
}

impl QueryKey for CatalogQueryKey {
  fn resource_kind(&self) -> &'static str {
    match self {
      Self::Models(_) => kind::MODELS,
      Self::ModelDetail { .. } => kind::MODEL,
      Self::ModelVariants { .. } => kind::MODEL_VARIANTS,
      Self::Favorites(_) => kind::FAVORITES,
      Self::Purchases(_) => kind::PURCHASES,
      Self::Manufacturers => kind::MANUFACTURERS,
      Self::Profile => kind::PROFILE,
    }
  }

  fn cache_hash(&self) -> String {
    let input = match self {
      Self::Models(query) => format!("models:{}", query.cache_repr()),
      Self::ModelDetail { id } => format!("model:{}", id),
      Self::ModelVariants { id } => format!("model_variants:{}", id),
      Self::Favorites(paging) => format!("favorites:{}", paging.cache_repr()),
      Self::Purchases(paging) => format!("purchases:{}", paging.cache_repr()),
      Self::Manufacturers => "manufacturers".to_string(),
      Self::Profile => "profile".to_string(),
    };

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  fn description(&self) -> String {
    match self {
      Self::Models(query) => format!("models [{}]", query.cache_repr()),
      Self::ModelDetail { id } => format!("model {}", id),
      Self::ModelVariants { id } => format!("variants of model {}", id),
      Self::Favorites(_) => "favorites".to_string(),
      Self::Purchases(_) => "purchases".to_string(),
      Self::Manufacturers => "manufacturers".to_string(),
      Self::Profile => "user profile".to_string(),
    }
  }

  fn ttl(&self) -> Duration {
    match self {
      Self::Models(_) => LIST_TTL,
      Self::ModelDetail { .. } | Self::ModelVariants { .. } => DETAIL_TTL,
      Self::Favorites(_) | Self::Purchases(_) => USER_LIST_TTL,
      Self::Manufacturers => DETAIL_TTL,
      Self::Profile => LIST_TTL,
    }
  }
}

/// What each mutation invalidates on success.
pub mod invalidations {
  use super::*;

  fn model_detail(id: u64) -> Invalidation {
    Invalidation::Key(CatalogQueryKey::ModelDetail { id }.cache_key())
  }

  pub fn model_created() -> Vec<Invalidation> {
    vec![Invalidation::Kind(kind::MODELS)]
  }

  pub fn model_updated(id: u64) -> Vec<Invalidation> {
    vec![Invalidation::Kind(kind::MODELS), model_detail(id)]
  }

  pub fn model_deleted(id: u64) -> Vec<Invalidation> {
    vec![
      Invalidation::Kind(kind::MODELS),
      Invalidation::Kind(kind::MODEL_VARIANTS),
      model_detail(id),
    ]
  }

  pub fn favorite_changed(id: u64) -> Vec<Invalidation> {
    vec![
      Invalidation::Kind(kind::FAVORITES),
      Invalidation::Kind(kind::MODELS),
      model_detail(id),
    ]
  }

  pub fn purchase_changed(id: u64) -> Vec<Invalidation> {
    vec![
      Invalidation::Kind(kind::PURCHASES),
      Invalidation::Kind(kind::MODELS),
      model_detail(id),
    ]
  }

  pub fn manufacturer_created() -> Vec<Invalidation> {
    vec![Invalidation::Kind(kind::MANUFACTURERS)]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_identical_queries_hash_identically() {
    let a = CatalogQueryKey::Models(ModelQuery {
      search: Some("zaku".to_string()),
      page: Some(2),
      ..Default::default()
    });
    let b = CatalogQueryKey::Models(ModelQuery {
      search: Some("zaku".to_string()),
      page: Some(2),
      ..Default::default()
    });

    assert_eq!(a.cache_key(), b.cache_key());
  }

  #[test]
  fn test_different_params_hash_differently() {
    let page1 = CatalogQueryKey::Models(ModelQuery {
      page: Some(1),
      ..Default::default()
    });
    let page2 = CatalogQueryKey::Models(ModelQuery {
      page: Some(2),
      ..Default::default()
    });

    assert_ne!(page1.cache_key(), page2.cache_key());
  }

  #[test]
  fn test_detail_ttl_longer_than_list_ttl() {
    let list = CatalogQueryKey::Models(ModelQuery::default());
    let detail = CatalogQueryKey::ModelDetail { id: 7 };
    let favorites = CatalogQueryKey::Favorites(PageRequest::default());

    assert!(detail.ttl() > list.ttl());
    assert!(favorites.ttl() < list.ttl());
  }

  mod invalidation_sets {
    use super::*;
    use crate::api::ApiError;
    use crate::cache::{EntryState, QueryCache};

    /// A cache populated with one entry per resource the mutations touch.
    async fn populated_cache() -> QueryCache {
      let cache = QueryCache::new();
      let fetcher = || async { Ok::<_, ApiError>(1u32) };
      for key in [
        CatalogQueryKey::Models(ModelQuery::default()),
        CatalogQueryKey::ModelDetail { id: 7 },
        CatalogQueryKey::ModelVariants { id: 7 },
        CatalogQueryKey::Favorites(PageRequest::default()),
        CatalogQueryKey::Purchases(PageRequest::default()),
        CatalogQueryKey::Manufacturers,
      ] {
        cache.get(&key, fetcher).await.unwrap();
      }
      cache
    }

    async fn apply(cache: &QueryCache, set: Vec<Invalidation>) {
      cache
        .mutate(|| async { Ok::<_, ApiError>(()) }, set)
        .await
        .unwrap();
    }

    fn state(cache: &QueryCache, key: &CatalogQueryKey) -> EntryState {
      cache.entry_state(key).unwrap()
    }

    #[tokio::test]
    async fn test_favorite_change_stales_favorites_models_and_detail() {
      let cache = populated_cache().await;
      apply(&cache, invalidations::favorite_changed(7)).await;

      let favorites = CatalogQueryKey::Favorites(PageRequest::default());
      let models = CatalogQueryKey::Models(ModelQuery::default());
      let detail = CatalogQueryKey::ModelDetail { id: 7 };
      assert_eq!(state(&cache, &favorites), EntryState::Stale);
      assert_eq!(state(&cache, &models), EntryState::Stale);
      assert_eq!(state(&cache, &detail), EntryState::Stale);

      // Untouched resources keep serving from cache.
      assert_eq!(
        state(&cache, &CatalogQueryKey::Manufacturers),
        EntryState::Fresh
      );
      let other_detail = CatalogQueryKey::ModelDetail { id: 8 };
      assert_eq!(cache.entry_state(&other_detail), None);
    }

    #[tokio::test]
    async fn test_purchase_change_stales_purchases_models_and_detail() {
      let cache = populated_cache().await;
      apply(&cache, invalidations::purchase_changed(7)).await;

      let purchases = CatalogQueryKey::Purchases(PageRequest::default());
      let detail = CatalogQueryKey::ModelDetail { id: 7 };
      assert_eq!(state(&cache, &purchases), EntryState::Stale);
      assert_eq!(state(&cache, &detail), EntryState::Stale);
      let favorites = CatalogQueryKey::Favorites(PageRequest::default());
      assert_eq!(state(&cache, &favorites), EntryState::Fresh);
    }

    #[tokio::test]
    async fn test_model_deleted_stales_listings_variants_and_detail() {
      let cache = populated_cache().await;
      apply(&cache, invalidations::model_deleted(7)).await;

      let models = CatalogQueryKey::Models(ModelQuery::default());
      let variants = CatalogQueryKey::ModelVariants { id: 7 };
      let detail = CatalogQueryKey::ModelDetail { id: 7 };
      assert_eq!(state(&cache, &models), EntryState::Stale);
      assert_eq!(state(&cache, &variants), EntryState::Stale);
      assert_eq!(state(&cache, &detail), EntryState::Stale);
      let favorites = CatalogQueryKey::Favorites(PageRequest::default());
      assert_eq!(state(&cache, &favorites), EntryState::Fresh);
    }
  }
}
