//! Catalog client with transparent caching.
//!
//! Wraps [`CatalogClient`] behind the query cache: reads go through keyed,
//! deduplicated fetches; writes run the underlying service call and apply
//! that mutation's declared invalidations on success. List queries retry at
//! most once on network failure; everything else never retries.

use crate::api::ApiResult;
use crate::cache::{CacheResult, QueryCache, Retry};

use super::cache::{invalidations, CatalogQueryKey};
use super::client::CatalogClient;
use super::types::{
  Manufacturer, ManufacturerDraft, Model, ModelDraft, ModelQuery, Page, PageRequest,
  PurchaseDetails, User,
};

/// Catalog client with transparent caching support.
#[derive(Clone)]
pub struct CachedCatalogClient {
  inner: CatalogClient,
  cache: QueryCache,
}

impl CachedCatalogClient {
  pub fn new(inner: CatalogClient, cache: QueryCache) -> Self {
    Self { inner, cache }
  }

  // --- queries ---

  pub async fn models(&self, query: &ModelQuery) -> ApiResult<CacheResult<Page<Model>>> {
    let key = CatalogQueryKey::Models(query.clone());
    self
      .cache
      .get_with(&key, Retry::Once, || {
        let inner = self.inner.clone();
        let query = query.clone();
        async move { inner.models(&query).await }
      })
      .await
  }

  pub async fn model(&self, id: u64) -> ApiResult<CacheResult<Model>> {
    let key = CatalogQueryKey::ModelDetail { id };
    self
      .cache
      .get(&key, || {
        let inner = self.inner.clone();
        async move { inner.model(id).await }
      })
      .await
  }

  pub async fn model_variants(&self, id: u64) -> ApiResult<CacheResult<Vec<Model>>> {
    let key = CatalogQueryKey::ModelVariants { id };
    self
      .cache
      .get(&key, || {
        let inner = self.inner.clone();
        async move { inner.model_variants(id).await }
      })
      .await
  }

  pub async fn favorites(&self, paging: &PageRequest) -> ApiResult<CacheResult<Page<Model>>> {
    let key = CatalogQueryKey::Favorites(*paging);
    self
      .cache
      .get_with(&key, Retry::Once, || {
        let inner = self.inner.clone();
        let paging = *paging;
        async move { inner.favorites(&paging).await }
      })
      .await
  }

  pub async fn purchases(&self, paging: &PageRequest) -> ApiResult<CacheResult<Page<Model>>> {
    let key = CatalogQueryKey::Purchases(*paging);
    self
      .cache
      .get_with(&key, Retry::Once, || {
        let inner = self.inner.clone();
        let paging = *paging;
        async move { inner.purchases(&paging).await }
      })
      .await
  }

  pub async fn manufacturers(&self) -> ApiResult<CacheResult<Vec<Manufacturer>>> {
    self
      .cache
      .get_with(&CatalogQueryKey::Manufacturers, Retry::Once, || {
        let inner = self.inner.clone();
        async move { inner.manufacturers().await }
      })
      .await
  }

  pub async fn profile(&self) -> ApiResult<CacheResult<User>> {
    self
      .cache
      .get(&CatalogQueryKey::Profile, || {
        let inner = self.inner.clone();
        async move { inner.profile().await }
      })
      .await
  }

  // --- mutations ---

  pub async fn create_model(&self, draft: &ModelDraft) -> ApiResult<Model> {
    self
      .cache
      .mutate(
        || {
          let inner = self.inner.clone();
          let draft = draft.clone();
          async move { inner.create_model(&draft).await }
        },
        invalidations::model_created(),
      )
      .await
  }

  pub async fn update_model(&self, id: u64, draft: &ModelDraft) -> ApiResult<Model> {
    self
      .cache
      .mutate(
        || {
          let inner = self.inner.clone();
          let draft = draft.clone();
          async move { inner.update_model(id, &draft).await }
        },
        invalidations::model_updated(id),
      )
      .await
  }

  pub async fn delete_model(&self, id: u64) -> ApiResult<()> {
    self
      .cache
      .mutate(
        || {
          let inner = self.inner.clone();
          async move { inner.delete_model(id).await }
        },
        invalidations::model_deleted(id),
      )
      .await
  }

  pub async fn add_favorite(&self, model_id: u64, notes: Option<String>) -> ApiResult<()> {
    self
      .cache
      .mutate(
        || {
          let inner = self.inner.clone();
          async move { inner.add_favorite(model_id, notes).await }
        },
        invalidations::favorite_changed(model_id),
      )
      .await
  }

  pub async fn remove_favorite(&self, model_id: u64) -> ApiResult<()> {
    self
      .cache
      .mutate(
        || {
          let inner = self.inner.clone();
          async move { inner.remove_favorite(model_id).await }
        },
        invalidations::favorite_changed(model_id),
      )
      .await
  }

  pub async fn add_purchase(&self, model_id: u64, details: PurchaseDetails) -> ApiResult<()> {
    self
      .cache
      .mutate(
        || {
          let inner = self.inner.clone();
          async move { inner.add_purchase(model_id, details).await }
        },
        invalidations::purchase_changed(model_id),
      )
      .await
  }

  pub async fn remove_purchase(&self, model_id: u64) -> ApiResult<()> {
    self
      .cache
      .mutate(
        || {
          let inner = self.inner.clone();
          async move { inner.remove_purchase(model_id).await }
        },
        invalidations::purchase_changed(model_id),
      )
      .await
  }

  pub async fn create_manufacturer(&self, draft: &ManufacturerDraft) -> ApiResult<Manufacturer> {
    self
      .cache
      .mutate(
        || {
          let inner = self.inner.clone();
          let draft = draft.clone();
          async move { inner.create_manufacturer(&draft).await }
        },
        invalidations::manufacturer_created(),
      )
      .await
  }
}
