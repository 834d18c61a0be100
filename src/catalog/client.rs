//! Resource services: stateless request/response mapping for the catalog
//! API. Nothing here caches or holds state; errors pass straight through.

use crate::api::{ApiError, ApiResult, HttpClient};

use super::types::{
  LoginRequest, LoginResponse, Manufacturer, ManufacturerDraft, Model, ModelDraft, ModelQuery,
  Page, PageRequest, PurchaseDetails, User,
};
use super::wire::{
  FavoriteRequest, ManufacturerEnvelope, ManufacturersEnvelope, ModelEnvelope, PaginatedBody,
  PurchaseRequest, UserEnvelope, VariantsEnvelope,
};

/// Catalog API client.
#[derive(Clone)]
pub struct CatalogClient {
  http: HttpClient,
}

impl CatalogClient {
  pub fn new(http: HttpClient) -> Self {
    Self { http }
  }

  #[cfg(test)]
  pub(crate) fn http(&self) -> &HttpClient {
    &self.http
  }

  /// Exchange credentials for a token and user record. Empty fields are
  /// rejected before any network traffic.
  pub async fn login(&self, credentials: &LoginRequest) -> ApiResult<LoginResponse> {
    if credentials.username.trim().is_empty() {
      return Err(ApiError::Validation("username is required".to_string()));
    }
    if credentials.password.is_empty() {
      return Err(ApiError::Validation("password is required".to_string()));
    }

    self.http.post("auth/login", credentials).await
  }

  /// Fetch the authenticated user's profile.
  pub async fn profile(&self) -> ApiResult<User> {
    let envelope: UserEnvelope = self.http.get("user/profile").await?;
    Ok(envelope.user)
  }

  /// List models with filters, sorting, and paging.
  pub async fn models(&self, query: &ModelQuery) -> ApiResult<Page<Model>> {
    let mut url = self.http.url("models")?;
    query.apply(&mut url);
    let body: PaginatedBody<Model> = self.http.get_url(url).await?;
    Ok(body.into_page())
  }

  pub async fn model(&self, id: u64) -> ApiResult<Model> {
    let envelope: ModelEnvelope = self.http.get(&format!("models/{}", id)).await?;
    Ok(envelope.model)
  }

  pub async fn model_variants(&self, id: u64) -> ApiResult<Vec<Model>> {
    let envelope: VariantsEnvelope = self.http.get(&format!("models/{}/variants", id)).await?;
    Ok(envelope.variants)
  }

  pub async fn create_model(&self, draft: &ModelDraft) -> ApiResult<Model> {
    if draft.name.as_deref().map(str::trim).unwrap_or("").is_empty() {
      return Err(ApiError::Validation("model name is required".to_string()));
    }
    if draft.manufacturer_id.is_none() {
      return Err(ApiError::Validation("manufacturer is required".to_string()));
    }

    let envelope: ModelEnvelope = self.http.post("models", draft).await?;
    Ok(envelope.model)
  }

  pub async fn update_model(&self, id: u64, draft: &ModelDraft) -> ApiResult<Model> {
    let envelope: ModelEnvelope = self.http.put(&format!("models/{}", id), draft).await?;
    Ok(envelope.model)
  }

  pub async fn delete_model(&self, id: u64) -> ApiResult<()> {
    self.http.delete(&format!("models/{}", id)).await
  }

  /// List the user's favorite models.
  pub async fn favorites(&self, paging: &PageRequest) -> ApiResult<Page<Model>> {
    let mut url = self.http.url("user/favorites")?;
    paging.apply(&mut url);
    let body: PaginatedBody<Model> = self.http.get_url(url).await?;
    Ok(body.into_page())
  }

  pub async fn add_favorite(&self, model_id: u64, notes: Option<String>) -> ApiResult<()> {
    let body = FavoriteRequest {
      model_id,
      favorite_notes: notes,
    };
    self.http.post_discard("user/favorites", &body).await
  }

  pub async fn remove_favorite(&self, model_id: u64) -> ApiResult<()> {
    self
      .http
      .delete(&format!("user/favorites/{}", model_id))
      .await
  }

  /// List the user's purchased models.
  pub async fn purchases(&self, paging: &PageRequest) -> ApiResult<Page<Model>> {
    let mut url = self.http.url("user/purchases")?;
    paging.apply(&mut url);
    let body: PaginatedBody<Model> = self.http.get_url(url).await?;
    Ok(body.into_page())
  }

  pub async fn add_purchase(&self, model_id: u64, details: PurchaseDetails) -> ApiResult<()> {
    let body = PurchaseRequest {
      model_id,
      purchased: true,
      details,
    };
    self.http.post_discard("user/purchases", &body).await
  }

  pub async fn remove_purchase(&self, model_id: u64) -> ApiResult<()> {
    self
      .http
      .delete(&format!("user/purchases/{}", model_id))
      .await
  }

  pub async fn manufacturers(&self) -> ApiResult<Vec<Manufacturer>> {
    let envelope: ManufacturersEnvelope = self.http.get("manufacturers").await?;
    Ok(envelope.manufacturers)
  }

  pub async fn create_manufacturer(&self, draft: &ManufacturerDraft) -> ApiResult<Manufacturer> {
    if draft.name.trim().is_empty() {
      return Err(ApiError::Validation(
        "manufacturer name is required".to_string(),
      ));
    }

    let envelope: ManufacturerEnvelope = self.http.post("manufacturers", draft).await?;
    Ok(envelope.manufacturer)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::session::SessionStore;
  use std::time::Duration;
  use url::Url;

  fn offline_client(dir: &tempfile::TempDir) -> CatalogClient {
    let store = SessionStore::at_path(dir.path().join("session.json"));
    let http = HttpClient::new(
      Url::parse("http://127.0.0.1:1/api/").unwrap(),
      Duration::from_secs(1),
      store,
    )
    .unwrap();
    CatalogClient::new(http)
  }

  #[tokio::test]
  async fn test_login_rejects_empty_credentials_before_network() {
    let dir = tempfile::tempdir().unwrap();
    let client = offline_client(&dir);

    let result = client
      .login(&LoginRequest {
        username: "  ".to_string(),
        password: "admin123".to_string(),
      })
      .await;

    assert!(matches!(result, Err(ApiError::Validation(_))));
  }

  #[tokio::test]
  async fn test_create_model_requires_name_and_manufacturer() {
    let dir = tempfile::tempdir().unwrap();
    let client = offline_client(&dir);

    let missing_name = client.create_model(&ModelDraft::default()).await;
    assert!(matches!(missing_name, Err(ApiError::Validation(_))));

    let missing_manufacturer = client
      .create_model(&ModelDraft {
        name: Some("RX-78-2".to_string()),
        ..Default::default()
      })
      .await;
    assert!(matches!(missing_manufacturer, Err(ApiError::Validation(_))));
  }

  #[tokio::test]
  async fn test_create_manufacturer_requires_name() {
    let dir = tempfile::tempdir().unwrap();
    let client = offline_client(&dir);

    let result = client.create_manufacturer(&ManufacturerDraft::default()).await;
    assert!(matches!(result, Err(ApiError::Validation(_))));
  }
}
