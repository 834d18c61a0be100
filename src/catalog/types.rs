//! Domain types for the catalog API.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// An authenticated user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub id: u64,
  pub username: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// A model kit manufacturer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manufacturer {
  pub id: u64,
  pub name: String,
  pub full_name: Option<String>,
  pub founded_date: Option<NaiveDate>,
  pub active_period_start: Option<NaiveDate>,
  pub active_period_end: Option<NaiveDate>,
  pub parent_company: Option<String>,
  pub country: Option<String>,
  pub website: Option<String>,
  pub description: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// A collectible model kit, possibly a variant of a parent kit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
  pub id: u64,
  pub parent_id: Option<u64>,
  pub manufacturer_id: u64,
  pub series: Option<String>,
  pub name: String,
  pub status: String,
  pub category: String,
  pub release_date: Option<NaiveDate>,
  pub rating: Option<f64>,
  pub notes: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,

  // Associations, populated depending on the endpoint
  pub manufacturer: Option<Manufacturer>,
  pub parent: Option<Box<Model>>,
  #[serde(default)]
  pub children: Vec<Model>,
  #[serde(default)]
  pub price_history: Vec<PriceHistory>,
  #[serde(default)]
  pub user_purchases: Vec<UserModelPurchase>,
  #[serde(default)]
  pub user_favorites: Vec<UserModelFavorite>,
}

/// A recorded market price for a model at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
  pub id: u64,
  pub model_id: u64,
  pub price: f64,
  pub price_date: NaiveDate,
  pub source: String,
  pub notes: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// A user's purchase record for a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserModelPurchase {
  pub id: u64,
  pub user_id: u64,
  pub model_id: u64,
  pub purchased: bool,
  pub purchased_date: Option<NaiveDate>,
  pub purchased_price: Option<f64>,
  pub purchase_notes: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// A user's favorite marker for a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserModelFavorite {
  pub id: u64,
  pub user_id: u64,
  pub model_id: u64,
  pub favorite_notes: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
  pub data: Vec<T>,
  pub total: u64,
  pub page: u32,
  pub page_size: u32,
  pub total_pages: u32,
}

/// Sort direction for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
  Asc,
  Desc,
}

impl SortOrder {
  pub fn as_str(self) -> &'static str {
    match self {
      SortOrder::Asc => "asc",
      SortOrder::Desc => "desc",
    }
  }
}

/// Filters and paging for model listings. All fields optional; unset fields
/// are omitted from the query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelQuery {
  pub search: Option<String>,
  pub manufacturer: Option<String>,
  pub series: Option<String>,
  pub category: Option<String>,
  pub status: Option<String>,
  pub sort_by: Option<String>,
  pub sort_order: Option<SortOrder>,
  pub page: Option<u32>,
  pub page_size: Option<u32>,
}

impl ModelQuery {
  /// Append the set fields as query pairs on a URL.
  pub fn apply(&self, url: &mut url::Url) {
    let mut pairs = url.query_pairs_mut();
    if let Some(s) = &self.search {
      pairs.append_pair("search", s);
    }
    if let Some(m) = &self.manufacturer {
      pairs.append_pair("manufacturer", m);
    }
    if let Some(s) = &self.series {
      pairs.append_pair("series", s);
    }
    if let Some(c) = &self.category {
      pairs.append_pair("category", c);
    }
    if let Some(s) = &self.status {
      pairs.append_pair("status", s);
    }
    if let Some(s) = &self.sort_by {
      pairs.append_pair("sort_by", s);
    }
    if let Some(o) = self.sort_order {
      pairs.append_pair("sort_order", o.as_str());
    }
    if let Some(p) = self.page {
      pairs.append_pair("page", &p.to_string());
    }
    if let Some(p) = self.page_size {
      pairs.append_pair("page_size", &p.to_string());
    }
  }

  /// Stable textual form used for cache keying.
  pub fn cache_repr(&self) -> String {
    format!(
      "search={};manufacturer={};series={};category={};status={};sort_by={};sort_order={};page={};page_size={}",
      self.search.as_deref().unwrap_or(""),
      self.manufacturer.as_deref().unwrap_or(""),
      self.series.as_deref().unwrap_or(""),
      self.category.as_deref().unwrap_or(""),
      self.status.as_deref().unwrap_or(""),
      self.sort_by.as_deref().unwrap_or(""),
      self.sort_order.map(|o| o.as_str()).unwrap_or(""),
      self.page.map(|p| p.to_string()).unwrap_or_default(),
      self.page_size.map(|p| p.to_string()).unwrap_or_default(),
    )
  }
}

/// Paging for listings that take no filters (favorites, purchases).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
  pub page: Option<u32>,
  pub page_size: Option<u32>,
}

impl PageRequest {
  pub fn apply(&self, url: &mut url::Url) {
    let mut pairs = url.query_pairs_mut();
    if let Some(p) = self.page {
      pairs.append_pair("page", &p.to_string());
    }
    if let Some(p) = self.page_size {
      pairs.append_pair("page_size", &p.to_string());
    }
  }

  /// Stable textual form used for cache keying.
  pub fn cache_repr(&self) -> String {
    format!(
      "page={};page_size={}",
      self.page.map(|p| p.to_string()).unwrap_or_default(),
      self.page_size.map(|p| p.to_string()).unwrap_or_default(),
    )
  }
}

/// Fields accepted when creating or updating a model.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelDraft {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub parent_id: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub manufacturer_id: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub series: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub release_date: Option<NaiveDate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub rating: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
}

/// Fields accepted when creating a manufacturer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ManufacturerDraft {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub full_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub country: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub website: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

/// Credentials for `POST /auth/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
  pub username: String,
  pub password: String,
}

/// Successful login payload.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
  pub token: String,
  pub user: User,
  pub expires_in: u64,
}

/// Details attached when marking a model as purchased.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PurchaseDetails {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub purchased_date: Option<NaiveDate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub purchased_price: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub purchase_notes: Option<String>,
}
