//! Wire-format envelopes for the catalog REST API.
//!
//! The server wraps most payloads in a single-field object (`{"model": ...}`,
//! `{"user": ...}`); paginated listings arrive under either `models` or
//! `data` depending on the endpoint. These types absorb that variance so the
//! rest of the crate only sees domain types.

use serde::{Deserialize, Serialize};

use super::types::{Manufacturer, Model, Page, PurchaseDetails, User};

#[derive(Debug, Deserialize)]
pub struct ModelEnvelope {
  pub model: Model,
}

#[derive(Debug, Deserialize)]
pub struct VariantsEnvelope {
  pub variants: Vec<Model>,
}

#[derive(Debug, Deserialize)]
pub struct UserEnvelope {
  pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct ManufacturersEnvelope {
  pub manufacturers: Vec<Manufacturer>,
}

#[derive(Debug, Deserialize)]
pub struct ManufacturerEnvelope {
  pub manufacturer: Manufacturer,
}

/// Paginated listing body. Some endpoints name the item array `models`,
/// others `data`; missing paging fields fall back to sane defaults.
#[derive(Debug, Deserialize)]
pub struct PaginatedBody<T> {
  #[serde(default = "Vec::new")]
  models: Vec<T>,
  #[serde(default = "Vec::new")]
  data: Vec<T>,
  #[serde(default)]
  total: u64,
  #[serde(default = "default_page")]
  page: u32,
  #[serde(default = "default_page_size")]
  page_size: u32,
  #[serde(default)]
  total_pages: u32,
}

fn default_page() -> u32 {
  1
}

fn default_page_size() -> u32 {
  20
}

impl<T> PaginatedBody<T> {
  pub fn into_page(self) -> Page<T> {
    let data = if self.models.is_empty() {
      self.data
    } else {
      self.models
    };
    Page {
      data,
      total: self.total,
      page: self.page,
      page_size: self.page_size,
      total_pages: self.total_pages,
    }
  }
}

/// Body for `POST /user/favorites`.
#[derive(Debug, Serialize)]
pub struct FavoriteRequest {
  pub model_id: u64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub favorite_notes: Option<String>,
}

/// Body for `POST /user/purchases`.
#[derive(Debug, Serialize)]
pub struct PurchaseRequest {
  pub model_id: u64,
  pub purchased: bool,
  #[serde(flatten)]
  pub details: PurchaseDetails,
}
