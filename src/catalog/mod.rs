//! Catalog domain: entity types, resource services, query keys, and the
//! cached client the rest of the app talks to.

pub mod cache;
pub mod cached_client;
pub mod client;
pub mod types;
mod wire;

pub use cached_client::CachedCatalogClient;
pub use client::CatalogClient;
