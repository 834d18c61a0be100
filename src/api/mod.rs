//! HTTP transport and error taxonomy for the catalog REST API.

pub mod client;
pub mod error;

pub use client::{HttpClient, UnauthorizedNotice};
pub use error::{ApiError, ApiResult};
