//! Error taxonomy for the API layer.

use thiserror::Error;

/// Errors produced by the HTTP client and resource services.
///
/// Variants are cloneable strings rather than wrapped transport errors so
/// that a single failed fetch can be fanned out to every caller waiting on
/// the same cache key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
  /// Client-side validation failure. Never reaches the network.
  #[error("{0}")]
  Validation(String),

  /// No response received: connection failure or timeout.
  #[error("network error: {0}")]
  Network(String),

  /// The server rejected the session token (HTTP 401).
  #[error("session expired or invalid, please log in again")]
  Unauthorized,

  /// Any other 4xx/5xx response, with the server's message when it sent one.
  #[error("server error ({status}): {message}")]
  Server { status: u16, message: String },

  /// The response arrived but its body was not what we expected.
  #[error("unexpected response body: {0}")]
  Decode(String),
}

impl ApiError {
  /// Build a `Server` error from a status code and an optional body message.
  pub fn server(status: u16, message: Option<String>) -> Self {
    ApiError::Server {
      status,
      message: message.unwrap_or_else(|| "request failed".to_string()),
    }
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_timeout() || err.is_connect() || err.is_request() {
      ApiError::Network(err.to_string())
    } else if err.is_decode() {
      ApiError::Decode(err.to_string())
    } else {
      ApiError::Network(err.to_string())
    }
  }
}

pub type ApiResult<T> = Result<T, ApiError>;
