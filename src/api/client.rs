//! The single configured request pipeline.
//!
//! Every outgoing request picks up the bearer token from the session store.
//! A 401 response is never handled here beyond broadcasting one
//! [`UnauthorizedNotice`] per failing call and rejecting with
//! [`ApiError::Unauthorized`]; clearing the session and flipping auth state
//! is the auth controller's job. This keeps transport-layer detection
//! decoupled from session-state mutation when several requests fail at once.

use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use url::Url;

use super::error::{ApiError, ApiResult};
use crate::session::SessionStore;

/// One-shot signal: the current session token was rejected by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnauthorizedNotice;

/// HTTP client for the catalog API.
#[derive(Clone)]
pub struct HttpClient {
  http: reqwest::Client,
  base_url: Url,
  session: SessionStore,
  unauthorized_tx: broadcast::Sender<UnauthorizedNotice>,
}

impl HttpClient {
  /// Create a client with one fixed request timeout. A timed-out request
  /// surfaces exactly like a connection failure.
  pub fn new(base_url: Url, timeout: Duration, session: SessionStore) -> ApiResult<Self> {
    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {}", e)))?;

    let (unauthorized_tx, _) = broadcast::channel(16);

    Ok(Self {
      http,
      base_url,
      session,
      unauthorized_tx,
    })
  }

  /// Subscribe to unauthorized notices. Normally exactly one subscriber
  /// exists, the auth session controller.
  pub fn subscribe_unauthorized(&self) -> broadcast::Receiver<UnauthorizedNotice> {
    self.unauthorized_tx.subscribe()
  }

  /// Inject an unauthorized notice as if a request had hit a 401.
  #[cfg(test)]
  pub(crate) fn notify_unauthorized(&self) {
    let _ = self.unauthorized_tx.send(UnauthorizedNotice);
  }

  /// Resolve a path (e.g. `models/7/variants`) against the base URL.
  pub fn url(&self, path: &str) -> ApiResult<Url> {
    self
      .base_url
      .join(path)
      .map_err(|e| ApiError::Validation(format!("invalid request path '{}': {}", path, e)))
  }

  pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
    let url = self.url(path)?;
    self.get_url(url).await
  }

  /// GET an already-built URL (used by list endpoints with query params).
  pub async fn get_url<T: DeserializeOwned>(&self, url: Url) -> ApiResult<T> {
    let response = self.send(Method::GET, url, None::<&()>).await?;
    decode_body(response).await
  }

  pub async fn post<T: DeserializeOwned, B: Serialize>(
    &self,
    path: &str,
    body: &B,
  ) -> ApiResult<T> {
    let url = self.url(path)?;
    let response = self.send(Method::POST, url, Some(body)).await?;
    decode_body(response).await
  }

  pub async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> ApiResult<T> {
    let url = self.url(path)?;
    let response = self.send(Method::PUT, url, Some(body)).await?;
    decode_body(response).await
  }

  /// POST where the response body, if any, carries nothing we need.
  pub async fn post_discard<B: Serialize>(&self, path: &str, body: &B) -> ApiResult<()> {
    let url = self.url(path)?;
    self.send(Method::POST, url, Some(body)).await?;
    Ok(())
  }

  /// DELETE, discarding any response body.
  pub async fn delete(&self, path: &str) -> ApiResult<()> {
    let url = self.url(path)?;
    self.send(Method::DELETE, url, None::<&()>).await?;
    Ok(())
  }

  /// Send one request: attach the bearer token if a session is present,
  /// map the response status into the error taxonomy. Never retries.
  async fn send<B: Serialize>(
    &self,
    method: Method,
    url: Url,
    body: Option<&B>,
  ) -> ApiResult<reqwest::Response> {
    debug!(%method, %url, "sending request");

    let mut request = self.http.request(method, url);
    if let Some(token) = self.session.token() {
      request = request.bearer_auth(token);
    }
    if let Some(body) = body {
      request = request.json(body);
    }

    // No response at all: network error, no unauthorized notice.
    let response = request.send().await.map_err(ApiError::from)?;
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED {
      warn!("server rejected session token");
      // Broadcast, not request-per-subscriber: every listener sees each
      // failing call's notice. Nobody listening is fine.
      let _ = self.unauthorized_tx.send(UnauthorizedNotice);
      return Err(ApiError::Unauthorized);
    }

    if !status.is_success() {
      let message = server_message(response).await;
      return Err(ApiError::server(status.as_u16(), message));
    }

    Ok(response)
  }
}

async fn decode_body<T: DeserializeOwned>(response: reqwest::Response) -> ApiResult<T> {
  response
    .json::<T>()
    .await
    .map_err(|e| ApiError::Decode(e.to_string()))
}

/// Pull a human-readable message out of an error response body, if the
/// server sent one as `{"error": ...}` or `{"message": ...}`.
async fn server_message(response: reqwest::Response) -> Option<String> {
  let body = response.text().await.ok()?;
  let value: serde_json::Value = serde_json::from_str(&body).ok()?;
  value
    .get("error")
    .or_else(|| value.get("message"))
    .and_then(|v| v.as_str())
    .map(String::from)
}
