//! Auth session controller.
//!
//! Owns the `Uninitialized -> Loading -> {Authenticated, Unauthenticated}`
//! state machine. This is the only component that writes the session store
//! or clears the cache, and the only one that turns an HTTP 401 into a
//! state transition; everything else treats errors as local display
//! concerns.

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::api::{ApiResult, UnauthorizedNotice};
use crate::cache::QueryCache;
use crate::catalog::types::{LoginRequest, User};
use crate::catalog::CatalogClient;
use crate::session::{Session, SessionStore};

/// Authentication state.
#[derive(Debug, Clone)]
pub enum AuthState {
  /// Controller created, session store not read yet
  Uninitialized,
  /// Session store read in progress
  Loading,
  /// A persisted or freshly-issued session is active
  Authenticated(User),
  /// No session
  Unauthenticated,
}

impl AuthState {
  pub fn is_authenticated(&self) -> bool {
    matches!(self, AuthState::Authenticated(_))
  }
}

/// The auth session controller.
///
/// The unauthorized receiver is handed over at construction: the HTTP
/// client broadcasts, the controller is the one listener that reacts.
pub struct AuthController {
  state: AuthState,
  store: SessionStore,
  cache: QueryCache,
  client: CatalogClient,
  unauthorized_rx: broadcast::Receiver<UnauthorizedNotice>,
}

impl AuthController {
  pub fn new(
    client: CatalogClient,
    cache: QueryCache,
    store: SessionStore,
    unauthorized_rx: broadcast::Receiver<UnauthorizedNotice>,
  ) -> Self {
    Self {
      state: AuthState::Uninitialized,
      store,
      cache,
      client,
      unauthorized_rx,
    }
  }

  pub fn state(&self) -> &AuthState {
    &self.state
  }

  pub fn is_authenticated(&self) -> bool {
    self.state.is_authenticated()
  }

  pub fn user(&self) -> Option<&User> {
    match &self.state {
      AuthState::Authenticated(user) => Some(user),
      _ => None,
    }
  }

  /// Read the persisted session and settle into Authenticated or
  /// Unauthenticated. Idempotent after the first call.
  pub fn initialize(&mut self) {
    if !matches!(self.state, AuthState::Uninitialized) {
      return;
    }
    self.state = AuthState::Loading;

    let session = self.store.load();
    match (session.token, session.user) {
      (Some(_), Some(user)) => {
        info!(username = %user.username, "restored persisted session");
        self.state = AuthState::Authenticated(user);
      }
      _ => {
        self.state = AuthState::Unauthenticated;
      }
    }
  }

  /// Exchange credentials for a session.
  ///
  /// On success the token and user are persisted together, the cache is
  /// cleared so no previous session's responses remain observable, and the
  /// state flips to Authenticated. On failure the state stays
  /// Unauthenticated and the reason is surfaced without retry.
  pub async fn login(&mut self, username: &str, password: &str) -> ApiResult<User> {
    let response = self
      .client
      .login(&LoginRequest {
        username: username.to_string(),
        password: password.to_string(),
      })
      .await?;

    let user = response.user.clone();
    let expires_in = response.expires_in;
    let session = Session::authenticated(response.token, response.user);
    if let Err(err) = self.store.save(&session) {
      // A session that outlives the process is a convenience, not a
      // requirement; the in-memory session still works.
      warn!("failed to persist session: {}", err);
    }

    self.cache.clear();
    self.state = AuthState::Authenticated(user.clone());
    info!(username = %user.username, expires_in, "logged in");

    Ok(user)
  }

  /// End the session: clear the persisted session and the cache, flip to
  /// Unauthenticated. Calling this while already logged out is a no-op.
  pub fn logout(&mut self) {
    if !self.state.is_authenticated() {
      return;
    }
    self.end_session("logged out");
  }

  /// Apply any pending unauthorized notices.
  ///
  /// However many notices concurrent failing requests produced, at most one
  /// `Authenticated -> Unauthenticated` transition happens. Returns true if
  /// the session was ended.
  pub fn drain_unauthorized(&mut self) -> bool {
    let mut notified = false;
    loop {
      match self.unauthorized_rx.try_recv() {
        Ok(UnauthorizedNotice) => notified = true,
        // Missed notices still mean the token was rejected.
        Err(broadcast::error::TryRecvError::Lagged(_)) => notified = true,
        Err(broadcast::error::TryRecvError::Empty)
        | Err(broadcast::error::TryRecvError::Closed) => break,
      }
    }

    if notified && self.state.is_authenticated() {
      self.end_session("session rejected by server");
      return true;
    }
    false
  }

  fn end_session(&mut self, reason: &str) {
    info!(reason, "ending session");
    self.store.clear();
    // No stale authenticated data survives a session transition.
    self.cache.clear();
    self.state = AuthState::Unauthenticated;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::{ApiError, HttpClient};
  use crate::cache::EntryState;
  use crate::catalog::cache::CatalogQueryKey;
  use crate::catalog::types::{ModelQuery, PageRequest};
  use std::net::SocketAddr;
  use std::time::Duration;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;
  use url::Url;

  fn test_user() -> User {
    User {
      id: 1,
      username: "admin".to_string(),
      created_at: chrono::Utc::now(),
      updated_at: chrono::Utc::now(),
    }
  }

  struct Harness {
    controller: AuthController,
    client: CatalogClient,
    cache: QueryCache,
    store: SessionStore,
    _dir: tempfile::TempDir,
  }

  fn harness_at(addr: Option<SocketAddr>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::at_path(dir.path().join("session.json"));
    let base = match addr {
      Some(addr) => format!("http://{}/api/", addr),
      None => "http://127.0.0.1:1/api/".to_string(),
    };
    let http = HttpClient::new(
      Url::parse(&base).unwrap(),
      Duration::from_secs(5),
      store.clone(),
    )
    .unwrap();
    let unauthorized_rx = http.subscribe_unauthorized();
    let client = CatalogClient::new(http);
    let cache = QueryCache::new();
    let controller =
      AuthController::new(client.clone(), cache.clone(), store.clone(), unauthorized_rx);

    Harness {
      controller,
      client,
      cache,
      store,
      _dir: dir,
    }
  }

  /// Serve one connection with a canned response.
  async fn serve_once(response: String) -> SocketAddr {
    let (addr, _) = serve_script(vec![response]).await;
    addr
  }

  /// Serve one connection per canned response, in order, capturing the raw
  /// requests.
  async fn serve_script(
    responses: Vec<String>,
  ) -> (SocketAddr, tokio::task::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
      let mut requests = Vec::new();
      for response in responses {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 8192];
        let n = sock.read(&mut buf).await.unwrap();
        requests.push(String::from_utf8_lossy(&buf[..n]).to_string());
        sock.write_all(response.as_bytes()).await.unwrap();
        sock.shutdown().await.unwrap();
      }
      requests
    });
    (addr, handle)
  }

  fn http_response(status: &str, body: &str) -> String {
    format!(
      "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
      status,
      body.len(),
      body
    )
  }

  fn login_body() -> String {
    let user = serde_json::to_string(&test_user()).unwrap();
    format!(
      r#"{{"token":"tok-new","user":{},"expires_in":3600}}"#,
      user
    )
  }

  #[test]
  fn test_initialize_with_persisted_session_is_authenticated() {
    let mut h = harness_at(None);
    h.store
      .save(&Session::authenticated("tok".to_string(), test_user()))
      .unwrap();

    h.controller.initialize();
    assert!(h.controller.is_authenticated());
    assert_eq!(h.controller.user().unwrap().username, "admin");
  }

  #[test]
  fn test_initialize_without_session_is_unauthenticated() {
    let mut h = harness_at(None);
    h.controller.initialize();
    assert!(!h.controller.is_authenticated());
    assert!(h.controller.user().is_none());
  }

  #[test]
  fn test_logout_when_unauthenticated_is_noop() {
    let mut h = harness_at(None);
    h.controller.initialize();
    h.controller.logout();
    h.controller.logout();
    assert!(!h.controller.is_authenticated());
  }

  #[tokio::test]
  async fn test_login_success_persists_session_and_clears_cache() {
    let addr = serve_once(http_response("200 OK", &login_body())).await;
    let mut h = harness_at(Some(addr));
    h.controller.initialize();

    // Pre-login cache contents must not survive into the new session.
    let key = CatalogQueryKey::Manufacturers;
    h.cache
      .get(&key, || async { Ok::<_, ApiError>(vec![1u32]) })
      .await
      .unwrap();

    let user = h.controller.login("admin", "admin123").await.unwrap();
    assert_eq!(user.username, "admin");
    assert!(h.controller.is_authenticated());

    let session = h.store.load();
    assert_eq!(session.token.as_deref(), Some("tok-new"));
    assert!(session.user.is_some());

    assert_eq!(h.cache.entry_state(&key), None);
  }

  #[tokio::test]
  async fn test_login_token_carried_on_subsequent_requests() {
    let (addr, handle) = serve_script(vec![
      http_response("200 OK", &login_body()),
      http_response(
        "200 OK",
        r#"{"models":[],"total":0,"page":1,"page_size":20,"total_pages":0}"#,
      ),
    ])
    .await;
    let mut h = harness_at(Some(addr));
    h.controller.initialize();

    h.controller.login("admin", "admin123").await.unwrap();
    h.client.models(&ModelQuery::default()).await.unwrap();

    let requests = handle.await.unwrap();
    assert!(!requests[0].to_lowercase().contains("authorization:"));
    assert!(requests[1]
      .to_lowercase()
      .contains("authorization: bearer tok-new"));
  }

  #[tokio::test]
  async fn test_login_rejection_stays_unauthenticated() {
    let addr = serve_once(http_response(
      "401 Unauthorized",
      r#"{"error":"bad credentials"}"#,
    ))
    .await;
    let mut h = harness_at(Some(addr));
    h.controller.initialize();

    let result = h.controller.login("admin", "wrong").await;
    assert_eq!(result.unwrap_err(), ApiError::Unauthorized);
    assert!(!h.controller.is_authenticated());
    assert!(h.store.load().token.is_none());
  }

  #[tokio::test]
  async fn test_unauthorized_notice_forces_single_logout() {
    let mut h = harness_at(None);
    h.store
      .save(&Session::authenticated("tok".to_string(), test_user()))
      .unwrap();
    h.controller.initialize();

    let favorites = CatalogQueryKey::Favorites(PageRequest::default());
    h.cache
      .get(&favorites, || async { Ok::<_, ApiError>("cached".to_string()) })
      .await
      .unwrap();
    assert_eq!(h.cache.entry_state(&favorites), Some(EntryState::Fresh));

    // Three concurrent requests each raised the notice.
    h.controller.client.http().notify_unauthorized();
    h.controller.client.http().notify_unauthorized();
    h.controller.client.http().notify_unauthorized();

    assert!(h.controller.drain_unauthorized());
    assert!(!h.controller.is_authenticated());
    assert!(h.store.load().token.is_none());
    assert_eq!(h.cache.entry_state(&favorites), None);

    // Already unauthenticated: further notices cause no second transition.
    h.controller.client.http().notify_unauthorized();
    assert!(!h.controller.drain_unauthorized());
  }

  #[test]
  fn test_drain_without_notices_is_noop() {
    let mut h = harness_at(None);
    h.store
      .save(&Session::authenticated("tok".to_string(), test_user()))
      .unwrap();
    h.controller.initialize();

    assert!(!h.controller.drain_unauthorized());
    assert!(h.controller.is_authenticated());
  }
}
