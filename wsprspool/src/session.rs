//! Session token persistence and login.
//!
//! wsprnet.org issues a Drupal session on login, and the session cookie must
//! accompany every spot fetch. Tokens are cached on disk so restarts reuse
//! them instead of burning a login per run; upstream throttles accounts that
//! log in too often. A token stays in use until upstream rejects it, at
//! which point it is invalidated and the next fetch logs in fresh.

use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::wsprnet::{AsyncHttpClient, WsprnetError};

/// Persisted session state for one wsprnet.org account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionToken {
    pub sessid: String,
    pub session_name: String,
    pub username: String,
    /// Unix seconds at which the login completed.
    pub login_time: i64,
}

impl SessionToken {
    /// Cookie header value expected by the spots endpoint.
    pub fn cookie(&self) -> String {
        format!("{}={}", self.session_name, self.sessid)
    }

    fn is_complete(&self) -> bool {
        !self.sessid.is_empty() && !self.session_name.is_empty()
    }
}

/// Account credentials used when no usable session is cached.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Session acquisition failures.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No cached session exists and no credentials were supplied.
    #[error("no cached session and no credentials supplied")]
    MissingCredentials,

    /// The login endpoint answered, but not with a usable session.
    #[error("login failed: {0}")]
    LoginFailed(String),

    /// The login request itself failed.
    #[error("login request failed: {0}")]
    Http(#[from] WsprnetError),

    /// The session file could not be written or removed.
    #[error("session file error: {0}")]
    Io(#[from] std::io::Error),

    /// The token could not be encoded for persistence.
    #[error("session encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The fields of a successful login response we care about.
#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    sessid: String,
    #[serde(default)]
    session_name: String,
}

/// On-disk session store with login fallback.
pub struct SessionStore {
    file: PathBuf,
    login_url: String,
    credentials: Option<Credentials>,
}

impl SessionStore {
    pub fn new(file: PathBuf, login_url: String, credentials: Option<Credentials>) -> Self {
        Self {
            file,
            login_url,
            credentials,
        }
    }

    /// Return the cached token, or log in and persist a fresh one.
    pub async fn get_token<C: AsyncHttpClient>(
        &self,
        http: &C,
    ) -> Result<SessionToken, SessionError> {
        if let Some(token) = self.read_cached().await {
            return Ok(token);
        }
        self.login(http).await
    }

    /// Delete the persisted token so the next `get_token` performs a login.
    pub async fn invalidate(&self) -> Result<(), SessionError> {
        match tokio::fs::remove_file(&self.file).await {
            Ok(()) => {
                info!(file = %self.file.display(), "Session invalidated");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Io(e)),
        }
    }

    async fn read_cached(&self) -> Option<SessionToken> {
        let bytes = tokio::fs::read(&self.file).await.ok()?;
        match serde_json::from_slice::<SessionToken>(&bytes) {
            Ok(token) if token.is_complete() => {
                let age_hours = (Utc::now().timestamp() - token.login_time) as f64 / 3600.0;
                info!(
                    file = %self.file.display(),
                    username = %token.username,
                    age_hours,
                    "Using cached session"
                );
                Some(token)
            }
            Ok(_) => {
                warn!(file = %self.file.display(), "Cached session is missing sessid or session_name");
                None
            }
            Err(e) => {
                warn!(file = %self.file.display(), error = %e, "Failed to parse cached session");
                None
            }
        }
    }

    async fn login<C: AsyncHttpClient>(&self, http: &C) -> Result<SessionToken, SessionError> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or(SessionError::MissingCredentials)?;

        info!(username = %creds.username, url = %self.login_url, "Logging in to upstream");
        let request_body = serde_json::json!({
            "name": creds.username,
            "pass": creds.password,
        })
        .to_string();

        let response = http.post_json(&self.login_url, &request_body).await?;

        let parsed: LoginResponse = serde_json::from_slice(&response).map_err(|e| {
            let excerpt: String = String::from_utf8_lossy(&response).chars().take(200).collect();
            SessionError::LoginFailed(format!("unparseable response ({e}): {excerpt}"))
        })?;

        if parsed.sessid.is_empty() || parsed.session_name.is_empty() {
            return Err(SessionError::LoginFailed(
                "response carries no sessid or session_name".to_string(),
            ));
        }

        let token = SessionToken {
            sessid: parsed.sessid,
            session_name: parsed.session_name,
            username: creds.username.clone(),
            login_time: Utc::now().timestamp(),
        };
        self.persist(&token).await?;
        info!(file = %self.file.display(), "Login succeeded, session saved");
        Ok(token)
    }

    async fn persist(&self, token: &SessionToken) -> Result<(), SessionError> {
        if let Some(parent) = self.file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(token)?;

        // Write-then-rename keeps a crash from leaving a half-written file
        let temp_path = self.file.with_extension("tmp");
        tokio::fs::write(&temp_path, &json).await?;
        tokio::fs::rename(&temp_path, &self.file).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wsprnet::MockHttpClient;

    fn store_at(dir: &tempfile::TempDir, credentials: Option<Credentials>) -> SessionStore {
        SessionStore::new(
            dir.path().join("session.json"),
            "http://example.test/login".to_string(),
            credentials,
        )
    }

    fn test_credentials() -> Credentials {
        Credentials {
            username: "w1abc".to_string(),
            password: "secret".to_string(),
        }
    }

    #[tokio::test]
    async fn test_no_session_and_no_credentials_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = store_at(&dir, None);
        let http = MockHttpClient::new();

        assert!(matches!(
            store.get_token(&http).await,
            Err(SessionError::MissingCredentials)
        ));
        assert_eq!(http.request_count(), 0);
    }

    #[tokio::test]
    async fn test_login_persists_token() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = store_at(&dir, Some(test_credentials()));
        let http = MockHttpClient::new();
        http.push_body(r#"{"sessid": "abc123", "session_name": "SESS42", "user": {"name": "w1abc"}}"#);

        let token = store.get_token(&http).await.unwrap();
        assert_eq!(token.cookie(), "SESS42=abc123");
        assert_eq!(token.username, "w1abc");

        // Login sent the credentials as JSON
        let requests = http.requests.lock().unwrap();
        let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(body["name"], "w1abc");
        assert_eq!(body["pass"], "secret");

        // Token is on disk, with no temp file left behind
        let session_file = dir.path().join("session.json");
        assert!(session_file.exists());
        assert!(!dir.path().join("session.tmp").exists());

        let saved: SessionToken =
            serde_json::from_slice(&std::fs::read(&session_file).unwrap()).unwrap();
        assert_eq!(saved.sessid, "abc123");
    }

    #[tokio::test]
    async fn test_cached_token_skips_login() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = store_at(&dir, Some(test_credentials()));

        let http = MockHttpClient::new();
        http.push_body(r#"{"sessid": "abc123", "session_name": "SESS42"}"#);
        store.get_token(&http).await.unwrap();
        assert_eq!(http.request_count(), 1);

        // Second call must not touch the network
        let token = store.get_token(&http).await.unwrap();
        assert_eq!(token.cookie(), "SESS42=abc123");
        assert_eq!(http.request_count(), 1);
    }

    #[tokio::test]
    async fn test_incomplete_cached_token_triggers_login() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("session.json"),
            r#"{"sessid": "", "session_name": "SESS42", "username": "w1abc", "login_time": 0}"#,
        )
        .unwrap();

        let store = store_at(&dir, Some(test_credentials()));
        let http = MockHttpClient::new();
        http.push_body(r#"{"sessid": "fresh", "session_name": "SESS42"}"#);

        let token = store.get_token(&http).await.unwrap();
        assert_eq!(token.sessid, "fresh");
        assert_eq!(http.request_count(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_cached_token_triggers_login() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("session.json"), "not json at all").unwrap();

        let store = store_at(&dir, Some(test_credentials()));
        let http = MockHttpClient::new();
        http.push_body(r#"{"sessid": "fresh", "session_name": "SESS42"}"#);

        assert_eq!(store.get_token(&http).await.unwrap().sessid, "fresh");
    }

    #[tokio::test]
    async fn test_login_without_session_fields_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = store_at(&dir, Some(test_credentials()));
        let http = MockHttpClient::new();
        http.push_body(r#"{"message": "Wrong username or password."}"#);

        assert!(matches!(
            store.get_token(&http).await,
            Err(SessionError::LoginFailed(_))
        ));
        assert!(!dir.path().join("session.json").exists());
    }

    #[tokio::test]
    async fn test_login_with_unparseable_response_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = store_at(&dir, Some(test_credentials()));
        let http = MockHttpClient::new();
        http.push_body("<html>service unavailable</html>");

        match store.get_token(&http).await {
            Err(SessionError::LoginFailed(msg)) => {
                assert!(msg.contains("service unavailable"));
            }
            other => panic!("expected login failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalidate_removes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = store_at(&dir, Some(test_credentials()));
        let http = MockHttpClient::new();
        http.push_body(r#"{"sessid": "abc123", "session_name": "SESS42"}"#);
        store.get_token(&http).await.unwrap();

        store.invalidate().await.unwrap();
        assert!(!dir.path().join("session.json").exists());

        // Invalidating twice is fine
        store.invalidate().await.unwrap();
    }
}
