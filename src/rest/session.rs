//! Session management and controller failover
//!
//! Each array exposes several equivalent controller endpoints. Login walks the
//! configured list in order: the login request goes to a bootstrap base URL
//! with a placeholder device id, and a successful response rewrites the base
//! URL to embed the real device id the array reports. The active base URL and
//! token are replaced together under a write lock, so a request is never built
//! half from an old session and half from a new one.
//!
//! Re-login is reactive: only the request executor calls [`Session::refresh_if_stale`]
//! after the array rejects a token. There is no heartbeat.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::rest::envelope::{Envelope, CODE_USER_ALREADY_ONLINE};

/// Vendor base path prefix for every management endpoint
pub(crate) const REST_BASE: &str = "/deviceManager/rest";
/// Placeholder device id accepted by the login endpoint before the real id is known
pub(crate) const BOOTSTRAP_DEVICE_ID: &str = "xx";
/// Header carrying the session token on every authenticated request
pub(crate) const TOKEN_HEADER: &str = "iBaseToken";

/// Base URL and token from one successful login; never mixed across logins
#[derive(Debug, Clone)]
pub(crate) struct SessionState {
    pub base_url: Url,
    pub token: String,
}

#[derive(Debug, Serialize)]
struct LoginParam<'a> {
    username: &'a str,
    password: &'a str,
    scope: i32,
}

#[derive(Debug, Deserialize)]
struct SessionData {
    #[serde(rename = "iBaseToken")]
    token: String,
    #[serde(rename = "deviceid")]
    device_id: String,
}

/// Per-device session manager
pub(crate) struct Session {
    controllers: Vec<String>,
    username: String,
    password: String,
    state: RwLock<Option<SessionState>>,
}

impl Session {
    pub(crate) fn new(config: &DeviceConfig) -> Self {
        Self {
            controllers: config.controllers.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            state: RwLock::new(None),
        }
    }

    #[cfg(test)]
    pub(crate) fn seeded(config: &DeviceConfig, state: SessionState) -> Self {
        Self {
            controllers: config.controllers.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            state: RwLock::new(Some(state)),
        }
    }

    /// Snapshot of the active session, logging in on first use.
    pub(crate) async fn authenticated(&self, http: &reqwest::Client) -> Result<SessionState> {
        if let Some(state) = self.state.read().await.clone() {
            return Ok(state);
        }
        self.refresh(http).await
    }

    /// Base URL of the last successful login, if any.
    pub(crate) async fn current_base_url(&self) -> Option<Url> {
        self.state.read().await.as_ref().map(|s| s.base_url.clone())
    }

    /// Re-login unless another task already replaced the session the caller
    /// observed. The write lock is held across the login round-trip, which
    /// orders the rewrite against concurrent request construction.
    pub(crate) async fn refresh_if_stale(
        &self,
        http: &reqwest::Client,
        observed_token: &str,
    ) -> Result<SessionState> {
        let mut guard = self.state.write().await;
        if let Some(current) = guard.as_ref() {
            if current.token != observed_token {
                return Ok(current.clone());
            }
        }

        let state = self.login(http).await?;
        *guard = Some(state.clone());
        Ok(state)
    }

    async fn refresh(&self, http: &reqwest::Client) -> Result<SessionState> {
        let mut guard = self.state.write().await;
        if let Some(state) = guard.as_ref() {
            return Ok(state.clone());
        }

        let state = self.login(http).await?;
        *guard = Some(state.clone());
        Ok(state)
    }

    async fn login(&self, http: &reqwest::Client) -> Result<SessionState> {
        for controller in &self.controllers {
            match self.login_once(http, controller).await {
                Ok(state) => {
                    info!(%controller, "session established");
                    return Ok(state);
                }
                Err(error) => {
                    warn!(%controller, %error, "login failed, trying next controller");
                }
            }
        }

        Err(Error::AllControllersFailed {
            tried: self.controllers.len(),
        })
    }

    async fn login_once(&self, http: &reqwest::Client, controller: &str) -> Result<SessionState> {
        let host = controller.trim_end_matches('/');
        let login_url = format!("{host}{REST_BASE}/{BOOTSTRAP_DEVICE_ID}/sessions");

        let param = LoginParam {
            username: &self.username,
            password: &self.password,
            scope: 0,
        };
        let response = http.post(&login_url).json(&param).send().await?;
        let payload = response.bytes().await?;

        let (data, error) = Envelope::<SessionData>::parse(&payload)?.into_parts();
        if !error.is_ok() && error.code != CODE_USER_ALREADY_ONLINE {
            return Err(error.into_error());
        }
        let data = data.ok_or_else(|| Error::EmptyData {
            path: "/sessions".into(),
        })?;

        let base_url = Url::parse(&format!("{host}{REST_BASE}/{}", data.device_id))
            .map_err(|e| Error::Configuration(format!("invalid controller endpoint {controller}: {e}")))?;

        Ok(SessionState {
            base_url,
            token: data.token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use httpmock::{Method::POST, MockServer};

    fn config(controllers: Vec<String>) -> DeviceConfig {
        DeviceConfig {
            controllers,
            username: "admin".into(),
            password: "secret".into(),
            accept_invalid_certs: false,
        }
    }

    fn login_body(token: &str, device_id: &str) -> serde_json::Value {
        serde_json::json!({
            "data": {"iBaseToken": token, "deviceid": device_id},
            "error": {"code": 0, "description": "", "suggestion": ""},
        })
    }

    #[tokio::test]
    async fn test_login_skips_dead_controller() {
        let server = MockServer::start();
        let login = server.mock(|when, then| {
            when.method(POST).path("/deviceManager/rest/xx/sessions");
            then.status(200).json_body(login_body("tok-1", "210235G6"));
        });

        // Port 1 refuses connections, forcing failover to the live server.
        let session = Session::new(&config(vec![
            "http://127.0.0.1:1".into(),
            server.base_url(),
        ]));
        let http = reqwest::Client::new();

        let state = session.authenticated(&http).await.unwrap();

        login.assert();
        assert_eq!(state.token, "tok-1");
        assert_eq!(
            state.base_url.as_str(),
            format!("{}/deviceManager/rest/210235G6", server.base_url())
        );
    }

    #[tokio::test]
    async fn test_login_fails_hard_when_all_controllers_fail() {
        let session = Session::new(&config(vec![
            "http://127.0.0.1:1".into(),
            "http://127.0.0.1:1".into(),
        ]));
        let http = reqwest::Client::new();

        assert_matches!(
            session.authenticated(&http).await,
            Err(Error::AllControllersFailed { tried: 2 })
        );
    }

    #[tokio::test]
    async fn test_login_rejected_by_array_advances_to_next_controller() {
        let rejecting = MockServer::start();
        rejecting.mock(|when, then| {
            when.method(POST).path("/deviceManager/rest/xx/sessions");
            then.status(200).json_body(serde_json::json!({
                "data": {},
                "error": {"code": 1077949081, "description": "Authentication failed.", "suggestion": ""},
            }));
        });

        let accepting = MockServer::start();
        accepting.mock(|when, then| {
            when.method(POST).path("/deviceManager/rest/xx/sessions");
            then.status(200).json_body(login_body("tok-2", "dev-2"));
        });

        let session = Session::new(&config(vec![rejecting.base_url(), accepting.base_url()]));
        let state = session.authenticated(&reqwest::Client::new()).await.unwrap();

        assert_eq!(state.token, "tok-2");
        assert!(state.base_url.as_str().starts_with(&accepting.base_url()));
    }

    #[tokio::test]
    async fn test_already_online_login_still_carries_session() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/deviceManager/rest/xx/sessions");
            then.status(200).json_body(serde_json::json!({
                "data": {"iBaseToken": "tok-3", "deviceid": "dev-3"},
                "error": {"code": CODE_USER_ALREADY_ONLINE, "description": "The user is already online.", "suggestion": ""},
            }));
        });

        let session = Session::new(&config(vec![server.base_url()]));
        let state = session.authenticated(&reqwest::Client::new()).await.unwrap();
        assert_eq!(state.token, "tok-3");
    }

    #[tokio::test]
    async fn test_refresh_skipped_when_session_already_replaced() {
        let server = MockServer::start();
        let login = server.mock(|when, then| {
            when.method(POST).path("/deviceManager/rest/xx/sessions");
            then.status(200).json_body(login_body("tok-new", "dev-1"));
        });

        let session = Session::new(&config(vec![server.base_url()]));
        let http = reqwest::Client::new();

        let first = session.refresh_if_stale(&http, "tok-old").await.unwrap();
        assert_eq!(first.token, "tok-new");

        // A second caller that still holds the pre-refresh token must not
        // trigger another login.
        let second = session.refresh_if_stale(&http, "tok-old").await.unwrap();
        assert_eq!(second.token, "tok-new");
        login.assert_hits(1);
    }
}
