//! Replayable request templates and the bounded retry-on-unauthorized loop
//!
//! A [`RequestTemplate`] buffers the body bytes up front, so the retry path
//! can rebuild a byte-identical request against whatever base URL and token
//! the re-login produced. The retry budget caps how often a rejected session
//! is refreshed before the executor gives up; an array that rejects freshly
//! issued tokens outright would otherwise loop forever.

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::rest::envelope::Envelope;
use crate::rest::query::SearchQuery;
use crate::rest::session::{Session, TOKEN_HEADER};

/// A fully buffered request: verb + path + query + body bytes
#[derive(Debug, Clone)]
pub(crate) struct RequestTemplate {
    method: Method,
    path: String,
    query: Vec<(&'static str, String)>,
    body: Option<Bytes>,
}

impl RequestTemplate {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub(crate) fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub(crate) fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub(crate) fn post<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self> {
        Self::new(Method::POST, path).body(body)
    }

    pub(crate) fn put<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self> {
        Self::new(Method::PUT, path).body(body)
    }

    pub(crate) fn delete_with_body<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self> {
        Self::new(Method::DELETE, path).body(body)
    }

    fn body<B: Serialize>(mut self, body: &B) -> Result<Self> {
        self.body = Some(Bytes::from(serde_json::to_vec(body)?));
        Ok(self)
    }

    /// Append collection query parameters.
    pub(crate) fn search(mut self, query: &SearchQuery) -> Self {
        self.query.extend(query.pairs());
        self
    }

    /// Append a single query parameter.
    pub(crate) fn param(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    fn url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        url.set_path(&format!("{}{}", base.path(), self.path));
        if !self.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(self.query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        url
    }
}

/// Issue a templated request, re-logging-in and replaying on session
/// invalidation until the retry budget runs out.
///
/// Returns the decoded `data` member (absent on no-content endpoints). Any
/// non-auth array error is terminal and never replayed.
pub(crate) async fn execute<T: DeserializeOwned>(
    http: &reqwest::Client,
    session: &Session,
    device: &'static str,
    template: &RequestTemplate,
    retry_budget: u32,
) -> Result<Option<T>> {
    let mut remaining = retry_budget;
    let mut relogins: u32 = 0;

    loop {
        let state = session.authenticated(http).await?;

        let mut request = http
            .request(template.method.clone(), template.url(&state.base_url))
            .header(CONTENT_TYPE, "application/json")
            .header(TOKEN_HEADER, &state.token);
        if let Some(body) = &template.body {
            request = request.body(body.clone());
        }

        let response = request.send().await?;
        let payload = response.bytes().await?;
        let envelope = Envelope::<T>::parse(&payload)?;

        if envelope.error().is_session_expired() {
            if remaining == 0 {
                return Err(Error::AuthRetriesExhausted { attempts: relogins });
            }
            remaining -= 1;
            relogins += 1;
            debug!(device, relogins, path = template.path(), "session rejected, re-authenticating");
            session.refresh_if_stale(http, &state.token).await?;
            continue;
        }

        return envelope.into_data();
    }
}
