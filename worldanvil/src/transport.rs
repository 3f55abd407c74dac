//! HTTP transport seam.
//!
//! Everything above this module talks to a [`Transport`], never to reqwest
//! directly. [`HttpTransport`] is the real implementation; [`MemoryTransport`]
//! records requests and replays canned replies for tests.

use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};

/// Per-request options. `params` become the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub params: BTreeMap<String, String>,
}

impl RequestOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Shorthand for the `?id=...` selector used by most endpoints.
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::new().param("id", id)
    }
}

/// A fully described outbound request, as handed to [`Transport::execute`].
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub query: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: &str, headers: HeaderMap, options: RequestOptions) -> Self {
        Self {
            method,
            path: path.to_string(),
            headers,
            query: options.params,
            body: None,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }

    /// Header value as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Minimal HTTP interface.
///
/// Implementors only provide [`Transport::execute`]; the verb helpers build
/// the [`ApiRequest`]. Replies are raw JSON, decoding into concrete types is
/// left to [`crate::AnvilClient`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a request and returns the decoded JSON body.
    ///
    /// # Errors
    /// Implementations may fail for any reason; [`HttpTransport`] returns
    /// [`Error::HttpStatus`] for non-2xx responses.
    async fn execute(&self, request: ApiRequest) -> Result<Value>;

    async fn get(&self, path: &str, headers: HeaderMap, options: RequestOptions) -> Result<Value> {
        self.execute(ApiRequest::new(Method::GET, path, headers, options))
            .await
    }

    async fn post(
        &self,
        path: &str,
        body: Option<Value>,
        headers: HeaderMap,
        options: RequestOptions,
    ) -> Result<Value> {
        self.execute(ApiRequest::new(Method::POST, path, headers, options).with_body(body))
            .await
    }

    async fn put(
        &self,
        path: &str,
        body: Option<Value>,
        headers: HeaderMap,
        options: RequestOptions,
    ) -> Result<Value> {
        self.execute(ApiRequest::new(Method::PUT, path, headers, options).with_body(body))
            .await
    }

    async fn patch(
        &self,
        path: &str,
        body: Option<Value>,
        headers: HeaderMap,
        options: RequestOptions,
    ) -> Result<Value> {
        self.execute(ApiRequest::new(Method::PATCH, path, headers, options).with_body(body))
            .await
    }

    async fn delete(
        &self,
        path: &str,
        headers: HeaderMap,
        options: RequestOptions,
    ) -> Result<Value> {
        self.execute(ApiRequest::new(Method::DELETE, path, headers, options))
            .await
    }
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Uses a preconfigured reqwest client (timeouts, proxies, ...).
    #[must_use]
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<Value> {
        let mut builder = self
            .client
            .request(request.method, self.url(&request.path))
            .headers(request.headers);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or_default().to_string();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                reason,
                body,
            });
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(Error::from)
    }
}

/// In-memory transport that records requests and replays queued replies.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    requests: Mutex<Vec<ApiRequest>>,
    replies: Mutex<VecDeque<Result<Value>>>,
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful reply.
    pub fn reply(&self, body: Value) {
        self.replies.lock().push_back(Ok(body));
    }

    /// Queues a failure.
    pub fn fail(&self, error: Error) {
        self.replies.lock().push_back(Err(error));
    }

    /// Queues an HTTP status failure with the given body.
    pub fn fail_status(&self, status: u16, body: impl Into<String>) {
        self.fail(Error::HttpStatus {
            status,
            reason: String::new(),
            body: body.into(),
        });
    }

    /// Every request seen so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    #[must_use]
    pub fn last_request(&self) -> Option<ApiRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn execute(&self, request: ApiRequest) -> Result<Value> {
        let label = format!("{} {}", request.method, request.path);
        self.requests.lock().push(request);
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Transport(format!("no reply queued for {label}"))))
    }
}
