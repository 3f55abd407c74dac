use crate::config::{ClientConfig, Credentials};
use crate::error::{Error, ErrorClass, Result};
use crate::transport::{HttpTransport, RequestOptions, Transport};
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub const APPLICATION_KEY_HEADER: &str = "x-application-key";

struct ClientInner {
    transport: Arc<dyn Transport>,
    base_url: String,
    api_key: RwLock<String>,
    access_token: RwLock<Option<String>>,
}

/// Authenticated World Anvil client.
///
/// Cloning is cheap and clones share token state: a token set through one
/// clone is attached to the next request issued by any of them.
#[derive(Clone)]
pub struct AnvilClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for AnvilClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnvilClient")
            .field("base_url", &self.inner.base_url)
            .field("has_access_token", &self.inner.access_token.read().is_some())
            .finish_non_exhaustive()
    }
}

impl AnvilClient {
    /// Creates a client backed by reqwest.
    #[must_use]
    pub fn new(credentials: &Credentials) -> Self {
        let transport = Arc::new(HttpTransport::new(credentials.api_url.clone()));
        Self::with_transport(credentials, transport)
    }

    /// Creates a client over an arbitrary transport.
    #[must_use]
    pub fn with_transport(credentials: &Credentials, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                base_url: credentials.api_url.clone(),
                api_key: RwLock::new(credentials.api_key.clone()),
                access_token: RwLock::new(credentials.access_token.clone()),
            }),
        }
    }

    /// Resolves `explicit` field by field over `process` and builds a client.
    ///
    /// # Errors
    /// Returns an error if neither source yields an application key, or the
    /// url is invalid.
    pub fn from_config(explicit: ClientConfig, process: ClientConfig) -> Result<Self> {
        let credentials = explicit.or(process).resolve()?;
        Ok(Self::new(&credentials))
    }

    /// Builds a client from `WORLD_ANVIL_*` environment variables.
    ///
    /// # Errors
    /// Returns an error if `WORLD_ANVIL_KEY` is unset or the url is invalid.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(&Credentials::from_env()?))
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    #[must_use]
    pub fn api_key(&self) -> String {
        self.inner.api_key.read().clone()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.inner.access_token.read().clone()
    }

    pub fn set_api_key(&self, api_key: impl Into<String>) {
        *self.inner.api_key.write() = api_key.into();
        debug!("application key replaced");
    }

    pub fn set_access_token(&self, access_token: impl Into<String>) {
        *self.inner.access_token.write() = Some(access_token.into());
        debug!("access token replaced");
    }

    pub fn clear_access_token(&self) {
        *self.inner.access_token.write() = None;
        debug!("access token cleared");
    }

    // Read on every call so token rotation is seen by the next request.
    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            APPLICATION_KEY_HEADER,
            HeaderValue::from_str(&self.inner.api_key.read())?,
        );
        if let Some(token) = self.inner.access_token.read().as_deref() {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// # Errors
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn get<T>(&self, path: &str, options: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let result = match self.headers() {
            Ok(headers) => self.inner.transport.get(path, headers, options).await,
            Err(err) => Err(err),
        };
        self.finish(&Method::GET, path, result)
    }

    /// # Errors
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn post<T, B>(&self, path: &str, body: &B, options: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let result = match self.prepare(body) {
            Ok((body, headers)) => {
                self.inner
                    .transport
                    .post(path, Some(body), headers, options)
                    .await
            }
            Err(err) => Err(err),
        };
        self.finish(&Method::POST, path, result)
    }

    /// # Errors
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn put<T, B>(&self, path: &str, body: &B, options: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let result = match self.prepare(body) {
            Ok((body, headers)) => {
                self.inner
                    .transport
                    .put(path, Some(body), headers, options)
                    .await
            }
            Err(err) => Err(err),
        };
        self.finish(&Method::PUT, path, result)
    }

    /// # Errors
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn patch<T, B>(&self, path: &str, body: &B, options: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let result = match self.prepare(body) {
            Ok((body, headers)) => {
                self.inner
                    .transport
                    .patch(path, Some(body), headers, options)
                    .await
            }
            Err(err) => Err(err),
        };
        self.finish(&Method::PATCH, path, result)
    }

    /// # Errors
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn delete<T>(&self, path: &str, options: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let result = match self.headers() {
            Ok(headers) => self.inner.transport.delete(path, headers, options).await,
            Err(err) => Err(err),
        };
        self.finish(&Method::DELETE, path, result)
    }

    fn prepare<B>(&self, body: &B) -> Result<(Value, HeaderMap)>
    where
        B: Serialize + ?Sized,
    {
        Ok((serde_json::to_value(body)?, self.headers()?))
    }

    fn finish<T>(&self, method: &Method, path: &str, result: Result<Value>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let decoded = result.and_then(|value| serde_json::from_value(value).map_err(Error::from));
        match decoded {
            Ok(value) => {
                debug!(%method, path, "request succeeded");
                Ok(value)
            }
            Err(err) => {
                report(method, path, &err);
                Err(err)
            }
        }
    }
}

/// Logs a failed request once, at a level chosen by its [`ErrorClass`].
pub(crate) fn report(method: &Method, path: &str, err: &Error) {
    let class = err.class();
    let status = err.status();
    match class {
        ErrorClass::RateLimited => {
            warn!(%method, path, ?status, %class, "rate limited by World Anvil: {err}");
        }
        ErrorClass::Unauthorized => {
            error!(%method, path, ?status, %class, "unauthorized; check the access token: {err}");
        }
        ErrorClass::Forbidden => {
            error!(%method, path, ?status, %class, "forbidden; insufficient permissions: {err}");
        }
        ErrorClass::ServerOrUnknown => {
            error!(%method, path, ?status, %class, "World Anvil request failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use serde_json::json;

    fn credentials(token: Option<&str>) -> Credentials {
        Credentials {
            api_url: "https://api.test".to_string(),
            api_key: "k1".to_string(),
            access_token: token.map(str::to_string),
        }
    }

    fn client(token: Option<&str>) -> (AnvilClient, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let client = AnvilClient::with_transport(&credentials(token), transport.clone());
        (client, transport)
    }

    #[tokio::test]
    async fn api_key_without_token_sends_no_authorization() {
        let (client, transport) = client(None);
        transport.reply(json!({}));

        let _: Value = client.get("/identity", RequestOptions::new()).await.unwrap();

        let request = transport.last_request().unwrap();
        assert_eq!(request.header("x-application-key"), Some("k1"));
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("accept"), Some("application/json"));
        assert!(request.header("authorization").is_none());
    }

    #[tokio::test]
    async fn token_set_before_a_request_is_attached() {
        let (client, transport) = client(None);
        transport.reply(json!({}));
        transport.reply(json!({}));
        transport.reply(json!({}));

        client.set_access_token("t1");
        let _: Value = client.get("/identity", RequestOptions::new()).await.unwrap();
        client.set_access_token("t1");
        let _: Value = client.get("/identity", RequestOptions::new()).await.unwrap();
        client.set_access_token("t2");
        let _: Value = client.get("/identity", RequestOptions::new()).await.unwrap();

        let seen: Vec<_> = transport
            .requests()
            .iter()
            .map(|r| r.header("authorization").map(str::to_string))
            .collect();
        assert_eq!(
            seen,
            vec![
                Some("Bearer t1".to_string()),
                Some("Bearer t1".to_string()),
                Some("Bearer t2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn invalid_header_is_logged_and_never_sent() {
        let (client, transport) = client(None);
        let (logs, _guard) = crate::testing::capture_logs();
        client.set_access_token("bad\ntoken");

        let err = client
            .post::<Value, _>("/article", &json!({"title": "A"}), RequestOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidHeader(_)));
        assert!(transport.requests().is_empty());
        let logs = logs.contents();
        assert!(logs.contains("ERROR"), "{logs}");
        assert!(logs.contains("class=server_or_unknown"), "{logs}");
        assert!(logs.contains("World Anvil request failed"), "{logs}");
    }

    #[tokio::test]
    async fn rate_limit_is_logged_as_warning() {
        let (client, transport) = client(Some("t1"));
        let (logs, _guard) = crate::testing::capture_logs();
        transport.fail_status(429, "slow down");

        let err = client
            .get::<Value>("/map", RequestOptions::id("m1"))
            .await
            .unwrap_err();

        assert!(err.is_rate_limited());
        let logs = logs.contents();
        assert!(logs.contains("WARN"), "{logs}");
        assert!(logs.contains("class=rate_limited"), "{logs}");
    }

    #[tokio::test]
    async fn clones_share_token_state() {
        let (client, transport) = client(Some("old"));
        let other = client.clone();
        transport.reply(json!({}));

        other.set_access_token("new");
        let _: Value = client.get("/identity", RequestOptions::new()).await.unwrap();

        let request = transport.last_request().unwrap();
        assert_eq!(request.header("authorization"), Some("Bearer new"));
        assert_eq!(client.access_token().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn cleared_token_is_not_sent() {
        let (client, transport) = client(Some("t1"));
        transport.reply(json!({}));

        client.clear_access_token();
        let _: Value = client.get("/identity", RequestOptions::new()).await.unwrap();

        assert!(transport.last_request().unwrap().header("authorization").is_none());
    }

    #[tokio::test]
    async fn replaced_api_key_is_sent() {
        let (client, transport) = client(None);
        transport.reply(json!({}));

        client.set_api_key("k2");
        let _: Value = client.get("/identity", RequestOptions::new()).await.unwrap();

        assert_eq!(
            transport.last_request().unwrap().header("x-application-key"),
            Some("k2")
        );
    }

    #[tokio::test]
    async fn failures_are_returned_unchanged() {
        let (client, transport) = client(Some("t1"));
        transport.fail_status(429, "slow down");

        let err = client
            .delete::<Value>("/article", RequestOptions::id("a1"))
            .await
            .unwrap_err();

        assert!(err.is_rate_limited());
        match err {
            Error::HttpStatus { status, body, .. } => {
                assert_eq!(status, 429);
                assert_eq!(body, "slow down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn body_and_query_are_forwarded() {
        let (client, transport) = client(None);
        transport.reply(json!({"id": "a1"}));

        let _: Value = client
            .patch("/article", &json!({"title": "New"}), RequestOptions::id("a1"))
            .await
            .unwrap();

        let request = transport.last_request().unwrap();
        assert_eq!(request.method, Method::PATCH);
        assert_eq!(request.body, Some(json!({"title": "New"})));
        assert_eq!(request.query.get("id").map(String::as_str), Some("a1"));
    }

    #[tokio::test]
    async fn undecodable_response_is_a_json_error() {
        let (client, transport) = client(None);
        transport.reply(json!("not an object"));

        #[derive(Debug, serde::Deserialize)]
        struct Shape {
            #[allow(dead_code)]
            id: String,
        }
        let err = client
            .get::<Shape>("/article", RequestOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn explicit_config_overrides_process_config() {
        let process = ClientConfig::new()
            .with_api_url("https://process.test")
            .with_api_key("process-key");
        let explicit = ClientConfig::new().with_api_key("explicit-key");

        let client = AnvilClient::from_config(explicit, process).unwrap();
        assert_eq!(client.base_url(), "https://process.test");
        assert_eq!(client.api_key(), "explicit-key");
        assert_eq!(client.access_token(), None);
    }

    #[test]
    fn missing_key_fails_construction() {
        let err = AnvilClient::from_config(ClientConfig::new(), ClientConfig::new()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
