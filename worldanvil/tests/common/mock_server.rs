use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use wiremock::matchers::{body_partial_json, header, method, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};
use worldanvil::{AnvilClient, Credentials, WorldAnvil};

pub const TEST_API_KEY: &str = "test-api-key";

#[derive(Deserialize)]
pub struct Fixture {
    #[serde(rename = "_meta")]
    pub meta: Option<FixtureMeta>,
    pub request: FixtureRequest,
    pub response: FixtureResponse,
}

#[derive(Deserialize)]
pub struct FixtureMeta {
    pub query: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Deserialize)]
pub struct FixtureRequest {
    pub method: String,
    pub path_pattern: String,
    pub headers: Option<HashMap<String, String>>,
    /// Matched as a subset of the JSON request body.
    pub body: Option<serde_json::Value>,
}

#[derive(Deserialize)]
pub struct FixtureResponse {
    pub status_code: u16,
    pub body: serde_json::Value,
}

pub struct AnvilMock {
    pub server: MockServer,
}

impl AnvilMock {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
    }

    pub async fn mount_fixture(&self, fixture_path: &str) {
        let full_path = Self::fixtures_dir().join(fixture_path);

        let content = fs::read_to_string(&full_path)
            .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", full_path.display(), e));

        let fixture: Fixture = serde_json::from_str(&content)
            .unwrap_or_else(|e| panic!("Failed to parse fixture {}: {}", full_path.display(), e));

        let mut mock = Mock::given(method(fixture.request.method.as_str()))
            .and(path_regex(&fixture.request.path_pattern));

        if let Some(query) = fixture.meta.as_ref().and_then(|meta| meta.query.as_ref()) {
            for (key, value) in query {
                if let Some(value) = query_value_to_string(value) {
                    mock = mock.and(query_param(key.as_str(), value.as_str()));
                }
            }
        }

        if let Some(headers) = &fixture.request.headers {
            for (key, value) in headers {
                mock = mock.and(header(key.as_str(), value.as_str()));
            }
        }

        if let Some(body) = &fixture.request.body {
            mock = mock.and(body_partial_json(body));
        }

        mock.respond_with(
            ResponseTemplate::new(fixture.response.status_code)
                .set_body_json(&fixture.response.body),
        )
        .mount(&self.server)
        .await;
    }

    pub fn credentials(&self, access_token: Option<&str>) -> Credentials {
        Credentials {
            api_url: self.server.uri(),
            api_key: TEST_API_KEY.to_string(),
            access_token: access_token.map(str::to_string),
        }
    }

    pub fn client(&self) -> AnvilClient {
        AnvilClient::new(&self.credentials(Some("test-access-token")))
    }

    #[allow(dead_code)]
    pub fn anonymous_client(&self) -> AnvilClient {
        AnvilClient::new(&self.credentials(None))
    }

    #[allow(dead_code)]
    pub fn anvil(&self) -> WorldAnvil {
        WorldAnvil::new(self.anonymous_client())
    }

    #[allow(dead_code)]
    pub async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }
}

fn query_value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(value) => Some(value.clone()),
        serde_json::Value::Number(value) => Some(value.to_string()),
        serde_json::Value::Bool(value) => Some(value.to_string()),
        serde_json::Value::Null => None,
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
    }
}

#[allow(dead_code)]
pub fn header_value<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
}
