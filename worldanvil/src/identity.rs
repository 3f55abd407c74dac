use crate::client::AnvilClient;
use crate::error::Result;
use crate::transport::RequestOptions;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const IDENTITY_PATH: &str = "/identity";

/// Raw `/identity` payload.
///
/// Only `id`, `success`, `username` and `userhash` are documented upstream;
/// the rest are sometimes present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityResponse {
    pub id: String,
    #[serde(default)]
    pub success: bool,
    pub username: String,
    #[serde(default)]
    pub userhash: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub subscription_type: Option<String>,
    #[serde(default)]
    pub is_author: Option<bool>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// The authenticated user, as resolved from the bearer token.
///
/// Optional fields are always present when serialised (as `null`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub username: String,
    pub userhash: String,
    pub success: bool,
    pub display_name: Option<String>,
    pub subscription_type: Option<String>,
    pub is_author: Option<bool>,
    pub avatar_url: Option<String>,
}

impl From<IdentityResponse> for Identity {
    fn from(raw: IdentityResponse) -> Self {
        Self {
            id: raw.id,
            username: raw.username,
            userhash: raw.userhash,
            success: raw.success,
            display_name: raw.display_name,
            subscription_type: raw.subscription_type,
            is_author: raw.is_author,
            avatar_url: raw.avatar_url,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdentityService {
    client: AnvilClient,
}

impl IdentityService {
    #[must_use]
    pub fn new(client: AnvilClient) -> Self {
        Self { client }
    }

    /// Builds the service from `WORLD_ANVIL_*` environment variables.
    ///
    /// # Errors
    /// Returns an error if the environment does not configure a client.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(AnvilClient::from_env()?))
    }

    #[must_use]
    pub fn client(&self) -> &AnvilClient {
        &self.client
    }

    /// Resolves the user behind the current access token.
    ///
    /// # Errors
    /// Returns the upstream error unchanged, typically a 401 when the token is
    /// missing or expired.
    pub async fn current_identity(&self) -> Result<Identity> {
        let raw: IdentityResponse = self
            .client
            .get(IDENTITY_PATH, RequestOptions::new())
            .await?;
        Ok(raw.into())
    }

    /// `true` iff [`IdentityService::current_identity`] succeeds. Never fails.
    pub async fn verify_access_token(&self) -> bool {
        match self.current_identity().await {
            Ok(_) => true,
            Err(err) => {
                debug!(error = %err, "access token did not verify");
                false
            }
        }
    }

    pub fn set_access_token(&self, access_token: impl Into<String>) {
        self.client.set_access_token(access_token);
    }

    pub fn clear_access_token(&self) {
        self.client.clear_access_token();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::error::Error;
    use crate::transport::MemoryTransport;
    use serde_json::json;
    use std::sync::Arc;

    fn service() -> (IdentityService, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let credentials = Credentials {
            api_url: "https://api.test".to_string(),
            api_key: "k1".to_string(),
            access_token: Some("t1".to_string()),
        };
        let client = AnvilClient::with_transport(&credentials, transport.clone());
        (IdentityService::new(client), transport)
    }

    #[tokio::test]
    async fn maps_snake_case_fields() {
        let (service, transport) = service();
        transport.reply(json!({
            "id": "u1",
            "success": true,
            "username": "u",
            "userhash": "h",
            "display_name": "User One",
            "subscription_type": "master",
            "is_author": true,
            "avatar_url": "https://img.test/u1.png"
        }));

        let identity = service.current_identity().await.unwrap();

        assert_eq!(identity.display_name.as_deref(), Some("User One"));
        assert_eq!(identity.subscription_type.as_deref(), Some("master"));
        assert_eq!(identity.is_author, Some(true));
        assert_eq!(identity.avatar_url.as_deref(), Some("https://img.test/u1.png"));
        let request = transport.last_request().unwrap();
        assert_eq!(request.path, IDENTITY_PATH);
        assert_eq!(request.header("authorization"), Some("Bearer t1"));
    }

    #[test]
    fn missing_optionals_serialise_as_null() {
        let identity = Identity::from(IdentityResponse {
            id: "u1".to_string(),
            success: true,
            username: "u".to_string(),
            userhash: "h".to_string(),
            display_name: None,
            subscription_type: None,
            is_author: None,
            avatar_url: None,
        });
        assert_eq!(
            serde_json::to_value(&identity).unwrap(),
            json!({
                "id": "u1",
                "username": "u",
                "userhash": "h",
                "success": true,
                "displayName": null,
                "subscriptionType": null,
                "isAuthor": null,
                "avatarUrl": null
            })
        );
    }

    #[tokio::test]
    async fn verify_is_true_on_success() {
        let (service, transport) = service();
        transport.reply(json!({"id": "u1", "success": true, "username": "u", "userhash": "h"}));
        assert!(service.verify_access_token().await);
    }

    #[tokio::test]
    async fn verify_is_false_on_any_failure() {
        let (service, transport) = service();
        transport.fail(Error::Transport("Invalid token".to_string()));
        transport.fail_status(401, "unauthorized");
        transport.reply(json!({"unexpected": "shape"}));

        assert!(!service.verify_access_token().await);
        assert!(!service.verify_access_token().await);
        assert!(!service.verify_access_token().await);
    }

    #[tokio::test]
    async fn set_access_token_reaches_the_client() {
        let (service, transport) = service();
        transport.reply(json!({"id": "u1", "success": true, "username": "u", "userhash": "h"}));

        service.set_access_token("t2");
        service.current_identity().await.unwrap();

        assert_eq!(
            transport.last_request().unwrap().header("authorization"),
            Some("Bearer t2")
        );
    }
}
