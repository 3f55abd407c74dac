//! OAuth2 token lifecycle.
//!
//! [`AuthService`] exchanges authorization codes and refresh tokens at the
//! token endpoint, pushes the new access token into the client and the
//! identity service, and then tries to attach the resolved identity.

use crate::client::AnvilClient;
use crate::error::Result;
use crate::identity::{Identity, IdentityService};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};

pub const TOKEN_PATH: &str = "/oauth/token";

/// Token endpoint reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationResult {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: String,
}

/// Result of a grant exchange.
///
/// `WithIdentity` when the follow-up identity lookup succeeded, `Token`
/// otherwise. Serialises flat, with an `identity` key only in the first case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthOutcome {
    WithIdentity {
        #[serde(flatten)]
        token: AuthorizationResult,
        identity: Identity,
    },
    Token(AuthorizationResult),
}

impl AuthOutcome {
    #[must_use]
    pub fn token(&self) -> &AuthorizationResult {
        match self {
            Self::WithIdentity { token, .. } | Self::Token(token) => token,
        }
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::WithIdentity { identity, .. } => Some(identity),
            Self::Token(_) => None,
        }
    }

    #[must_use]
    pub fn into_token(self) -> AuthorizationResult {
        match self {
            Self::WithIdentity { token, .. } | Self::Token(token) => token,
        }
    }
}

/// Form posted to the token endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
pub enum Grant<'a> {
    AuthorizationCode {
        code: &'a str,
        client_id: &'a str,
        client_secret: &'a str,
        redirect_uri: &'a str,
    },
    RefreshToken {
        refresh_token: &'a str,
        client_id: &'a str,
        client_secret: &'a str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    /// `expires_at` is unknown for tokens supplied directly rather than
    /// obtained from a grant.
    Authenticated { expires_at: Option<OffsetDateTime> },
}

impl AuthState {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// Whether the token is known to have expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        match self {
            Self::Authenticated {
                expires_at: Some(expires_at),
            } => now >= *expires_at,
            _ => false,
        }
    }
}

#[derive(Debug)]
pub struct AuthService {
    client: AnvilClient,
    identity: IdentityService,
    state: RwLock<AuthState>,
}

impl AuthService {
    /// Creates the service with an identity service over the same client.
    #[must_use]
    pub fn new(client: AnvilClient) -> Self {
        let identity = IdentityService::new(client.clone());
        Self::with_identity(client, identity)
    }

    #[must_use]
    pub fn with_identity(client: AnvilClient, identity: IdentityService) -> Self {
        let state = if client.access_token().is_some() {
            AuthState::Authenticated { expires_at: None }
        } else {
            AuthState::Unauthenticated
        };
        Self {
            client,
            identity,
            state: RwLock::new(state),
        }
    }

    /// Builds the service from `WORLD_ANVIL_*` environment variables.
    ///
    /// # Errors
    /// Returns an error if the environment does not configure a client.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(AnvilClient::from_env()?))
    }

    #[must_use]
    pub fn state(&self) -> AuthState {
        *self.state.read()
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.state().is_expired_at(OffsetDateTime::now_utc())
    }

    /// Exchanges an OAuth authorization code for tokens.
    ///
    /// # Errors
    /// Returns the token endpoint's error unchanged. A failing identity
    /// lookup afterwards is not an error.
    pub async fn authenticate(
        &self,
        code: &str,
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
    ) -> Result<AuthOutcome> {
        let grant = Grant::AuthorizationCode {
            code,
            client_id,
            client_secret,
            redirect_uri,
        };
        let token = self.exchange(&grant).await?;
        info!("authenticated with World Anvil");
        Ok(self.enrich(token).await)
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// # Errors
    /// Returns the token endpoint's error unchanged. The service is then
    /// unauthenticated and the previous access token is dropped.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<AuthOutcome> {
        let grant = Grant::RefreshToken {
            refresh_token,
            client_id,
            client_secret,
        };
        match self.exchange(&grant).await {
            Ok(token) => {
                info!("refreshed World Anvil access token");
                Ok(self.enrich(token).await)
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed; dropping access token");
                *self.state.write() = AuthState::Unauthenticated;
                self.client.clear_access_token();
                self.identity.clear_access_token();
                Err(err)
            }
        }
    }

    pub async fn is_token_valid(&self) -> bool {
        self.identity.verify_access_token().await
    }

    /// # Errors
    /// Returns the identity endpoint's error unchanged.
    pub async fn current_identity(&self) -> Result<Identity> {
        self.identity.current_identity().await
    }

    /// Installs a token obtained elsewhere; its expiry is unknown.
    pub fn set_access_token(&self, access_token: &str) {
        self.propagate(access_token);
        *self.state.write() = AuthState::Authenticated { expires_at: None };
    }

    async fn exchange(&self, grant: &Grant<'_>) -> Result<AuthorizationResult> {
        let token: AuthorizationResult = self
            .client
            .post(TOKEN_PATH, grant, Default::default())
            .await?;
        self.propagate(&token.access_token);
        // A missing, zero or out-of-range lifetime means the expiry is unknown.
        let expires_at = (token.expires_in > 0)
            .then(|| OffsetDateTime::now_utc().checked_add(Duration::seconds(token.expires_in)))
            .flatten();
        *self.state.write() = AuthState::Authenticated { expires_at };
        Ok(token)
    }

    // Both must see the token before the next call.
    fn propagate(&self, access_token: &str) {
        self.client.set_access_token(access_token);
        self.identity.set_access_token(access_token);
    }

    async fn enrich(&self, token: AuthorizationResult) -> AuthOutcome {
        match self.identity.current_identity().await {
            Ok(identity) => AuthOutcome::WithIdentity { token, identity },
            Err(err) => {
                debug!(error = %err, "identity lookup after token exchange failed");
                AuthOutcome::Token(token)
            }
        }
    }
}
