use crate::auth::{AuthOutcome, AuthService};
use crate::client::AnvilClient;
use crate::config::Credentials;
use crate::error::Result;
use crate::identity::Identity;
use crate::resource::{Granularity, Page, PageOptions, ResourceClient};
use crate::resources::{
    Articles, BlockFolders, BlockTemplates, Blocks, Canvases, Categories, Images, Layers,
    Manuscripts, Maps, MarkerGroups, MarkerTypes, Markers, Notebooks, RpgSystems, Secrets,
    SubscriberGroups, Timelines, Users, VariableCollections, Variables, Worlds,
};
use crate::types;

/// Entry point combining authentication with every resource family.
///
/// All sub-clients share one [`AnvilClient`], so a token installed through
/// the facade is seen by all of them.
#[derive(Debug)]
pub struct WorldAnvil {
    client: AnvilClient,
    auth: AuthService,
}

impl WorldAnvil {
    #[must_use]
    pub fn new(client: AnvilClient) -> Self {
        let auth = AuthService::new(client.clone());
        Self { client, auth }
    }

    #[must_use]
    pub fn from_credentials(credentials: &Credentials) -> Self {
        Self::new(AnvilClient::new(credentials))
    }

    /// # Errors
    /// Returns an error if `WORLD_ANVIL_KEY` is unset or the url is invalid.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(AnvilClient::from_env()?))
    }

    #[must_use]
    pub fn client(&self) -> &AnvilClient {
        &self.client
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    /// # Errors
    /// Returns the token endpoint's error unchanged.
    pub async fn authenticate(
        &self,
        code: &str,
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
    ) -> Result<AuthOutcome> {
        self.auth
            .authenticate(code, client_id, client_secret, redirect_uri)
            .await
    }

    /// # Errors
    /// Returns the token endpoint's error unchanged.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<AuthOutcome> {
        self.auth
            .refresh_token(refresh_token, client_id, client_secret)
            .await
    }

    pub async fn is_token_valid(&self) -> bool {
        self.auth.is_token_valid().await
    }

    pub fn set_access_token(&self, access_token: &str) {
        self.auth.set_access_token(access_token);
    }

    /// # Errors
    /// Returns the identity endpoint's error unchanged.
    pub async fn current_identity(&self) -> Result<Identity> {
        self.auth.current_identity().await
    }

    /// # Errors
    /// Returns an error if the request fails or the response cannot be parsed.
    pub async fn current_user(&self) -> Result<types::User> {
        self.users().current(None).await
    }

    /// # Errors
    /// Returns an error if the identity lookup or the listing fails.
    pub async fn my_worlds(&self, options: &PageOptions) -> Result<Page<types::World>> {
        self.worlds().mine(options).await
    }

    /// # Errors
    /// Returns an error if the request fails or the response cannot be parsed.
    pub async fn world_by_id(
        &self,
        world_id: &str,
        granularity: Option<Granularity>,
    ) -> Result<types::World> {
        self.worlds().get(world_id, granularity).await
    }

    fn resources<R>(&self) -> ResourceClient<R> {
        ResourceClient::new(self.client.clone())
    }

    #[must_use]
    pub fn articles(&self) -> Articles {
        self.resources()
    }

    #[must_use]
    pub fn blocks(&self) -> Blocks {
        self.resources()
    }

    #[must_use]
    pub fn block_folders(&self) -> BlockFolders {
        self.resources()
    }

    #[must_use]
    pub fn block_templates(&self) -> BlockTemplates {
        self.resources()
    }

    #[must_use]
    pub fn canvases(&self) -> Canvases {
        self.resources()
    }

    #[must_use]
    pub fn categories(&self) -> Categories {
        self.resources()
    }

    #[must_use]
    pub fn images(&self) -> Images {
        self.resources()
    }

    #[must_use]
    pub fn layers(&self) -> Layers {
        self.resources()
    }

    #[must_use]
    pub fn manuscripts(&self) -> Manuscripts {
        self.resources()
    }

    #[must_use]
    pub fn maps(&self) -> Maps {
        self.resources()
    }

    #[must_use]
    pub fn marker_groups(&self) -> MarkerGroups {
        self.resources()
    }

    #[must_use]
    pub fn markers(&self) -> Markers {
        self.resources()
    }

    #[must_use]
    pub fn marker_types(&self) -> MarkerTypes {
        self.resources()
    }

    #[must_use]
    pub fn notebooks(&self) -> Notebooks {
        self.resources()
    }

    #[must_use]
    pub fn rpg_systems(&self) -> RpgSystems {
        self.resources()
    }

    #[must_use]
    pub fn secrets(&self) -> Secrets {
        self.resources()
    }

    #[must_use]
    pub fn subscriber_groups(&self) -> SubscriberGroups {
        self.resources()
    }

    #[must_use]
    pub fn timelines(&self) -> Timelines {
        self.resources()
    }

    #[must_use]
    pub fn users(&self) -> Users {
        self.resources()
    }

    #[must_use]
    pub fn variables(&self) -> Variables {
        self.resources()
    }

    #[must_use]
    pub fn variable_collections(&self) -> VariableCollections {
        self.resources()
    }

    #[must_use]
    pub fn worlds(&self) -> Worlds {
        self.resources()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use serde_json::json;
    use std::sync::Arc;

    fn facade() -> (WorldAnvil, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let credentials = Credentials {
            api_url: "https://api.test".to_string(),
            api_key: "k1".to_string(),
            access_token: None,
        };
        let client = AnvilClient::with_transport(&credentials, transport.clone());
        (WorldAnvil::new(client), transport)
    }

    #[tokio::test]
    async fn token_from_authenticate_reaches_sub_clients() {
        let (anvil, transport) = facade();
        transport.reply(json!({"access_token": "t1", "refresh_token": "r1", "expires_in": 60, "token_type": "Bearer"}));
        transport.fail_status(500, "identity down");
        transport.reply(json!({"id": "s1", "title": "Hidden"}));

        let outcome = anvil.authenticate("code", "id", "secret", "uri").await.unwrap();
        assert!(outcome.identity().is_none());

        anvil.secrets().get("s1", None).await.unwrap();
        assert_eq!(
            transport.last_request().unwrap().header("authorization"),
            Some("Bearer t1")
        );
    }

    #[tokio::test]
    async fn set_access_token_is_shared() {
        let (anvil, transport) = facade();
        let maps = anvil.maps();
        transport.reply(json!({"id": "m1", "title": "Atlas"}));

        anvil.set_access_token("t9");
        maps.get("m1", None).await.unwrap();

        assert_eq!(
            transport.last_request().unwrap().header("authorization"),
            Some("Bearer t9")
        );
    }

    #[tokio::test]
    async fn world_by_id_uses_reference_granularity() {
        let (anvil, transport) = facade();
        transport.reply(json!({"id": "w1", "title": "Aerth"}));

        let world = anvil.world_by_id("w1", None).await.unwrap();

        assert_eq!(world.id, "w1");
        let request = transport.last_request().unwrap();
        assert_eq!(request.path, "/world");
        assert_eq!(request.query.get("granularity").map(String::as_str), Some("-1"));
    }

    #[tokio::test]
    async fn current_user_reads_me() {
        let (anvil, transport) = facade();
        transport.reply(json!({"id": "u1", "username": "u"}));

        let user = anvil.current_user().await.unwrap();

        assert_eq!(user.username, "u");
        assert_eq!(transport.last_request().unwrap().path, "/user/me");
    }
}
