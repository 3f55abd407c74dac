//! The World Anvil resource families.
//!
//! Each family is a marker type; see [`crate::resource`] for the operations
//! every family shares. Family-specific calls live in the `impl` blocks at the
//! bottom of this file.

use crate::error::{Error, Result};
use crate::identity::IdentityService;
use crate::resource::{
    Creatable, EntityList, Granularity, ListOptions, ListedUnder, Page, PageMethod, PageOptions,
    PagedListing, Resource, ResourceClient, Writable,
};
use crate::transport::RequestOptions;
use crate::types::{
    self, ArticleInput, BlockInput, BlockTemplateInput, Entity, EntityInput, EntityRef,
    EntityUpdate, MapChildInput, MapInput, MarkerInput, MarkerTypeInput, UserUpdate,
    VariableCollectionInput, VariableInput, WorldInput, WorldUpdate,
};

use crate::resource::Granularity::{Complete, Extended, Full, Reference, Standard};

const REF_STANDARD_FULL: &[Granularity] = &[Reference, Standard, Full];
const UP_TO_FULL: &[Granularity] = &[Reference, Standard, Extended, Full];

// =============================================================================
// ARTICLES AND CATEGORIES
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct Article;

impl Resource for Article {
    const PATH: &'static str = "/article";
    const NAME: &'static str = "article";
    const GRANULARITIES: &'static [Granularity] = &[Reference, Standard, Extended, Full, Complete];
    type Response = types::Article;
}

impl Writable for Article {
    type Update = EntityUpdate;
}

impl Creatable for Article {
    type Input = ArticleInput;
}

impl ListedUnder<World> for Article {
    const LIST_PATH: &'static str = "/world-articles";
}

impl PagedListing for Article {
    const PAGE_PATH: &'static str = "/article";
    const COLLECTION_KEY: &'static str = "articles";
    const PAGE_METHOD: PageMethod = PageMethod::Get;
}

#[derive(Debug, Clone, Copy)]
pub struct Category;

impl Resource for Category {
    const PATH: &'static str = "/category";
    const NAME: &'static str = "category";
    const GRANULARITIES: &'static [Granularity] = UP_TO_FULL;
    type Response = Entity;
}

impl Writable for Category {
    type Update = EntityUpdate;
}

impl Creatable for Category {
    type Input = EntityInput;
}

impl ListedUnder<World> for Category {
    const LIST_PATH: &'static str = "/world-categories";
}

// =============================================================================
// BLOCKS
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct Block;

impl Resource for Block {
    const PATH: &'static str = "/block";
    const NAME: &'static str = "block";
    const GRANULARITIES: &'static [Granularity] = REF_STANDARD_FULL;
    type Response = Entity;
}

impl Writable for Block {
    type Update = EntityUpdate;
}

impl Creatable for Block {
    type Input = BlockInput;
}

impl ListedUnder<BlockFolder> for Block {
    const LIST_PATH: &'static str = "/blockfolder-blocks";
}

#[derive(Debug, Clone, Copy)]
pub struct BlockFolder;

impl Resource for BlockFolder {
    const PATH: &'static str = "/blockfolder";
    const NAME: &'static str = "blockfolder";
    const GRANULARITIES: &'static [Granularity] = REF_STANDARD_FULL;
    type Response = Entity;
}

impl Writable for BlockFolder {
    type Update = EntityUpdate;
}

impl Creatable for BlockFolder {
    type Input = EntityInput;
}

impl ListedUnder<World> for BlockFolder {
    const LIST_PATH: &'static str = "/world-blockfolders";
}

#[derive(Debug, Clone, Copy)]
pub struct BlockTemplate;

impl Resource for BlockTemplate {
    const PATH: &'static str = "/blocktemplate";
    const NAME: &'static str = "blocktemplate";
    const GRANULARITIES: &'static [Granularity] = REF_STANDARD_FULL;
    type Response = types::BlockTemplate;
}

impl Writable for BlockTemplate {
    type Update = EntityUpdate;
}

impl Creatable for BlockTemplate {
    type Input = BlockTemplateInput;
}

impl ListedUnder<User> for BlockTemplate {
    const LIST_PATH: &'static str = "/user-blocktemplates";
}

// =============================================================================
// WORLD-SCOPED CONTENT
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct Canvas;

impl Resource for Canvas {
    const PATH: &'static str = "/canvas";
    const NAME: &'static str = "canvas";
    const GRANULARITIES: &'static [Granularity] = REF_STANDARD_FULL;
    type Response = Entity;
}

impl Writable for Canvas {
    type Update = EntityUpdate;
}

impl Creatable for Canvas {
    type Input = EntityInput;
}

impl ListedUnder<World> for Canvas {
    const LIST_PATH: &'static str = "/world-canvases";
}

/// Images cannot be uploaded through the API; there is no create.
#[derive(Debug, Clone, Copy)]
pub struct Image;

impl Resource for Image {
    const PATH: &'static str = "/image";
    const NAME: &'static str = "image";
    const GRANULARITIES: &'static [Granularity] = REF_STANDARD_FULL;
    type Response = types::Image;
}

impl Writable for Image {
    type Update = EntityUpdate;
}

impl ListedUnder<World> for Image {
    const LIST_PATH: &'static str = "/world-images";
}

#[derive(Debug, Clone, Copy)]
pub struct Manuscript;

impl Resource for Manuscript {
    const PATH: &'static str = "/manuscript";
    const NAME: &'static str = "manuscript";
    const GRANULARITIES: &'static [Granularity] = UP_TO_FULL;
    type Response = Entity;
}

impl Writable for Manuscript {
    type Update = EntityUpdate;
}

impl Creatable for Manuscript {
    type Input = EntityInput;
}

impl ListedUnder<World> for Manuscript {
    const LIST_PATH: &'static str = "/world-manuscripts";
}

#[derive(Debug, Clone, Copy)]
pub struct Notebook;

impl Resource for Notebook {
    const PATH: &'static str = "/notebook";
    const NAME: &'static str = "notebook";
    const GRANULARITIES: &'static [Granularity] = REF_STANDARD_FULL;
    type Response = Entity;
}

impl Writable for Notebook {
    type Update = EntityUpdate;
}

impl Creatable for Notebook {
    type Input = EntityInput;
}

impl ListedUnder<World> for Notebook {
    const LIST_PATH: &'static str = "/world-notebooks";
}

#[derive(Debug, Clone, Copy)]
pub struct Secret;

impl Resource for Secret {
    const PATH: &'static str = "/secret";
    const NAME: &'static str = "secret";
    const GRANULARITIES: &'static [Granularity] = REF_STANDARD_FULL;
    type Response = Entity;
}

impl Writable for Secret {
    type Update = EntityUpdate;
}

impl Creatable for Secret {
    type Input = EntityInput;
}

impl ListedUnder<World> for Secret {
    const LIST_PATH: &'static str = "/world-secrets";
}

#[derive(Debug, Clone, Copy)]
pub struct SubscriberGroup;

impl Resource for SubscriberGroup {
    const PATH: &'static str = "/subscribergroup";
    const NAME: &'static str = "subscribergroup";
    const GRANULARITIES: &'static [Granularity] = &[Reference, Standard, Extended];
    type Response = Entity;
}

impl Writable for SubscriberGroup {
    type Update = EntityUpdate;
}

impl Creatable for SubscriberGroup {
    type Input = EntityInput;
}

impl ListedUnder<World> for SubscriberGroup {
    const LIST_PATH: &'static str = "/world-subscribergroups";
}

#[derive(Debug, Clone, Copy)]
pub struct Timeline;

impl Resource for Timeline {
    const PATH: &'static str = "/timeline";
    const NAME: &'static str = "timeline";
    const GRANULARITIES: &'static [Granularity] = UP_TO_FULL;
    type Response = Entity;
}

impl Writable for Timeline {
    type Update = EntityUpdate;
}

impl Creatable for Timeline {
    type Input = EntityInput;
}

impl ListedUnder<World> for Timeline {
    const LIST_PATH: &'static str = "/world-timelines";
}

// =============================================================================
// MAPS
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct Map;

impl Resource for Map {
    const PATH: &'static str = "/map";
    const NAME: &'static str = "map";
    const GRANULARITIES: &'static [Granularity] = REF_STANDARD_FULL;
    type Response = Entity;
}

impl Writable for Map {
    type Update = EntityUpdate;
}

impl Creatable for Map {
    type Input = MapInput;
}

impl ListedUnder<World> for Map {
    const LIST_PATH: &'static str = "/world-maps";
}

#[derive(Debug, Clone, Copy)]
pub struct Layer;

impl Resource for Layer {
    const PATH: &'static str = "/layer";
    const NAME: &'static str = "layer";
    const GRANULARITIES: &'static [Granularity] = REF_STANDARD_FULL;
    type Response = Entity;
}

impl Writable for Layer {
    type Update = EntityUpdate;
}

impl Creatable for Layer {
    type Input = MapChildInput;
}

impl ListedUnder<Map> for Layer {
    const LIST_PATH: &'static str = "/map-layers";
}

#[derive(Debug, Clone, Copy)]
pub struct MarkerGroup;

impl Resource for MarkerGroup {
    const PATH: &'static str = "/markergroup";
    const NAME: &'static str = "markergroup";
    const GRANULARITIES: &'static [Granularity] = REF_STANDARD_FULL;
    type Response = Entity;
}

impl Writable for MarkerGroup {
    type Update = EntityUpdate;
}

impl Creatable for MarkerGroup {
    type Input = MapChildInput;
}

impl ListedUnder<Map> for MarkerGroup {
    const LIST_PATH: &'static str = "/map-markergroups";
}

#[derive(Debug, Clone, Copy)]
pub struct Marker;

impl Resource for Marker {
    const PATH: &'static str = "/marker";
    const NAME: &'static str = "marker";
    const GRANULARITIES: &'static [Granularity] = UP_TO_FULL;
    type Response = Entity;
}

impl Writable for Marker {
    type Update = EntityUpdate;
}

impl Creatable for Marker {
    type Input = MarkerInput;
}

impl ListedUnder<Map> for Marker {
    const LIST_PATH: &'static str = "/map-markers";
}

impl ListedUnder<MarkerGroup> for Marker {
    const LIST_PATH: &'static str = "/markergroup-markers";
}

#[derive(Debug, Clone, Copy)]
pub struct MarkerType;

impl Resource for MarkerType {
    const PATH: &'static str = "/markertype";
    const NAME: &'static str = "markertype";
    const GRANULARITIES: &'static [Granularity] = REF_STANDARD_FULL;
    type Response = Entity;
}

impl Writable for MarkerType {
    type Update = EntityUpdate;
}

impl Creatable for MarkerType {
    type Input = MarkerTypeInput;
}

// =============================================================================
// VARIABLES
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct Variable;

impl Resource for Variable {
    const PATH: &'static str = "/variable";
    const NAME: &'static str = "variable";
    const GRANULARITIES: &'static [Granularity] = UP_TO_FULL;
    type Response = types::Variable;
}

impl Writable for Variable {
    type Update = EntityUpdate;
}

impl Creatable for Variable {
    type Input = VariableInput;
}

impl ListedUnder<VariableCollection> for Variable {
    const LIST_PATH: &'static str = "/variable_collection/variables";
}

#[derive(Debug, Clone, Copy)]
pub struct VariableCollection;

impl Resource for VariableCollection {
    const PATH: &'static str = "/variable_collection";
    const NAME: &'static str = "variablecollection";
    const GRANULARITIES: &'static [Granularity] = REF_STANDARD_FULL;
    type Response = Entity;
}

impl Writable for VariableCollection {
    type Update = EntityUpdate;
}

impl Creatable for VariableCollection {
    type Input = VariableCollectionInput;
}

impl ListedUnder<World> for VariableCollection {
    const LIST_PATH: &'static str = "/world/variablecollections";
}

// =============================================================================
// WORLDS, USERS, RPG SYSTEMS
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct World;

impl Resource for World {
    const PATH: &'static str = "/world";
    const NAME: &'static str = "world";
    const DEFAULT_GRANULARITY: Granularity = Reference;
    const GRANULARITIES: &'static [Granularity] = &[Reference, Standard, Extended];
    type Response = types::World;
}

impl Writable for World {
    type Update = WorldUpdate;
}

impl Creatable for World {
    type Input = WorldInput;
}

#[derive(Debug, Clone, Copy)]
pub struct User;

impl Resource for User {
    const PATH: &'static str = "/user";
    const NAME: &'static str = "user";
    const DEFAULT_GRANULARITY: Granularity = Reference;
    const GRANULARITIES: &'static [Granularity] = REF_STANDARD_FULL;
    type Response = types::User;
}

impl Writable for User {
    type Update = UserUpdate;
}

/// Read-only.
#[derive(Debug, Clone, Copy)]
pub struct RpgSystem;

impl Resource for RpgSystem {
    const PATH: &'static str = "/rpgsystem";
    const NAME: &'static str = "rpgsystem";
    const GRANULARITIES: &'static [Granularity] = &[Reference, Standard];
    type Response = types::RpgSystem;
}

impl PagedListing for RpgSystem {
    const PAGE_PATH: &'static str = "/rpgsystems";
    const COLLECTION_KEY: &'static str = "rpgsystems";
    const PAGE_METHOD: PageMethod = PageMethod::Post;
}

// =============================================================================
// CLIENT ALIASES
// =============================================================================

pub type Articles = ResourceClient<Article>;
pub type Blocks = ResourceClient<Block>;
pub type BlockFolders = ResourceClient<BlockFolder>;
pub type BlockTemplates = ResourceClient<BlockTemplate>;
pub type Canvases = ResourceClient<Canvas>;
pub type Categories = ResourceClient<Category>;
pub type Images = ResourceClient<Image>;
pub type Layers = ResourceClient<Layer>;
pub type Manuscripts = ResourceClient<Manuscript>;
pub type Maps = ResourceClient<Map>;
pub type MarkerGroups = ResourceClient<MarkerGroup>;
pub type Markers = ResourceClient<Marker>;
pub type MarkerTypes = ResourceClient<MarkerType>;
pub type Notebooks = ResourceClient<Notebook>;
pub type RpgSystems = ResourceClient<RpgSystem>;
pub type Secrets = ResourceClient<Secret>;
pub type SubscriberGroups = ResourceClient<SubscriberGroup>;
pub type Timelines = ResourceClient<Timeline>;
pub type Users = ResourceClient<User>;
pub type Variables = ResourceClient<Variable>;
pub type VariableCollections = ResourceClient<VariableCollection>;
pub type Worlds = ResourceClient<World>;

// =============================================================================
// FAMILY-SPECIFIC OPERATIONS
// =============================================================================

/// Id of the user behind the current token.
async fn current_user_id<R>(resources: &ResourceClient<R>) -> Result<String> {
    let identity = IdentityService::new(resources.client().clone())
        .current_identity()
        .await?;
    if identity.id.trim().is_empty() {
        return Err(Error::MissingIdentity);
    }
    Ok(identity.id)
}

impl ResourceClient<Article> {
    /// Fetches an article by world and slug.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be parsed.
    pub async fn by_slug(&self, world_id: &str, slug: &str) -> Result<types::Article> {
        let path = format!("{}/slug/{world_id}/{slug}", Article::PATH);
        self.client().get(&path, RequestOptions::new()).await
    }

    /// Page listing of the articles in one category.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be parsed.
    pub async fn by_category(
        &self,
        category_id: &str,
        options: &PageOptions,
    ) -> Result<Page<types::Article>> {
        self.fetch_page(
            Article::PAGE_METHOD,
            Article::PAGE_PATH,
            Article::COLLECTION_KEY,
            options,
            RequestOptions::new().param("category_id", category_id),
        )
        .await
    }
}

impl ResourceClient<World> {
    /// Worlds owned by `user_id` (options in the body, user in the query).
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be parsed.
    pub async fn by_user(&self, user_id: &str, options: &PageOptions) -> Result<Page<types::World>> {
        self.fetch_page(
            PageMethod::Post,
            "/user-worlds",
            "worlds",
            options,
            RequestOptions::id(user_id),
        )
        .await
    }

    /// Worlds owned by the user behind the current token.
    ///
    /// # Errors
    /// Returns [`Error::MissingIdentity`] if the identity carries no id, or the
    /// underlying request error.
    pub async fn mine(&self, options: &PageOptions) -> Result<Page<types::World>> {
        let user_id = current_user_id(self).await?;
        self.by_user(&user_id, options).await
    }

    /// # Errors
    /// Returns an error if the request fails or the response cannot be parsed.
    pub async fn by_slug(
        &self,
        slug: &str,
        granularity: Option<Granularity>,
    ) -> Result<types::World> {
        let granularity = granularity.unwrap_or(World::DEFAULT_GRANULARITY);
        let options = RequestOptions::new()
            .param("slug", slug)
            .param("granularity", granularity.as_str());
        self.client().get("/world/by-slug", options).await
    }
}

impl ResourceClient<BlockTemplate> {
    /// Block templates of the user behind the current token.
    ///
    /// # Errors
    /// Returns [`Error::MissingIdentity`] if the identity carries no id, or the
    /// underlying request error.
    pub async fn mine(&self, options: &ListOptions) -> Result<EntityList<EntityRef>> {
        let user_id = current_user_id(self).await?;
        self.list_by_parent::<User>(&user_id, options).await
    }
}

impl ResourceClient<MarkerType> {
    /// Marker types are global; there is no parent id.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be parsed.
    pub async fn list(&self, options: &ListOptions) -> Result<EntityList<EntityRef>> {
        self.client()
            .post("/markertypes", options, RequestOptions::new())
            .await
    }
}

impl ResourceClient<User> {
    /// The user behind the current token.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be parsed.
    pub async fn current(&self, granularity: Option<Granularity>) -> Result<types::User> {
        let granularity = granularity.unwrap_or(User::DEFAULT_GRANULARITY);
        let options = RequestOptions::new().param("granularity", granularity.as_str());
        self.client().get("/user/me", options).await
    }
}

impl ResourceClient<RpgSystem> {
    /// # Errors
    /// Returns [`Error::Upstream`] if the listing reports `success: false`.
    pub async fn list(&self, options: &PageOptions) -> Result<Page<types::RpgSystem>> {
        self.list_page(options).await
    }

    /// # Errors
    /// Returns [`Error::Upstream`] if the listing reports `success: false`.
    pub async fn by_filter(
        &self,
        filter: &str,
        options: &PageOptions,
    ) -> Result<Page<types::RpgSystem>> {
        self.list_page(&options.clone().filter(filter)).await
    }
}
