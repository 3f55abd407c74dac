//! Conventions shared by every resource family.
//!
//! A family is a zero-sized marker type implementing [`Resource`] (and, where
//! upstream allows it, [`Writable`], [`Creatable`], [`ListedUnder`] and
//! [`PagedListing`]). [`ResourceClient`] provides the operations.

use crate::client::{report, AnvilClient};
use crate::error::{Error, Result};
use crate::resources::World;
use crate::transport::RequestOptions;
use crate::types::EntityRef;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

/// Detail level requested from get-by-id endpoints.
///
/// Relayed to the server as is; which levels a family accepts is listed in
/// [`Resource::GRANULARITIES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    #[serde(rename = "-1")]
    Reference,
    #[serde(rename = "0")]
    Standard,
    #[serde(rename = "1")]
    Extended,
    #[serde(rename = "2")]
    Full,
    #[serde(rename = "3")]
    Complete,
}

impl Granularity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reference => "-1",
            Self::Standard => "0",
            Self::Extended => "1",
            Self::Full => "2",
            Self::Complete => "3",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid granularity '{0}'; expected one of -1, 0, 1, 2, 3")]
pub struct ParseGranularityError(String);

impl FromStr for Granularity {
    type Err = ParseGranularityError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "-1" => Ok(Self::Reference),
            "0" => Ok(Self::Standard),
            "1" => Ok(Self::Extended),
            "2" => Ok(Self::Full),
            "3" => Ok(Self::Complete),
            other => Err(ParseGranularityError(other.to_string())),
        }
    }
}

pub const DEFAULT_LIST_LIMIT: u32 = 50;

/// Offset pagination for list-by-parent endpoints (sent as the POST body).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    pub offset: u32,
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_LIST_LIMIT,
            category: None,
        }
    }
}

impl ListOptions {
    #[must_use]
    pub fn new(offset: u32, limit: u32) -> Self {
        Self {
            offset,
            limit,
            category: None,
        }
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// `{success, entities}` envelope returned by list-by-parent endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityList<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default = "Vec::new")]
    pub entities: Vec<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Page pagination for top-level collection endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<SortOrder>,
    /// Name filter; only the RPG system listing honours it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl PageOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(sort.into());
        self.order = Some(order);
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// The options as query parameters, merged into `options`.
    #[must_use]
    pub fn to_query(&self, mut options: RequestOptions) -> RequestOptions {
        if let Some(page) = self.page {
            options = options.param("page", page.to_string());
        }
        if let Some(limit) = self.limit {
            options = options.param("limit", limit.to_string());
        }
        if let Some(sort) = &self.sort {
            options = options.param("sort", sort.clone());
        }
        if let Some(order) = self.order {
            let order = match order {
                SortOrder::Asc => "asc",
                SortOrder::Desc => "desc",
            };
            options = options.param("order", order);
        }
        if let Some(filter) = &self.filter {
            options = options.param("filter", filter.clone());
        }
        options
    }
}

/// One page of a top-level collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub pages: u64,
}

impl<T: DeserializeOwned> Page<T> {
    /// Decodes a `{<key>: [...], total, page, pages}` envelope.
    ///
    /// Falls back to an `entities` array when `key` is absent. Missing counters
    /// default to a single page holding every item.
    ///
    /// # Errors
    /// Returns [`Error::Upstream`] if the envelope carries `success: false`,
    /// or a JSON error if the items do not decode.
    pub fn from_envelope(value: Value, key: &str) -> Result<Self> {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Err(Error::Upstream(format!(
                    "expected a '{key}' envelope, got {other}"
                )))
            }
        };
        if map.get("success").and_then(Value::as_bool) == Some(false) {
            return Err(Error::Upstream(format!("listing '{key}' reported failure")));
        }
        let items = map
            .remove(key)
            .or_else(|| map.remove("entities"))
            .unwrap_or_else(|| Value::Array(Vec::new()));
        let items: Vec<T> = serde_json::from_value(items)?;
        let counter = |name: &str| map.get(name).and_then(Value::as_u64);
        Ok(Self {
            total: counter("total").unwrap_or(items.len() as u64),
            page: counter("page").unwrap_or(1),
            pages: counter("pages").unwrap_or(1),
            items,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deleted {
    pub success: bool,
}

/// A resource family: an endpoint path and the shape it returns.
pub trait Resource {
    const PATH: &'static str;
    /// Human name, used in logs and by the command line.
    const NAME: &'static str;
    const DEFAULT_GRANULARITY: Granularity = Granularity::Standard;
    /// Levels upstream documents for this family.
    const GRANULARITIES: &'static [Granularity];

    type Response: DeserializeOwned + Serialize;

    #[must_use]
    fn accepts(granularity: Granularity) -> bool {
        Self::GRANULARITIES.contains(&granularity)
    }
}

/// Families that can be updated (PATCH) and deleted.
pub trait Writable: Resource {
    type Update: Serialize;
}

/// Families that can be created (PUT).
pub trait Creatable: Writable {
    type Input: Serialize;
}

/// `Self` can be listed under a parent of family `P` at `LIST_PATH`.
pub trait ListedUnder<P: Resource>: Resource {
    const LIST_PATH: &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMethod {
    /// Options are sent as query parameters.
    Get,
    /// Options are sent as the JSON body.
    Post,
}

/// Families with a top-level page/limit listing.
pub trait PagedListing: Resource {
    const PAGE_PATH: &'static str;
    const COLLECTION_KEY: &'static str;
    const PAGE_METHOD: PageMethod;
}

/// Generic client for one resource family.
pub struct ResourceClient<R> {
    client: AnvilClient,
    _resource: PhantomData<fn() -> R>,
}

impl<R> Clone for ResourceClient<R> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

impl<R: Resource> fmt::Debug for ResourceClient<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceClient")
            .field("resource", &R::NAME)
            .field("client", &self.client)
            .finish()
    }
}

impl<R> ResourceClient<R> {
    #[must_use]
    pub fn new(client: AnvilClient) -> Self {
        Self {
            client,
            _resource: PhantomData,
        }
    }

    /// Builds a client from `WORLD_ANVIL_*` environment variables.
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

    pub(crate) async fn fetch_page<T>(
        &self,
        method: PageMethod,
        path: &str,
        key: &str,
        page: &PageOptions,
        options: RequestOptions,
    ) -> Result<Page<T>>
    where
        T: DeserializeOwned,
    {
        let (verb, value): (Method, Value) = match method {
            PageMethod::Get => (
                Method::GET,
                self.client.get(path, page.to_query(options)).await?,
            ),
            PageMethod::Post => (Method::POST, self.client.post(path, page, options).await?),
        };
        Page::from_envelope(value, key).inspect_err(|err| report(&verb, path, err))
    }
}

impl<R: Resource> ResourceClient<R> {
    /// Fetches one entity; `None` uses the family default granularity.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be parsed.
    pub async fn get(&self, id: &str, granularity: Option<Granularity>) -> Result<R::Response> {
        let granularity = granularity.unwrap_or(R::DEFAULT_GRANULARITY);
        let options = RequestOptions::id(id).param("granularity", granularity.as_str());
        self.client.get(R::PATH, options).await
    }

    /// Offset listing under a parent of family `P`.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be parsed.
    pub async fn list_by_parent<P>(
        &self,
        parent_id: &str,
        options: &ListOptions,
    ) -> Result<EntityList<EntityRef>>
    where
        P: Resource,
        R: ListedUnder<P>,
    {
        self.client
            .post(
                <R as ListedUnder<P>>::LIST_PATH,
                options,
                RequestOptions::id(parent_id),
            )
            .await
    }

    /// Shorthand for [`ResourceClient::list_by_parent`] with a world parent.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be parsed.
    pub async fn list_by_world(
        &self,
        world_id: &str,
        options: &ListOptions,
    ) -> Result<EntityList<EntityRef>>
    where
        R: ListedUnder<World>,
    {
        self.list_by_parent::<World>(world_id, options).await
    }
}

impl<R: Writable> ResourceClient<R> {
    /// Applies a partial update; returns the entity reference.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be parsed.
    pub async fn update(&self, id: &str, update: &R::Update) -> Result<EntityRef> {
        self.client
            .patch(R::PATH, update, RequestOptions::id(id))
            .await
    }

    /// # Errors
    /// Returns an error if the request fails or the response cannot be parsed.
    pub async fn delete(&self, id: &str) -> Result<Deleted> {
        self.client.delete(R::PATH, RequestOptions::id(id)).await
    }
}

impl<R: Creatable> ResourceClient<R> {
    /// # Errors
    /// Returns an error if the request fails or the response cannot be parsed.
    pub async fn create(&self, input: &R::Input) -> Result<EntityRef> {
        self.client
            .put(R::PATH, input, RequestOptions::new())
            .await
    }
}

impl<R: PagedListing> ResourceClient<R> {
    /// Page listing of the whole collection.
    ///
    /// # Errors
    /// Returns an error if the request fails, the upstream reports failure, or
    /// the response cannot be parsed.
    pub async fn list_page(&self, options: &PageOptions) -> Result<Page<R::Response>> {
        self.fetch_page(
            R::PAGE_METHOD,
            R::PAGE_PATH,
            R::COLLECTION_KEY,
            options,
            RequestOptions::new(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn granularity_round_trips_through_strings() {
        for g in [
            Granularity::Reference,
            Granularity::Standard,
            Granularity::Extended,
            Granularity::Full,
            Granularity::Complete,
        ] {
            assert_eq!(g.as_str().parse::<Granularity>(), Ok(g));
            assert_eq!(serde_json::to_value(g).unwrap(), json!(g.as_str()));
        }
        assert!("4".parse::<Granularity>().is_err());
    }

    #[test]
    fn list_options_default_and_skip_category() {
        assert_eq!(
            serde_json::to_value(ListOptions::default()).unwrap(),
            json!({"offset": 0, "limit": 50})
        );
        assert_eq!(
            serde_json::to_value(ListOptions::new(10, 25).with_category("c1")).unwrap(),
            json!({"offset": 10, "limit": 25, "category": "c1"})
        );
    }

    #[test]
    fn page_options_become_query_params() {
        let options = PageOptions::new()
            .page(2)
            .limit(10)
            .sort("title", SortOrder::Asc)
            .to_query(RequestOptions::new());
        assert_eq!(options.params.get("page").map(String::as_str), Some("2"));
        assert_eq!(options.params.get("limit").map(String::as_str), Some("10"));
        assert_eq!(options.params.get("sort").map(String::as_str), Some("title"));
        assert_eq!(options.params.get("order").map(String::as_str), Some("asc"));
        assert!(!options.params.contains_key("filter"));
    }

    #[test]
    fn page_envelope_uses_collection_key() {
        let page: Page<Value> = Page::from_envelope(
            json!({"worlds": [{"id": "w1"}, {"id": "w2"}], "total": 12, "page": 2, "pages": 6}),
            "worlds",
        )
        .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!((page.total, page.page, page.pages), (12, 2, 6));
    }

    #[test]
    fn page_envelope_falls_back_to_entities() {
        let page: Page<Value> = Page::from_envelope(
            json!({"success": true, "entities": [{"id": 1}]}),
            "rpgsystems",
        )
        .unwrap();
        assert_eq!(page.items, vec![json!({"id": 1})]);
        assert_eq!((page.total, page.page, page.pages), (1, 1, 1));
    }

    #[test]
    fn page_envelope_rejects_reported_failure() {
        let err = Page::<Value>::from_envelope(json!({"success": false}), "rpgsystems")
            .unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
    }
}
