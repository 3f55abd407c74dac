//! Async client for the World Anvil (Boromir) API.
//!
//! ```no_run
//! # async fn run() -> worldanvil::Result<()> {
//! use worldanvil::{ListOptions, WorldAnvil};
//!
//! let anvil = WorldAnvil::from_env()?;
//! let identity = anvil.current_identity().await?;
//! let worlds = anvil.my_worlds(&Default::default()).await?;
//! for world in &worlds.items {
//!     let articles = anvil.articles().list_by_world(&world.id, &ListOptions::default()).await?;
//!     println!("{} ({}): {} articles", world.title, identity.username, articles.entities.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod identity;
pub mod resource;
pub mod resources;
#[cfg(test)]
mod testing;
pub mod transport;
pub mod types;

pub use auth::{AuthOutcome, AuthService, AuthState, AuthorizationResult};
pub use client::AnvilClient;
pub use config::{ClientConfig, Credentials, DEFAULT_API_URL};
pub use controller::WorldAnvil;
pub use error::{ConfigError, Error, ErrorClass, Result};
pub use identity::{Identity, IdentityService};
pub use resource::{
    Deleted, EntityList, Granularity, ListOptions, Page, PageOptions, ResourceClient, SortOrder,
};
pub use transport::{ApiRequest, HttpTransport, MemoryTransport, RequestOptions, Transport};
pub use types::{EntityRef, IdRef};
