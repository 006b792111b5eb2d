//! Typed resource modules on top of the request pipeline and the cache.
//!
//! [`ScmClient`] bundles one [`ApiClient`] with one [`ResourceCache`] for
//! the lifetime of a session; every resource module borrows both through
//! it. There is no ambient instance, tests construct a fresh client each.

pub mod auth;
pub mod branches;
pub mod changesets;
pub mod diff;
pub mod groups;
pub mod index;
pub mod links;
pub mod plugins;
pub mod repositories;
pub mod sources;
pub mod tags;
pub mod types;
pub mod users;

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cache::ResourceCache;
use crate::config::Config;
use crate::error::ApiError;
use crate::http::ApiClient;

/// Facade bundling the API client with its per-session resource cache.
#[derive(Clone)]
pub struct ScmClient {
  api: ApiClient,
  cache: ResourceCache,
  poll_delay: Duration,
}

impl ScmClient {
  pub fn new(base_url: &str) -> Result<Self, ApiError> {
    Ok(Self {
      api: ApiClient::new(base_url)?,
      cache: ResourceCache::new(),
      poll_delay: Duration::from_millis(3000),
    })
  }

  pub fn from_config(config: &Config) -> Result<Self, ApiError> {
    let api = ApiClient::from_config(config)?;
    let cache = ResourceCache::new()
      .with_stale_after(chrono::Duration::seconds(config.cache.stale_after_secs as i64));
    Ok(Self {
      api,
      cache,
      poll_delay: Duration::from_millis(config.polling.partial_delay_millis),
    })
  }

  pub fn api(&self) -> &ApiClient {
    &self.api
  }

  pub fn cache(&self) -> &ResourceCache {
    &self.cache
  }

  /// Delay between refetches of partially computed resources.
  pub fn poll_delay(&self) -> Duration {
    self.poll_delay
  }

  pub fn auth(&self) -> auth::Auth<'_> {
    auth::Auth::new(self)
  }

  pub fn repositories(&self) -> repositories::Repositories<'_> {
    repositories::Repositories::new(self)
  }

  pub fn users(&self) -> users::Users<'_> {
    users::Users::new(self)
  }

  pub fn groups(&self) -> groups::Groups<'_> {
    groups::Groups::new(self)
  }

  pub fn branches(&self) -> branches::Branches<'_> {
    branches::Branches::new(self)
  }

  pub fn tags(&self) -> tags::Tags<'_> {
    tags::Tags::new(self)
  }

  pub fn changesets(&self) -> changesets::Changesets<'_> {
    changesets::Changesets::new(self)
  }

  pub fn diffs(&self) -> diff::Diffs<'_> {
    diff::Diffs::new(self)
  }

  pub fn sources(&self) -> sources::Sources<'_> {
    sources::Sources::new(self)
  }

  pub fn plugins(&self) -> plugins::Plugins<'_> {
    plugins::Plugins::new(self)
  }
}

/// Deserialize a cached JSON snapshot into its typed view.
pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
  serde_json::from_value(value).map_err(ApiError::from)
}

/// Fetch a JSON resource; owned arguments so the future is spawnable.
pub(crate) async fn fetch_json(api: ApiClient, url: String) -> Result<Value, ApiError> {
  let response = api.get(&url).await?;
  response.json::<Value>().await.map_err(ApiError::from)
}
