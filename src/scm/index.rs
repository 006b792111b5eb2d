//! Index (root) resource: the entry point carrying all top level links.

use crate::cache::CacheKey;
use crate::error::ApiError;

use super::types::Index;
use super::{decode, fetch_json, ScmClient};

pub(super) fn index_key() -> CacheKey {
  CacheKey::new().push("index")
}

impl ScmClient {
  /// Fetch (and cache) the index resource.
  pub async fn index(&self) -> Result<Index, ApiError> {
    let api = self.api().clone();
    let value = self
      .cache()
      .get_with(&index_key(), move || fetch_json(api, "/".to_string()))
      .await?;
    decode(value)
  }

  /// Resolve an optional entry point link from the index.
  pub async fn index_link(&self, name: &str) -> Result<Option<String>, ApiError> {
    let index = self.index().await?;
    Ok(index.links.link(name)?.map(String::from))
  }

  /// Resolve a required entry point link from the index.
  pub async fn required_index_link(&self, name: &str) -> Result<String, ApiError> {
    let index = self.index().await?;
    Ok(index.links.required_link(name)?.to_string())
  }
}
