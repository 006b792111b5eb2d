//! Tags of a repository.
//!
//! Tag deletion is the classic invalidation cascade: the tag's own entry
//! disappears, the tag collection and the repository's changesets become
//! stale, and so does the single changeset the tag pointed at.

use serde_json::Value;

use crate::cache::{CacheKey, MutationEffects};
use crate::error::ApiError;

use super::changesets::{changeset_key, changesets_key};
use super::repositories::repo_key;
use super::types::{Repository, Tag, TagCollection};
use super::{decode, fetch_json, ScmClient};

pub const TAG_REQUEST_MEDIA_TYPE: &str = "application/vnd.scmm-tagRequest+json;v=2";

pub fn tags_key(repository: &Repository) -> CacheKey {
  repo_key(&repository.namespace, &repository.name).push("tags")
}

pub fn tag_key(repository: &Repository, name: &str) -> CacheKey {
  repo_key(&repository.namespace, &repository.name)
    .push("tag")
    .push(name)
}

pub struct Tags<'a> {
  scm: &'a ScmClient,
}

impl<'a> Tags<'a> {
  pub(super) fn new(scm: &'a ScmClient) -> Self {
    Self { scm }
  }

  /// Fetch all tags of a repository, seeding per-tag entries.
  pub async fn list(&self, repository: &Repository) -> Result<TagCollection, ApiError> {
    let link = repository.links.required_link("tags")?.to_string();
    let key = tags_key(repository);

    let namespace = repository.namespace.clone();
    let name = repository.name.clone();
    let seed = move |value: &Value| seed_tags(&namespace, &name, value);

    let api = self.scm.api().clone();
    let value = self
      .scm
      .cache()
      .get_with_seed(&key, move || fetch_json(api, link), seed)
      .await?;
    decode(value)
  }

  /// Tag a revision; the tag collection becomes stale.
  pub async fn create(
    &self,
    repository: &Repository,
    name: &str,
    revision: &str,
  ) -> Result<(), ApiError> {
    let link = repository.links.required_link("tags")?.to_string();
    let payload = serde_json::json!({ "name": name, "revision": revision });
    self
      .scm
      .api()
      .post_json(&link, &payload, TAG_REQUEST_MEDIA_TYPE, &[])
      .await?;
    self
      .scm
      .cache()
      .apply(MutationEffects::new().invalidate(tags_key(repository)));
    Ok(())
  }

  /// Delete a tag and run its invalidation cascade.
  pub async fn delete(&self, repository: &Repository, tag: &Tag) -> Result<(), ApiError> {
    let link = tag.links.required_link("delete")?.to_string();
    self.scm.api().delete(&link).await?;
    self.scm.cache().apply(
      MutationEffects::new()
        .remove(tag_key(repository, &tag.name))
        .invalidate(tags_key(repository))
        .invalidate(changesets_key(repository))
        .invalidate(changeset_key(repository, &tag.revision)),
    );
    Ok(())
  }
}

fn seed_tags(namespace: &str, name: &str, value: &Value) -> Vec<(CacheKey, Value)> {
  let mut seeds = Vec::new();
  if let Some(items) = value.pointer("/_embedded/tags").and_then(Value::as_array) {
    for item in items {
      if let Some(tag_name) = item.get("name").and_then(Value::as_str) {
        let key = CacheKey::new()
          .push("repository")
          .push(namespace)
          .push(name)
          .push("tag")
          .push(tag_name);
        seeds.push((key, item.clone()));
      }
    }
  }
  seeds
}
