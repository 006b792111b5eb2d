//! Changeset collection of a repository.

use serde_json::Value;

use crate::cache::CacheKey;
use crate::error::ApiError;
use crate::http::urls;

use super::repositories::repo_key;
use super::types::{Changeset, ChangesetCollection, Repository};
use super::{decode, fetch_json, ScmClient};

pub fn changesets_key(repository: &Repository) -> CacheKey {
  repo_key(&repository.namespace, &repository.name).push("changesets")
}

pub fn changeset_key(repository: &Repository, id: &str) -> CacheKey {
  repo_key(&repository.namespace, &repository.name)
    .push("changeset")
    .push(id)
}

pub struct Changesets<'a> {
  scm: &'a ScmClient,
}

impl<'a> Changesets<'a> {
  pub(super) fn new(scm: &'a ScmClient) -> Self {
    Self { scm }
  }

  /// Fetch one page of the changeset collection; embedded changesets are
  /// seeded under their own keys.
  pub async fn list(
    &self,
    repository: &Repository,
    page: Option<u64>,
  ) -> Result<ChangesetCollection, ApiError> {
    let link = repository.links.required_link("changesets")?.to_string();
    let url = match page {
      Some(page) => format!(
        "{}?{}",
        link,
        urls::create_query_string(&[("page", page.to_string())])
      ),
      None => link,
    };
    let key = changesets_key(repository).push(page.unwrap_or(0));

    let namespace = repository.namespace.clone();
    let name = repository.name.clone();
    let seed = move |value: &Value| seed_changesets(&namespace, &name, value);

    let api = self.scm.api().clone();
    let value = self
      .scm
      .cache()
      .get_with_seed(&key, move || fetch_json(api, url), seed)
      .await?;
    decode(value)
  }

  pub async fn get(&self, repository: &Repository, id: &str) -> Result<Changeset, ApiError> {
    let link = repository.links.required_link("changesets")?;
    let url = urls::concat(link.trim_end_matches('/'), &[id]);
    let key = changeset_key(repository, id);

    let api = self.scm.api().clone();
    let value = self
      .scm
      .cache()
      .get_with(&key, move || fetch_json(api, url))
      .await?;
    decode(value)
  }
}

fn seed_changesets(namespace: &str, name: &str, value: &Value) -> Vec<(CacheKey, Value)> {
  let mut seeds = Vec::new();
  if let Some(items) = value
    .pointer("/_embedded/changesets")
    .and_then(Value::as_array)
  {
    for item in items {
      if let Some(id) = item.get("id").and_then(Value::as_str) {
        let key = CacheKey::new()
          .push("repository")
          .push(namespace)
          .push(name)
          .push("changeset")
          .push(id);
        seeds.push((key, item.clone()));
      }
    }
  }
  seeds
}
