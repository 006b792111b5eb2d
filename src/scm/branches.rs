//! Branches of a repository.

use serde_json::Value;

use crate::cache::{CacheKey, MutationEffects};
use crate::error::ApiError;
use crate::http::urls;

use super::repositories::repo_key;
use super::types::{Branch, BranchCollection, Repository};
use super::{decode, fetch_json, ScmClient};

pub const BRANCH_REQUEST_MEDIA_TYPE: &str = "application/vnd.scmm-branchRequest+json;v=2";

pub fn branches_key(repository: &Repository) -> CacheKey {
  repo_key(&repository.namespace, &repository.name).push("branches")
}

pub fn branch_key(repository: &Repository, name: &str) -> CacheKey {
  repo_key(&repository.namespace, &repository.name)
    .push("branch")
    .push(name)
}

pub struct Branches<'a> {
  scm: &'a ScmClient,
}

impl<'a> Branches<'a> {
  pub(super) fn new(scm: &'a ScmClient) -> Self {
    Self { scm }
  }

  /// Fetch all branches of a repository, seeding per-branch entries.
  pub async fn list(&self, repository: &Repository) -> Result<BranchCollection, ApiError> {
    let link = repository.links.required_link("branches")?.to_string();
    let key = branches_key(repository);

    let namespace = repository.namespace.clone();
    let name = repository.name.clone();
    let seed = move |value: &Value| seed_branches(&namespace, &name, value);

    let api = self.scm.api().clone();
    let value = self
      .scm
      .cache()
      .get_with_seed(&key, move || fetch_json(api, link), seed)
      .await?;
    decode(value)
  }

  pub async fn get(&self, repository: &Repository, name: &str) -> Result<Branch, ApiError> {
    let link = repository.links.required_link("branches")?;
    let encoded = urls::encode_component(name);
    let url = urls::concat(link.trim_end_matches('/'), &[encoded.as_str()]);
    let key = branch_key(repository, name);

    let api = self.scm.api().clone();
    let value = self
      .scm
      .cache()
      .get_with(&key, move || fetch_json(api, url))
      .await?;
    decode(value)
  }

  /// Create a branch from `parent` and invalidate the branch collection.
  pub async fn create(
    &self,
    repository: &Repository,
    name: &str,
    parent: &str,
  ) -> Result<(), ApiError> {
    let link = repository.links.required_link("branches")?.to_string();
    let payload = serde_json::json!({ "name": name, "parent": parent });
    self
      .scm
      .api()
      .post_json(&link, &payload, BRANCH_REQUEST_MEDIA_TYPE, &[])
      .await?;
    self
      .scm
      .cache()
      .apply(MutationEffects::new().invalidate(branches_key(repository)));
    Ok(())
  }

  pub async fn delete(&self, repository: &Repository, branch: &Branch) -> Result<(), ApiError> {
    let link = branch.links.required_link("delete")?.to_string();
    self.scm.api().delete(&link).await?;
    self.scm.cache().apply(
      MutationEffects::new()
        .remove(branch_key(repository, &branch.name))
        .invalidate(branches_key(repository)),
    );
    Ok(())
  }
}

fn seed_branches(namespace: &str, name: &str, value: &Value) -> Vec<(CacheKey, Value)> {
  let mut seeds = Vec::new();
  if let Some(items) = value
    .pointer("/_embedded/branches")
    .and_then(Value::as_array)
  {
    for item in items {
      if let Some(branch_name) = item.get("name").and_then(Value::as_str) {
        let key = CacheKey::new()
          .push("repository")
          .push(namespace)
          .push(name)
          .push("branch")
          .push(branch_name);
        seeds.push((key, item.clone()));
      }
    }
  }
  seeds
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::EntryState;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn heart_of_gold(server: &MockServer) -> Repository {
    serde_json::from_value(serde_json::json!({
      "namespace": "spaceships",
      "name": "heart-of-gold",
      "type": "git",
      "_links": {
        "branches": {"href": format!("{}/api/v2/repositories/spaceships/heart-of-gold/branches/", server.uri())}
      }
    }))
    .unwrap()
  }

  #[tokio::test]
  async fn test_list_seeds_branch_entries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path(
        "/api/v2/repositories/spaceships/heart-of-gold/branches/",
      ))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "_embedded": {
          "branches": [
            {"name": "main", "revision": "42a", "defaultBranch": true, "_links": {}},
            {"name": "develop", "revision": "43b", "_links": {}}
          ]
        },
        "_links": {}
      })))
      .expect(1)
      .mount(&server)
      .await;

    let client = ScmClient::new(&server.uri()).unwrap();
    let repository = heart_of_gold(&server);
    let collection = client.branches().list(&repository).await.unwrap();
    assert_eq!(collection.embedded.branches.len(), 2);
    assert!(collection.embedded.branches[0].default_branch);

    let entry = client.cache().lookup(&branch_key(&repository, "develop"));
    assert_eq!(entry.state, EntryState::Fresh);
  }

  #[tokio::test]
  async fn test_create_invalidates_collection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path(
        "/api/v2/repositories/spaceships/heart-of-gold/branches/",
      ))
      .respond_with(ResponseTemplate::new(201))
      .expect(1)
      .mount(&server)
      .await;

    let client = ScmClient::new(&server.uri()).unwrap();
    let repository = heart_of_gold(&server);
    client
      .cache()
      .set(branches_key(&repository), serde_json::json!({}));

    client
      .branches()
      .create(&repository, "feature/infinite-improbability", "main")
      .await
      .unwrap();

    assert_eq!(
      client.cache().lookup(&branches_key(&repository)).state,
      EntryState::Stale
    );
  }
}
