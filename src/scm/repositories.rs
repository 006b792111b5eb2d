//! Repository collection and mutations.
//!
//! Keys: the collection lives under `("repositories", namespace, search,
//! page)`, a single repository under `("repository", namespace, name)`.
//! Collection fetches seed the single-repository entries, so a detail
//! lookup right after a list is a cache hit.

use serde_json::Value;

use crate::cache::{CacheKey, MutationEffects};
use crate::error::ApiError;
use crate::http::urls;

use super::types::{Paths, Repository, RepositoryCollection};
use super::{decode, fetch_json, ScmClient};

pub const REPOSITORY_MEDIA_TYPE: &str = "application/vnd.scmm-repository+json;v=2";

/// Cache key of a single repository; further segments address resources
/// nested under it (branches, changesets, sources).
pub fn repo_key(namespace: &str, name: &str) -> CacheKey {
  CacheKey::new().push("repository").push(namespace).push(name)
}

fn collection_key() -> CacheKey {
  CacheKey::new().push("repositories")
}

#[derive(Debug, Clone, Default)]
pub struct RepositoriesRequest {
  pub namespace: Option<String>,
  pub search: Option<String>,
  pub page: Option<u64>,
  pub page_size: Option<u64>,
  pub show_archived: Option<bool>,
}

pub struct Repositories<'a> {
  scm: &'a ScmClient,
}

impl<'a> Repositories<'a> {
  pub(super) fn new(scm: &'a ScmClient) -> Self {
    Self { scm }
  }

  /// Fetch the (optionally filtered) repository collection and seed the
  /// embedded repositories under their own keys.
  pub async fn list(&self, request: &RepositoriesRequest) -> Result<RepositoryCollection, ApiError> {
    let link = self.scm.required_index_link("repositories").await?;
    let link = match &request.namespace {
      Some(namespace) => urls::concat(link.trim_end_matches('/'), &[namespace.as_str()]),
      None => link,
    };

    let mut params: Vec<(&str, String)> = Vec::new();
    if let Some(search) = &request.search {
      params.push(("q", search.clone()));
    }
    if let Some(page_size) = request.page_size {
      params.push(("pageSize", page_size.to_string()));
    }
    if let Some(show_archived) = request.show_archived {
      params.push(("showArchived", show_archived.to_string()));
    }
    if let Some(page) = request.page {
      params.push(("page", page.to_string()));
    }
    let url = if params.is_empty() {
      link
    } else {
      format!("{}?{}", link, urls::create_query_string(&params))
    };

    let key = collection_key()
      .push(request.namespace.clone().unwrap_or_default())
      .push(request.search.clone().unwrap_or_default())
      .push(request.page.unwrap_or(0));

    let api = self.scm.api().clone();
    let value = self
      .scm
      .cache()
      .get_with_seed(&key, move || fetch_json(api, url), seed_repositories)
      .await?;
    decode(value)
  }

  pub async fn get(&self, namespace: &str, name: &str) -> Result<Repository, ApiError> {
    let link = self.scm.required_index_link("repositories").await?;
    let url = urls::concat(link.trim_end_matches('/'), &[namespace, name]);

    let api = self.scm.api().clone();
    let value = self
      .scm
      .cache()
      .get_with(&repo_key(namespace, name), move || fetch_json(api, url))
      .await?;
    decode(value)
  }

  /// Create a repository. The server signals the created resource through
  /// the `Location` header; the resource is fetched from there, seeded
  /// under its own key, and the collection is invalidated.
  pub async fn create(
    &self,
    repository: &Repository,
    initialize: bool,
  ) -> Result<Repository, ApiError> {
    // not really the index link, but a post to the collection is create
    // by convention
    let mut link = self.scm.required_index_link("repositories").await?;
    if initialize {
      link.push_str("?initialize=true");
    }

    let response = self
      .scm
      .api()
      .post_json(&link, repository, REPOSITORY_MEDIA_TYPE, &[])
      .await?;
    let location = response
      .headers()
      .get(reqwest::header::LOCATION)
      .and_then(|value| value.to_str().ok())
      .map(String::from)
      .ok_or(ApiError::MissingLocationHeader)?;

    let created = self.scm.api().get(&location).await?;
    let value: Value = created.json().await.map_err(ApiError::from)?;
    let repository: Repository = decode(value.clone())?;

    self.scm.cache().apply(
      MutationEffects::new()
        .set(repo_key(&repository.namespace, &repository.name), value)
        .invalidate(collection_key()),
    );
    Ok(repository)
  }

  pub async fn update(&self, repository: &Repository) -> Result<(), ApiError> {
    let link = repository.links.required_link("update")?.to_string();
    self
      .scm
      .api()
      .put_json(&link, repository, REPOSITORY_MEDIA_TYPE, &[])
      .await?;
    self.scm.cache().apply(
      MutationEffects::new()
        .invalidate(repo_key(&repository.namespace, &repository.name))
        .invalidate(collection_key()),
    );
    Ok(())
  }

  /// Delete a repository. Unlike invalidation, removal leaves no stale
  /// value behind for the dropped entry and everything nested under it.
  pub async fn delete(&self, repository: &Repository) -> Result<(), ApiError> {
    let link = repository.links.required_link("delete")?.to_string();
    self.scm.api().delete(&link).await?;
    self.scm.cache().apply(
      MutationEffects::new()
        .remove(repo_key(&repository.namespace, &repository.name))
        .invalidate(collection_key()),
    );
    Ok(())
  }

  pub async fn archive(&self, repository: &Repository) -> Result<(), ApiError> {
    self.trigger(repository, "archive").await
  }

  pub async fn unarchive(&self, repository: &Repository) -> Result<(), ApiError> {
    self.trigger(repository, "unarchive").await
  }

  async fn trigger(&self, repository: &Repository, relation: &str) -> Result<(), ApiError> {
    let link = repository.links.required_link(relation)?.to_string();
    self.scm.api().post(&link).await?;
    self.scm.cache().apply(
      MutationEffects::new()
        .invalidate(repo_key(&repository.namespace, &repository.name))
        .invalidate(collection_key()),
    );
    Ok(())
  }

  pub async fn run_health_check(&self, repository: &Repository) -> Result<(), ApiError> {
    let link = repository.links.required_link("runHealthCheck")?.to_string();
    self.scm.api().post(&link).await?;
    self.scm.cache().apply(
      MutationEffects::new().invalidate(repo_key(&repository.namespace, &repository.name)),
    );
    Ok(())
  }

  /// Rename a repository. The old key is removed because the resource now
  /// lives at a different address.
  pub async fn rename(
    &self,
    repository: &Repository,
    namespace: &str,
    name: &str,
  ) -> Result<(), ApiError> {
    let link = match repository.links.link("renameWithNamespace")? {
      Some(link) => link.to_string(),
      None => repository.links.required_link("rename")?.to_string(),
    };

    let payload = serde_json::json!({ "namespace": namespace, "name": name });
    self
      .scm
      .api()
      .post_json(&link, &payload, REPOSITORY_MEDIA_TYPE, &[])
      .await?;
    self.scm.cache().apply(
      MutationEffects::new()
        .remove(repo_key(&repository.namespace, &repository.name))
        .invalidate(collection_key()),
    );
    Ok(())
  }

  /// Paths of the repository at one revision.
  pub async fn paths(&self, repository: &Repository, revision: &str) -> Result<Paths, ApiError> {
    let link = repository
      .links
      .required_link("paths")?
      .replace("{revision}", &urls::encode_component(revision));

    let key = repo_key(&repository.namespace, &repository.name)
      .push("paths")
      .push(revision);
    let api = self.scm.api().clone();
    let value = self
      .scm
      .cache()
      .get_with(&key, move || fetch_json(api, link))
      .await?;
    decode(value)
  }
}

fn seed_repositories(value: &Value) -> Vec<(CacheKey, Value)> {
  let mut seeds = Vec::new();
  if let Some(items) = value
    .pointer("/_embedded/repositories")
    .and_then(Value::as_array)
  {
    for item in items {
      if let (Some(namespace), Some(name)) = (
        item.get("namespace").and_then(Value::as_str),
        item.get("name").and_then(Value::as_str),
      ) {
        seeds.push((repo_key(namespace, name), item.clone()));
      }
    }
  }
  seeds
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::EntryState;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  async fn mount_index(server: &MockServer) {
    Mock::given(method("GET"))
      .and(path("/api/v2/"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "_links": {"repositories": {"href": "/repositories/"}}
      })))
      .mount(server)
      .await;
  }

  fn heart_of_gold() -> serde_json::Value {
    serde_json::json!({
      "namespace": "spaceships",
      "name": "heart-of-gold",
      "type": "git",
      "_links": {}
    })
  }

  #[tokio::test]
  async fn test_list_seeds_single_repository_entries() {
    let server = MockServer::start().await;
    mount_index(&server).await;
    Mock::given(method("GET"))
      .and(path("/api/v2/repositories/"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "page": 0,
        "pageTotal": 1,
        "_embedded": {"repositories": [heart_of_gold()]},
        "_links": {}
      })))
      .expect(1)
      .mount(&server)
      .await;

    let client = ScmClient::new(&server.uri()).unwrap();
    let collection = client
      .repositories()
      .list(&RepositoriesRequest::default())
      .await
      .unwrap();
    assert_eq!(collection.embedded.repositories.len(), 1);

    // the detail lookup is served from the seeded entry, no second request
    let repository = client
      .repositories()
      .get("spaceships", "heart-of-gold")
      .await
      .unwrap();
    assert_eq!(repository.name, "heart-of-gold");
  }

  #[tokio::test]
  async fn test_list_with_search_and_page() {
    let server = MockServer::start().await;
    mount_index(&server).await;
    Mock::given(method("GET"))
      .and(path("/api/v2/repositories/"))
      .and(query_param("q", "heart"))
      .and(query_param("page", "2"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "page": 2,
        "_embedded": {"repositories": []},
        "_links": {}
      })))
      .expect(1)
      .mount(&server)
      .await;

    let client = ScmClient::new(&server.uri()).unwrap();
    let request = RepositoriesRequest {
      search: Some("heart".to_string()),
      page: Some(2),
      ..Default::default()
    };
    let collection = client.repositories().list(&request).await.unwrap();
    assert_eq!(collection.page, 2);
  }

  #[tokio::test]
  async fn test_create_follows_location_header() {
    let server = MockServer::start().await;
    mount_index(&server).await;
    let location = format!("{}/api/v2/repositories/spaceships/heart-of-gold", server.uri());
    Mock::given(method("POST"))
      .and(path("/api/v2/repositories/"))
      .respond_with(ResponseTemplate::new(201).insert_header("Location", location.as_str()))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/api/v2/repositories/spaceships/heart-of-gold"))
      .respond_with(ResponseTemplate::new(200).set_body_json(heart_of_gold()))
      .expect(1)
      .mount(&server)
      .await;

    let client = ScmClient::new(&server.uri()).unwrap();
    let repository: Repository = serde_json::from_value(heart_of_gold()).unwrap();
    let created = client
      .repositories()
      .create(&repository, false)
      .await
      .unwrap();
    assert_eq!(created.namespace, "spaceships");

    // created resource was seeded under its own key
    let entry = client
      .cache()
      .lookup(&repo_key("spaceships", "heart-of-gold"));
    assert_eq!(entry.state, EntryState::Fresh);
  }

  #[tokio::test]
  async fn test_create_without_location_header_fails() {
    let server = MockServer::start().await;
    mount_index(&server).await;
    Mock::given(method("POST"))
      .and(path("/api/v2/repositories/"))
      .respond_with(ResponseTemplate::new(201))
      .mount(&server)
      .await;

    let client = ScmClient::new(&server.uri()).unwrap();
    let repository: Repository = serde_json::from_value(heart_of_gold()).unwrap();
    let error = client
      .repositories()
      .create(&repository, false)
      .await
      .unwrap_err();
    assert_eq!(error, ApiError::MissingLocationHeader);
    assert_eq!(
      error.to_string(),
      "Server does not return required Location header"
    );
  }

  #[tokio::test]
  async fn test_delete_removes_entry_and_invalidates_collection() {
    let server = MockServer::start().await;
    mount_index(&server).await;
    Mock::given(method("DELETE"))
      .and(path("/api/v2/repositories/spaceships/heart-of-gold"))
      .respond_with(ResponseTemplate::new(204))
      .expect(1)
      .mount(&server)
      .await;

    let client = ScmClient::new(&server.uri()).unwrap();
    let key = repo_key("spaceships", "heart-of-gold");
    client.cache().set(key.clone(), heart_of_gold());
    client.cache().set(
      collection_key().push("").push("").push(0u64),
      serde_json::json!({}),
    );

    let mut value = heart_of_gold();
    value["_links"] = serde_json::json!({
      "delete": {"href": "/repositories/spaceships/heart-of-gold"}
    });
    let repository: Repository = serde_json::from_value(value).unwrap();
    client.repositories().delete(&repository).await.unwrap();

    assert_eq!(client.cache().lookup(&key).state, EntryState::Missing);
    assert_eq!(
      client
        .cache()
        .lookup(&collection_key().push("").push("").push(0u64))
        .state,
      EntryState::Stale
    );
  }

  #[tokio::test]
  async fn test_failed_mutation_leaves_cache_untouched() {
    let server = MockServer::start().await;
    mount_index(&server).await;
    Mock::given(method("DELETE"))
      .respond_with(ResponseTemplate::new(500))
      .mount(&server)
      .await;

    let client = ScmClient::new(&server.uri()).unwrap();
    let key = repo_key("spaceships", "heart-of-gold");
    client.cache().set(key.clone(), heart_of_gold());

    let mut value = heart_of_gold();
    value["_links"] = serde_json::json!({
      "delete": {"href": "/repositories/spaceships/heart-of-gold"}
    });
    let repository: Repository = serde_json::from_value(value).unwrap();
    let error = client.repositories().delete(&repository).await.unwrap_err();
    assert_eq!(error, ApiError::Generic { status: 500 });

    // nothing was removed or invalidated
    assert_eq!(client.cache().lookup(&key).state, EntryState::Fresh);
  }
}
