//! Group collection and mutations. Same shape as the user module: the
//! collection seeds per-group entries, creation follows the `Location`
//! header, mutations invalidate the item and the collection.

use serde_json::Value;

use crate::cache::{CacheKey, MutationEffects};
use crate::error::ApiError;
use crate::http::urls;

use super::types::{Group, GroupCollection};
use super::{decode, fetch_json, ScmClient};

pub const GROUP_MEDIA_TYPE: &str = "application/vnd.scmm-group+json;v=2";

pub fn group_key(name: &str) -> CacheKey {
  CacheKey::new().push("group").push(name)
}

fn collection_key() -> CacheKey {
  CacheKey::new().push("groups")
}

#[derive(Debug, Clone, Default)]
pub struct GroupsRequest {
  pub search: Option<String>,
  pub page: Option<u64>,
}

pub struct Groups<'a> {
  scm: &'a ScmClient,
}

impl<'a> Groups<'a> {
  pub(super) fn new(scm: &'a ScmClient) -> Self {
    Self { scm }
  }

  pub async fn list(&self, request: &GroupsRequest) -> Result<GroupCollection, ApiError> {
    let link = self.scm.required_index_link("groups").await?;

    let mut params: Vec<(&str, String)> = Vec::new();
    if let Some(search) = &request.search {
      params.push(("q", search.clone()));
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
      .push(request.search.clone().unwrap_or_default())
      .push(request.page.unwrap_or(0));

    let api = self.scm.api().clone();
    let value = self
      .scm
      .cache()
      .get_with_seed(&key, move || fetch_json(api, url), seed_groups)
      .await?;
    decode(value)
  }

  pub async fn get(&self, name: &str) -> Result<Group, ApiError> {
    let link = self.scm.required_index_link("groups").await?;
    let url = urls::concat(link.trim_end_matches('/'), &[name]);

    let api = self.scm.api().clone();
    let value = self
      .scm
      .cache()
      .get_with(&group_key(name), move || fetch_json(api, url))
      .await?;
    decode(value)
  }

  pub async fn create(&self, group: &Group) -> Result<Group, ApiError> {
    let link = self.scm.required_index_link("groups").await?;

    let response = self
      .scm
      .api()
      .post_json(&link, group, GROUP_MEDIA_TYPE, &[])
      .await?;
    let location = response
      .headers()
      .get(reqwest::header::LOCATION)
      .and_then(|value| value.to_str().ok())
      .map(String::from)
      .ok_or(ApiError::MissingLocationHeader)?;

    let created = self.scm.api().get(&location).await?;
    let value: Value = created.json().await.map_err(ApiError::from)?;
    let group: Group = decode(value.clone())?;

    self.scm.cache().apply(
      MutationEffects::new()
        .set(group_key(&group.name), value)
        .invalidate(collection_key()),
    );
    Ok(group)
  }

  pub async fn update(&self, group: &Group) -> Result<(), ApiError> {
    let link = group.links.required_link("update")?.to_string();
    self
      .scm
      .api()
      .put_json(&link, group, GROUP_MEDIA_TYPE, &[])
      .await?;
    self.scm.cache().apply(
      MutationEffects::new()
        .invalidate(group_key(&group.name))
        .invalidate(collection_key()),
    );
    Ok(())
  }

  pub async fn delete(&self, group: &Group) -> Result<(), ApiError> {
    let link = group.links.required_link("delete")?.to_string();
    self.scm.api().delete(&link).await?;
    self.scm.cache().apply(
      MutationEffects::new()
        .remove(group_key(&group.name))
        .invalidate(collection_key()),
    );
    Ok(())
  }
}

fn seed_groups(value: &Value) -> Vec<(CacheKey, Value)> {
  let mut seeds = Vec::new();
  if let Some(items) = value.pointer("/_embedded/groups").and_then(Value::as_array) {
    for item in items {
      if let Some(name) = item.get("name").and_then(Value::as_str) {
        seeds.push((group_key(name), item.clone()));
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

  #[tokio::test]
  async fn test_delete_removes_group_entry() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
      .and(path("/api/v2/groups/crew"))
      .respond_with(ResponseTemplate::new(204))
      .expect(1)
      .mount(&server)
      .await;

    let client = ScmClient::new(&server.uri()).unwrap();
    client
      .cache()
      .set(group_key("crew"), serde_json::json!({"name": "crew"}));

    let group: Group = serde_json::from_value(serde_json::json!({
      "name": "crew",
      "_links": {"delete": {"href": "/groups/crew"}}
    }))
    .unwrap();
    client.groups().delete(&group).await.unwrap();

    assert_eq!(
      client.cache().lookup(&group_key("crew")).state,
      EntryState::Missing
    );
  }
}
