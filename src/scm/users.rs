//! User collection and mutations.

use serde_json::Value;

use crate::cache::{CacheKey, MutationEffects};
use crate::error::ApiError;
use crate::http::urls;

use super::types::{PermissionOverview, User, UserCollection};
use super::{decode, fetch_json, ScmClient};

pub const USER_MEDIA_TYPE: &str = "application/vnd.scmm-user+json;v=2";

pub fn user_key(name: &str) -> CacheKey {
  CacheKey::new().push("user").push(name)
}

fn collection_key() -> CacheKey {
  CacheKey::new().push("users")
}

#[derive(Debug, Clone, Default)]
pub struct UsersRequest {
  pub search: Option<String>,
  pub page: Option<u64>,
}

pub struct Users<'a> {
  scm: &'a ScmClient,
}

impl<'a> Users<'a> {
  pub(super) fn new(scm: &'a ScmClient) -> Self {
    Self { scm }
  }

  /// Fetch the user collection, seeding every embedded user under its own
  /// key.
  pub async fn list(&self, request: &UsersRequest) -> Result<UserCollection, ApiError> {
    let link = self.scm.required_index_link("users").await?;

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
      .get_with_seed(&key, move || fetch_json(api, url), seed_users)
      .await?;
    decode(value)
  }

  pub async fn get(&self, name: &str) -> Result<User, ApiError> {
    let link = self.scm.required_index_link("users").await?;
    let url = urls::concat(link.trim_end_matches('/'), &[name]);

    let api = self.scm.api().clone();
    let value = self
      .scm
      .cache()
      .get_with(&user_key(name), move || fetch_json(api, url))
      .await?;
    decode(value)
  }

  /// Create a user; the created resource is fetched from the `Location`
  /// header and seeded.
  pub async fn create(&self, user: &User) -> Result<User, ApiError> {
    let link = self.scm.required_index_link("users").await?;

    let response = self
      .scm
      .api()
      .post_json(&link, user, USER_MEDIA_TYPE, &[])
      .await?;
    let location = response
      .headers()
      .get(reqwest::header::LOCATION)
      .and_then(|value| value.to_str().ok())
      .map(String::from)
      .ok_or(ApiError::MissingLocationHeader)?;

    let created = self.scm.api().get(&location).await?;
    let value: Value = created.json().await.map_err(ApiError::from)?;
    let user: User = decode(value.clone())?;

    self.scm.cache().apply(
      MutationEffects::new()
        .set(user_key(&user.name), value)
        .invalidate(collection_key()),
    );
    Ok(user)
  }

  pub async fn update(&self, user: &User) -> Result<(), ApiError> {
    let link = user.links.required_link("update")?.to_string();
    self
      .scm
      .api()
      .put_json(&link, user, USER_MEDIA_TYPE, &[])
      .await?;
    self.scm.cache().apply(
      MutationEffects::new()
        .invalidate(user_key(&user.name))
        .invalidate(collection_key()),
    );
    Ok(())
  }

  pub async fn delete(&self, user: &User) -> Result<(), ApiError> {
    let link = user.links.required_link("delete")?.to_string();
    self.scm.api().delete(&link).await?;
    self.scm.cache().apply(
      MutationEffects::new()
        .remove(user_key(&user.name))
        .invalidate(collection_key()),
    );
    Ok(())
  }

  /// Overview of groups and repositories relevant for one user.
  pub async fn permission_overview(&self, user: &User) -> Result<PermissionOverview, ApiError> {
    let link = user.links.required_link("permissionOverview")?.to_string();
    let key = user_key(&user.name).push("permissionOverview");

    let api = self.scm.api().clone();
    let value = self
      .scm
      .cache()
      .get_with(&key, move || fetch_json(api, link))
      .await?;
    decode(value)
  }
}

fn seed_users(value: &Value) -> Vec<(CacheKey, Value)> {
  let mut seeds = Vec::new();
  if let Some(items) = value.pointer("/_embedded/users").and_then(Value::as_array) {
    for item in items {
      if let Some(name) = item.get("name").and_then(Value::as_str) {
        seeds.push((user_key(name), item.clone()));
      }
    }
  }
  seeds
}
