//! Login, logout and the authenticated subject.
//!
//! Both login and logout change who the server answers for, so they drop
//! the whole cache instead of picking individual keys.

use reqwest::header::SET_COOKIE;

use crate::cache::CacheKey;
use crate::error::ApiError;

use super::types::Me;
use super::{decode, fetch_json, ScmClient};

pub(super) fn me_key() -> CacheKey {
  CacheKey::new().push("me")
}

pub struct Auth<'a> {
  scm: &'a ScmClient,
}

impl<'a> Auth<'a> {
  pub(super) fn new(scm: &'a ScmClient) -> Self {
    Self { scm }
  }

  /// The authenticated subject, `None` while the index carries no `me`
  /// link (anonymous session).
  pub async fn me(&self) -> Result<Option<Me>, ApiError> {
    let Some(link) = self.scm.index_link("me").await? else {
      return Ok(None);
    };

    let api = self.scm.api().clone();
    let value = self
      .scm
      .cache()
      .get_with(&me_key(), move || fetch_json(api, link))
      .await?;
    Ok(Some(decode(value)?))
  }

  /// Authenticate with username and password; the session cookie handed
  /// out by the server is adopted for all further requests.
  pub async fn login(&self, username: &str, password: &str) -> Result<(), ApiError> {
    let link = self.scm.required_index_link("login").await?;
    let payload = serde_json::json!({
      "cookie": true,
      "grant_type": "password",
      "username": username,
      "password": password,
    });

    let response = self
      .scm
      .api()
      .post_json(&link, &payload, "application/json", &[])
      .await?;

    let cookies: Vec<String> = response
      .headers()
      .get_all(SET_COOKIE)
      .iter()
      .filter_map(|value| value.to_str().ok())
      .filter_map(|value| value.split(';').next())
      .map(String::from)
      .collect();
    if !cookies.is_empty() {
      self.scm.api().set_cookies(Some(cookies.join("; ")));
    }

    self.scm.cache().clear();
    Ok(())
  }

  pub async fn logout(&self) -> Result<(), ApiError> {
    let link = self.scm.required_index_link("logout").await?;
    self.scm.api().delete(&link).await?;

    self.scm.api().set_cookies(None);
    self.scm.cache().clear();
    Ok(())
  }
}
