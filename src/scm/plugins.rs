//! Plugin administration: available, installed and pending plugins.
//!
//! Every plugin mutation invalidates all three collections, because an
//! install moves a plugin from available to installed and parks it in the
//! pending set until the pending changes are executed.

use crate::cache::{CacheKey, MutationEffects};
use crate::error::ApiError;

use super::types::{PendingPlugins, Plugin, PluginCollection};
use super::{decode, fetch_json, ScmClient};

fn plugins_key(kind: &str) -> CacheKey {
  CacheKey::new().push("plugins").push(kind)
}

fn invalidate_all_plugin_collections() -> MutationEffects {
  MutationEffects::new()
    .invalidate(plugins_key("available"))
    .invalidate(plugins_key("installed"))
    .invalidate(plugins_key("pending"))
}

pub struct Plugins<'a> {
  scm: &'a ScmClient,
}

impl<'a> Plugins<'a> {
  pub(super) fn new(scm: &'a ScmClient) -> Self {
    Self { scm }
  }

  pub async fn list_available(&self) -> Result<PluginCollection, ApiError> {
    self.list("availablePlugins", "available").await
  }

  pub async fn list_installed(&self) -> Result<PluginCollection, ApiError> {
    self.list("installedPlugins", "installed").await
  }

  async fn list(&self, relation: &str, kind: &str) -> Result<PluginCollection, ApiError> {
    let link = self.scm.required_index_link(relation).await?;
    let api = self.scm.api().clone();
    let value = self
      .scm
      .cache()
      .get_with(&plugins_key(kind), move || fetch_json(api, link))
      .await?;
    decode(value)
  }

  /// Changes waiting for execution (install, update, uninstall).
  pub async fn pending(&self) -> Result<PendingPlugins, ApiError> {
    let link = self.scm.required_index_link("pendingPlugins").await?;
    let api = self.scm.api().clone();
    let value = self
      .scm
      .cache()
      .get_with(&plugins_key("pending"), move || fetch_json(api, link))
      .await?;
    decode(value)
  }

  pub async fn install(&self, plugin: &Plugin) -> Result<(), ApiError> {
    self.trigger(&plugin.links.required_link("install")?.to_string()).await
  }

  pub async fn uninstall(&self, plugin: &Plugin) -> Result<(), ApiError> {
    self.trigger(&plugin.links.required_link("uninstall")?.to_string()).await
  }

  pub async fn update(&self, plugin: &Plugin) -> Result<(), ApiError> {
    self.trigger(&plugin.links.required_link("update")?.to_string()).await
  }

  /// Execute all pending plugin changes (usually restarts the server).
  pub async fn execute_pending(&self, pending: &PendingPlugins) -> Result<(), ApiError> {
    self.trigger(&pending.links.required_link("execute")?.to_string()).await
  }

  /// Revert all pending plugin changes.
  pub async fn cancel_pending(&self, pending: &PendingPlugins) -> Result<(), ApiError> {
    self.trigger(&pending.links.required_link("cancel")?.to_string()).await
  }

  async fn trigger(&self, link: &str) -> Result<(), ApiError> {
    self.scm.api().post(link).await?;
    self.scm.cache().apply(invalidate_all_plugin_collections());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::EntryState;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  #[tokio::test]
  async fn test_install_invalidates_all_plugin_collections() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/v2/plugins/available/scm-review-plugin/install"))
      .respond_with(ResponseTemplate::new(200))
      .expect(1)
      .mount(&server)
      .await;

    let client = ScmClient::new(&server.uri()).unwrap();
    client
      .cache()
      .set(plugins_key("available"), serde_json::json!({}));
    client
      .cache()
      .set(plugins_key("installed"), serde_json::json!({}));
    client
      .cache()
      .set(plugins_key("pending"), serde_json::json!({}));

    let plugin: Plugin = serde_json::from_value(serde_json::json!({
      "name": "scm-review-plugin",
      "version": "2.0.0",
      "_links": {
        "install": {"href": "/plugins/available/scm-review-plugin/install"}
      }
    }))
    .unwrap();
    client.plugins().install(&plugin).await.unwrap();

    for kind in ["available", "installed", "pending"] {
      assert_eq!(
        client.cache().lookup(&plugins_key(kind)).state,
        EntryState::Stale,
        "collection {} should be stale",
        kind
      );
    }
  }

  #[tokio::test]
  async fn test_pending_plugins_parse() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v2/"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "_links": {"pendingPlugins": {"href": "/plugins/pending"}}
      })))
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/api/v2/plugins/pending"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "_embedded": {
          "new": [{"name": "scm-review-plugin", "version": "2.0.0", "_links": {}}],
          "update": [],
          "uninstall": []
        },
        "_links": {"execute": {"href": "/plugins/pending/execute"}}
      })))
      .mount(&server)
      .await;

    let client = ScmClient::new(&server.uri()).unwrap();
    let pending = client.plugins().pending().await.unwrap();
    assert_eq!(pending.embedded.new_plugins[0].name, "scm-review-plugin");
    assert!(pending.links.contains("execute"));
  }
}
