//! Multi-page diff of a changeset.
//!
//! Large diffs arrive in chunks: each page may carry a `next` cursor, an
//! explicit advance fetches it, and the file lists concatenate in fetch
//! order while the link metadata always reflects the newest page. The
//! merged snapshot is written back to the cache after every advance.

use crate::cache::{CacheKey, ResourceCache};
use crate::error::ApiError;
use crate::fetch::{PagedRepresentation, Pager};

use super::types::{Changeset, Diff};
use super::ScmClient;

impl PagedRepresentation for Diff {
  fn next_link(&self) -> Option<String> {
    self.links.link("next").ok().flatten().map(String::from)
  }

  fn merge(older: Self, newer: Self) -> Self {
    let mut files = older.files;
    files.extend(newer.files);
    Diff {
      files,
      partial: newer.partial,
      links: newer.links,
    }
  }
}

pub fn diff_key(changeset: &Changeset) -> CacheKey {
  CacheKey::new().push("diff").push(&changeset.id)
}

pub struct Diffs<'a> {
  scm: &'a ScmClient,
}

impl<'a> Diffs<'a> {
  pub(super) fn new(scm: &'a ScmClient) -> Self {
    Self { scm }
  }

  /// Fetch the first diff page of a changeset and return a session for
  /// explicit page advances.
  pub async fn fetch(&self, changeset: &Changeset) -> Result<DiffSession, ApiError> {
    let link = match changeset.links.link("diffParsed")? {
      Some(link) => link.to_string(),
      None => changeset.links.required_link("diff")?.to_string(),
    };

    let mut pager = Pager::new(self.scm.api().clone());
    pager.fetch_initial(&link).await?;

    let session = DiffSession {
      pager,
      cache: self.scm.cache().clone(),
      key: diff_key(changeset),
    };
    session.store_current();
    Ok(session)
  }
}

/// One diff being read page by page.
pub struct DiffSession {
  pager: Pager<Diff>,
  cache: ResourceCache,
  key: CacheKey,
}

impl DiffSession {
  pub fn current(&self) -> Option<&Diff> {
    self.pager.current()
  }

  /// True once the last page carried no cursor.
  pub fn is_complete(&self) -> bool {
    self.pager.is_complete()
  }

  /// Follow the cursor of the newest page and merge its content.
  pub async fn fetch_more(&mut self) -> Result<Diff, ApiError> {
    let merged = self.pager.fetch_more().await?.clone();
    self.store_current();
    Ok(merged)
  }

  fn store_current(&self) {
    if let Some(diff) = self.pager.current() {
      if let Ok(value) = serde_json::to_value(diff) {
        self.cache.set(self.key.clone(), value);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::EntryState;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn changeset(server: &MockServer) -> Changeset {
    serde_json::from_value(serde_json::json!({
      "id": "42a",
      "_links": {
        "diffParsed": {
          "href": format!("{}/api/v2/repositories/spaceships/heart-of-gold/diff/42a/parsed", server.uri())
        }
      }
    }))
    .unwrap()
  }

  #[tokio::test]
  async fn test_pages_merge_in_fetch_order() {
    let server = MockServer::start().await;
    let page_two_url = format!(
      "{}/api/v2/repositories/spaceships/heart-of-gold/diff/42a/parsed?offset=1",
      server.uri()
    );

    Mock::given(method("GET"))
      .and(path(
        "/api/v2/repositories/spaceships/heart-of-gold/diff/42a/parsed",
      ))
      .and(query_param("offset", "1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "files": [{"newPath": "b.rs", "hunks": []}],
        "partial": false,
        "_links": {"self": {"href": "page-two"}}
      })))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path(
        "/api/v2/repositories/spaceships/heart-of-gold/diff/42a/parsed",
      ))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "files": [{"newPath": "a.rs", "hunks": []}],
        "partial": true,
        "_links": {
          "self": {"href": "page-one"},
          "next": {"href": page_two_url}
        }
      })))
      .expect(1)
      .mount(&server)
      .await;

    let client = ScmClient::new(&server.uri()).unwrap();
    let mut session = client.diffs().fetch(&changeset(&server)).await.unwrap();
    assert!(!session.is_complete());

    let merged = session.fetch_more().await.unwrap();
    let paths: Vec<_> = merged
      .files
      .iter()
      .filter_map(|file| file.new_path.as_deref())
      .collect();
    assert_eq!(paths, vec!["a.rs", "b.rs"]);

    // non-list metadata comes from the newest page
    assert_eq!(merged.links.link("self").unwrap(), Some("page-two"));
    assert!(!merged.partial);
    assert!(session.is_complete());

    // another advance on a complete diff is a no-op
    let unchanged = session.fetch_more().await.unwrap();
    assert_eq!(unchanged.files.len(), 2);
  }

  #[tokio::test]
  async fn test_merged_snapshot_lands_in_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "files": [],
        "_links": {}
      })))
      .mount(&server)
      .await;

    let client = ScmClient::new(&server.uri()).unwrap();
    let changeset = changeset(&server);
    client.diffs().fetch(&changeset).await.unwrap();

    let entry = client.cache().lookup(&diff_key(&changeset));
    assert_eq!(entry.state, EntryState::Fresh);
  }
}
