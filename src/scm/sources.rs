//! Source tree of a repository with partial-result polling.
//!
//! Trees are paged through the `proceed` cursor like diffs are paged
//! through `next`. On top of that, entries may still be computed
//! server-side: as long as any entry stays partial, the watcher refetches
//! the already merged tree after a fixed delay, and stops permanently
//! once the server reports it gave up. Consumers observe snapshots
//! through a watch channel and tear the polling down with
//! [`SourcesWatcher::stop`] (dropping the watcher does the same).

use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;

use crate::cache::{CacheKey, ResourceCache};
use crate::error::ApiError;
use crate::fetch::{PagedRepresentation, Pager, Partiality, Poller, PollState};
use crate::http::urls;

use super::repositories::repo_key;
use super::types::{File, FileChildren, Repository};
use super::ScmClient;

impl PagedRepresentation for File {
  fn next_link(&self) -> Option<String> {
    self.links.link("proceed").ok().flatten().map(String::from)
  }

  fn merge(older: Self, newer: Self) -> Self {
    let mut children = older.embedded.children;
    children.extend(newer.embedded.children);
    File {
      embedded: FileChildren { children },
      ..newer
    }
  }
}

/// Verdict over a merged tree: an abandoned computation dominates any
/// partial entry, because polling must stop for good in that case.
pub fn partiality(file: &File) -> Partiality {
  let mut any_partial = false;
  let mut any_aborted = false;
  walk(file, &mut any_partial, &mut any_aborted);

  if any_aborted {
    Partiality::Aborted
  } else if any_partial {
    Partiality::Partial
  } else {
    Partiality::Complete
  }
}

fn walk(file: &File, any_partial: &mut bool, any_aborted: &mut bool) {
  if file.computation_aborted {
    *any_aborted = true;
  } else if file.partial_result {
    *any_partial = true;
  }
  for child in &file.embedded.children {
    walk(child, any_partial, any_aborted);
  }
}

pub fn sources_key(repository: &Repository, revision: &str, path: &str) -> CacheKey {
  repo_key(&repository.namespace, &repository.name)
    .push("sources")
    .push(revision)
    .push(path)
}

fn sources_url(base: &str, revision: &str, path: &str) -> String {
  if revision.is_empty() && path.is_empty() {
    return base.to_string();
  }
  format!(
    "{}/{}/{}",
    base.trim_end_matches('/'),
    urls::encode_component(revision),
    path
  )
}

pub struct Sources<'a> {
  scm: &'a ScmClient,
}

impl<'a> Sources<'a> {
  pub(super) fn new(scm: &'a ScmClient) -> Self {
    Self { scm }
  }

  /// Build a watcher for the tree at `revision`/`path`. Nothing is
  /// fetched until [`SourcesWatcher::fetch`] runs.
  pub fn watch(
    &self,
    repository: &Repository,
    revision: &str,
    path: &str,
  ) -> Result<SourcesWatcher, ApiError> {
    let base = repository.links.required_link("sources")?;
    let url = sources_url(base, revision, path);
    let key = sources_key(repository, revision, path);

    Ok(SourcesWatcher {
      inner: Arc::new(WatcherInner {
        pager: tokio::sync::Mutex::new(Pager::new(self.scm.api().clone())),
        poller: Poller::new(self.scm.poll_delay()),
        tx: watch::channel(None).0,
        cache: self.scm.cache().clone(),
        key,
        url,
      }),
    })
  }
}

/// One observed source tree. Not clonable: the owner controls the
/// polling lifecycle, other consumers attach via [`subscribe`].
///
/// [`subscribe`]: SourcesWatcher::subscribe
pub struct SourcesWatcher {
  inner: Arc<WatcherInner>,
}

struct WatcherInner {
  pager: tokio::sync::Mutex<Pager<File>>,
  poller: Poller,
  tx: watch::Sender<Option<File>>,
  cache: ResourceCache,
  key: CacheKey,
  url: String,
}

impl SourcesWatcher {
  /// Snapshot stream; receivers see every published merge and poll result.
  pub fn subscribe(&self) -> watch::Receiver<Option<File>> {
    self.inner.tx.subscribe()
  }

  pub fn poll_state(&self) -> PollState {
    self.inner.poller.state()
  }

  /// True once the last fetched page carried no cursor.
  pub fn is_complete(&self) -> bool {
    self
      .inner
      .tx
      .borrow()
      .as_ref()
      .map(|file| file.links.link("proceed").ok().flatten().is_none())
      .unwrap_or(false)
  }

  /// Fetch the first tree page, replacing any previous state.
  pub async fn fetch(&self) -> Result<File, ApiError> {
    self.inner.poller.mark_fetching();
    let file = {
      let mut pager = self.inner.pager.lock().await;
      pager.fetch_initial(&self.inner.url).await?.clone()
    };
    publish_and_schedule(&self.inner, file.clone());
    Ok(file)
  }

  /// Follow the `proceed` cursor of the newest page and merge its
  /// children into the tree.
  pub async fn advance(&self) -> Result<File, ApiError> {
    self.inner.poller.mark_fetching();
    let file = {
      let mut pager = self.inner.pager.lock().await;
      pager.fetch_more().await?.clone()
    };
    publish_and_schedule(&self.inner, file.clone());
    Ok(file)
  }

  /// Stop polling. Safe to call any number of times; dropping the
  /// watcher stops polling as well.
  pub fn stop(&self) {
    self.inner.poller.stop();
  }
}

impl Drop for SourcesWatcher {
  fn drop(&mut self) {
    self.stop();
  }
}

fn publish_and_schedule(inner: &Arc<WatcherInner>, file: File) {
  if let Ok(value) = serde_json::to_value(&file) {
    inner.cache.set(inner.key.clone(), value);
  }
  let verdict = partiality(&file);
  inner.tx.send_replace(Some(file));

  let task_inner = Arc::clone(inner);
  inner.poller.on_fetched(verdict, move || async move {
    let refetched = {
      let mut pager = task_inner.pager.lock().await;
      pager.refetch_merged().await.map(|file| file.clone())
    };
    match refetched {
      Ok(file) => publish_and_schedule(&task_inner, file),
      Err(error) => {
        warn!(error = %error, "refetch of partial tree failed, polling stops");
      }
    }
  });
}
