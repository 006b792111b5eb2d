//! Cursor-driven fetching of multi-page resources.
//!
//! A page representation may carry a link to more data; absence of the
//! link means the resource is complete. Pages are merged in fetch order,
//! item lists concatenated, while non-list metadata always comes from the
//! most recently fetched page.

use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::http::ApiClient;

/// A page representation that may point at more data.
pub trait PagedRepresentation: Sized {
  /// Cursor to the next chunk; `None` means the resource is complete.
  fn next_link(&self) -> Option<String>;

  /// Merge a newer page into an older one.
  fn merge(older: Self, newer: Self) -> Self;
}

/// Drives initial fetch and explicit page advances for one resource.
pub struct Pager<T> {
  client: ApiClient,
  fetched_urls: Vec<String>,
  current: Option<T>,
}

impl<T: PagedRepresentation + DeserializeOwned> Pager<T> {
  pub fn new(client: ApiClient) -> Self {
    Self {
      client,
      fetched_urls: Vec::new(),
      current: None,
    }
  }

  /// Merged value fetched so far.
  pub fn current(&self) -> Option<&T> {
    self.current.as_ref()
  }

  /// True once the last fetched page carries no cursor.
  pub fn is_complete(&self) -> bool {
    self
      .current
      .as_ref()
      .map(|page| page.next_link().is_none())
      .unwrap_or(false)
  }

  /// Fetch page one at the base URL, replacing any previous state.
  pub async fn fetch_initial(&mut self, url: &str) -> Result<&T, ApiError> {
    let page = self.fetch_page(url).await?;
    self.fetched_urls = vec![url.to_string()];
    Ok(&*self.current.insert(page))
  }

  /// Follow the current page's cursor and merge the result. A complete
  /// resource is left untouched.
  pub async fn fetch_more(&mut self) -> Result<&T, ApiError> {
    let next = self.current.as_ref().and_then(|page| page.next_link());
    let Some(next) = next else {
      return self.current_or_error();
    };

    let page = self.fetch_page(&next).await?;
    self.fetched_urls.push(next);
    let merged = match self.current.take() {
      Some(older) => T::merge(older, page),
      None => page,
    };
    Ok(&*self.current.insert(merged))
  }

  /// Refetch every previously fetched page and rebuild the merged value,
  /// used when the server was still computing parts of the resource.
  pub async fn refetch_merged(&mut self) -> Result<&T, ApiError> {
    let urls = self.fetched_urls.clone();
    let mut merged: Option<T> = None;
    for url in &urls {
      let page = self.fetch_page(url).await?;
      merged = Some(match merged {
        Some(older) => T::merge(older, page),
        None => page,
      });
    }
    if let Some(merged) = merged {
      self.current = Some(merged);
    }
    self.current_or_error()
  }

  async fn fetch_page(&self, url: &str) -> Result<T, ApiError> {
    let response = self.client.get(url).await?;
    response.json::<T>().await.map_err(ApiError::from)
  }

  fn current_or_error(&self) -> Result<&T, ApiError> {
    self.current.as_ref().ok_or_else(|| {
      ApiError::MissingLink("cannot advance before the initial page was fetched".to_string())
    })
  }
}
