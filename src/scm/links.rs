//! Hypermedia link resolution.
//!
//! A relation may be absent, a single link, or an array of named
//! sub-links. Absence is a normal outcome and never an error; hitting an
//! array without naming the wanted sub-link is an error, not an absence.

use crate::error::ApiError;

use super::types::{Links, LinkValue};

impl Links {
  /// Resolve a single link by relation name. Absent relations yield
  /// `Ok(None)`.
  pub fn link(&self, name: &str) -> Result<Option<&str>, ApiError> {
    match self.0.get(name) {
      None => Ok(None),
      Some(LinkValue::Single(link)) => Ok(Some(&link.href)),
      Some(LinkValue::Multiple(_)) => Err(ApiError::MissingLink(format!(
        "link {} is a collection of named links, a sub-name is required",
        name
      ))),
    }
  }

  /// Like [`link`](Self::link), but failing when the relation is absent.
  pub fn required_link(&self, name: &str) -> Result<&str, ApiError> {
    self
      .link(name)?
      .ok_or_else(|| ApiError::MissingLink(format!("could not find link {}", name)))
  }

  /// Resolve a named sub-link from an array relation. A single link under
  /// the relation is returned as is.
  pub fn named_link(&self, name: &str, sub_name: &str) -> Result<Option<&str>, ApiError> {
    match self.0.get(name) {
      None => Ok(None),
      Some(LinkValue::Single(link)) => Ok(Some(&link.href)),
      Some(LinkValue::Multiple(links)) => Ok(
        links
          .iter()
          .find(|link| link.name.as_deref() == Some(sub_name))
          .map(|link| link.href.as_str()),
      ),
    }
  }

  pub fn contains(&self, name: &str) -> bool {
    self.0.contains_key(name)
  }
}
