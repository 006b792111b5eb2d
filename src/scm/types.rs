//! Wire types for the SCM-Manager REST API.
//!
//! Representations follow the hypermedia convention: a `_links` map of
//! relation name to a link or an array of named sub-links, and
//! `_embedded` item lists on collections.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single hypermedia link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
  pub href: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub templated: Option<bool>,
}

impl Link {
  pub fn to(href: impl Into<String>) -> Self {
    Self {
      href: href.into(),
      name: None,
      templated: None,
    }
  }

  pub fn named(name: impl Into<String>, href: impl Into<String>) -> Self {
    Self {
      href: href.into(),
      name: Some(name.into()),
      templated: None,
    }
  }
}

/// A link relation: either one link or an array of named sub-links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkValue {
  Single(Link),
  Multiple(Vec<Link>),
}

/// The `_links` map of a representation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Links(pub HashMap<String, LinkValue>);

impl Links {
  /// Builder used mostly by tests and fixtures.
  pub fn with(mut self, name: impl Into<String>, value: LinkValue) -> Self {
    self.0.insert(name.into(), value);
    self
  }

  pub fn single(name: impl Into<String>, href: impl Into<String>) -> Self {
    Links::default().with(name, LinkValue::Single(Link::to(href)))
  }
}

/// Index (root) resource carrying all entry point links.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Index {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  #[serde(rename = "_links", default)]
  pub links: Links,
}

// ---------------------------------------------------------------------------
// repositories

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
  pub namespace: String,
  pub name: String,
  #[serde(rename = "type")]
  pub repository_type: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub contact: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub archived: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub creation_date: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_modified: Option<String>,
  #[serde(rename = "_links", default)]
  pub links: Links,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedRepositories {
  #[serde(default)]
  pub repositories: Vec<Repository>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryCollection {
  #[serde(default)]
  pub page: u64,
  #[serde(default)]
  pub page_total: u64,
  #[serde(rename = "_embedded", default)]
  pub embedded: EmbeddedRepositories,
  #[serde(rename = "_links", default)]
  pub links: Links,
}

/// Paths of a repository at one revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paths {
  pub revision: String,
  #[serde(default)]
  pub paths: Vec<String>,
}

// ---------------------------------------------------------------------------
// users and groups

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub name: String,
  pub display_name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mail: Option<String>,
  #[serde(default)]
  pub external: bool,
  #[serde(default)]
  pub active: bool,
  /// Only set on creation requests, never returned by the server.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub password: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub creation_date: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_modified: Option<String>,
  #[serde(rename = "_links", default)]
  pub links: Links,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedUsers {
  #[serde(default)]
  pub users: Vec<User>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCollection {
  #[serde(default)]
  pub page: u64,
  #[serde(default)]
  pub page_total: u64,
  #[serde(rename = "_embedded", default)]
  pub embedded: EmbeddedUsers,
  #[serde(rename = "_links", default)]
  pub links: Links,
}

/// The authenticated subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Me {
  pub name: String,
  pub display_name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mail: Option<String>,
  #[serde(default)]
  pub groups: Vec<String>,
  #[serde(rename = "_links", default)]
  pub links: Links,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionOverviewGroup {
  pub name: String,
  #[serde(default)]
  pub permissions: bool,
  #[serde(default)]
  pub external: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionOverviewRepository {
  pub namespace: String,
  pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionOverview {
  #[serde(default)]
  pub relevant_groups: Vec<PermissionOverviewGroup>,
  #[serde(default)]
  pub relevant_namespaces: Vec<String>,
  #[serde(default)]
  pub relevant_repositories: Vec<PermissionOverviewRepository>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub members: Vec<String>,
  #[serde(default)]
  pub external: bool,
  #[serde(rename = "_links", default)]
  pub links: Links,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedGroups {
  #[serde(default)]
  pub groups: Vec<Group>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCollection {
  #[serde(default)]
  pub page: u64,
  #[serde(default)]
  pub page_total: u64,
  #[serde(rename = "_embedded", default)]
  pub embedded: EmbeddedGroups,
  #[serde(rename = "_links", default)]
  pub links: Links,
}

// ---------------------------------------------------------------------------
// branches, tags, changesets

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
  pub name: String,
  pub revision: String,
  #[serde(default)]
  pub default_branch: bool,
  #[serde(rename = "_links", default)]
  pub links: Links,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedBranches {
  #[serde(default)]
  pub branches: Vec<Branch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BranchCollection {
  #[serde(rename = "_embedded", default)]
  pub embedded: EmbeddedBranches,
  #[serde(rename = "_links", default)]
  pub links: Links,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
  pub name: String,
  pub revision: String,
  #[serde(rename = "_links", default)]
  pub links: Links,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedTags {
  #[serde(default)]
  pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagCollection {
  #[serde(rename = "_embedded", default)]
  pub embedded: EmbeddedTags,
  #[serde(rename = "_links", default)]
  pub links: Links,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Changeset {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub date: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub author: Option<Person>,
  #[serde(rename = "_links", default)]
  pub links: Links,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChangesets {
  #[serde(default)]
  pub changesets: Vec<Changeset>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesetCollection {
  #[serde(default)]
  pub page: u64,
  #[serde(default)]
  pub page_total: u64,
  #[serde(rename = "_embedded", default)]
  pub embedded: EmbeddedChangesets,
  #[serde(rename = "_links", default)]
  pub links: Links,
}

// ---------------------------------------------------------------------------
// diff

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HunkChange {
  pub content: String,
  #[serde(rename = "type")]
  pub change_type: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub old_line_number: Option<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub new_line_number: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hunk {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content: Option<String>,
  #[serde(default)]
  pub changes: Vec<HunkChange>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffFile {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub old_path: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub new_path: Option<String>,
  #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
  pub change_type: Option<String>,
  #[serde(default)]
  pub hunks: Vec<Hunk>,
}

/// Parsed diff of a changeset; large diffs arrive in pages linked through
/// the `next` relation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diff {
  #[serde(default)]
  pub files: Vec<DiffFile>,
  #[serde(default)]
  pub partial: bool,
  #[serde(rename = "_links", default)]
  pub links: Links,
}

// ---------------------------------------------------------------------------
// file tree

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileChildren {
  #[serde(default)]
  pub children: Vec<File>,
}

/// Entry of a source tree. Large directories arrive in pages linked
/// through the `proceed` relation; entries the server is still computing
/// carry the partial-result markers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
  pub name: String,
  pub path: String,
  #[serde(default)]
  pub directory: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub length: Option<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub revision: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub commit_date: Option<String>,
  /// The value is not final; the server is still computing it.
  #[serde(default)]
  pub partial_result: bool,
  /// The server gave up computing this entry.
  #[serde(default)]
  pub computation_aborted: bool,
  #[serde(rename = "_embedded", default)]
  pub embedded: FileChildren,
  #[serde(rename = "_links", default)]
  pub links: Links,
}

// ---------------------------------------------------------------------------
// plugins

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plugin {
  pub name: String,
  pub version: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub display_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub pending: bool,
  #[serde(rename = "_links", default)]
  pub links: Links,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedPlugins {
  #[serde(default)]
  pub plugins: Vec<Plugin>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginCollection {
  #[serde(rename = "_embedded", default)]
  pub embedded: EmbeddedPlugins,
  #[serde(rename = "_links", default)]
  pub links: Links,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedPendingPlugins {
  #[serde(rename = "new", default)]
  pub new_plugins: Vec<Plugin>,
  #[serde(default)]
  pub update: Vec<Plugin>,
  #[serde(default)]
  pub uninstall: Vec<Plugin>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingPlugins {
  #[serde(rename = "_embedded", default)]
  pub embedded: EmbeddedPendingPlugins,
  #[serde(rename = "_links", default)]
  pub links: Links,
}
